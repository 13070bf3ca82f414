//! Example: Load and inspect a 3MF file.
//!
//! Run with: cargo run --example load_3mf -- assets/assembly.3mf
//!
//! Flags:
//!   --json              print the scene description as JSON
//!   --no-postprocess    disable the per-body merge heuristic
//!   --export <path>     write the resolved geometry back out as 3MF

use std::env;

use tmf_core::threemf::{load_3mf_with_options, save_3mf, LoadOptions};
use tmf_math::DVec3;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut path = None;
    let mut json = false;
    let mut export = None;
    let mut options = LoadOptions::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--no-postprocess" => options.postprocess = false,
            "--export" => export = iter.next(),
            other => path = Some(other),
        }
    }

    let Some(path) = path else {
        println!("Usage: load_3mf <path-to-3mf-file> [--json] [--no-postprocess] [--export <path>]");
        println!("\nExamples:");
        println!("  cargo run --example load_3mf -- assets/assembly.3mf");
        println!("  cargo run --example load_3mf -- assets/assembly.3mf --json");
        return;
    };

    println!("Loading 3MF file: {}", path);

    let scene = match load_3mf_with_options(path, &options) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("Error loading 3MF file: {}", e);
            return;
        }
    };

    if json {
        match scene.to_json_pretty() {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error serializing scene: {}", e),
        }
    } else {
        println!("\n=== Scene ({}) ===", scene.metadata.units);
        println!("Geometries: {}", scene.geometry_count());
        println!("Instances: {}", scene.instance_count());
        println!("Total triangles: {}", scene.total_triangle_count());

        println!("\n--- Geometry ---");
        for geometry in scene.geometries() {
            println!(
                "  {} - {} vertices, {} triangles, {} instances",
                geometry.name,
                geometry.mesh.vertex_count(),
                geometry.mesh.triangle_count(),
                scene.instances_of(&geometry.name).count()
            );
        }

        println!("\n--- Instances ---");
        for edge in &scene.graph {
            let pos = edge.matrix.transform_point3(DVec3::ZERO);
            println!(
                "  {} -> {} at ({:.2}, {:.2}, {:.2})",
                edge.frame_to, edge.geometry, pos.x, pos.y, pos.z
            );
        }

        let bounds = scene.world_bounds();
        if !bounds.is_empty() {
            println!("\n--- World Bounds ---");
            println!("  Min: ({:.2}, {:.2}, {:.2})", bounds.min.x, bounds.min.y, bounds.min.z);
            println!("  Max: ({:.2}, {:.2}, {:.2})", bounds.max.x, bounds.max.y, bounds.max.z);
            let (size, center) = (bounds.size(), bounds.centroid());
            println!("  Size: ({:.2}, {:.2}, {:.2})", size.x, size.y, size.z);
            println!("  Center: ({:.2}, {:.2}, {:.2})", center.x, center.y, center.z);
        }
    }

    if let Some(out) = export {
        let geometry = scene.geometries().iter().map(|g| (g.name.as_str(), &g.mesh));
        match save_3mf(out, geometry) {
            Ok(()) => println!("\nExported to {}", out),
            Err(e) => eprintln!("Error exporting 3MF file: {}", e),
        }
    }
}
