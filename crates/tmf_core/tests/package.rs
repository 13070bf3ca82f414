//! End-to-end tests through in-memory 3MF packages.

use std::io::{Cursor, Write};

use anyhow::Result;
use tmf_core::threemf::{
    export_scene, load_3mf, load_3mf_from_reader, save_3mf, LoadError, LoadOptions,
};
use tmf_core::SceneDescription;
use tmf_math::DVec3;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const ASSEMBLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US"
       xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <object id="1" name="Bolt" type="model">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="1" y="0" z="0"/>
          <vertex x="0" y="1" z="0"/>
          <vertex x="0" y="0" z="1"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="2" v3="1"/>
          <triangle v1="0" v2="1" v3="3"/>
          <triangle v1="0" v2="3" v3="2"/>
          <triangle v1="1" v2="2" v3="3"/>
        </triangles>
      </mesh>
    </object>
    <object id="2" name="Plate" type="model">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="10" y="0" z="0"/>
          <vertex x="0" y="10" z="0"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
    <object id="3" name="Bracket" type="model">
      <components>
        <component objectid="2"/>
        <component objectid="1" transform="1 0 0 0 1 0 0 0 1 2 2 0"/>
        <component objectid="1" transform="1 0 0 0 1 0 0 0 1 8 2 0"/>
      </components>
    </object>
  </resources>
  <build>
    <item objectid="3" transform="1 0 0 0 1 0 0 0 1 0 0 5"/>
    <item objectid="3" transform="1 0 0 0 1 0 0 0 1 0 0 -5"/>
  </build>
</model>"#;

fn package(entries: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

fn load_bytes(bytes: Vec<u8>) -> Result<SceneDescription, LoadError> {
    load_3mf_from_reader(Cursor::new(bytes), &LoadOptions::default())
}

#[test]
fn test_load_assembly() -> Result<()> {
    let scene = load_bytes(package(&[("3D/3dmodel.model", ASSEMBLY)])?)?;

    assert_eq!(scene.geometry_count(), 2);
    assert_eq!(scene.instance_count(), 6);
    assert_eq!(scene.instances_of("Bolt").count(), 4);
    assert_eq!(scene.instances_of("Plate").count(), 2);
    assert_eq!(scene.total_triangle_count(), 4 * 4 + 2);

    // Bracket at z=5, second bolt at (8, 2)
    let origin = scene.graph[2].matrix.transform_point3(DVec3::ZERO);
    assert!((origin - DVec3::new(8.0, 2.0, 5.0)).length() < 1e-9);

    let bounds = scene.world_bounds();
    assert!((bounds.min.z - -5.0).abs() < 1e-9);
    assert!((bounds.max.z - 6.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_model_found_under_other_name() -> Result<()> {
    let scene = load_bytes(package(&[
        ("_rels/.rels", "<Relationships/>"),
        ("3D/Assembly.model", ASSEMBLY),
    ])?)?;
    assert_eq!(scene.instance_count(), 6);
    Ok(())
}

#[test]
fn test_missing_model() -> Result<()> {
    let result = load_bytes(package(&[("readme.txt", "nothing here")])?);
    assert!(matches!(result, Err(LoadError::MissingModel)));
    Ok(())
}

#[test]
fn test_corrupt_archive() {
    let result = load_bytes(b"PK\x03\x04 truncated".to_vec());
    assert!(matches!(result, Err(LoadError::Archive(_))));
}

#[test]
fn test_malformed_model() -> Result<()> {
    let result = load_bytes(package(&[(
        "3D/3dmodel.model",
        r#"<model><build><item/></build></model>"#,
    )])?);
    assert!(matches!(result, Err(LoadError::Parse(_))));
    Ok(())
}

#[test]
fn test_export_round_trip() -> Result<()> {
    let scene = load_bytes(package(&[("3D/3dmodel.model", ASSEMBLY)])?)?;
    let reloaded = load_bytes(export_scene(&scene)?)?;

    // Export flattens: one object and one item per geometry
    assert_eq!(reloaded.instance_count(), scene.geometry_count());
    assert_eq!(reloaded.metadata.units, "millimeter");

    for (before, after) in scene.geometries().iter().zip(reloaded.geometries()) {
        assert_eq!(before.name, after.name);
        assert_eq!(before.mesh.vertex_count(), after.mesh.vertex_count());
        assert_eq!(before.mesh.triangle_count(), after.mesh.triangle_count());
        assert_eq!(before.mesh.vertices, after.mesh.vertices);
    }
    Ok(())
}

#[test]
fn test_save_and_load_file() -> Result<()> {
    let scene = load_bytes(package(&[("3D/3dmodel.model", ASSEMBLY)])?)?;
    let path = std::env::temp_dir().join(format!("tmf-{}.3mf", uuid::Uuid::new_v4()));

    save_3mf(&path, scene.geometries().iter().map(|g| (g.name.as_str(), &g.mesh)))?;
    let reloaded = load_3mf(&path);
    std::fs::remove_file(&path)?;

    assert_eq!(reloaded?.geometry_count(), 2);
    Ok(())
}

#[test]
fn test_json_output() -> Result<()> {
    let scene = load_bytes(package(&[("3D/3dmodel.model", ASSEMBLY)])?)?;
    let json: serde_json::Value = serde_json::from_str(&scene.to_json()?)?;

    assert_eq!(json["base_frame"], "world");
    assert_eq!(json["metadata"]["units"], "millimeter");
    assert_eq!(json["graph"].as_array().map(Vec::len), Some(6));
    assert_eq!(json["graph"][0]["frame_from"], "world");
    assert_eq!(json["graph"][0]["matrix"][2][3], 5.0);
    assert!(json["geometry"]["Bolt"]["vertices"].is_array());
    assert_eq!(json["geometry"]["Plate"]["metadata"]["units"], "millimeter");
    Ok(())
}
