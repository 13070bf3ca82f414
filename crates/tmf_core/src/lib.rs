//! TMF Core - 3MF instancing resolution and export.
//!
//! This crate provides:
//!
//! - **Scene description types**: `SceneDescription`, `GraphEdge`, `Geometry`, `Mesh`
//! - **3MF support**: package loading, instancing graph resolution and export
//!
//! # Example
//!
//! ```ignore
//! use tmf_core::threemf::load_3mf;
//!
//! // Resolve every placement in an assembly
//! let scene = load_3mf("assembly.3mf")?;
//! for edge in &scene.graph {
//!     println!("{} -> {}", edge.frame_to, edge.geometry);
//! }
//! ```

pub mod mesh;
pub mod scene;
pub mod threemf;

// Re-export commonly used types
pub use mesh::Mesh;
pub use scene::{Geometry, GraphEdge, Metadata, SceneDescription};
pub use threemf::{
    export_3mf, export_scene, load_3mf, load_3mf_from_reader, load_3mf_with_options, save_3mf,
    ExportError, LoadError, LoadOptions,
};
