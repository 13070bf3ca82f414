//! 3MF package support.
//!
//! Loading turns the instancing structure of a 3MF model (build items and
//! nested components) into a flat [`SceneDescription`](crate::SceneDescription):
//! one named, world-space placement per root-to-leaf path.
//!
//! ## Pipeline
//!
//! - `archive`: locate the model document inside the zip container
//! - `parser`: stream objects, components and build items out of the XML
//! - `graph`: ordered multigraph and lazy simple-path enumeration
//! - `loader`: compose transforms, name instances, apply the body merge
//! - `writer`: emit a minimal package with one object per geometry
//!
//! ## Not Supported
//!
//! - Materials, colors and textures
//! - Slices, beam lattices and other extensions
//! - Multi-file production packages (external `p:path` references)
//!
//! # Example
//!
//! ```ignore
//! use tmf_core::threemf::{export_scene, load_3mf};
//!
//! let scene = load_3mf("assembly.3mf")?;
//! println!("Loaded {} instances of {} geometries",
//!     scene.instance_count(),
//!     scene.geometry_count());
//!
//! let bytes = export_scene(&scene)?;
//! ```

mod archive;
mod graph;
mod loader;
mod parser;
mod types;
mod writer;

pub use archive::*;
pub use graph::*;
pub use loader::*;
pub use parser::*;
pub use types::*;
pub use writer::*;
