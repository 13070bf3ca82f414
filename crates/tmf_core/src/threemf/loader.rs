//! High-level 3MF loading.
//!
//! This module ties the pipeline together: the archive is opened, the model
//! document is collected, the instancing graph is built and every path from
//! the world root is turned into one placement in a [`SceneDescription`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmf_math::DMat4;
use zip::ZipArchive;

use crate::scene::SceneDescription;
use crate::threemf::archive::find_model_entry;
use crate::threemf::graph::InstanceGraph;
use crate::threemf::parser::{parse_model, parse_model_str, ParseError};
use crate::threemf::types::{ModelDocument, ObjectRecord};

/// Errors that can occur during 3MF loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("3MF archive does not contain a model file")]
    MissingModel,

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Options controlling how a package is resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Apply the per-body merge heuristic for CAD exports that split one
    /// part into one mesh per body.
    pub postprocess: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { postprocess: true }
    }
}

impl LoadOptions {
    /// Set the `postprocess` flag.
    pub fn with_postprocess(mut self, postprocess: bool) -> Self {
        self.postprocess = postprocess;
        self
    }
}

/// Load a 3MF file with default options.
///
/// # Example
///
/// ```ignore
/// use tmf_core::threemf::load_3mf;
///
/// let scene = load_3mf("assembly.3mf")?;
/// println!("Loaded {} instances", scene.instance_count());
/// ```
pub fn load_3mf<P: AsRef<Path>>(path: P) -> LoadResult<SceneDescription> {
    load_3mf_with_options(path, &LoadOptions::default())
}

/// Load a 3MF file.
pub fn load_3mf_with_options<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> LoadResult<SceneDescription> {
    let file = File::open(path.as_ref())?;
    load_3mf_from_reader(BufReader::new(file), options)
}

/// Load a 3MF package from any seekable byte stream.
pub fn load_3mf_from_reader<R: Read + Seek>(
    reader: R,
    options: &LoadOptions,
) -> LoadResult<SceneDescription> {
    let mut archive = ZipArchive::new(reader)?;
    let model_path = find_model_entry(&archive).ok_or(LoadError::MissingModel)?;

    // Stream the entry straight into the collector
    let entry = archive.by_name(&model_path)?;
    let document = parse_model(BufReader::new(entry))?;

    Ok(resolve(document, options))
}

/// Load a bare model document (the XML inside `3D/3dmodel.model`).
pub fn load_model_str(content: &str, options: &LoadOptions) -> LoadResult<SceneDescription> {
    let document = parse_model_str(content)?;
    Ok(resolve(document, options))
}

/// One placement before merge renaming.
struct PendingInstance {
    frame: String,
    geometry: String,
    matrix: DMat4,
}

/// Parent object id -> child object ids, in order of first appearance.
#[derive(Default)]
struct ParentIndex<'a> {
    order: Vec<&'a str>,
    children: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> ParentIndex<'a> {
    fn record(&mut self, parent: &'a str, child: &'a str) {
        let children = self.children.entry(parent).or_insert_with(|| {
            self.order.push(parent);
            Vec::new()
        });
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// Parents with exactly one distinct child, in order.
    fn single_children(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.order.iter().filter_map(|parent| match self.children[parent].as_slice() {
            [only] => Some((*parent, *only)),
            _ => None,
        })
    }
}

/// Resolve a collected document into a flat scene description.
pub fn resolve(document: ModelDocument, options: &LoadOptions) -> SceneDescription {
    let (instances, rename) = {
        let objects: HashMap<&str, &ObjectRecord> =
            document.objects().iter().map(|o| (o.id.as_str(), o)).collect();
        let graph = InstanceGraph::from_document(&document);

        let mut instances = Vec::new();
        let mut parents = ParentIndex::default();
        let mut dropped = 0usize;

        for path in graph.paths_from_world() {
            let Some(id) = path.terminal().object_id() else {
                continue;
            };
            let Some(object) = objects.get(id).copied() else {
                log::debug!("id {} included but not defined!", id);
                dropped += 1;
                continue;
            };

            // Every declared child counts toward its parent, with or without a mesh
            if let Some(parent) = path.parent().and_then(|p| p.object_id()) {
                parents.record(parent, &object.id);
            }

            if !object.has_mesh() {
                log::debug!("id {} ({}) has no mesh data, skipping", id, object.name);
                dropped += 1;
                continue;
            }

            // The text after the last '_' is the counter, so frame names never collide
            instances.push(PendingInstance {
                frame: format!("{}_{}", object.name, instances.len()),
                geometry: object.name.clone(),
                matrix: path.compose(),
            });
        }

        if dropped > 0 {
            log::debug!("Dropped {} placements without geometry", dropped);
        }

        let rename = if options.postprocess {
            body_merge_renames(&document, &objects, &parents)
        } else {
            HashMap::new()
        };

        (instances, rename)
    };

    let metadata = document.metadata();
    let mut scene = SceneDescription::new(metadata);

    for object in document.into_objects() {
        let Some(mesh) = object.mesh else { continue };
        let name = rename.get(&object.name).cloned().unwrap_or(object.name);
        if scene.geometry(&name).is_some() {
            log::warn!("Geometry {} already exists, replacing it", name);
        }
        scene.insert_geometry(name, mesh);
    }

    for instance in instances {
        let geometry = rename
            .get(&instance.geometry)
            .cloned()
            .unwrap_or(instance.geometry);
        scene.add_instance(instance.frame, geometry, instance.matrix);
    }

    log::info!(
        "Resolved {} instances of {} geometries",
        scene.instance_count(),
        scene.geometry_count()
    );

    scene
}

/// Renames for exporters that write one mesh per body under a part.
///
/// Applies only when every geometry name contains "body" (any case). A part
/// with a single body lends that body its name, without any parenthesized
/// suffix. Parts with several bodies are left alone.
fn body_merge_renames(
    document: &ModelDocument,
    objects: &HashMap<&str, &ObjectRecord>,
    parents: &ParentIndex<'_>,
) -> HashMap<String, String> {
    let mut geometry_names = document
        .objects()
        .iter()
        .filter(|o| o.has_mesh())
        .map(|o| o.name.to_lowercase());
    if !geometry_names.all(|name| name.contains("body")) {
        return HashMap::new();
    }

    let mut rename = HashMap::new();
    for (parent, child) in parents.single_children() {
        let (Some(parent), Some(child)) = (objects.get(parent), objects.get(child)) else {
            continue;
        };
        let part = parent.name.split('(').next().unwrap_or_default();
        rename.insert(child.name.clone(), part.to_string());
    }

    rename
}
