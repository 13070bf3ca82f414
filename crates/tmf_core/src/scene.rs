//! Flat scene description produced by the 3MF loader.
//!
//! Every placement of a mesh is a [`GraphEdge`] hanging directly off the base
//! frame with an absolute transform. Geometry is shared by name, so one mesh
//! can be placed many times under distinct frame names.

use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tmf_math::{Aabb, DMat4, DMat4Ext};

use crate::mesh::Mesh;

/// Name of the root frame every instance is attached to.
pub const BASE_FRAME: &str = "world";

/// Units assumed when the model does not declare any.
pub const DEFAULT_UNITS: &str = "millimeters";

/// Model-level metadata, copied onto every geometry entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    /// Length unit of all coordinates
    pub units: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            units: DEFAULT_UNITS.to_string(),
        }
    }
}

/// A named mesh in the scene.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Geometry {
    /// Key in the geometry map
    #[serde(skip)]
    pub name: String,

    /// Vertex and face data
    #[serde(flatten)]
    pub mesh: Mesh,

    /// Copy of the model metadata
    pub metadata: Metadata,
}

/// One resolved placement of a geometry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphEdge {
    /// Parent frame (always the base frame)
    pub frame_from: String,

    /// Unique frame name of this placement
    pub frame_to: String,

    /// Absolute transform from the base frame
    #[serde(serialize_with = "serialize_row_major")]
    pub matrix: DMat4,

    /// Name of the geometry placed here
    pub geometry: String,
}

/// The complete result of resolving a 3MF package.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneDescription {
    /// Root frame name
    pub base_frame: String,

    /// Placements, in path enumeration order
    pub graph: Vec<GraphEdge>,

    /// Geometry in declaration order, serialized as a name-keyed map
    #[serde(serialize_with = "serialize_geometry_map")]
    geometry: Vec<Geometry>,

    /// Geometry name -> position in `geometry`
    #[serde(skip)]
    index: HashMap<String, usize>,

    /// Model metadata
    pub metadata: Metadata,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self::new(Metadata::default())
    }
}

impl SceneDescription {
    /// Create an empty scene.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            base_frame: BASE_FRAME.to_string(),
            graph: Vec::new(),
            geometry: Vec::new(),
            index: HashMap::new(),
            metadata,
        }
    }

    /// Add a geometry entry, replacing (in place) any entry with the same name.
    pub fn insert_geometry(&mut self, name: impl Into<String>, mesh: Mesh) {
        let name = name.into();
        let geometry = Geometry {
            name,
            mesh,
            metadata: self.metadata.clone(),
        };

        match self.index.get(&geometry.name) {
            Some(&i) => self.geometry[i] = geometry,
            None => {
                self.index.insert(geometry.name.clone(), self.geometry.len());
                self.geometry.push(geometry);
            }
        }
    }

    /// Place a geometry under the base frame.
    pub fn add_instance(
        &mut self,
        frame_to: impl Into<String>,
        geometry: impl Into<String>,
        matrix: DMat4,
    ) {
        self.graph.push(GraphEdge {
            frame_from: self.base_frame.clone(),
            frame_to: frame_to.into(),
            matrix,
            geometry: geometry.into(),
        });
    }

    /// Geometry in declaration order.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometry
    }

    /// Look up a geometry by name.
    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.index.get(name).map(|&i| &self.geometry[i])
    }

    /// All placements of the named geometry.
    pub fn instances_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.graph.iter().filter(move |edge| edge.geometry == name)
    }

    /// Get total instance count.
    pub fn instance_count(&self) -> usize {
        self.graph.len()
    }

    /// Get geometry count.
    pub fn geometry_count(&self) -> usize {
        self.geometry.len()
    }

    /// Get total triangle count across all instances.
    pub fn total_triangle_count(&self) -> usize {
        self.graph
            .iter()
            .filter_map(|edge| self.geometry(&edge.geometry))
            .map(|g| g.mesh.triangle_count())
            .sum()
    }

    /// Compute the world-space bounding box of all instances.
    pub fn world_bounds(&self) -> Aabb {
        self.graph
            .iter()
            .filter_map(|edge| {
                self.geometry(&edge.geometry)
                    .map(|g| edge.matrix.transform_aabb(&g.mesh.bounds))
            })
            .fold(Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, &b))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to an indented JSON string.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn serialize_row_major<S: Serializer>(matrix: &DMat4, serializer: S) -> Result<S::Ok, S::Error> {
    // glam is column-major; emit rows so the output reads like the math
    let rows = [matrix.row(0), matrix.row(1), matrix.row(2), matrix.row(3)].map(|r| r.to_array());
    rows.serialize(serializer)
}

fn serialize_geometry_map<S: Serializer>(
    geometry: &[Geometry],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(geometry.len()))?;
    for g in geometry {
        map.serialize_entry(&g.name, g)?;
    }
    map.end()
}
