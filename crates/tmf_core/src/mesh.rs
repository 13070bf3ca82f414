//! Mesh geometry representation for TMF scene descriptions.
//!
//! A mesh is the raw payload of a 3MF `object`: a vertex list and a list of
//! triangles indexing into it. Indices are stored exactly as read; nothing
//! here rejects an index that is out of range for the vertex list.

use serde::Serialize;
use tmf_math::{Aabb, DVec3};

/// A triangle mesh with double precision vertices.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Mesh {
    /// Vertex positions (one DVec3 per vertex)
    pub vertices: Vec<DVec3>,

    /// Triangles as vertex index triples
    pub faces: Vec<[u32; 3]>,

    /// Axis-aligned bounding box of the vertices
    #[serde(skip)]
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from vertices and faces.
    pub fn new(vertices: Vec<DVec3>, faces: Vec<[u32; 3]>) -> Self {
        let bounds = Aabb::enclosing(vertices.iter().copied());
        Self {
            vertices,
            faces,
            bounds,
        }
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True if the mesh has neither vertices nor faces.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.faces.is_empty()
    }
}
