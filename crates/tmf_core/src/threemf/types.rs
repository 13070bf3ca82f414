//! 3MF entities for intermediate representation.
//!
//! These types hold what the entity collector read from a model document
//! before the instancing graph is resolved into a scene description.

use std::collections::HashMap;

use tmf_math::DMat4;

use crate::mesh::Mesh;
use crate::scene::Metadata;

/// A `component` reference from one object to another.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    /// Id of the referenced object
    pub object_id: String,

    /// Placement of the referenced object in the parent's frame
    pub transform: DMat4,
}

/// A 3MF `object` resource.
///
/// An object normally carries either a mesh or components. Both (or neither)
/// are kept as given.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    /// Id from the source file (not necessarily numeric)
    pub id: String,

    /// Display name, unique across the document
    pub name: String,

    /// Mesh payload, if the object has a `mesh` element
    pub mesh: Option<Mesh>,

    /// Components in source order
    pub components: Vec<Component>,
}

impl ObjectRecord {
    /// True if the object carries mesh data.
    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }
}

/// A `build/item`: a top-level instantiation into the world frame.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildItem {
    /// Id of the instantiated object
    pub object_id: String,

    /// Placement in the world frame
    pub transform: DMat4,
}

/// Everything collected from one `3dmodel.model` document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelDocument {
    /// `unit` attribute of the `model` element, if present
    pub unit: Option<String>,

    /// Objects in declaration order, unique by id
    objects: Vec<ObjectRecord>,

    /// Object id -> position in `objects`
    index: HashMap<String, usize>,

    /// Build items in source order
    pub build: Vec<BuildItem>,
}

impl ModelDocument {
    /// Objects in declaration order.
    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    /// Take the objects, in declaration order.
    pub fn into_objects(self) -> Vec<ObjectRecord> {
        self.objects
    }

    /// Look up an object by id.
    pub fn object(&self, id: &str) -> Option<&ObjectRecord> {
        self.index.get(id).map(|&i| &self.objects[i])
    }

    /// Add an object. A later object with an existing id replaces the earlier
    /// one in place.
    pub fn insert_object(&mut self, object: ObjectRecord) {
        match self.index.get(&object.id) {
            Some(&i) => {
                log::warn!("Object id {} declared more than once, keeping the last", object.id);
                self.objects[i] = object;
            }
            None => {
                self.index.insert(object.id.clone(), self.objects.len());
                self.objects.push(object);
            }
        }
    }

    /// Model metadata, with the default unit when none was declared.
    pub fn metadata(&self) -> Metadata {
        match &self.unit {
            Some(unit) => Metadata { units: unit.clone() },
            None => Metadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: &str, name: &str) -> ObjectRecord {
        ObjectRecord {
            id: id.to_string(),
            name: name.to_string(),
            mesh: None,
            components: Vec::new(),
        }
    }

    #[test]
    fn test_insert_object_replaces_duplicate_id() {
        let mut doc = ModelDocument::default();
        doc.insert_object(object("1", "first"));
        doc.insert_object(object("2", "second"));
        doc.insert_object(object("1", "again"));

        assert_eq!(doc.objects().len(), 2);
        assert_eq!(doc.objects()[0].name, "again");
        assert_eq!(doc.object("2").unwrap().name, "second");
        assert!(doc.object("3").is_none());
    }

    #[test]
    fn test_metadata_default_units() {
        let mut doc = ModelDocument::default();
        assert_eq!(doc.metadata().units, "millimeters");

        doc.unit = Some("inch".to_string());
        assert_eq!(doc.metadata().units, "inch");
    }
}
