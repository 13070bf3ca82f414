//! 3MF package export.
//!
//! Every geometry becomes one `object` with a mesh and one `build/item`
//! placing it at the origin. Instancing structure is not written back.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use thiserror::Error;
use uuid::Uuid;

use crate::mesh::Mesh;
use crate::scene::SceneDescription;
use crate::threemf::archive::{write_archive, CONTENT_TYPES_PATH, MODEL_PATH, RELS_PATH};

/// 3MF core specification namespace.
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// 3MF production extension namespace (`p:UUID`).
pub const PRODUCTION_NAMESPACE: &str =
    "http://schemas.microsoft.com/3dmanufacturing/production/2015/06";

const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
const MODEL_RELATIONSHIP: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";

const CONTENT_TYPES: [(&str, &str); 6] = [
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("model", "application/vnd.ms-package.3dmanufacturing-3dmodel+xml"),
    ("png", "image/png"),
    ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
    ("texture", "application/vnd.ms-package.3dmanufacturing-3dmodeltexture"),
];

/// Errors that can occur during 3MF export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML write error: {0}")]
    Xml(String),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Export named meshes as 3MF archive bytes.
///
/// Objects get ids `1..=N` in iteration order.
pub fn export_3mf<'a, I>(geometry: I) -> ExportResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Mesh)>,
{
    let model = write_model(geometry)?;
    let rels = write_relationships()?;
    let content_types = write_content_types()?;

    let cursor = write_archive(
        Cursor::new(Vec::new()),
        &[
            (MODEL_PATH, model.as_slice()),
            (RELS_PATH, rels.as_slice()),
            (CONTENT_TYPES_PATH, content_types.as_slice()),
        ],
    )?;

    Ok(cursor.into_inner())
}

/// Export the geometry of a resolved scene.
pub fn export_scene(scene: &SceneDescription) -> ExportResult<Vec<u8>> {
    export_3mf(scene.geometries().iter().map(|g| (g.name.as_str(), &g.mesh)))
}

/// Export a single mesh named `object`.
pub fn export_mesh(mesh: &Mesh) -> ExportResult<Vec<u8>> {
    export_3mf([("object", mesh)])
}

/// Export named meshes to a 3MF file.
pub fn save_3mf<'a, P, I>(path: P, geometry: I) -> ExportResult<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a str, &'a Mesh)>,
{
    let bytes = export_3mf(geometry)?;
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    file.write_all(&bytes)?;
    file.flush()?;

    log::info!("Wrote {}", path.as_ref().display());
    Ok(())
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> ExportResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::Xml(e.to_string()))
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Write the `3D/3dmodel.model` document.
pub fn write_model<'a, I>(geometry: I) -> ExportResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Mesh)>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    model.push_attribute(("xmlns", CORE_NAMESPACE));
    model.push_attribute(("xmlns:p", PRODUCTION_NAMESPACE));
    emit(&mut writer, Event::Start(model))?;

    emit(&mut writer, Event::Start(BytesStart::new("resources")))?;
    let mut count = 0usize;
    for (index, (name, mesh)) in geometry.into_iter().enumerate() {
        write_object(&mut writer, index + 1, name, mesh)?;
        count += 1;
    }
    emit(&mut writer, Event::End(BytesEnd::new("resources")))?;

    let mut build = BytesStart::new("build");
    build.push_attribute(("p:UUID", new_uuid().as_str()));
    emit(&mut writer, Event::Start(build))?;
    for id in 1..=count {
        let mut item = BytesStart::new("item");
        item.push_attribute(("objectid", id.to_string().as_str()));
        item.push_attribute(("p:UUID", new_uuid().as_str()));
        emit(&mut writer, Event::Empty(item))?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("build")))?;

    emit(&mut writer, Event::End(BytesEnd::new("model")))?;

    log::info!("Exported {} objects", count);
    Ok(writer.into_inner())
}

fn write_object<W: Write>(
    writer: &mut Writer<W>,
    id: usize,
    name: &str,
    mesh: &Mesh,
) -> ExportResult<()> {
    let mut object = BytesStart::new("object");
    object.push_attribute(("id", id.to_string().as_str()));
    object.push_attribute(("name", name));
    object.push_attribute(("type", "model"));
    object.push_attribute(("p:UUID", new_uuid().as_str()));
    emit(writer, Event::Start(object))?;
    emit(writer, Event::Start(BytesStart::new("mesh")))?;

    emit(writer, Event::Start(BytesStart::new("vertices")))?;
    for v in &mesh.vertices {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", v.x.to_string().as_str()));
        vertex.push_attribute(("y", v.y.to_string().as_str()));
        vertex.push_attribute(("z", v.z.to_string().as_str()));
        emit(writer, Event::Empty(vertex))?;
    }
    emit(writer, Event::End(BytesEnd::new("vertices")))?;

    emit(writer, Event::Start(BytesStart::new("triangles")))?;
    for [v1, v2, v3] in &mesh.faces {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", v1.to_string().as_str()));
        triangle.push_attribute(("v2", v2.to_string().as_str()));
        triangle.push_attribute(("v3", v3.to_string().as_str()));
        emit(writer, Event::Empty(triangle))?;
    }
    emit(writer, Event::End(BytesEnd::new("triangles")))?;

    emit(writer, Event::End(BytesEnd::new("mesh")))?;
    emit(writer, Event::End(BytesEnd::new("object")))
}

/// Write the `_rels/.rels` package relationships.
pub fn write_relationships() -> ExportResult<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", RELATIONSHIPS_NAMESPACE));
    emit(&mut writer, Event::Start(root))?;

    let mut relationship = BytesStart::new("Relationship");
    relationship.push_attribute(("Target", "/3D/3dmodel.model"));
    relationship.push_attribute(("Id", "rel0"));
    relationship.push_attribute(("Type", MODEL_RELATIONSHIP));
    emit(&mut writer, Event::Empty(relationship))?;

    emit(&mut writer, Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner())
}

/// Write the `[Content_Types].xml` declarations.
pub fn write_content_types() -> ExportResult<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("Types");
    root.push_attribute(("xmlns", CONTENT_TYPES_NAMESPACE));
    emit(&mut writer, Event::Start(root))?;

    for (extension, content_type) in CONTENT_TYPES {
        let mut default = BytesStart::new("Default");
        default.push_attribute(("Extension", extension));
        default.push_attribute(("ContentType", content_type));
        emit(&mut writer, Event::Empty(default))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("Types")))?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threemf::parser::parse_model_str;
    use std::collections::HashSet;
    use tmf_math::DVec3;

    fn triangle(offset: f64) -> Mesh {
        Mesh::new(
            vec![
                DVec3::new(offset, 0.0, 0.0),
                DVec3::new(offset + 1.0, 0.0, 0.0),
                DVec3::new(offset, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn model_text(geometry: &[(&str, &Mesh)]) -> String {
        String::from_utf8(write_model(geometry.iter().copied()).unwrap()).unwrap()
    }

    fn uuids(text: &str) -> Vec<&str> {
        text.split("p:UUID=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect()
    }

    #[test]
    fn test_objects_numbered_in_order() {
        let (a, b, c) = (triangle(0.0), triangle(5.0), triangle(9.0));
        let text = model_text(&[("first", &a), ("second", &b), ("third", &c)]);
        let doc = parse_model_str(&text).unwrap();

        let ids: Vec<_> = doc.objects().iter().map(|o| o.id.as_str()).collect();
        let names: Vec<_> = doc.objects().iter().map(|o| o.name.as_str()).collect();
        let items: Vec<_> = doc.build.iter().map(|i| i.object_id.as_str()).collect();

        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(items, vec!["1", "2", "3"]);
        assert!(doc.objects().iter().all(|o| o.components.is_empty()));
    }

    #[test]
    fn test_uuids_are_distinct() {
        let (a, b) = (triangle(0.0), triangle(1.0));
        let text = model_text(&[("a", &a), ("b", &b)]);
        let tags = uuids(&text);

        // Two objects, two items, one build
        assert_eq!(tags.len(), 5);
        assert_eq!(tags.iter().collect::<HashSet<_>>().len(), 5);
        assert!(tags.iter().all(|t| Uuid::parse_str(t).is_ok()));
    }

    #[test]
    fn test_model_header() {
        let mesh = triangle(0.0);
        let text = model_text(&[("a", &mesh)]);

        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("unit=\"millimeter\""));
        assert!(text.contains(CORE_NAMESPACE));
        assert!(text.contains(PRODUCTION_NAMESPACE));
    }

    #[test]
    fn test_coordinates_round_trip_exactly() {
        let mesh = Mesh::new(vec![DVec3::new(0.1, -2.5e-7, 1.0 / 3.0)], vec![]);
        let text = model_text(&[("a", &mesh)]);
        let doc = parse_model_str(&text).unwrap();

        let parsed = doc.objects()[0].mesh.as_ref().unwrap();
        assert_eq!(parsed.vertices, mesh.vertices);
    }

    #[test]
    fn test_empty_export() {
        let text = model_text(&[]);
        let doc = parse_model_str(&text).unwrap();
        assert!(doc.objects().is_empty());
        assert!(doc.build.is_empty());
    }

    #[test]
    fn test_relationships() {
        let text = String::from_utf8(write_relationships().unwrap()).unwrap();
        assert!(text.contains("Target=\"/3D/3dmodel.model\""));
        assert!(text.contains("Id=\"rel0\""));
        assert!(text.contains(MODEL_RELATIONSHIP));
    }

    #[test]
    fn test_content_types() {
        let text = String::from_utf8(write_content_types().unwrap()).unwrap();
        for (extension, content_type) in CONTENT_TYPES {
            assert!(text.contains(&format!("Extension=\"{extension}\"")));
            assert!(text.contains(content_type));
        }
    }

    #[test]
    fn test_export_mesh_names_object() {
        let bytes = export_mesh(&triangle(0.0)).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, vec![MODEL_PATH, RELS_PATH, CONTENT_TYPES_PATH]);

        let mut text = String::new();
        std::io::Read::read_to_string(&mut archive.by_name(MODEL_PATH).unwrap(), &mut text)
            .unwrap();
        let doc = parse_model_str(&text).unwrap();
        assert_eq!(doc.objects()[0].name, "object");
    }
}
