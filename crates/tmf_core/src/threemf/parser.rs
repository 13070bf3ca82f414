//! Streaming collector for 3MF model documents.
//!
//! The collector pulls events from `quick-xml` and keeps only what the
//! instancing graph needs: objects (mesh data and components), build items and
//! the model unit. Elements are matched by local name, so any namespace prefix
//! is accepted. No DOM is built; vertices and triangles go straight into the
//! arrays of the object being read.

use std::collections::HashSet;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tmf_math::{DMat4, DMat4Ext, DVec3, TransformError};

use super::types::*;
use crate::mesh::Mesh;

/// Errors that can occur while collecting entities from a model document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid attribute on <{element}>: {message}")]
    Attribute {
        element: &'static str,
        message: String,
    },

    #[error("<{element}> is missing mandatory attribute `{attribute}`")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Invalid number in <{element}> attribute `{attribute}`: {value:?}")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("Invalid transform on <{element}>: {source}")]
    InvalidTransform {
        element: &'static str,
        #[source]
        source: TransformError,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// An object whose end tag has not been seen yet.
struct PendingObject {
    id: String,
    name: Option<String>,
    mesh: Option<(Vec<DVec3>, Vec<[u32; 3]>)>,
    components: Vec<Component>,
}

/// Event-driven collector for `object` and `build` entities.
#[derive(Default)]
pub struct EntityCollector {
    document: ModelDocument,
    consumed_names: HashSet<String>,
    current: Option<PendingObject>,
    seen_model: bool,
    in_vertices: bool,
    in_triangles: bool,
    in_build: bool,
}

impl EntityCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a start (or self-closing) element.
    pub fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> ParseResult<()> {
        let local = e.local_name();
        let local = local.as_ref();

        match local {
            b"model" if !self.seen_model => {
                self.seen_model = true;
                self.document.unit = attribute(e, "model", "unit")?;
            }
            b"object" => {
                if let Some(unclosed) = self.current.take() {
                    log::debug!("Object {} not closed before next object", unclosed.id);
                    self.finish_object(unclosed);
                }
                let id = attribute(e, "object", "id")?.ok_or(ParseError::MissingAttribute {
                    element: "object",
                    attribute: "id",
                })?;
                let name = attribute(e, "object", "name")?;
                self.current = Some(PendingObject {
                    id,
                    name,
                    mesh: None,
                    components: Vec::new(),
                });
            }
            b"mesh" => {
                if let Some(object) = self.current.as_mut() {
                    object.mesh.get_or_insert_with(Default::default);
                }
            }
            b"vertices" => self.in_vertices = self.current_has_mesh(),
            b"triangles" => self.in_triangles = self.current_has_mesh(),
            b"vertex" if self.in_vertices => {
                let vertex = DVec3::new(
                    number(e, "vertex", "x")?,
                    number(e, "vertex", "y")?,
                    number(e, "vertex", "z")?,
                );
                if let Some((vertices, _)) = self.current.as_mut().and_then(|o| o.mesh.as_mut()) {
                    vertices.push(vertex);
                }
            }
            b"triangle" if self.in_triangles => {
                let face: [u32; 3] = [
                    number(e, "triangle", "v1")?,
                    number(e, "triangle", "v2")?,
                    number(e, "triangle", "v3")?,
                ];
                if let Some((_, faces)) = self.current.as_mut().and_then(|o| o.mesh.as_mut()) {
                    faces.push(face);
                }
            }
            b"component" => {
                if let Some(object) = self.current.as_mut() {
                    let object_id = attribute(e, "component", "objectid")?.ok_or(
                        ParseError::MissingAttribute {
                            element: "component",
                            attribute: "objectid",
                        },
                    )?;
                    let transform = transform(e, "component")?;
                    object.components.push(Component {
                        object_id,
                        transform,
                    });
                }
            }
            b"build" => self.in_build = true,
            b"item" if self.in_build => {
                let object_id = match attribute(e, "item", "objectid")? {
                    Some(id) => Some(id),
                    None => prefixed_attribute(e, "item", "objectid")?,
                }
                .ok_or(ParseError::MissingAttribute {
                    element: "item",
                    attribute: "objectid",
                })?;
                let transform = transform(e, "item")?;
                self.document.build.push(BuildItem {
                    object_id,
                    transform,
                });
            }
            _ => {}
        }

        if empty {
            self.end(local);
        }
        Ok(())
    }

    /// Handle an end element by local name.
    pub fn end(&mut self, local: &[u8]) {
        match local {
            b"object" => {
                if let Some(object) = self.current.take() {
                    self.finish_object(object);
                }
            }
            b"vertices" => self.in_vertices = false,
            b"triangles" => self.in_triangles = false,
            b"build" => self.in_build = false,
            _ => {}
        }
    }

    /// Finish collecting and return the document.
    pub fn finish(mut self) -> ModelDocument {
        if let Some(object) = self.current.take() {
            self.finish_object(object);
        }
        self.document
    }

    fn current_has_mesh(&self) -> bool {
        self.current.as_ref().is_some_and(|o| o.mesh.is_some())
    }

    fn finish_object(&mut self, object: PendingObject) {
        // First occurrence keeps the bare name, later ones get the id appended,
        // then a counter while that is still taken
        let mut name = object.name.unwrap_or_else(|| object.id.clone());
        if self.consumed_names.contains(&name) {
            let base = format!("{}{}", name, object.id);
            let mut candidate = base.clone();
            let mut n = 1;
            while self.consumed_names.contains(&candidate) {
                candidate = format!("{}_{}", base, n);
                n += 1;
            }
            log::warn!("Object {} name {:?} already taken, using {:?}", object.id, name, candidate);
            name = candidate;
        }
        self.consumed_names.insert(name.clone());

        self.document.insert_object(ObjectRecord {
            id: object.id,
            name,
            mesh: object.mesh.map(|(vertices, faces)| Mesh::new(vertices, faces)),
            components: object.components,
        });
    }
}

/// Read an unprefixed attribute by name.
fn attribute(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &str,
) -> ParseResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::Attribute {
            element,
            message: err.to_string(),
        })?;
        if attr.key.prefix().is_none() && attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| ParseError::Attribute {
                element,
                message: err.to_string(),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Read an extension attribute (`p:objectid` and the like) by local name.
fn prefixed_attribute(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &str,
) -> ParseResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::Attribute {
            element,
            message: err.to_string(),
        })?;
        let is_xmlns = attr
            .key
            .prefix()
            .is_some_and(|p| p.as_ref() == b"xmlns");
        if !is_xmlns && attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| ParseError::Attribute {
                element,
                message: err.to_string(),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Read a mandatory numeric attribute.
fn number<T: std::str::FromStr>(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
) -> ParseResult<T> {
    let value = attribute(e, element, name)?.ok_or(ParseError::MissingAttribute {
        element,
        attribute: name,
    })?;
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        element,
        attribute: name,
        value,
    })
}

/// Read the optional `transform` attribute (identity when absent).
fn transform(e: &BytesStart<'_>, element: &'static str) -> ParseResult<DMat4> {
    let value = attribute(e, element, "transform")?;
    DMat4::from_3mf_attr(value.as_deref())
        .map_err(|source| ParseError::InvalidTransform { element, source })
}

/// Collect all entities from a model document stream.
pub fn parse_model<R: BufRead>(reader: R) -> ParseResult<ModelDocument> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);

    let mut collector = EntityCollector::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => collector.start(e, false)?,
            Event::Empty(ref e) => collector.start(e, true)?,
            Event::End(ref e) => collector.end(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(collector.finish())
}

/// Collect all entities from a model document string.
pub fn parse_model_str(content: &str) -> ParseResult<ModelDocument> {
    parse_model(content.as_bytes())
}
