//! Zip container access for 3MF packages.

use std::io::{Read, Seek, Write};

use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Archive path of the model document.
pub const MODEL_PATH: &str = "3D/3dmodel.model";

/// Archive path of the package relationships.
pub const RELS_PATH: &str = "_rels/.rels";

/// Archive path of the content type declarations.
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Find the model document entry.
///
/// Tries the standard path, then a case-insensitive match of it, then any
/// entry with a `.model` extension.
pub fn find_model_entry<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let names: Vec<&str> = archive.file_names().collect();

    if names.contains(&MODEL_PATH) {
        return Some(MODEL_PATH.to_string());
    }
    if let Some(name) = names.iter().find(|n| n.eq_ignore_ascii_case(MODEL_PATH)) {
        return Some(name.to_string());
    }
    names
        .iter()
        .find(|n| {
            std::path::Path::new(n)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("model"))
        })
        .map(|n| n.to_string())
}

/// Write named entries into a deflated zip archive, in the given order.
pub fn write_archive<W: Write + Seek>(writer: W, entries: &[(&str, &[u8])]) -> ZipResult<W> {
    let mut zip = ZipWriter::new(writer);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)?;
    }

    zip.finish()
}
