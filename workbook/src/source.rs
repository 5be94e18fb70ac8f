//! FILENAME: workbook/src/source.rs
//! PURPOSE: Locates and decodes the XML document behind a Tableau file.
//! CONTEXT: .twb/.tds files are the XML itself. .twbx/.tdsx are zip packages
//! that carry the XML next to extracts and images; the first member (archive
//! order) ending in .twb or .tds is the document.

use crate::error::WorkbookError;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".twb", ".twbx", ".tds", ".tdsx"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Plain XML: .twb, .tds
    Document,
    /// Zip package: .twbx, .tdsx
    Packaged,
}

impl SourceKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".twb" | ".tds" => Some(SourceKind::Document),
            ".twbx" | ".tdsx" => Some(SourceKind::Packaged),
            _ => None,
        }
    }

    /// Classifies a path by its extension.
    pub fn from_path(path: &Path) -> Result<Self, WorkbookError> {
        let extension = extension_of(path);
        Self::from_extension(&extension).ok_or_else(|| WorkbookError::UnsupportedFileType {
            extension,
            supported: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Lowercased extension with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn is_supported(path: &Path) -> bool {
    SourceKind::from_extension(&extension_of(path)).is_some()
}

/// Reads the XML text of a Tableau file of either kind.
pub fn read_source(path: &Path) -> Result<String, WorkbookError> {
    if !path.exists() {
        return Err(WorkbookError::FileNotFound(path.to_path_buf()));
    }

    match SourceKind::from_path(path)? {
        SourceKind::Document => {
            let bytes = std::fs::read(path)?;
            decode(path, bytes)
        }
        SourceKind::Packaged => read_packaged(path),
    }
}

fn read_packaged(path: &Path) -> Result<String, WorkbookError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_error(path, e))?;

    let member = document_member(&mut archive)
        .map_err(|e| zip_error(path, e))?
        .ok_or_else(|| WorkbookError::corrupted(path, "No XML file found in archive"))?;

    log::debug!("Reading {} from {}", member, path.display());

    let mut entry = archive.by_name(&member).map_err(|e| zip_error(path, e))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| WorkbookError::corrupted(path, format!("Failed to read {}: {}", member, e)))?;

    decode(path, bytes)
}

/// Name of the first archive member that holds a workbook or data source document.
fn document_member<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<String>, ZipError> {
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let lower = entry.name().to_lowercase();
        if lower.ends_with(".twb") || lower.ends_with(".tds") {
            return Ok(Some(entry.name().to_string()));
        }
    }
    Ok(None)
}

fn zip_error(path: &Path, err: ZipError) -> WorkbookError {
    match err {
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            WorkbookError::corrupted(path, format!("Invalid ZIP archive: {}", err))
        }
        other => WorkbookError::corrupted(path, other.to_string()),
    }
}

/// UTF-8 decoding with an optional byte order mark.
fn decode(path: &Path, bytes: Vec<u8>) -> Result<String, WorkbookError> {
    let bytes = if bytes.starts_with(UTF8_BOM) {
        bytes[UTF8_BOM.len()..].to_vec()
    } else {
        bytes
    };
    String::from_utf8(bytes)
        .map_err(|e| WorkbookError::corrupted(path, format!("File is not valid UTF-8: {}", e)))
}
