//! FILENAME: workbook/src/lib.rs
//! Tableau Workbook Module
//!
//! Reads Tableau workbooks (.twb, .twbx) and data sources (.tds, .tdsx) and
//! extracts their datasources, worksheets, dashboards, parameters, filters
//! and calculated fields into a serializable model.

mod error;
pub mod extract;
mod model;
mod source;
pub mod xml;

#[cfg(test)]
mod tests;

pub use error::WorkbookError;
pub use model::{
    CalculatedField, Calculation, Column, Connection, Dashboard, DashboardSize, DataSource,
    FileInfo, Filter, Parameter, ParameterMember, ParsedWorkbook, Relation, SortRule, View,
    Worksheet, Zone,
};
pub use source::{extension_of, is_supported, read_source, SourceKind, SUPPORTED_EXTENSIONS};
pub use xml::{parse_document, XmlElement};

use std::path::Path;

/// Loads and extracts a Tableau file.
///
/// Errors: `FileNotFound`, `UnsupportedFileType`, and `CorruptedFile` for
/// unreadable archives, undecodable text and malformed XML.
pub fn load_workbook(path: &Path) -> Result<ParsedWorkbook, WorkbookError> {
    let xml = read_source(path)?;
    let root = parse_document(&xml).map_err(|e| match e {
        WorkbookError::Xml(reason) => WorkbookError::corrupted(path, reason),
        other => other,
    })?;

    let file_info = FileInfo {
        path: path.display().to_string(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        extension: extension_of(path),
        size: std::fs::metadata(path)?.len(),
    };

    log::debug!(
        "Parsed {} ({} bytes), root element <{}>",
        file_info.name,
        file_info.size,
        root.name
    );

    Ok(extract::extract_workbook(&root, file_info))
}
