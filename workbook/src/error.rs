//! FILENAME: workbook/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file type '{extension}'. Supported types: {}", .supported.join(", "))]
    UnsupportedFileType {
        extension: String,
        supported: Vec<String>,
    },

    #[error("Corrupted file {}: {reason}", .path.display())]
    CorruptedFile { path: PathBuf, reason: String },

    #[error("XML error: {0}")]
    Xml(String),
}

impl WorkbookError {
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        WorkbookError::CorruptedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
