//! FILENAME: engine/src/error.rs
//! PURPOSE: Error taxonomy of the migration engine.
//! CONTEXT: File errors come from the workbook crate and are fatal for the
//! file being converted. Formula and validation errors are isolated per item
//! and end up as `ErrorInfo` records in converter summaries.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use workbook::WorkbookError;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Formula conversion error: {message}")]
    FormulaConversion {
        message: String,
        original_formula: Option<String>,
    },

    #[error("Unsupported Tableau function: {function}")]
    UnsupportedFunction { function: String },

    #[error("Invalid DAX syntax: {}", .syntax_errors.join("; "))]
    DaxSyntax {
        dax_formula: String,
        syntax_errors: Vec<String>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        component: Option<String>,
        validation_errors: Vec<String>,
    },

    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field_name: Option<String>,
        expected_value: Option<String>,
        actual_value: Option<String>,
    },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_file: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl MigrationError {
    pub fn formula(message: impl Into<String>, original_formula: impl Into<String>) -> Self {
        MigrationError::FormulaConversion {
            message: message.into(),
            original_formula: Some(original_formula.into()),
        }
    }

    pub fn configuration(message: impl Into<String>, config_file: Option<String>) -> Self {
        MigrationError::Configuration {
            message: message.into(),
            config_file,
        }
    }

    /// Stable name of the error kind, used in reports.
    pub fn exception_type(&self) -> &'static str {
        match self {
            MigrationError::Workbook(e) => match e {
                WorkbookError::UnsupportedFileType { .. } => "UnsupportedFileType",
                WorkbookError::CorruptedFile { .. } => "CorruptedFile",
                WorkbookError::FileNotFound(_) => "FileProcessing",
                WorkbookError::Io(_) => "Io",
                WorkbookError::Json(_) => "Json",
                WorkbookError::Xml(_) => "CorruptedFile",
            },
            MigrationError::DirectoryNotFound(_) => "FileProcessing",
            MigrationError::FormulaConversion { .. } => "FormulaConversion",
            MigrationError::UnsupportedFunction { .. } => "UnsupportedFunction",
            MigrationError::DaxSyntax { .. } => "DaxSyntax",
            MigrationError::Validation { .. } => "Validation",
            MigrationError::DataValidation { .. } => "DataValidation",
            MigrationError::Configuration { .. } => "Configuration",
            MigrationError::Io(_) => "Io",
            MigrationError::Json(_) => "Json",
            MigrationError::Unexpected(_) => "Unexpected",
        }
    }

    /// True for the kinds the migration taxonomy names. IO, JSON and
    /// unexpected failures go through the generic error branch instead.
    pub fn is_classified(&self) -> bool {
        !matches!(
            self,
            MigrationError::Io(_)
                | MigrationError::Json(_)
                | MigrationError::Unexpected(_)
                | MigrationError::Workbook(WorkbookError::Io(_))
                | MigrationError::Workbook(WorkbookError::Json(_))
        )
    }

    /// Whether conversion of other items can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MigrationError::Workbook(_)
                | MigrationError::DirectoryNotFound(_)
                | MigrationError::Configuration { .. }
        )
    }

    /// Structured details of the error.
    pub fn context(&self) -> Map<String, Value> {
        let value = match self {
            MigrationError::Workbook(WorkbookError::UnsupportedFileType {
                extension,
                supported,
            }) => json!({ "file_type": extension, "supported_types": supported }),
            MigrationError::Workbook(WorkbookError::CorruptedFile { path, reason }) => {
                json!({ "file_path": path.display().to_string(), "reason": reason })
            }
            MigrationError::Workbook(WorkbookError::FileNotFound(path))
            | MigrationError::DirectoryNotFound(path) => {
                json!({ "file_path": path.display().to_string() })
            }
            MigrationError::FormulaConversion {
                original_formula, ..
            } => json!({ "original_formula": original_formula }),
            MigrationError::UnsupportedFunction { function } => {
                json!({ "tableau_function": function })
            }
            MigrationError::DaxSyntax {
                dax_formula,
                syntax_errors,
            } => json!({ "dax_formula": dax_formula, "syntax_errors": syntax_errors }),
            MigrationError::Validation {
                component,
                validation_errors,
                ..
            } => json!({ "component": component, "validation_errors": validation_errors }),
            MigrationError::DataValidation {
                field_name,
                expected_value,
                actual_value,
                ..
            } => json!({
                "validation_type": "data_validation",
                "field_name": field_name,
                "expected_value": expected_value,
                "actual_value": actual_value,
            }),
            MigrationError::Configuration { config_file, .. } => {
                json!({ "config_file": config_file })
            }
            _ => json!({}),
        };

        match value {
            Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            _ => Map::new(),
        }
    }
}

/// Serialized form of an error collected by converters and the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub exception_type: String,
    pub message: String,
    pub context: Map<String, Value>,
}

impl ErrorInfo {
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            exception_type: exception_type.into(),
            message: message.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

impl From<&MigrationError> for ErrorInfo {
    fn from(err: &MigrationError) -> Self {
        ErrorInfo {
            exception_type: err.exception_type().to_string(),
            message: err.to_string(),
            context: err.context(),
        }
    }
}

/// Counts errors by kind: "3 errors: 2 CorruptedFile, 1 Io"
pub fn error_summary(errors: &[ErrorInfo]) -> String {
    if errors.is_empty() {
        return "No errors".to_string();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for error in errors {
        match counts.iter_mut().find(|(kind, _)| *kind == error.exception_type) {
            Some((_, count)) => *count += 1,
            None => counts.push((&error.exception_type, 1)),
        }
    }

    let parts: Vec<String> = counts
        .iter()
        .map(|(kind, count)| format!("{} {}", count, kind))
        .collect();
    format!("{} errors: {}", errors.len(), parts.join(", "))
}
