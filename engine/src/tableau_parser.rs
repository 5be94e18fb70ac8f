//! FILENAME: engine/src/tableau_parser.rs
//! PURPOSE: Pipeline stage that loads a Tableau file into a ParsedWorkbook.
//! CONTEXT: Reading and extraction live in the workbook crate. This stage
//! adds what the migration needs around it: the version compatibility check
//! against the mapping configuration, and the progress events.

use crate::config::MappingConfig;
use crate::converter::{ConversionTracker, Converter};
use crate::error::MigrationError;
use crate::events::{EventSink, MigrationEvent};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use workbook::{ParsedWorkbook, SUPPORTED_EXTENSIONS};

pub struct TableauParser {
    config: Arc<MappingConfig>,
    tracker: ConversionTracker,
}

impl TableauParser {
    pub fn new(config: Arc<MappingConfig>, events: Arc<dyn EventSink>) -> Self {
        TableauParser {
            config,
            tracker: ConversionTracker::new("TableauParser", events),
        }
    }

    fn check_version(&mut self, version: &str) {
        let info = self.config.version_info(version);
        if !info.supported {
            let mut context = Map::new();
            context.insert("version".to_string(), json!(version));
            context.insert("schema_version".to_string(), json!(info.schema_version));
            self.tracker.add_warning(
                format!("Tableau version {} may not be fully supported", version),
                context,
            );
        }
    }
}

fn details(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl Converter for TableauParser {
    type Input = PathBuf;
    type Output = ParsedWorkbook;

    fn supported_types(&self) -> &[&'static str] {
        &SUPPORTED_EXTENSIONS
    }

    fn validate_input(&self, path: &PathBuf) -> bool {
        path.is_file() && self.is_supported_type(&workbook::extension_of(path))
    }

    /// Errors: FileNotFound, UnsupportedFileType, CorruptedFile.
    fn convert(&mut self, path: PathBuf) -> Result<ParsedWorkbook, MigrationError> {
        let workbook = workbook::load_workbook(&path)?;
        let info = &workbook.file_info;

        self.tracker.emit(MigrationEvent::FileAnalysis {
            file_path: info.path.clone(),
            file_type: info.extension.clone(),
            file_size: info.size,
        });
        self.tracker.log_step(
            "file_analysis",
            details(&[
                ("file_name", json!(info.name)),
                ("file_size", json!(info.size)),
                ("file_type", json!(info.extension)),
            ]),
        );

        self.tracker.log_step(
            "version_detection",
            details(&[("version", json!(workbook.tableau_version))]),
        );
        self.check_version(&workbook.tableau_version);

        self.tracker.log_step(
            "metadata_extraction_complete",
            details(&[
                ("datasources_count", json!(workbook.datasources.len())),
                ("worksheets_count", json!(workbook.worksheets.len())),
                ("dashboards_count", json!(workbook.dashboards.len())),
                ("calculated_fields_count", json!(workbook.calculated_fields.len())),
            ]),
        );

        Ok(workbook)
    }

    fn tracker(&self) -> &ConversionTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ConversionTracker {
        &mut self.tracker
    }
}
