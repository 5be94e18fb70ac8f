//! FILENAME: engine/src/migration.rs
//! PURPOSE: Top-level orchestrator: one Tableau file or a directory of them
//! in, Power BI artifacts out.
//! CONTEXT: The configuration is loaded once and shared by every pipeline
//! the engine builds. Events go both to the `log` facade and to an in-memory
//! session log that can be saved as a JSON report.

use crate::config::MappingConfig;
use crate::dax::{FormulaConverter, FormulaSettings};
use crate::error::{ErrorInfo, MigrationError};
use crate::events::{ConversionStatus, EventSink, LogSink, MemorySink, MigrationEvent, MultiSink};
use crate::output::write_outputs;
use crate::pipeline::{ConversionPipeline, PipelineResult, StageData};
use crate::tableau_parser::TableauParser;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use workbook::{extension_of, is_supported, WorkbookError, SUPPORTED_EXTENSIONS};

pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSettings {
    /// Directory of mapping documents; built-in defaults when `None`.
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub formula: FormulaSettings,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        MigrationSettings {
            config_dir: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            formula: FormulaSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationStats {
    pub files_processed: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub warnings_generated: usize,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
}

pub struct MigrationEngine {
    settings: MigrationSettings,
    config: Arc<MappingConfig>,
    session: Arc<MemorySink>,
    events: Arc<dyn EventSink>,
    stats: MigrationStats,
}

impl MigrationEngine {
    /// Loads the mapping configuration named by the settings.
    pub fn new(settings: MigrationSettings) -> Result<Self, MigrationError> {
        let config = MappingConfig::from_dir(settings.config_dir.as_deref())?;
        Ok(Self::with_config(settings, Arc::new(config)))
    }

    pub fn with_config(settings: MigrationSettings, config: Arc<MappingConfig>) -> Self {
        let session = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogSink), session.clone()];
        let events: Arc<dyn EventSink> = Arc::new(MultiSink::new(sinks));

        log::info!("Migration engine initialized (session {})", session.session_id());
        log::info!("Output directory: {}", settings.output_dir.display());

        MigrationEngine {
            settings,
            config,
            session,
            events,
            stats: MigrationStats::default(),
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    pub fn config(&self) -> &Arc<MappingConfig> {
        &self.config
    }

    pub fn session(&self) -> &Arc<MemorySink> {
        &self.session
    }

    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    /// parse_tableau --> convert_formulas
    fn build_pipeline(&self) -> ConversionPipeline {
        let mut pipeline = ConversionPipeline::new(self.events.clone());
        pipeline
            .add_converter(
                TableauParser::new(self.config.clone(), self.events.clone()),
                "parse_tableau",
            )
            .add_converter(
                FormulaConverter::new(self.config.clone(), self.events.clone())
                    .with_settings(self.settings.formula.clone()),
                "convert_formulas",
            );
        pipeline
    }

    fn file_conversion_event(&self, status: ConversionStatus, details: Map<String, Value>) {
        self.events.record(MigrationEvent::component(
            "MigrationEngine",
            "file_conversion",
            status,
            details,
        ));
    }

    fn reject(&mut self, path: &Path, err: MigrationError) -> PipelineResult {
        let info = ErrorInfo::from(&err);
        log::error!("{}", err);
        self.events.record(MigrationEvent::error(
            info.exception_type.clone(),
            info.message.clone(),
            info.context.clone(),
        ));
        self.stats.failed_conversions += 1;

        let mut result = PipelineResult::failure(info);
        result
            .metadata
            .insert("file_path".to_string(), json!(path.display().to_string()));
        result
    }

    /// Converts one file and writes its artifacts. `output_name` defaults to
    /// the file stem. Never fails: problems are in the returned result.
    pub fn convert_file(&mut self, path: &Path, output_name: Option<&str>) -> PipelineResult {
        self.stats.start_time = Some(Local::now());
        self.stats.files_processed += 1;
        let result = self.run_file(path, output_name);
        self.stats.end_time = Some(Local::now());
        result
    }

    fn run_file(&mut self, path: &Path, output_name: Option<&str>) -> PipelineResult {
        if !path.exists() {
            return self.reject(
                path,
                MigrationError::Workbook(WorkbookError::FileNotFound(path.to_path_buf())),
            );
        }
        if !is_supported(path) {
            return self.reject(
                path,
                MigrationError::Workbook(WorkbookError::UnsupportedFileType {
                    extension: extension_of(path),
                    supported: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
                }),
            );
        }

        let name = match output_name {
            Some(name) => name.to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "converted".to_string()),
        };

        let mut details = Map::new();
        details.insert("file_path".to_string(), json!(path.display().to_string()));
        details.insert("output_name".to_string(), json!(name));
        self.file_conversion_event(ConversionStatus::Started, details);

        let mut pipeline = self.build_pipeline();
        let mut result = pipeline.execute(StageData::Path(path.to_path_buf()));
        result
            .metadata
            .insert("file_path".to_string(), json!(path.display().to_string()));
        self.stats.warnings_generated += result.warnings.len();

        if result.success {
            let written = match result.data.as_ref().and_then(StageData::as_converted) {
                Some(converted) => write_outputs(
                    converted,
                    &self.settings.output_dir,
                    &name,
                    &self.config,
                    self.events.as_ref(),
                ),
                None => Err(MigrationError::Unexpected(
                    "Pipeline finished without a converted workbook".to_string(),
                )),
            };
            match written {
                Ok(files) => {
                    let files: Vec<String> =
                        files.iter().map(|f| f.display().to_string()).collect();
                    let mut details = Map::new();
                    details.insert("output_files".to_string(), json!(files));
                    self.file_conversion_event(ConversionStatus::Completed, details);
                    result.metadata.insert("output_files".to_string(), json!(files));
                }
                Err(err) => {
                    log::error!("Writing outputs for {} failed: {}", path.display(), err);
                    result.errors.push(
                        ErrorInfo::from(&err).with_context("file_path", path.display().to_string()),
                    );
                    result.success = false;
                }
            }
        }

        if result.success {
            self.stats.successful_conversions += 1;
        } else {
            self.stats.failed_conversions += 1;
            let mut details = Map::new();
            details.insert(
                "errors".to_string(),
                serde_json::to_value(&result.errors).unwrap_or(Value::Null),
            );
            self.file_conversion_event(ConversionStatus::Failed, details);
        }
        result
    }

    /// Converts every supported file in `dir`, in file name order.
    pub fn convert_directory(
        &mut self,
        dir: &Path,
        recursive: bool,
    ) -> Result<Vec<PipelineResult>, MigrationError> {
        if !dir.is_dir() {
            return Err(MigrationError::DirectoryNotFound(dir.to_path_buf()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let files: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();

        log::info!("Found {} Tableau files in {}", files.len(), dir.display());

        Ok(files
            .iter()
            .map(|file| {
                log::info!("Converting: {}", file.display());
                self.convert_file(file, None)
            })
            .collect())
    }

    /// Saves the session log. Defaults to `<output_dir>/<session_id>_report.json`.
    pub fn save_session_report(&self, path: Option<&Path>) -> Result<PathBuf, MigrationError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .settings
                .output_dir
                .join(format!("{}_report.json", self.session.session_id())),
        };
        self.session.save_report(&path)?;
        Ok(path)
    }
}
