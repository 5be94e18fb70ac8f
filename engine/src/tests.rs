//! FILENAME: engine/src/tests.rs
//! PURPOSE: Unit tests for configuration, errors, events, converters and the pipeline.

use crate::config::*;
use crate::converter::{ConversionTracker, Converter};
use crate::error::{error_summary, ErrorInfo, MigrationError};
use crate::events::{ConversionStatus, EventSink, MemorySink, MigrationEvent, SessionStatistics};
use crate::pipeline::{ConversionPipeline, FromStage, StageData};
use serde_json::{json, Map};
use std::sync::Arc;
use workbook::WorkbookError;

// ========================================
// CONFIGURATION
// ========================================

#[test]
fn test_builtin_function_mappings() {
    let config = MappingConfig::builtin();
    assert_eq!(config.function_mapping("countd"), Some("DISTINCTCOUNT"));
    assert_eq!(config.function_mapping("AVG"), Some("AVERAGE"));
    assert_eq!(config.function_mapping("ZSCORE"), None);
    assert!(config.supported_functions()["aggregation_functions"].contains(&"SUM".to_string()));
}

#[test]
fn test_builtin_visual_and_type_mappings() {
    let config = MappingConfig::builtin();
    assert_eq!(config.visual_mapping("bar", Some("vertical")), Some("clusteredColumnChart"));
    assert_eq!(config.visual_mapping("bar", Some("stacked")), Some("clusteredBarChart"));
    assert_eq!(config.visual_mapping("line", None), Some("lineChart"));
    assert_eq!(config.visual_mapping("treemap", None), None);

    assert_eq!(config.data_type_mapping("integer"), "Int64");
    assert_eq!(config.data_type_mapping("spatial"), FALLBACK_DATA_TYPE);

    let sqlserver = config.connection_mapping("sqlserver").unwrap();
    assert_eq!(sqlserver.powerbi_type, "SqlServer");
    assert!(sqlserver.supported);
    assert!(config.connection_mapping("excel-direct").is_none());
}

#[test]
fn test_builtin_validates() {
    let report = MappingConfig::builtin().validate();
    assert_eq!(report.len(), CONFIG_FILES.len());
    assert!(report.values().all(|ok| *ok));
}

#[test]
fn test_load_missing_directory_fails() {
    let err = MappingConfig::load(std::path::Path::new("/definitely/not/here")).unwrap_err();
    assert_eq!(err.exception_type(), "Configuration");
    assert!(!err.is_recoverable());
}

#[test]
fn test_load_falls_back_per_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(FUNCTION_MAPPINGS),
        r#"{ "aggregation_functions": { "SUM": "SUMX" }, "notes": "not a category" }"#,
    )
    .unwrap();
    std::fs::write(dir.path().join(VISUAL_MAPPINGS), "{ not json").unwrap();

    let config = MappingConfig::load(dir.path()).unwrap();

    assert_eq!(config.function_mapping("sum"), Some("SUMX"));
    assert_eq!(config.function_mapping("AVG"), None);
    assert_eq!(config.visual_mapping("pie", None), Some("pieChart"));

    let sources = config.sources();
    assert!(matches!(sources[FUNCTION_MAPPINGS], ConfigSource::File { .. }));
    assert!(matches!(sources[VISUAL_MAPPINGS], ConfigSource::Fallback { .. }));
    assert_eq!(sources[DATA_TYPE_MAPPINGS], ConfigSource::Builtin);
}

#[test]
fn test_first_category_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(FUNCTION_MAPPINGS),
        r#"{ "b_functions": { "LEN": "LENGTH" }, "a_functions": { "LEN": "LEN" } }"#,
    )
    .unwrap();

    let config = MappingConfig::load(dir.path()).unwrap();
    assert_eq!(config.function_mapping("LEN"), Some("LEN"));
}

#[test]
fn test_version_info_nearest_major() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(TABLEAU_MAPPINGS),
        r#"{ "version_mappings": {
            "2020.1": { "supported": true, "schema_version": "18.1" },
            "8.0": { "supported": false }
        } }"#,
    )
    .unwrap();
    let config = MappingConfig::load(dir.path()).unwrap();

    assert_eq!(config.version_info("2020.1").schema_version, "18.1");
    assert_eq!(config.version_info("2020.4").schema_version, "18.1");
    assert!(!config.version_info("9.2").supported);
    assert_eq!(config.version_info("unknown"), VersionInfo::default());
}

#[test]
fn test_builtin_version_default_entry() {
    let config = MappingConfig::builtin();
    assert!(config.version_info("preview").supported);
    assert_eq!(config.version_info("preview").schema_version, "18.1");
    assert_eq!(config.version_info("2021.3"), config.version_info("default"));
    assert!(config.version_info("2021.3").supported);
    assert_eq!(config.supported_versions(), vec!["default"]);
}

// ========================================
// ERRORS
// ========================================

#[test]
fn test_unsupported_file_type_info() {
    let err = MigrationError::from(WorkbookError::UnsupportedFileType {
        extension: ".xlsx".to_string(),
        supported: vec![".twb".to_string(), ".twbx".to_string()],
    });
    let info = ErrorInfo::from(&err);

    assert_eq!(info.exception_type, "UnsupportedFileType");
    assert_eq!(info.context["file_type"], json!(".xlsx"));
    assert_eq!(info.context["supported_types"], json!([".twb", ".twbx"]));
}

#[test]
fn test_context_drops_missing_values() {
    let err = MigrationError::FormulaConversion {
        message: "bad".to_string(),
        original_formula: None,
    };
    assert!(err.context().is_empty());
    assert!(err.is_classified());
    assert!(err.is_recoverable());
    assert!(!MigrationError::Unexpected("boom".to_string()).is_classified());
}

#[test]
fn test_error_summary_counts_kinds() {
    assert_eq!(error_summary(&[]), "No errors");
    let errors = vec![
        ErrorInfo::new("CorruptedFile", "a"),
        ErrorInfo::new("Io", "b"),
        ErrorInfo::new("CorruptedFile", "c"),
    ];
    assert_eq!(error_summary(&errors), "3 errors: 2 CorruptedFile, 1 Io");
}

// ========================================
// EVENTS
// ========================================

#[test]
fn test_event_serializes_with_action_tag() {
    let event = MigrationEvent::warning("conversion_warning", "careful", Map::new());
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["action"], json!("warning"));
    assert_eq!(event.action(), "warning");
}

#[test]
fn test_session_statistics() {
    let events = vec![
        MigrationEvent::component("A", "a", ConversionStatus::Completed, Map::new()),
        MigrationEvent::component("B", "b", ConversionStatus::Completed, Map::new()),
        MigrationEvent::component("C", "c", ConversionStatus::Failed, Map::new()),
        MigrationEvent::warning("w", "w", Map::new()),
    ];
    let stats = SessionStatistics::from_events(events.iter());

    assert_eq!(stats.components_converted, 2);
    assert_eq!(stats.errors_encountered, 1);
    assert_eq!(stats.warnings_generated, 1);
    assert!((stats.success_rate - 66.666).abs() < 0.01);
    assert_eq!(SessionStatistics::from_events(std::iter::empty()).success_rate, 100.0);
}

#[test]
fn test_memory_sink_report() {
    let sink = MemorySink::new();
    assert!(sink.session_id().starts_with("migration_"));
    sink.record(MigrationEvent::performance("parse", 0.5));
    sink.record(MigrationEvent::error("CorruptedFile", "bad zip", Map::new()));
    sink.record(MigrationEvent::component("X", "x", ConversionStatus::Started, Map::new()));

    let report = sink.session_report();
    assert_eq!(report.performance_log.len(), 1);
    assert_eq!(report.error_log.len(), 1);
    assert_eq!(report.conversion_log.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("report.json");
    sink.save_report(&path).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["session_info"]["session_id"], json!(sink.session_id()));

    sink.clear();
    assert!(sink.events().is_empty());
}

// ========================================
// CONVERTERS
// ========================================

/// Repeats its input; "boom" fails with a formula error, "panic" with an
/// unexpected one, "odd" succeeds with a warning.
struct Repeater {
    tracker: ConversionTracker,
}

impl Repeater {
    fn new(events: Arc<dyn EventSink>) -> Self {
        Repeater {
            tracker: ConversionTracker::new("Repeater", events),
        }
    }
}

impl Converter for Repeater {
    type Input = String;
    type Output = String;

    fn supported_types(&self) -> &[&'static str] {
        &["text"]
    }

    fn validate_input(&self, input: &String) -> bool {
        !input.is_empty()
    }

    fn convert(&mut self, input: String) -> Result<String, MigrationError> {
        match input.as_str() {
            "boom" => Err(MigrationError::formula("cannot repeat", input.clone())),
            "panic" => Err(MigrationError::Unexpected("lost".to_string())),
            "odd" => {
                self.tracker.add_warning("odd input", Map::new());
                Ok(input.repeat(2))
            }
            _ => Ok(input.repeat(2)),
        }
    }

    fn tracker(&self) -> &ConversionTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ConversionTracker {
        &mut self.tracker
    }
}

#[test]
fn test_convert_with_error_handling_counts() {
    let sink = Arc::new(MemorySink::new());
    let mut repeater = Repeater::new(sink.clone());

    assert_eq!(repeater.convert_with_error_handling("ab".to_string(), "one"), Some("abab".to_string()));
    assert_eq!(repeater.convert_with_error_handling(String::new(), "two"), None);
    assert_eq!(repeater.convert_with_error_handling("boom".to_string(), "three"), None);
    assert_eq!(repeater.convert_with_error_handling("panic".to_string(), "four"), None);

    let stats = repeater.tracker().stats();
    assert_eq!(stats.items_processed, 4);
    assert_eq!(stats.items_converted, 1);
    assert_eq!(stats.items_skipped, 1);
    assert_eq!(stats.items_failed, 2);

    let errors = repeater.tracker().errors();
    assert_eq!(errors[0].exception_type, "FormulaConversion");
    assert_eq!(errors[0].context["original_formula"], json!("boom"));
    assert_eq!(errors[1].context["item_name"], json!("four"));
    assert_eq!(errors[1].context["converter"], json!("Repeater"));

    let unexpected = sink.events().into_iter().any(|e| {
        matches!(e, MigrationEvent::Error { ref error_type, .. } if error_type == "unexpected_error")
    });
    assert!(unexpected);
}

#[test]
fn test_batch_convert_and_summary() {
    let mut repeater = Repeater::new(Arc::new(MemorySink::new()));
    let results = repeater.batch_convert(
        vec!["a".to_string(), "boom".to_string(), "c".to_string()],
        &["first".to_string()],
    );

    assert_eq!(results, vec![Some("aa".to_string()), None, Some("cc".to_string())]);
    let summary = repeater.conversion_summary();
    assert_eq!(summary.converter_type, "Repeater");
    assert_eq!(summary.error_count, 1);
    assert!(summary.duration_seconds.is_some());
    assert!((summary.success_rate - 66.666).abs() < 0.01);

    repeater.reset();
    assert_eq!(repeater.tracker().stats().items_processed, 0);
    assert!(repeater.is_supported_type("text"));
}

// ========================================
// PIPELINE
// ========================================

struct Text(String);

impl FromStage for Text {
    fn from_stage(data: StageData) -> Result<Self, StageData> {
        match data {
            StageData::Formula(text) => Ok(Text(text)),
            other => Err(other),
        }
    }
}

impl From<Text> for StageData {
    fn from(text: Text) -> Self {
        StageData::Formula(text.0)
    }
}

/// Pipeline-facing wrapper around `Repeater`.
struct TextStage(Repeater);

impl Converter for TextStage {
    type Input = Text;
    type Output = Text;

    fn supported_types(&self) -> &[&'static str] {
        self.0.supported_types()
    }

    fn validate_input(&self, input: &Text) -> bool {
        self.0.validate_input(&input.0)
    }

    fn convert(&mut self, input: Text) -> Result<Text, MigrationError> {
        self.0.convert(input.0).map(Text)
    }

    fn tracker(&self) -> &ConversionTracker {
        self.0.tracker()
    }

    fn tracker_mut(&mut self) -> &mut ConversionTracker {
        self.0.tracker_mut()
    }
}

#[test]
fn test_pipeline_chains_stages() {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let mut pipeline = ConversionPipeline::new(sink.clone());
    pipeline
        .add_converter(TextStage(Repeater::new(sink.clone())), "first")
        .add_converter(TextStage(Repeater::new(sink.clone())), "second");

    let result = pipeline.execute(StageData::Formula("ab".to_string()));

    assert!(result.success);
    assert_eq!(result.data, Some(StageData::Formula("abababab".to_string())));
    assert!(result.metadata.contains_key("first"));
    assert!(result.metadata.contains_key("second"));
    assert_eq!(pipeline.stats().completed_stages, 2);
}

#[test]
fn test_failed_stage_keeps_last_good_data() {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let mut pipeline = ConversionPipeline::new(sink.clone());
    pipeline.add_converter(TextStage(Repeater::new(sink.clone())), "only");

    let result = pipeline.execute(StageData::Formula("boom".to_string()));

    assert!(!result.success);
    assert_eq!(result.data, Some(StageData::Formula("boom".to_string())));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.error_summary(), "1 errors: 1 FormulaConversion");
    assert_eq!(pipeline.stats().failed_stages, 1);
}

#[test]
fn test_incompatible_stage_input_is_skipped() {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let mut pipeline = ConversionPipeline::new(sink.clone());
    pipeline.add_converter(TextStage(Repeater::new(sink.clone())), "text");

    let result = pipeline.execute(StageData::Path("report.twb".into()));

    assert!(!result.success);
    assert!(!result.has_errors());
    assert_eq!(result.metadata["text"]["statistics"]["items_skipped"], json!(1));
}

#[test]
fn test_stage_with_warnings_ends_in_warning() {
    let memory = Arc::new(MemorySink::new());
    let sink: Arc<dyn EventSink> = memory.clone();
    let mut pipeline = ConversionPipeline::new(sink.clone());
    pipeline.add_converter(TextStage(Repeater::new(sink.clone())), "only");

    let result = pipeline.execute(StageData::Formula("odd".to_string()));

    assert!(result.success);
    assert!(result.has_warnings());
    assert_eq!(pipeline.stats().completed_stages, 1);

    let stage_statuses: Vec<ConversionStatus> = memory
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MigrationEvent::ComponentConversion {
                component_type,
                status,
                ..
            } if component_type == "PipelineStage" => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        stage_statuses,
        vec![ConversionStatus::Started, ConversionStatus::Warning]
    );
}
