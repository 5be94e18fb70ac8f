//! FILENAME: engine/src/pipeline.rs
//! PURPOSE: Chains converters into stages that run one after another.
//! CONTEXT: Each stage receives the output of the last stage that
//! succeeded. A stage that yields nothing is counted as failed and the data
//! it was given moves on to the next stage unchanged. A stage that yields
//! output with warnings ends in WARNING but still counts as completed. Failures never escape
//! as errors: callers read `PipelineResult::success` and `errors`.

use crate::converter::{ConversionSummary, Converter, WarningInfo};
use crate::dax::{ConversionOutput, ConversionResult, ConvertedWorkbook, FieldInput, FormulaInput};
use crate::error::{error_summary, ErrorInfo};
use crate::events::{ConversionStatus, EventSink, MigrationEvent};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use workbook::ParsedWorkbook;

// ============================================================================
// STAGE DATA
// ============================================================================

/// Everything that can flow between stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageData {
    Path(PathBuf),
    Formula(String),
    Field(FieldInput),
    Workbook(ParsedWorkbook),
    Converted(ConvertedWorkbook),
    Result(ConversionResult),
}

impl StageData {
    pub fn kind(&self) -> &'static str {
        match self {
            StageData::Path(_) => "path",
            StageData::Formula(_) => "formula",
            StageData::Field(_) => "field",
            StageData::Workbook(_) => "workbook",
            StageData::Converted(_) => "converted_workbook",
            StageData::Result(_) => "conversion_result",
        }
    }

    pub fn as_converted(&self) -> Option<&ConvertedWorkbook> {
        match self {
            StageData::Converted(converted) => Some(converted),
            _ => None,
        }
    }
}

/// Extracts a stage input from the data flowing through the pipeline.
/// Data the stage cannot take is handed back unchanged.
pub trait FromStage: Sized {
    fn from_stage(data: StageData) -> Result<Self, StageData>;
}

impl FromStage for PathBuf {
    fn from_stage(data: StageData) -> Result<Self, StageData> {
        match data {
            StageData::Path(path) => Ok(path),
            other => Err(other),
        }
    }
}

impl FromStage for FormulaInput {
    fn from_stage(data: StageData) -> Result<Self, StageData> {
        match data {
            StageData::Formula(formula) => Ok(FormulaInput::Formula(formula)),
            StageData::Field(field) => Ok(FormulaInput::Field(field)),
            StageData::Workbook(workbook) => Ok(FormulaInput::Workbook(workbook)),
            other => Err(other),
        }
    }
}

impl From<PathBuf> for StageData {
    fn from(path: PathBuf) -> Self {
        StageData::Path(path)
    }
}

impl From<ParsedWorkbook> for StageData {
    fn from(workbook: ParsedWorkbook) -> Self {
        StageData::Workbook(workbook)
    }
}

impl From<ConversionOutput> for StageData {
    fn from(output: ConversionOutput) -> Self {
        match output {
            ConversionOutput::Single(result) => StageData::Result(result),
            ConversionOutput::Workbook(converted) => StageData::Converted(converted),
        }
    }
}

// ============================================================================
// STAGES
// ============================================================================

/// A converter as the pipeline sees it.
pub trait Stage {
    /// `None` when the stage produced nothing: invalid or incompatible
    /// input, or a failed conversion.
    fn run(&mut self, data: StageData, stage_name: &str) -> Option<StageData>;

    fn summary(&self) -> ConversionSummary;

    fn reset(&mut self);
}

impl<C> Stage for C
where
    C: Converter,
    C::Input: FromStage,
    C::Output: Into<StageData>,
{
    fn run(&mut self, data: StageData, stage_name: &str) -> Option<StageData> {
        match C::Input::from_stage(data) {
            Ok(input) => self
                .convert_with_error_handling(input, stage_name)
                .map(Into::into),
            Err(data) => {
                log::warn!(
                    "Stage {} cannot take {} data; skipped",
                    stage_name,
                    data.kind()
                );
                let tracker = self.tracker_mut();
                tracker.skipped(stage_name);
                tracker.processed();
                None
            }
        }
    }

    fn summary(&self) -> ConversionSummary {
        self.conversion_summary()
    }

    fn reset(&mut self) {
        Converter::reset(self);
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total_stages: usize,
    pub completed_stages: usize,
    pub failed_stages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub data: Option<StageData>,
    pub errors: Vec<ErrorInfo>,
    pub warnings: Vec<WarningInfo>,
    /// Stage name -> stage summary, plus whatever the caller adds
    /// (e.g. "output_files").
    pub metadata: BTreeMap<String, Value>,
}

impl PipelineResult {
    /// A result for work that never reached the pipeline.
    pub fn failure(error: ErrorInfo) -> Self {
        PipelineResult {
            success: false,
            data: None,
            errors: vec![error],
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn error_summary(&self) -> String {
        error_summary(&self.errors)
    }
}

struct PipelineStage {
    name: String,
    stage: Box<dyn Stage>,
}

pub struct ConversionPipeline {
    stages: Vec<PipelineStage>,
    stats: PipelineStats,
    events: Arc<dyn EventSink>,
}

impl ConversionPipeline {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        ConversionPipeline {
            stages: Vec::new(),
            stats: PipelineStats::default(),
            events,
        }
    }

    /// Appends a stage. Stages run in the order they were added.
    pub fn add_converter(&mut self, converter: impl Stage + 'static, stage_name: impl Into<String>) -> &mut Self {
        self.stages.push(PipelineStage {
            name: stage_name.into(),
            stage: Box::new(converter),
        });
        self.stats.total_stages += 1;
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn emit(&self, component_type: &str, component_name: &str, status: ConversionStatus, details: Map<String, Value>) {
        self.events.record(MigrationEvent::component(
            component_type,
            component_name,
            status,
            details,
        ));
    }

    /// Runs every stage once over `input`.
    pub fn execute(&mut self, input: StageData) -> PipelineResult {
        self.stats.completed_stages = 0;
        self.stats.failed_stages = 0;
        self.emit(
            "ConversionPipeline",
            "pipeline_execution",
            ConversionStatus::Started,
            Map::new(),
        );

        let mut current = input;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut metadata = BTreeMap::new();

        for PipelineStage { name, stage } in self.stages.iter_mut() {
            self.events.record(MigrationEvent::component(
                "PipelineStage",
                name.as_str(),
                ConversionStatus::Started,
                Map::new(),
            ));
            stage.reset();

            let produced = match stage.run(current.clone(), name) {
                Some(output) => {
                    current = output;
                    self.stats.completed_stages += 1;
                    true
                }
                None => {
                    self.stats.failed_stages += 1;
                    false
                }
            };

            let summary = stage.summary();
            let status = match (produced, summary.warnings.is_empty()) {
                (false, _) => ConversionStatus::Failed,
                (true, true) => ConversionStatus::Completed,
                (true, false) => ConversionStatus::Warning,
            };
            log::debug!("Pipeline stage {} finished: {}", name, status);
            self.events.record(MigrationEvent::component(
                "PipelineStage",
                name.as_str(),
                status,
                Map::new(),
            ));

            errors.extend(summary.errors.iter().cloned());
            warnings.extend(summary.warnings.iter().cloned());
            metadata.insert(
                name.clone(),
                serde_json::to_value(&summary).unwrap_or(Value::Null),
            );
        }

        let success = self.stats.failed_stages == 0;
        let mut details = Map::new();
        details.insert("total_stages".to_string(), json!(self.stats.total_stages));
        details.insert("completed_stages".to_string(), json!(self.stats.completed_stages));
        details.insert("failed_stages".to_string(), json!(self.stats.failed_stages));
        self.emit(
            "ConversionPipeline",
            "pipeline_execution",
            if success {
                ConversionStatus::Completed
            } else {
                ConversionStatus::Failed
            },
            details,
        );

        PipelineResult {
            success,
            data: Some(current),
            errors,
            warnings,
            metadata,
        }
    }
}
