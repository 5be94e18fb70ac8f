//! FILENAME: engine/src/converter.rs
//! PURPOSE: The contract shared by every conversion component.
//! CONTEXT: A converter implements `validate_input` and `convert`; the
//! provided methods wrap them with the bookkeeping every component needs:
//! item counters, error isolation, warnings, timing and events. The
//! bookkeeping itself lives in `ConversionTracker`, which each converter owns.

use crate::error::{ErrorInfo, MigrationError};
use crate::events::{ConversionStatus, EventSink, MigrationEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub items_processed: usize,
    pub items_converted: usize,
    pub items_failed: usize,
    pub items_skipped: usize,
}

impl ConversionStats {
    fn to_details(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningInfo {
    pub message: String,
    pub context: Map<String, Value>,
    pub converter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub converter_type: String,
    pub statistics: ConversionStats,
    /// Set once a start/end bracket has completed.
    pub duration_seconds: Option<f64>,
    pub success_rate: f64,
    pub error_count: usize,
    pub warning_count: usize,
    pub errors: Vec<ErrorInfo>,
    pub warnings: Vec<WarningInfo>,
}

// ============================================================================
// TRACKER
// ============================================================================

/// Counters, collected errors and warnings of one converter.
pub struct ConversionTracker {
    name: String,
    stats: ConversionStats,
    errors: Vec<ErrorInfo>,
    warnings: Vec<WarningInfo>,
    started: Option<Instant>,
    finished: Option<Instant>,
    events: Arc<dyn EventSink>,
}

impl ConversionTracker {
    pub fn new(name: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        ConversionTracker {
            name: name.into(),
            stats: ConversionStats::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            started: None,
            finished: None,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> ConversionStats {
        self.stats
    }

    pub fn errors(&self) -> &[ErrorInfo] {
        &self.errors
    }

    pub fn warnings(&self) -> &[WarningInfo] {
        &self.warnings
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn emit(&self, event: MigrationEvent) {
        self.events.record(event);
    }

    /// Opens a timed operation (defaults to the converter name).
    pub fn start(&mut self, operation: Option<&str>) {
        self.started = Some(Instant::now());
        self.finished = None;
        let operation = operation.unwrap_or(&self.name).to_string();
        self.emit(MigrationEvent::component(
            operation,
            "conversion_process",
            ConversionStatus::Started,
            Map::new(),
        ));
    }

    /// Closes the operation opened by `start` and reports how it went.
    pub fn end(&mut self, operation: Option<&str>) {
        let finished = Instant::now();
        self.finished = Some(finished);
        let operation = operation.unwrap_or(&self.name).to_string();

        let duration = self
            .started
            .map(|started| finished.duration_since(started))
            .unwrap_or_default();
        self.emit(MigrationEvent::PerformanceMetric {
            operation: operation.clone(),
            duration_seconds: duration.as_secs_f64(),
            details: self.stats.to_details(),
        });

        let status = if self.stats.items_failed == 0 {
            ConversionStatus::Completed
        } else if self.stats.items_converted > 0 {
            ConversionStatus::Warning
        } else {
            ConversionStatus::Failed
        };
        self.emit(MigrationEvent::component(
            operation,
            "conversion_process",
            status,
            self.stats.to_details(),
        ));
    }

    /// An IN_PROGRESS event for a named step of the conversion.
    pub fn log_step(&self, step: &str, details: Map<String, Value>) {
        self.emit(MigrationEvent::component(
            self.name.clone(),
            step,
            ConversionStatus::InProgress,
            details,
        ));
    }

    pub fn add_warning(&mut self, message: impl Into<String>, context: Map<String, Value>) {
        let message = message.into();
        self.emit(MigrationEvent::warning(
            "conversion_warning",
            message.clone(),
            context.clone(),
        ));
        self.warnings.push(WarningInfo {
            message,
            context,
            converter: self.name.clone(),
        });
    }

    pub fn skipped(&mut self, item_name: &str) {
        let mut context = Map::new();
        context.insert("item_name".to_string(), json!(item_name));
        self.emit(MigrationEvent::warning(
            "validation_warning",
            format!("Input validation failed for {}", item_name),
            context,
        ));
        self.stats.items_skipped += 1;
    }

    pub fn converted(&mut self, item_name: &str, elapsed: Duration) {
        let mut details = Map::new();
        details.insert("item_name".to_string(), json!(item_name));
        self.emit(MigrationEvent::PerformanceMetric {
            operation: format!("{}_convert_item", self.name),
            duration_seconds: elapsed.as_secs_f64(),
            details,
        });
        self.stats.items_converted += 1;
    }

    /// Records a failed item. Errors outside the migration taxonomy are
    /// reported as unexpected, with the item and converter as context.
    pub fn failed(&mut self, item_name: &str, err: &MigrationError) {
        let info = if err.is_classified() {
            let info = ErrorInfo::from(err);
            self.emit(MigrationEvent::error(
                info.exception_type.clone(),
                info.message.clone(),
                info.context.clone(),
            ));
            info
        } else {
            let info = ErrorInfo::new(err.exception_type(), err.to_string())
                .with_context("item_name", item_name)
                .with_context("converter", self.name.clone());
            self.emit(MigrationEvent::error(
                "unexpected_error",
                info.message.clone(),
                info.context.clone(),
            ));
            info
        };
        self.errors.push(info);
        self.stats.items_failed += 1;
    }

    pub fn processed(&mut self) {
        self.stats.items_processed += 1;
    }

    pub fn summary(&self) -> ConversionSummary {
        let duration_seconds = match (self.started, self.finished) {
            (Some(started), Some(finished)) => Some(finished.duration_since(started).as_secs_f64()),
            _ => None,
        };
        let success_rate = if self.stats.items_processed > 0 {
            self.stats.items_converted as f64 / self.stats.items_processed as f64 * 100.0
        } else {
            0.0
        };

        ConversionSummary {
            converter_type: self.name.clone(),
            statistics: self.stats,
            duration_seconds,
            success_rate,
            error_count: self.errors.len(),
            warning_count: self.warnings.len(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.stats = ConversionStats::default();
        self.errors.clear();
        self.warnings.clear();
        self.started = None;
        self.finished = None;
    }
}

// ============================================================================
// CONVERTER TRAIT
// ============================================================================

pub trait Converter {
    type Input;
    type Output;

    /// Input kinds this converter accepts, e.g. file extensions.
    fn supported_types(&self) -> &[&'static str];

    fn validate_input(&self, input: &Self::Input) -> bool;

    fn convert(&mut self, input: Self::Input) -> Result<Self::Output, MigrationError>;

    fn tracker(&self) -> &ConversionTracker;

    fn tracker_mut(&mut self) -> &mut ConversionTracker;

    fn name(&self) -> &str {
        self.tracker().name()
    }

    fn is_supported_type(&self, input_type: &str) -> bool {
        self.supported_types().contains(&input_type)
    }

    /// Validates and converts one item. Invalid input is skipped and a failed
    /// conversion is recorded; both yield `None`.
    fn convert_with_error_handling(
        &mut self,
        input: Self::Input,
        item_name: &str,
    ) -> Option<Self::Output> {
        let outcome = if !self.validate_input(&input) {
            self.tracker_mut().skipped(item_name);
            None
        } else {
            let started = Instant::now();
            match self.convert(input) {
                Ok(output) => {
                    self.tracker_mut().converted(item_name, started.elapsed());
                    Some(output)
                }
                Err(err) => {
                    self.tracker_mut().failed(item_name, &err);
                    None
                }
            }
        };
        self.tracker_mut().processed();
        outcome
    }

    /// Converts items in order. Missing names default to `item_{i}`.
    fn batch_convert(
        &mut self,
        items: Vec<Self::Input>,
        names: &[String],
    ) -> Vec<Option<Self::Output>> {
        let operation = format!("{}_batch", self.name());
        self.tracker_mut().start(Some(&operation));

        let results = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let name = names.get(i).cloned().unwrap_or_else(|| format!("item_{}", i));
                self.convert_with_error_handling(item, &name)
            })
            .collect();

        self.tracker_mut().end(Some(&operation));
        results
    }

    fn conversion_summary(&self) -> ConversionSummary {
        self.tracker().summary()
    }

    fn reset(&mut self) {
        self.tracker_mut().reset();
    }
}
