//! FILENAME: engine/src/events.rs
//! PURPOSE: Structured migration events and the sinks that receive them.
//! CONTEXT: Converters never write log lines about their progress directly.
//! They emit `MigrationEvent`s into an `EventSink`. `LogSink` forwards events
//! to the `log` facade under the "migration" target; `MemorySink` keeps them
//! for the session report and for tests.

use crate::error::MigrationError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const LOG_TARGET: &str = "migration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Skipped,
    Warning,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversionStatus::Started => "STARTED",
            ConversionStatus::InProgress => "IN_PROGRESS",
            ConversionStatus::Completed => "COMPLETED",
            ConversionStatus::Failed => "FAILED",
            ConversionStatus::Skipped => "SKIPPED",
            ConversionStatus::Warning => "WARNING",
        };
        write!(f, "{}", label)
    }
}

/// One thing that happened during a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MigrationEvent {
    FileAnalysis {
        file_path: String,
        file_type: String,
        file_size: u64,
    },
    ComponentConversion {
        component_type: String,
        component_name: String,
        status: ConversionStatus,
        details: Map<String, Value>,
    },
    FormulaConversion {
        original_formula: String,
        converted_formula: String,
        success: bool,
        issues: Vec<String>,
    },
    VisualMapping {
        tableau_visual: String,
        powerbi_visual: String,
        mapping_success: bool,
        compatibility_notes: Vec<String>,
    },
    DataSourceConversion {
        source_type: String,
        target_type: String,
        connection_details: Map<String, Value>,
        success: bool,
    },
    PerformanceMetric {
        operation: String,
        duration_seconds: f64,
        details: Map<String, Value>,
    },
    ValidationResult {
        validation_type: String,
        component: String,
        passed: bool,
        issues: Vec<String>,
    },
    Error {
        error_type: String,
        message: String,
        context: Map<String, Value>,
    },
    Warning {
        warning_type: String,
        message: String,
        context: Map<String, Value>,
    },
}

impl MigrationEvent {
    pub fn component(
        component_type: impl Into<String>,
        component_name: impl Into<String>,
        status: ConversionStatus,
        details: Map<String, Value>,
    ) -> Self {
        MigrationEvent::ComponentConversion {
            component_type: component_type.into(),
            component_name: component_name.into(),
            status,
            details,
        }
    }

    pub fn performance(operation: impl Into<String>, duration_seconds: f64) -> Self {
        MigrationEvent::PerformanceMetric {
            operation: operation.into(),
            duration_seconds,
            details: Map::new(),
        }
    }

    pub fn error(
        error_type: impl Into<String>,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        MigrationEvent::Error {
            error_type: error_type.into(),
            message: message.into(),
            context,
        }
    }

    pub fn warning(
        warning_type: impl Into<String>,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        MigrationEvent::Warning {
            warning_type: warning_type.into(),
            message: message.into(),
            context,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            MigrationEvent::FileAnalysis { .. } => "file_analysis",
            MigrationEvent::ComponentConversion { .. } => "component_conversion",
            MigrationEvent::FormulaConversion { .. } => "formula_conversion",
            MigrationEvent::VisualMapping { .. } => "visual_mapping",
            MigrationEvent::DataSourceConversion { .. } => "data_source_conversion",
            MigrationEvent::PerformanceMetric { .. } => "performance_metric",
            MigrationEvent::ValidationResult { .. } => "validation_result",
            MigrationEvent::Error { .. } => "error",
            MigrationEvent::Warning { .. } => "warning",
        }
    }
}

/// Receiver of migration events. Shared between converters behind an `Arc`.
pub trait EventSink: Send + Sync {
    fn record(&self, event: MigrationEvent);
}

// ============================================================================
// LOG SINK
// ============================================================================

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

fn preview(formula: &str) -> String {
    if formula.chars().count() > 50 {
        let head: String = formula.chars().take(50).collect();
        format!("{}...", head)
    } else {
        formula.to_string()
    }
}

impl EventSink for LogSink {
    fn record(&self, event: MigrationEvent) {
        match &event {
            MigrationEvent::FileAnalysis {
                file_path,
                file_type,
                file_size,
            } => {
                log::info!(target: LOG_TARGET, "Analyzing file: {}", file_path);
                log::info!(target: LOG_TARGET, "File type: {}, size: {} bytes", file_type, file_size);
            }
            MigrationEvent::ComponentConversion {
                component_type,
                component_name,
                status,
                ..
            } => match status {
                ConversionStatus::Completed => {
                    log::info!(target: LOG_TARGET, "Converted {}: {}", component_type, component_name)
                }
                ConversionStatus::Failed => {
                    log::error!(target: LOG_TARGET, "Failed to convert {}: {}", component_type, component_name)
                }
                ConversionStatus::Warning => {
                    log::warn!(target: LOG_TARGET, "Warning in {}: {}", component_type, component_name)
                }
                other => {
                    log::info!(target: LOG_TARGET, "{}: {} - {}", other, component_type, component_name)
                }
            },
            MigrationEvent::FormulaConversion {
                original_formula,
                success,
                issues,
                ..
            } => {
                if *success {
                    log::info!(target: LOG_TARGET, "Formula converted: {}", preview(original_formula));
                } else {
                    log::error!(target: LOG_TARGET, "Formula conversion failed: {}", preview(original_formula));
                    for issue in issues {
                        log::error!(target: LOG_TARGET, "   Issue: {}", issue);
                    }
                }
            }
            MigrationEvent::VisualMapping {
                tableau_visual,
                powerbi_visual,
                mapping_success,
                compatibility_notes,
            } => {
                if *mapping_success {
                    log::info!(target: LOG_TARGET, "Visual mapped: {} -> {}", tableau_visual, powerbi_visual);
                } else {
                    log::warn!(target: LOG_TARGET, "Visual mapping issue: {}", tableau_visual);
                }
                for note in compatibility_notes {
                    log::info!(target: LOG_TARGET, "   Note: {}", note);
                }
            }
            MigrationEvent::DataSourceConversion {
                source_type,
                target_type,
                success,
                ..
            } => {
                if *success {
                    log::info!(target: LOG_TARGET, "Data source converted: {} -> {}", source_type, target_type);
                } else {
                    log::error!(target: LOG_TARGET, "Data source conversion failed: {}", source_type);
                }
            }
            MigrationEvent::PerformanceMetric {
                operation,
                duration_seconds,
                ..
            } => {
                log::debug!(target: LOG_TARGET, "{}: {:.2}s", operation, duration_seconds);
            }
            MigrationEvent::ValidationResult {
                validation_type,
                component,
                passed,
                issues,
            } => {
                if *passed {
                    log::info!(target: LOG_TARGET, "Validation passed: {} - {}", validation_type, component);
                } else {
                    log::error!(target: LOG_TARGET, "Validation failed: {} - {}", validation_type, component);
                    for issue in issues {
                        log::error!(target: LOG_TARGET, "   Issue: {}", issue);
                    }
                }
            }
            MigrationEvent::Error {
                error_type,
                message,
                ..
            } => log::error!(target: LOG_TARGET, "{}: {}", error_type, message),
            MigrationEvent::Warning {
                warning_type,
                message,
                ..
            } => log::warn!(target: LOG_TARGET, "{}: {}", warning_type, message),
        }
    }
}

// ============================================================================
// MEMORY SINK & SESSION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: MigrationEvent,
}

/// Keeps every event of a session in arrival order.
#[derive(Debug)]
pub struct MemorySink {
    session_id: String,
    started: DateTime<Local>,
    records: Mutex<Vec<EventRecord>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        let started = Local::now();
        let session_id = format!(
            "migration_{}_{}",
            started.format("%Y%m%d_%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        MemorySink {
            session_id,
            started,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.records
            .lock()
            .map(|records| records.iter().map(|r| r.event.clone()).collect())
            .unwrap_or_default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    pub fn statistics(&self) -> SessionStatistics {
        SessionStatistics::from_events(self.records().iter().map(|r| &r.event))
    }

    pub fn session_report(&self) -> SessionReport {
        let end_time = Local::now();
        let records = self.records();
        let statistics = SessionStatistics::from_events(records.iter().map(|r| &r.event));

        let mut report = SessionReport {
            session_info: SessionInfo {
                session_id: self.session_id.clone(),
                start_time: self.started,
                end_time,
                duration_seconds: (end_time - self.started)
                    .to_std()
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0),
            },
            statistics,
            conversion_log: Vec::new(),
            error_log: Vec::new(),
            performance_log: Vec::new(),
            validation_log: Vec::new(),
        };

        for record in records {
            match record.event {
                MigrationEvent::Error { .. } => report.error_log.push(record),
                MigrationEvent::PerformanceMetric { .. } => report.performance_log.push(record),
                MigrationEvent::ValidationResult { .. } => report.validation_log.push(record),
                _ => report.conversion_log.push(record),
            }
        }
        report
    }

    /// Writes the session report as pretty JSON.
    pub fn save_report(&self, path: &Path) -> Result<(), MigrationError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.session_report())?;
        std::fs::write(path, json)?;
        log::info!(target: LOG_TARGET, "Conversion report saved: {}", path.display());
        Ok(())
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: MigrationEvent) {
        if let Ok(mut records) = self.records.lock() {
            records.push(EventRecord {
                timestamp: Local::now(),
                event,
            });
        }
    }
}

/// Sends every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        MultiSink { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for MultiSink {
    fn record(&self, event: MigrationEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub files_processed: usize,
    pub components_converted: usize,
    pub errors_encountered: usize,
    pub warnings_generated: usize,
    pub success_rate: f64,
}

impl SessionStatistics {
    pub fn from_events<'a>(events: impl Iterator<Item = &'a MigrationEvent>) -> Self {
        let mut stats = SessionStatistics::default();
        for event in events {
            match event {
                MigrationEvent::FileAnalysis { .. } => stats.files_processed += 1,
                MigrationEvent::ComponentConversion { status, .. } => match status {
                    ConversionStatus::Completed => stats.components_converted += 1,
                    ConversionStatus::Failed => stats.errors_encountered += 1,
                    ConversionStatus::Warning => stats.warnings_generated += 1,
                    _ => {}
                },
                MigrationEvent::Error { .. } => stats.errors_encountered += 1,
                MigrationEvent::Warning { .. } => stats.warnings_generated += 1,
                _ => {}
            }
        }

        let total = stats.components_converted + stats.errors_encountered;
        stats.success_rate = if total == 0 {
            100.0
        } else {
            stats.components_converted as f64 / total as f64 * 100.0
        };
        stats
    }
}

impl fmt::Display for SessionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files Processed: {}", self.files_processed)?;
        writeln!(f, "Components Converted: {}", self.components_converted)?;
        writeln!(f, "Errors: {}", self.errors_encountered)?;
        writeln!(f, "Warnings: {}", self.warnings_generated)?;
        write!(f, "Success Rate: {:.1}%", self.success_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_info: SessionInfo,
    pub statistics: SessionStatistics,
    pub conversion_log: Vec<EventRecord>,
    pub error_log: Vec<EventRecord>,
    pub performance_log: Vec<EventRecord>,
    pub validation_log: Vec<EventRecord>,
}
