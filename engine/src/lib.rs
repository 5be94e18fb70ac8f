//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the Tableau to Power BI migration engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//!
//! PIPELINE: .twb/.twbx/.tds/.tdsx --> TableauParser --> ParsedWorkbook
//!           --> FormulaConverter --> ConvertedWorkbook --> output files

pub mod config;
pub mod converter;
pub mod dax;
pub mod error;
pub mod events;
pub mod migration;
pub mod output;
pub mod pipeline;
pub mod tableau_parser;

#[cfg(test)]
mod tests;

// Re-export commonly used types at the crate root
pub use config::{ChartMapping, ConfigSource, ConnectionMapping, MappingConfig, VersionInfo};
pub use converter::{ConversionStats, ConversionSummary, ConversionTracker, Converter, WarningInfo};
pub use dax::{
    validate_dax, BatchSummary, ConversionOutput, ConversionResult, ConvertedWorkbook,
    DaxValidation, FieldInput, FormulaConverter, FormulaInput, FormulaSettings, FormulaType,
};
pub use error::{error_summary, ErrorInfo, MigrationError};
pub use events::{
    ConversionStatus, EventSink, LogSink, MemorySink, MigrationEvent, MultiSink, SessionReport,
    SessionStatistics,
};
pub use migration::{MigrationEngine, MigrationSettings, MigrationStats};
pub use pipeline::{ConversionPipeline, FromStage, PipelineResult, PipelineStats, Stage, StageData};
pub use tableau_parser::TableauParser;
