//! FILENAME: engine/src/output.rs
//! PURPOSE: Writes the Power BI side of a converted workbook to disk.
//! CONTEXT: Called by `MigrationEngine` after a successful pipeline run.
//! Every artifact of a file lands in `<output_dir>/<name>/`:
//!   <name>_measures.dax           measures, failed ones marked for review
//!   <name>_report_structure.json  the converted workbook
//!   <name>_data_sources.json      connector and data type lookups
//!   <name>_worksheets.json        suggested visual per mark class

use crate::config::MappingConfig;
use crate::dax::{ConversionResult, ConvertedWorkbook};
use crate::error::MigrationError;
use crate::events::{EventSink, MigrationEvent};
use serde::Serialize;
use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use workbook::{Column, Connection, DataSource, ParsedWorkbook, Worksheet};

// ============================================================================
// DAX MEASURES
// ============================================================================

/// Name a measure is published under: the caption of its calculated field
/// when there is one, else the field name without brackets.
fn measure_name<'a>(workbook: &'a ParsedWorkbook, result: &'a ConversionResult) -> &'a str {
    workbook
        .calculated_fields
        .iter()
        .find(|field| field.name == result.field_name)
        .map(|field| field.display_name())
        .unwrap_or_else(|| {
            result
                .field_name
                .trim_start_matches('[')
                .trim_end_matches(']')
        })
}

/// The measures file. Writing into a String cannot fail.
pub fn measures_dax(converted: &ConvertedWorkbook) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// DAX Measures converted from Tableau");
    let _ = writeln!(
        out,
        "// Source: {}",
        converted.workbook.file_info.name
    );
    let _ = writeln!(
        out,
        "// Conversion Success Rate: {:.1}%",
        converted.conversion_summary.success_rate
    );
    out.push('\n');

    for result in &converted.converted_formulas {
        let name = measure_name(&converted.workbook, result);
        let original = result.original_formula.replace('\n', " ");
        let _ = writeln!(out, "// {} ({})", name, result.field_role);
        let _ = writeln!(out, "// Original Tableau: {}", original);
        for note in &result.conversion_notes {
            let _ = writeln!(out, "// Note: {}", note);
        }

        if result.conversion_success {
            let _ = writeln!(out, "[{}] = {}", name, result.dax_formula);
        } else {
            let _ = writeln!(out, "// CONVERSION FAILED - Manual review required");
            let _ = writeln!(out, "// Issues: {}", result.conversion_issues.join(", "));
            if !result.dax_formula.is_empty() {
                let _ = writeln!(out, "// Candidate: {}", result.dax_formula);
            }
            let _ = writeln!(out, "[{}] = ", name);
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// DATA SOURCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub class: String,
    pub server: String,
    pub database: String,
    pub powerbi_connector: Option<String>,
    pub supported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnReport {
    pub name: String,
    pub caption: String,
    pub tableau_type: String,
    pub powerbi_type: String,
    pub role: String,
    pub calculated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceReport {
    pub name: String,
    pub caption: String,
    pub connections: Vec<ConnectionReport>,
    pub tables: Vec<String>,
    pub columns: Vec<ColumnReport>,
}

fn connection_report(
    connection: &Connection,
    config: &MappingConfig,
    events: &dyn EventSink,
) -> ConnectionReport {
    let mapping = config.connection_mapping(&connection.class);
    let report = ConnectionReport {
        class: connection.class.clone(),
        server: connection.server.clone(),
        database: connection.dbname.clone(),
        powerbi_connector: mapping.map(|m| m.powerbi_type.clone()),
        supported: mapping.is_some_and(|m| m.supported),
    };

    let mut details = Map::new();
    details.insert("server".to_string(), json!(connection.server));
    details.insert("database".to_string(), json!(connection.dbname));
    events.record(MigrationEvent::DataSourceConversion {
        source_type: connection.class.clone(),
        target_type: report.powerbi_connector.clone().unwrap_or_default(),
        connection_details: details,
        success: report.supported,
    });
    report
}

fn column_report(column: &Column, config: &MappingConfig) -> ColumnReport {
    ColumnReport {
        name: column.name.clone(),
        caption: column.caption.clone(),
        tableau_type: column.datatype.clone(),
        powerbi_type: config.data_type_mapping(&column.datatype).to_string(),
        role: column.role.clone(),
        calculated: column.calculation.is_some(),
    }
}

pub fn data_source_reports(
    workbook: &ParsedWorkbook,
    config: &MappingConfig,
    events: &dyn EventSink,
) -> Vec<DataSourceReport> {
    workbook
        .datasources
        .iter()
        .map(|ds: &DataSource| DataSourceReport {
            name: ds.name.clone(),
            caption: ds.caption.clone(),
            connections: ds
                .connections
                .iter()
                .map(|c| connection_report(c, config, events))
                .collect(),
            tables: ds
                .relations
                .iter()
                .map(|r| if r.table.is_empty() { &r.name } else { &r.table })
                .filter(|t| !t.is_empty())
                .cloned()
                .collect(),
            columns: ds.columns.iter().map(|c| column_report(c, config)).collect(),
        })
        .collect()
}

// ============================================================================
// WORKSHEETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualSuggestion {
    pub mark: String,
    pub powerbi_visual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorksheetReport {
    pub name: String,
    pub datasources: Vec<String>,
    pub shelves: BTreeMap<String, Vec<String>>,
    pub filter_count: usize,
    pub visuals: Vec<VisualSuggestion>,
}

/// Chart type in the visual mappings for a Tableau mark class.
pub fn chart_type_of(mark: &str) -> String {
    match mark.to_lowercase().as_str() {
        "circle" | "shape" => "scatter".to_string(),
        "automatic" => "bar".to_string(),
        other => other.to_string(),
    }
}

fn worksheet_report(
    worksheet: &Worksheet,
    config: &MappingConfig,
    events: &dyn EventSink,
) -> WorksheetReport {
    let visuals = worksheet
        .view
        .marks
        .iter()
        .map(|mark| {
            let chart = chart_type_of(mark);
            let visual = config.visual_mapping(&chart, None).map(str::to_string);
            let notes = match &visual {
                Some(_) => Vec::new(),
                None => vec![format!("No Power BI visual mapped for mark type {}", mark)],
            };
            events.record(MigrationEvent::VisualMapping {
                tableau_visual: mark.clone(),
                powerbi_visual: visual.clone().unwrap_or_default(),
                mapping_success: visual.is_some(),
                compatibility_notes: notes,
            });
            VisualSuggestion {
                mark: mark.clone(),
                powerbi_visual: visual,
            }
        })
        .collect();

    WorksheetReport {
        name: worksheet.name.clone(),
        datasources: worksheet.view.datasource_refs.clone(),
        shelves: worksheet.view.shelves.clone(),
        filter_count: worksheet.view.filters.len(),
        visuals,
    }
}

pub fn worksheet_reports(
    workbook: &ParsedWorkbook,
    config: &MappingConfig,
    events: &dyn EventSink,
) -> Vec<WorksheetReport> {
    workbook
        .worksheets
        .iter()
        .map(|ws| worksheet_report(ws, config, events))
        .collect()
}

// ============================================================================
// WRITER
// ============================================================================

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), MigrationError> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Writes all artifacts of one converted workbook and returns their paths.
pub fn write_outputs(
    converted: &ConvertedWorkbook,
    output_dir: &Path,
    name: &str,
    config: &MappingConfig,
    events: &dyn EventSink,
) -> Result<Vec<PathBuf>, MigrationError> {
    let dir = output_dir.join(name);
    fs::create_dir_all(&dir)?;
    let mut files = Vec::new();

    let measures = dir.join(format!("{}_measures.dax", name));
    fs::write(&measures, measures_dax(converted))?;
    files.push(measures);

    let structure = dir.join(format!("{}_report_structure.json", name));
    write_json(&structure, converted)?;
    files.push(structure);

    let data_sources = dir.join(format!("{}_data_sources.json", name));
    write_json(
        &data_sources,
        &data_source_reports(&converted.workbook, config, events),
    )?;
    files.push(data_sources);

    let worksheets = dir.join(format!("{}_worksheets.json", name));
    write_json(
        &worksheets,
        &worksheet_reports(&converted.workbook, config, events),
    )?;
    files.push(worksheets);

    log::info!("Wrote {} output files to {}", files.len(), dir.display());
    Ok(files)
}
