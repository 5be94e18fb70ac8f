//! FILENAME: workbook/src/model.rs
//! PURPOSE: Typed model of everything extracted from a Tableau document.
//! CONTEXT: Produced once per file by `load_workbook` and handed to the
//! formula converter, which never mutates it. Field names serialize in
//! snake_case; attributes that collide with Rust keywords are renamed back
//! to their document names ("type", "class").

use crate::error::WorkbookError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// WORKBOOK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    /// Lowercased extension with its dot: ".twbx"
    #[serde(rename = "type")]
    pub extension: String,
    pub size: u64,
}

/// Root output of parsing. Every list keeps document order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedWorkbook {
    pub file_info: FileInfo,
    pub tableau_version: String,
    pub datasources: Vec<DataSource>,
    pub worksheets: Vec<Worksheet>,
    pub dashboards: Vec<Dashboard>,
    pub parameters: Vec<Parameter>,
    pub calculated_fields: Vec<CalculatedField>,
    pub filters: Vec<Filter>,
}

impl ParsedWorkbook {
    pub fn to_json_pretty(&self) -> Result<String, WorkbookError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Columns of every datasource, flattened.
    pub fn all_columns(&self) -> impl Iterator<Item = &Column> {
        self.datasources.iter().flat_map(|ds| ds.columns.iter())
    }
}

// ============================================================================
// DATASOURCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub caption: String,
    pub version: String,
    pub inline: bool,
    pub connections: Vec<Connection>,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
    /// alias key -> alias value, only pairs where both are non-empty
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Connection {
    pub class: String,
    pub server: String,
    pub dbname: String,
    pub username: String,
    pub authentication: String,
    pub port: String,
    pub schema: String,
    pub warehouse: String,
    pub service: String,
    pub filename: String,
    pub directory: String,
    /// Every attribute of the element, including the ones above.
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub caption: String,
    pub datatype: String,
    pub role: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub aggregation: String,
    pub hidden: bool,
    /// Present only when the element has a direct <calculation> child.
    pub calculation: Option<Calculation>,
    pub default_format: String,
    pub semantic_role: String,
    pub geographic_role: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Calculation {
    pub class: String,
    pub formula: String,
    pub formula_text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relation {
    pub connection: String,
    pub name: String,
    pub table: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub join: String,
    pub text: String,
}

// ============================================================================
// WORKSHEETS & DASHBOARDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    pub view: View,
}

/// View configuration of a worksheet. Empty when the worksheet has no <view>.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct View {
    #[serde(rename = "datasources")]
    pub datasource_refs: Vec<String>,
    /// shelf name -> field names; "rows" and "columns" come from the table layout
    pub shelves: BTreeMap<String, Vec<String>>,
    pub filters: Vec<Filter>,
    pub sorts: Vec<SortRule>,
    /// Distinct mark classes ("Bar", "Line", ...) in document order.
    pub marks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub class: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortRule {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub name: String,
    pub size: Option<DashboardSize>,
    pub zones: Vec<Zone>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardSize {
    pub maxheight: String,
    pub maxwidth: String,
    pub minheight: String,
    pub minwidth: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: String,
    pub param: String,
    pub x: String,
    pub y: String,
    pub w: String,
    pub h: String,
}

// ============================================================================
// PARAMETERS & CALCULATED FIELDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub caption: String,
    pub datatype: String,
    pub param_domain_type: String,
    pub value: String,
    pub members: Vec<ParameterMember>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterMember {
    pub alias: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculatedField {
    pub name: String,
    pub caption: String,
    pub datatype: String,
    pub role: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub formula: String,
    #[serde(rename = "class")]
    pub formula_class: String,
    pub formula_text: String,
}

impl CalculatedField {
    /// The formula attribute, falling back to the element text.
    pub fn effective_formula(&self) -> &str {
        if self.formula.trim().is_empty() {
            self.formula_text.trim()
        } else {
            &self.formula
        }
    }

    /// Display name: the caption when set, else the name without brackets.
    pub fn display_name(&self) -> &str {
        if self.caption.is_empty() {
            self.name.trim_start_matches('[').trim_end_matches(']')
        } else {
            &self.caption
        }
    }
}
