//! FILENAME: engine/src/config.rs
//! PURPOSE: Mapping configuration: Tableau names to their Power BI counterparts.
//! CONTEXT: Five JSON documents live in a configuration directory. Each one
//! has a built-in default that is used when the file is missing, and also
//! (with a warning) when it cannot be read or parsed. The loaded
//! configuration is immutable and shared between converters behind an `Arc`.
//!
//! DOCUMENTS:
//! - tableau_mappings.json: { "version_mappings": { version: VersionInfo } }
//! - function_mappings.json: { category: { TABLEAU_FN: "DAX_FN" } }
//! - visual_mappings.json: { "chart_mappings": { type: "visual" | { subtype: "visual" } } }
//! - data_type_mappings.json: { "type_mappings": { tableau_type: "PowerBiType" } }
//! - connection_mappings.json: { "connection_mappings": { class: { "powerbi_type", "supported" } } }

use crate::error::MigrationError;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TABLEAU_MAPPINGS: &str = "tableau_mappings.json";
pub const FUNCTION_MAPPINGS: &str = "function_mappings.json";
pub const VISUAL_MAPPINGS: &str = "visual_mappings.json";
pub const DATA_TYPE_MAPPINGS: &str = "data_type_mappings.json";
pub const CONNECTION_MAPPINGS: &str = "connection_mappings.json";

pub const CONFIG_FILES: [&str; 5] = [
    TABLEAU_MAPPINGS,
    FUNCTION_MAPPINGS,
    VISUAL_MAPPINGS,
    DATA_TYPE_MAPPINGS,
    CONNECTION_MAPPINGS,
];

/// Power BI type used for Tableau data types without a mapping.
pub const FALLBACK_DATA_TYPE: &str = "String";

fn supported_by_default() -> bool {
    true
}

// ============================================================================
// MAPPING ENTRIES
// ============================================================================

/// Compatibility notes for one Tableau version. An empty entry counts as supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default = "supported_by_default")]
    pub supported: bool,
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        VersionInfo {
            supported: true,
            schema_version: String::new(),
            features: Vec::new(),
        }
    }
}

/// A chart type maps either straight to a visual or per subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartMapping {
    Visual(String),
    Subtypes(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMapping {
    pub powerbi_type: String,
    #[serde(default = "supported_by_default")]
    pub supported: bool,
    /// Any other keys of the entry, kept for the output writers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConnectionMapping {
    fn new(powerbi_type: &str) -> Self {
        ConnectionMapping {
            powerbi_type: powerbi_type.to_string(),
            supported: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Where a configuration document came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ConfigSource {
    Builtin,
    File { path: PathBuf },
    /// The file exists but could not be used; the default replaced it.
    Fallback { path: PathBuf, reason: String },
}

// ============================================================================
// DOCUMENT SHAPES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TableauMappingsDoc {
    #[serde(default)]
    version_mappings: BTreeMap<String, VersionInfo>,
}

/// Categories that are not objects of strings are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct FunctionMappingsDoc {
    categories: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct VisualMappingsDoc {
    #[serde(default)]
    chart_mappings: BTreeMap<String, ChartMapping>,
}

#[derive(Debug, Default, Deserialize)]
struct DataTypeMappingsDoc {
    #[serde(default)]
    type_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionMappingsDoc {
    #[serde(default)]
    connection_mappings: BTreeMap<String, ConnectionMapping>,
}

// ============================================================================
// MAPPING CONFIG
// ============================================================================

/// The lookup contract every converter uses.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    versions: BTreeMap<String, VersionInfo>,
    function_categories: BTreeMap<String, BTreeMap<String, String>>,
    /// Uppercased Tableau name -> DAX name, first category wins.
    functions: FxHashMap<String, String>,
    charts: BTreeMap<String, ChartMapping>,
    data_types: BTreeMap<String, String>,
    connections: BTreeMap<String, ConnectionMapping>,
    sources: BTreeMap<String, ConfigSource>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MappingConfig {
    /// Configuration made of the built-in defaults only.
    pub fn builtin() -> Self {
        let mut config = MappingConfig {
            versions: default_versions(),
            function_categories: default_function_categories(),
            functions: FxHashMap::default(),
            charts: default_charts(),
            data_types: default_data_types(),
            connections: default_connections(),
            sources: CONFIG_FILES
                .iter()
                .map(|name| (name.to_string(), ConfigSource::Builtin))
                .collect(),
        };
        config.index_functions();
        config
    }

    /// Loads every document from `dir`. The directory must exist; missing
    /// or unusable files fall back to their defaults.
    pub fn load(dir: &Path) -> Result<Self, MigrationError> {
        if !dir.is_dir() {
            return Err(MigrationError::configuration(
                format!("Configuration directory not found: {}", dir.display()),
                Some(dir.display().to_string()),
            ));
        }

        let mut sources = BTreeMap::new();

        let tableau: Option<TableauMappingsDoc> = read_document(dir, TABLEAU_MAPPINGS, &mut sources);
        let functions: Option<FunctionMappingsDoc> =
            read_document(dir, FUNCTION_MAPPINGS, &mut sources);
        let visuals: Option<VisualMappingsDoc> = read_document(dir, VISUAL_MAPPINGS, &mut sources);
        let data_types: Option<DataTypeMappingsDoc> =
            read_document(dir, DATA_TYPE_MAPPINGS, &mut sources);
        let connections: Option<ConnectionMappingsDoc> =
            read_document(dir, CONNECTION_MAPPINGS, &mut sources);

        let mut config = MappingConfig {
            versions: tableau
                .map(|doc| doc.version_mappings)
                .unwrap_or_else(default_versions),
            function_categories: functions
                .map(|doc| function_categories_of(doc.categories))
                .unwrap_or_else(default_function_categories),
            functions: FxHashMap::default(),
            charts: visuals
                .map(|doc| doc.chart_mappings)
                .unwrap_or_else(default_charts),
            data_types: data_types
                .map(|doc| doc.type_mappings)
                .unwrap_or_else(default_data_types),
            connections: connections
                .map(|doc| doc.connection_mappings)
                .unwrap_or_else(default_connections),
            sources,
        };
        config.index_functions();

        log::debug!(
            "Loaded mapping configuration from {} ({} functions, {} chart types)",
            dir.display(),
            config.functions.len(),
            config.charts.len()
        );
        Ok(config)
    }

    /// `Some(dir)` loads from the directory, `None` uses the defaults.
    pub fn from_dir(dir: Option<&Path>) -> Result<Self, MigrationError> {
        match dir {
            Some(dir) => Self::load(dir),
            None => Ok(Self::builtin()),
        }
    }

    fn index_functions(&mut self) {
        self.functions.clear();
        for category in self.function_categories.values() {
            for (tableau, dax) in category {
                self.functions
                    .entry(tableau.to_uppercase())
                    .or_insert_with(|| dax.clone());
            }
        }
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// DAX equivalent of a Tableau function (case-insensitive).
    pub fn function_mapping(&self, tableau_function: &str) -> Option<&str> {
        self.functions
            .get(&tableau_function.to_uppercase())
            .map(String::as_str)
    }

    /// Power BI visual for a Tableau chart type. With a subtype map, the
    /// subtype wins, then the "default" entry.
    pub fn visual_mapping(&self, visual_type: &str, subtype: Option<&str>) -> Option<&str> {
        match self.charts.get(visual_type)? {
            ChartMapping::Visual(visual) => Some(visual),
            ChartMapping::Subtypes(subtypes) => subtype
                .and_then(|s| subtypes.get(s))
                .or_else(|| subtypes.get("default"))
                .map(String::as_str),
        }
    }

    /// Power BI data type, "String" when unmapped.
    pub fn data_type_mapping(&self, tableau_type: &str) -> &str {
        self.data_types
            .get(tableau_type)
            .map(String::as_str)
            .unwrap_or(FALLBACK_DATA_TYPE)
    }

    pub fn connection_mapping(&self, connection_class: &str) -> Option<&ConnectionMapping> {
        self.connections.get(connection_class)
    }

    /// Exact version entry, else the entry with the nearest major version,
    /// else "default".
    pub fn version_info(&self, version: &str) -> VersionInfo {
        if let Some(info) = self.versions.get(version) {
            return info.clone();
        }

        let Some(target) = major_of(version) else {
            return self.versions.get("default").cloned().unwrap_or_default();
        };

        let mut best: Option<(f64, &VersionInfo)> = None;
        for (candidate, info) in &self.versions {
            if let Some(major) = major_of(candidate) {
                let diff = (target - major).abs();
                if best.map_or(true, |(min, _)| diff < min) {
                    best = Some((diff, info));
                }
            }
        }
        best.map(|(_, info)| info.clone())
            .or_else(|| self.versions.get("default").cloned())
            .unwrap_or_default()
    }

    pub fn supported_versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    pub fn supported_visual_types(&self) -> Vec<String> {
        self.charts.keys().cloned().collect()
    }

    /// Function names per category.
    pub fn supported_functions(&self) -> BTreeMap<String, Vec<String>> {
        self.function_categories
            .iter()
            .map(|(category, functions)| (category.clone(), functions.keys().cloned().collect()))
            .collect()
    }

    pub fn sources(&self) -> &BTreeMap<String, ConfigSource> {
        &self.sources
    }

    /// Per document: true when it holds at least one mapping.
    pub fn validate(&self) -> BTreeMap<String, bool> {
        let mut report = BTreeMap::new();
        report.insert(TABLEAU_MAPPINGS.to_string(), !self.versions.is_empty());
        report.insert(
            FUNCTION_MAPPINGS.to_string(),
            !self.function_categories.is_empty(),
        );
        report.insert(VISUAL_MAPPINGS.to_string(), !self.charts.is_empty());
        report.insert(DATA_TYPE_MAPPINGS.to_string(), !self.data_types.is_empty());
        report.insert(CONNECTION_MAPPINGS.to_string(), !self.connections.is_empty());
        report
    }
}

/// Leading dot-separated segment as a number: "2023.1" -> 2023.0
fn major_of(version: &str) -> Option<f64> {
    version.split('.').next()?.trim().parse::<f64>().ok()
}

/// `None` means "use the default": missing, unreadable or malformed.
fn read_document<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
    sources: &mut BTreeMap<String, ConfigSource>,
) -> Option<T> {
    let path = dir.join(name);
    if !path.exists() {
        sources.insert(name.to_string(), ConfigSource::Builtin);
        return None;
    }

    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<T>(&text).map_err(|e| e.to_string()));

    match parsed {
        Ok(doc) => {
            sources.insert(name.to_string(), ConfigSource::File { path });
            Some(doc)
        }
        Err(reason) => {
            log::warn!(
                "Could not load config file {}: {}. Using defaults.",
                path.display(),
                reason
            );
            sources.insert(name.to_string(), ConfigSource::Fallback { path, reason });
            None
        }
    }
}

fn function_categories_of(
    categories: BTreeMap<String, Value>,
) -> BTreeMap<String, BTreeMap<String, String>> {
    categories
        .into_iter()
        .filter_map(|(category, value)| {
            let Value::Object(entries) = value else {
                return None;
            };
            let functions = entries
                .into_iter()
                .filter_map(|(tableau, dax)| match dax {
                    Value::String(dax) => Some((tableau, dax)),
                    _ => None,
                })
                .collect();
            Some((category, functions))
        })
        .collect()
}

// ============================================================================
// DEFAULTS
// ============================================================================

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_versions() -> BTreeMap<String, VersionInfo> {
    let mut versions = BTreeMap::new();
    versions.insert(
        "default".to_string(),
        VersionInfo {
            supported: true,
            schema_version: "18.1".to_string(),
            features: vec![
                "basic_charts".to_string(),
                "calculations".to_string(),
                "dashboards".to_string(),
            ],
        },
    );
    versions
}

fn default_function_categories() -> BTreeMap<String, BTreeMap<String, String>> {
    let mut categories = BTreeMap::new();
    categories.insert(
        "aggregation_functions".to_string(),
        string_map(&[
            ("SUM", "SUM"),
            ("AVG", "AVERAGE"),
            ("COUNT", "COUNT"),
            ("COUNTD", "DISTINCTCOUNT"),
            ("MIN", "MIN"),
            ("MAX", "MAX"),
        ]),
    );
    categories.insert(
        "string_functions".to_string(),
        string_map(&[
            ("LEFT", "LEFT"),
            ("RIGHT", "RIGHT"),
            ("LEN", "LEN"),
            ("UPPER", "UPPER"),
            ("LOWER", "LOWER"),
        ]),
    );
    categories.insert(
        "date_functions".to_string(),
        string_map(&[("YEAR", "YEAR"), ("MONTH", "MONTH"), ("DAY", "DAY")]),
    );
    categories.insert(
        "logical_functions".to_string(),
        string_map(&[("IF", "IF"), ("AND", "AND"), ("OR", "OR")]),
    );
    categories
}

fn default_charts() -> BTreeMap<String, ChartMapping> {
    let mut charts = BTreeMap::new();
    charts.insert(
        "bar".to_string(),
        ChartMapping::Subtypes(string_map(&[
            ("horizontal", "clusteredBarChart"),
            ("vertical", "clusteredColumnChart"),
            ("default", "clusteredBarChart"),
        ])),
    );
    for (chart, visual) in [
        ("line", "lineChart"),
        ("scatter", "scatterChart"),
        ("pie", "pieChart"),
    ] {
        charts.insert(
            chart.to_string(),
            ChartMapping::Subtypes(string_map(&[("default", visual)])),
        );
    }
    charts
}

fn default_data_types() -> BTreeMap<String, String> {
    string_map(&[
        ("integer", "Int64"),
        ("real", "Double"),
        ("string", "String"),
        ("datetime", "DateTime"),
        ("boolean", "Boolean"),
    ])
}

fn default_connections() -> BTreeMap<String, ConnectionMapping> {
    [
        ("sqlserver", "SqlServer"),
        ("oracle", "Oracle"),
        ("mysql", "MySQL"),
    ]
    .into_iter()
    .map(|(class, powerbi)| (class.to_string(), ConnectionMapping::new(powerbi)))
    .collect()
}
