//! FILENAME: engine/src/dax/mod.rs
//! PURPOSE: Converts Tableau calculated-field formulas to DAX.
//! CONTEXT: Every formula is classified once (`parser::Parser::classify`)
//! and dispatched to the converter of its dialect. A formula never fails the
//! stage: problems are reported inside its `ConversionResult`, so N inputs
//! always give N results.
//!
//! PIPELINE: formula --> lexemes --> classify --> dialect rewrite --> validate --> ConversionResult

mod dialects;
mod rewrite;
mod validate;


pub use validate::{validate_dax, DaxValidation};

use crate::config::MappingConfig;
use crate::converter::{ConversionTracker, Converter};
use crate::error::MigrationError;
use crate::events::{EventSink, MigrationEvent};
use parser::{tokenize, FormulaKind, Parser};
use rewrite::Rewriter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;
use workbook::ParsedWorkbook;

pub const DEFAULT_FIELD_NAME: &str = "Unknown";
pub const DEFAULT_FIELD_ROLE: &str = "measure";
pub const NO_FORMULA: &str = "No formula found";

/// Placeholders written into the DAX output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSettings {
    /// Table that qualifies bare [Field] references.
    pub table: String,
    /// Column table calculations are ordered by.
    pub order_column: String,
}

impl Default for FormulaSettings {
    fn default() -> Self {
        FormulaSettings {
            table: "Sales".to_string(),
            order_column: "OrderDate".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    Standard,
    LodExpression,
    TableCalculation,
    Conditional,
    /// The formula never reached classification.
    Unknown,
}

impl From<&FormulaKind> for FormulaType {
    fn from(kind: &FormulaKind) -> Self {
        match kind {
            FormulaKind::Standard => FormulaType::Standard,
            FormulaKind::Lod { .. } => FormulaType::LodExpression,
            FormulaKind::TableCalc { .. } => FormulaType::TableCalculation,
            FormulaKind::Conditional { .. } => FormulaType::Conditional,
        }
    }
}

/// Verdict on one formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub original_formula: String,
    pub dax_formula: String,
    pub field_name: String,
    pub field_role: String,
    pub formula_type: FormulaType,
    pub functions_used: Vec<String>,
    pub fields_referenced: Vec<String>,
    pub conversion_success: bool,
    pub conversion_issues: Vec<String>,
    pub conversion_notes: Vec<String>,
}

impl ConversionResult {
    fn failed(formula: &str, field_name: &str, field_role: &str, issue: String) -> Self {
        ConversionResult {
            original_formula: formula.to_string(),
            dax_formula: String::new(),
            field_name: field_name.to_string(),
            field_role: field_role.to_string(),
            formula_type: FormulaType::Unknown,
            functions_used: Vec::new(),
            fields_referenced: Vec::new(),
            conversion_success: false,
            conversion_issues: vec![issue],
            conversion_notes: Vec::new(),
        }
    }
}

/// One calculated field given on its own. `formula` wins over `calculation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInput {
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub calculation: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl FieldInput {
    pub fn new(formula: impl Into<String>) -> Self {
        FieldInput {
            formula: Some(formula.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn formula_text(&self) -> &str {
        self.formula
            .as_deref()
            .filter(|f| !f.is_empty())
            .or(self.calculation.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaInput {
    Formula(String),
    Field(FieldInput),
    Workbook(ParsedWorkbook),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_fields: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub success_rate: f64,
}

/// The original workbook plus one result per calculated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedWorkbook {
    #[serde(flatten)]
    pub workbook: ParsedWorkbook,
    pub converted_formulas: Vec<ConversionResult>,
    pub conversion_summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutput {
    Single(ConversionResult),
    Workbook(ConvertedWorkbook),
}

// ============================================================================
// FORMULA CONVERTER
// ============================================================================

pub struct FormulaConverter {
    config: Arc<MappingConfig>,
    settings: FormulaSettings,
    tracker: ConversionTracker,
}

impl FormulaConverter {
    pub fn new(config: Arc<MappingConfig>, events: Arc<dyn EventSink>) -> Self {
        FormulaConverter {
            config,
            settings: FormulaSettings::default(),
            tracker: ConversionTracker::new("FormulaConverter", events),
        }
    }

    pub fn with_settings(mut self, settings: FormulaSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &FormulaSettings {
        &self.settings
    }

    /// Converts one formula. Never fails; see `ConversionResult`.
    pub fn convert_formula(&mut self, formula: &str, field_name: &str, field_role: &str) -> ConversionResult {
        if formula.trim().is_empty() {
            return ConversionResult::failed(formula, field_name, field_role, NO_FORMULA.to_string());
        }

        let mut details = Map::new();
        details.insert("field_name".to_string(), json!(field_name));
        details.insert("original_formula".to_string(), json!(preview(formula)));
        details.insert("field_role".to_string(), json!(field_role));
        self.tracker.log_step("formula_analysis", details);

        let lexemes = tokenize(formula);
        let parser = Parser::new(&lexemes);
        let kind = parser.classify();
        let facts = parser.facts();

        let mut rewriter = Rewriter::new(&self.config, &self.settings);
        let converted = match &kind {
            FormulaKind::Standard => Ok(rewriter.standard(&lexemes)),
            FormulaKind::Lod { .. } => rewriter.lod_formula(&lexemes),
            FormulaKind::TableCalc { .. } => rewriter.table_calc_formula(&lexemes),
            FormulaKind::Conditional { .. } => rewriter.conditional_formula(&lexemes),
        };
        let Rewriter {
            mut notes,
            unsupported,
            ..
        } = rewriter;

        let dax = match converted {
            Ok(dax) => dax,
            Err(err) => {
                let issue = format!("Failed to convert formula: {}", err);
                self.tracker.emit(MigrationEvent::FormulaConversion {
                    original_formula: formula.to_string(),
                    converted_formula: String::new(),
                    success: false,
                    issues: vec![issue.clone()],
                });
                return ConversionResult::failed(formula, field_name, field_role, issue);
            }
        };

        for function in unsupported {
            let mut context = Map::new();
            context.insert("tableau_function".to_string(), json!(function));
            context.insert("field_name".to_string(), json!(field_name));
            let note = format!("Unsupported function: {}", function);
            self.tracker.add_warning(note.clone(), context);
            notes.push(note);
        }

        let validation = validate_dax(&dax);
        self.tracker.emit(MigrationEvent::FormulaConversion {
            original_formula: formula.to_string(),
            converted_formula: dax.clone(),
            success: validation.valid,
            issues: validation.issues.clone(),
        });

        ConversionResult {
            original_formula: formula.to_string(),
            dax_formula: dax,
            field_name: field_name.to_string(),
            field_role: field_role.to_string(),
            formula_type: FormulaType::from(&kind),
            functions_used: facts.functions,
            fields_referenced: facts.fields,
            conversion_success: validation.valid,
            conversion_issues: validation.issues,
            conversion_notes: notes,
        }
    }

    /// Converts every calculated field of a workbook in document order.
    pub fn convert_workbook(&mut self, workbook: &ParsedWorkbook) -> ConvertedWorkbook {
        let total = workbook.calculated_fields.len();
        let mut details = Map::new();
        details.insert("total_calculated_fields".to_string(), json!(total));
        self.tracker.log_step("batch_formula_conversion", details);

        let converted_formulas: Vec<ConversionResult> = workbook
            .calculated_fields
            .iter()
            .map(|field| {
                let role = if field.role.is_empty() {
                    DEFAULT_FIELD_ROLE
                } else {
                    field.role.as_str()
                };
                let name = if field.name.is_empty() {
                    DEFAULT_FIELD_NAME
                } else {
                    field.name.as_str()
                };
                self.convert_formula(field.effective_formula(), name, role)
            })
            .collect();

        let successful = converted_formulas
            .iter()
            .filter(|r| r.conversion_success)
            .count();
        let conversion_summary = BatchSummary {
            total_fields: total,
            successful_conversions: successful,
            failed_conversions: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
        };

        ConvertedWorkbook {
            workbook: workbook.clone(),
            converted_formulas,
            conversion_summary,
        }
    }
}

fn preview(formula: &str) -> String {
    if formula.chars().count() > 100 {
        let head: String = formula.chars().take(100).collect();
        format!("{}...", head)
    } else {
        formula.to_string()
    }
}

impl Converter for FormulaConverter {
    type Input = FormulaInput;
    type Output = ConversionOutput;

    fn supported_types(&self) -> &[&'static str] {
        &[
            "string_formula",
            "calculated_field",
            "lod_expression",
            "table_calculation",
        ]
    }

    fn validate_input(&self, input: &FormulaInput) -> bool {
        match input {
            FormulaInput::Formula(formula) => !formula.trim().is_empty(),
            FormulaInput::Field(field) => field.formula.is_some() || field.calculation.is_some(),
            FormulaInput::Workbook(_) => true,
        }
    }

    fn convert(&mut self, input: FormulaInput) -> Result<ConversionOutput, MigrationError> {
        let output = match input {
            FormulaInput::Formula(formula) => ConversionOutput::Single(self.convert_formula(
                &formula,
                DEFAULT_FIELD_NAME,
                DEFAULT_FIELD_ROLE,
            )),
            FormulaInput::Field(field) => {
                let name = field.name.as_deref().unwrap_or(DEFAULT_FIELD_NAME);
                let role = field.role.as_deref().unwrap_or(DEFAULT_FIELD_ROLE);
                ConversionOutput::Single(self.convert_formula(field.formula_text(), name, role))
            }
            FormulaInput::Workbook(workbook) => {
                ConversionOutput::Workbook(self.convert_workbook(&workbook))
            }
        };
        Ok(output)
    }

    fn tracker(&self) -> &ConversionTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ConversionTracker {
        &mut self.tracker
    }
}
