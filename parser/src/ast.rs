//! FILENAME: parser/src/ast.rs
//! PURPOSE: Structural nodes recognized inside a Tableau formula.
//! CONTEXT: The formula converter does not need a full expression tree. It
//! needs to know where the dialect-specific constructs sit in the lexeme
//! stream so they can be rewritten in place. Every node therefore stores
//! lexeme index ranges (`Span`) into the slice it was parsed from.
//!
//! RECOGNIZED CONSTRUCTS:
//! - Level-of-detail blocks: {FIXED [Region] : SUM([Sales])}
//! - IF blocks: IF c THEN a ELSEIF c2 THEN b ELSE d END
//! - CASE blocks: CASE [f] WHEN 1 THEN "a" ELSE "b" END
//! - Function calls with their top-level argument ranges

use std::ops::Range;

/// Half-open range of lexeme indices.
pub type Span = Range<usize>;

/// Keyword that opens a level-of-detail block.
#[derive(Debug, PartialEq, Clone)]
pub enum LodKeyword {
    Fixed,
    Include,
    Exclude,
    /// Anything else written where the keyword belongs; the text is kept for notes.
    Other(String),
}

impl LodKeyword {
    pub fn from_identifier(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "FIXED" => LodKeyword::Fixed,
            "INCLUDE" => LodKeyword::Include,
            "EXCLUDE" => LodKeyword::Exclude,
            other => LodKeyword::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for LodKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LodKeyword::Fixed => write!(f, "FIXED"),
            LodKeyword::Include => write!(f, "INCLUDE"),
            LodKeyword::Exclude => write!(f, "EXCLUDE"),
            LodKeyword::Other(name) => write!(f, "{}", name),
        }
    }
}

/// `{KEYWORD dim1, dim2 : inner}`. `span` covers the braces.
#[derive(Debug, PartialEq, Clone)]
pub struct LodBlock {
    pub span: Span,
    pub keyword: LodKeyword,
    pub dimensions: Vec<Span>,
    pub inner: Span,
}

/// One `condition THEN value` pair of an IF chain, or `WHEN value THEN result` of a CASE.
#[derive(Debug, PartialEq, Clone)]
pub struct Branch {
    pub condition: Span,
    pub value: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct IfBlock {
    pub span: Span,
    pub branches: Vec<Branch>,
    pub otherwise: Option<Span>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CaseBlock {
    pub span: Span,
    pub subject: Span,
    pub arms: Vec<Branch>,
    pub otherwise: Option<Span>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Conditional {
    If(IfBlock),
    Case(CaseBlock),
}

impl Conditional {
    pub fn span(&self) -> &Span {
        match self {
            Conditional::If(block) => &block.span,
            Conditional::Case(block) => &block.span,
        }
    }

    /// More than one IF/ELSEIF branch or more than one WHEN arm.
    pub fn is_multi_branch(&self) -> bool {
        match self {
            Conditional::If(block) => block.branches.len() > 1,
            Conditional::Case(block) => block.arms.len() > 1,
        }
    }
}

/// `NAME(arg, arg, ...)`. `span` runs from the name through the closing paren.
#[derive(Debug, PartialEq, Clone)]
pub struct Call {
    pub span: Span,
    pub name: String,
    pub args: Vec<Span>,
}

/// Tableau functions whose result depends on the ordering of the view.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TableCalcFunction {
    Rank,
    RunningSum,
    RunningAvg,
    WindowSum,
    WindowAvg,
    Lookup,
    PreviousValue,
}

impl TableCalcFunction {
    /// Detection order: the first function of this list present in a formula wins.
    pub const ALL: [TableCalcFunction; 7] = [
        TableCalcFunction::Rank,
        TableCalcFunction::RunningSum,
        TableCalcFunction::RunningAvg,
        TableCalcFunction::WindowSum,
        TableCalcFunction::WindowAvg,
        TableCalcFunction::Lookup,
        TableCalcFunction::PreviousValue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TableCalcFunction::Rank => "RANK",
            TableCalcFunction::RunningSum => "RUNNING_SUM",
            TableCalcFunction::RunningAvg => "RUNNING_AVG",
            TableCalcFunction::WindowSum => "WINDOW_SUM",
            TableCalcFunction::WindowAvg => "WINDOW_AVG",
            TableCalcFunction::Lookup => "LOOKUP",
            TableCalcFunction::PreviousValue => "PREVIOUS_VALUE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConditionalForm {
    If,
    Case,
}

/// Dialect of a formula, decided once by `classify`.
#[derive(Debug, PartialEq, Clone)]
pub enum FormulaKind {
    Standard,
    /// Describes the first LOD block of the formula.
    Lod {
        keyword: LodKeyword,
        dimensions: Vec<String>,
        inner: String,
    },
    TableCalc {
        function: TableCalcFunction,
    },
    Conditional {
        form: ConditionalForm,
    },
}

impl FormulaKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaKind::Standard => "standard",
            FormulaKind::Lod { .. } => "lod_expression",
            FormulaKind::TableCalc { .. } => "table_calculation",
            FormulaKind::Conditional { .. } => "conditional",
        }
    }
}

/// Everything the lexer can tell about a formula regardless of its dialect.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct FormulaFacts {
    /// Uppercased names of identifiers directly followed by '(' (first-seen order, no repeats).
    pub functions: Vec<String>,
    /// Bracketed field names (first-seen order, no repeats).
    pub fields: Vec<String>,
    pub strings: Vec<String>,
    pub numbers: Vec<String>,
}
