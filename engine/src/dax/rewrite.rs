//! FILENAME: engine/src/dax/rewrite.rs
//! PURPOSE: Lexeme-level rewriting rules shared by every formula dialect.
//! CONTEXT: A dialect converter first splices its own constructs (LOD
//! blocks, conditionals, table calculations) into the lexeme stream as
//! `Token::Verbatim` lexemes, then hands the stream to the rules here:
//!   1. function names are mapped through the configuration
//!   2. operators and quotes are normalized to DAX spelling
//!   3. bare [Field] references are qualified with the placeholder table
//!   4. every division becomes DIVIDE(numerator, denominator, 0)
//! Verbatim lexemes are never touched by these rules.

use super::FormulaSettings;
use crate::config::MappingConfig;
use crate::error::MigrationError;
use parser::{render, Lexeme, Parser, Token};

/// Functions emitted by the converters themselves. A later pass over
/// converted text accepts them without a mapping.
pub(crate) const GENERATED_FUNCTIONS: [&str; 16] = [
    "ALL",
    "ALLEXCEPT",
    "ALLSELECTED",
    "AVERAGE",
    "CALCULATE",
    "DISTINCTCOUNT",
    "DIVIDE",
    "EARLIER",
    "FILTER",
    "IF",
    "MOD",
    "OFFSET",
    "ORDERBY",
    "RANKX",
    "SWITCH",
    "VALUES",
];

/// Deepest nesting of LOD blocks, conditionals or table calculations.
pub(crate) const MAX_NESTING: usize = 64;

/// Per-formula rewriting state: configuration, placeholders, and what was
/// noticed along the way.
pub(crate) struct Rewriter<'a> {
    config: &'a MappingConfig,
    settings: &'a FormulaSettings,
    pub(crate) notes: Vec<String>,
    pub(crate) unsupported: Vec<String>,
    depth: usize,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(config: &'a MappingConfig, settings: &'a FormulaSettings) -> Self {
        Rewriter {
            config,
            settings,
            notes: Vec::new(),
            unsupported: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    pub(crate) fn enter(&mut self, formula: &[Lexeme]) -> Result<(), MigrationError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(MigrationError::formula(
                format!("Formula nesting exceeds {} levels", MAX_NESTING),
                render(formula),
            ));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ========================================================================
    // REFERENCES
    // ========================================================================

    /// The placeholder table, quoted when DAX requires it.
    pub(crate) fn table(&self) -> String {
        table_ref(&self.settings.table)
    }

    /// `Table[column]` with the placeholder table.
    pub(crate) fn column(&self, name: &str) -> String {
        format!("{}[{}]", self.table(), name.replace(']', "]]"))
    }

    /// The column table calculations are ordered by.
    pub(crate) fn order_column(&self) -> String {
        self.column(&self.settings.order_column)
    }

    // ========================================================================
    // PASSES
    // ========================================================================

    /// Every standard rule, in order.
    pub(crate) fn standard(&mut self, lexemes: &[Lexeme]) -> String {
        let mut out = lexemes.to_vec();
        self.map_functions(&mut out);
        normalize(&mut out);
        self.qualify(&mut out);
        rewrite_division(&out).trim().to_string()
    }

    /// Normalization and field qualification only.
    pub(crate) fn qualified(&mut self, lexemes: &[Lexeme]) -> String {
        let mut out = lexemes.to_vec();
        normalize(&mut out);
        self.qualify(&mut out);
        render(&out)
    }

    /// Replaces mapped function names. Unmapped names stay and are reported.
    fn map_functions(&mut self, lexemes: &mut [Lexeme]) {
        let calls: Vec<usize> = {
            let parser = Parser::new(lexemes);
            (0..lexemes.len()).filter(|&i| parser.is_call_at(i)).collect()
        };

        for idx in calls {
            let name = match &lexemes[idx].token {
                Token::Identifier(name) => name.clone(),
                _ => continue,
            };
            if let Some(dax) = self.config.function_mapping(&name) {
                lexemes[idx].text = dax.to_string();
            } else if !GENERATED_FUNCTIONS.contains(&name.as_str())
                && !self.unsupported.contains(&name)
            {
                self.unsupported.push(name);
            }
        }
    }

    /// Prefixes bare field references with the placeholder table.
    /// `Table[Field]` and `'Table'[Field]` are already qualified.
    fn qualify(&self, lexemes: &mut [Lexeme]) {
        for idx in 0..lexemes.len() {
            let name = match &lexemes[idx].token {
                Token::Field(name) => name.clone(),
                _ => continue,
            };
            let qualified = idx > 0
                && lexemes[idx].is_attached()
                && matches!(
                    lexemes[idx - 1].token,
                    Token::Identifier(_) | Token::SingleQuoted(_)
                );
            if !qualified {
                lexemes[idx].text = self.column(&name);
            }
        }
    }
}

/// DAX spelling of operators and string literals.
fn normalize(lexemes: &mut [Lexeme]) {
    for idx in 0..lexemes.len() {
        let table_name = lexemes
            .get(idx + 1)
            .is_some_and(|next| next.is_attached() && matches!(next.token, Token::Field(_)));

        let replacement = match &lexemes[idx].token {
            Token::NotEqual => Some((Token::NotEqual, "<>".to_string())),
            Token::DoubleEquals => Some((Token::Equals, "=".to_string())),
            Token::SingleQuoted(s) if !table_name => Some((
                Token::String(s.clone()),
                format!("\"{}\"", s.replace('"', "\"\"")),
            )),
            _ => None,
        };
        if let Some((token, text)) = replacement {
            lexemes[idx].token = token;
            lexemes[idx].text = text;
        }
    }
}

/// Quotes a table name unless it is a plain identifier.
pub(crate) fn table_ref(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

// ============================================================================
// DIVISION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnitKind {
    Operand,
    Boundary,
    Multiply,
    Divide,
}

/// A lexeme, or a whole parenthesized group, with its leading whitespace.
#[derive(Debug)]
struct Unit {
    leading: String,
    text: String,
    kind: UnitKind,
}

fn join(units: &[Unit]) -> String {
    units
        .iter()
        .map(|u| format!("{}{}", u.leading, u.text))
        .collect()
}

fn units(lexemes: &[Lexeme]) -> Vec<Unit> {
    let parser = Parser::new(lexemes);
    let mut units = Vec::new();
    // Kind of the last unit that was not a comment.
    let mut previous: Option<UnitKind> = None;
    let mut idx = 0;

    while idx < lexemes.len() {
        let lexeme = &lexemes[idx];
        let after_operator = matches!(previous, Some(UnitKind::Multiply | UnitKind::Divide));
        let kind = match &lexeme.token {
            Token::LParen | Token::LBrace => {
                if let Some(close) = parser.matching_close(idx) {
                    let inner = rewrite_division(&lexemes[idx + 1..close]);
                    units.push(Unit {
                        leading: lexeme.leading.clone(),
                        text: format!(
                            "{}{}{}{}",
                            lexeme.text, inner, lexemes[close].leading, lexemes[close].text
                        ),
                        kind: UnitKind::Operand,
                    });
                    previous = Some(UnitKind::Operand);
                    idx = close + 1;
                    continue;
                }
                UnitKind::Operand
            }
            Token::Slash => UnitKind::Divide,
            Token::Asterisk | Token::Percent => UnitKind::Multiply,
            Token::Comment(_) => UnitKind::Boundary,
            // A sign opening an operand binds tighter than `*` and `/`.
            Token::Plus | Token::Minus
                if after_operator || matches!(previous, None | Some(UnitKind::Boundary)) =>
            {
                UnitKind::Operand
            }
            token if after_operator && token.is_keyword("NOT") => UnitKind::Operand,
            token if token.is_division_boundary() => UnitKind::Boundary,
            _ => UnitKind::Operand,
        };
        if !matches!(lexeme.token, Token::Comment(_)) {
            previous = Some(kind);
        }
        units.push(Unit {
            leading: lexeme.leading.clone(),
            text: lexeme.text.clone(),
            kind,
        });
        idx += 1;
    }
    units
}

/// Rewrites `a / b` at every parenthesis level. Operands never extend past
/// an operator that binds looser than division; `*` and `/` associate left.
fn rewrite_division(lexemes: &[Lexeme]) -> String {
    let mut out = String::new();
    let mut segment: Vec<Unit> = Vec::new();

    for unit in units(lexemes) {
        if unit.kind == UnitKind::Boundary {
            out.push_str(&fold_term(&segment));
            segment.clear();
            out.push_str(&unit.leading);
            out.push_str(&unit.text);
        } else {
            segment.push(unit);
        }
    }
    out.push_str(&fold_term(&segment));
    out
}

/// Folds one multiplicative term: factors joined by `*`, `/` and `%`.
fn fold_term(term: &[Unit]) -> String {
    if !term.iter().any(|u| u.kind == UnitKind::Divide) {
        return join(term);
    }

    let mut factors: Vec<&[Unit]> = Vec::new();
    let mut operators: Vec<&Unit> = Vec::new();
    let mut start = 0;
    for (idx, unit) in term.iter().enumerate() {
        if matches!(unit.kind, UnitKind::Multiply | UnitKind::Divide) {
            factors.push(&term[start..idx]);
            operators.push(unit);
            start = idx + 1;
        }
    }
    factors.push(&term[start..]);

    let leading = factors[0]
        .first()
        .map(|u| u.leading.clone())
        .unwrap_or_default();
    let mut acc = join(factors[0]).trim().to_string();

    for (operator, factor) in operators.iter().zip(&factors[1..]) {
        let rhs = join(factor);
        if operator.kind == UnitKind::Divide && !acc.is_empty() && !rhs.trim().is_empty() {
            acc = format!("DIVIDE({}, {}, 0)", acc, rhs.trim());
        } else {
            acc = format!("{}{}{}{}", acc, operator.leading, operator.text, rhs);
        }
    }
    format!("{}{}", leading, acc)
}
