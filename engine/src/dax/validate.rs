//! FILENAME: engine/src/dax/validate.rs
//! PURPOSE: Structural checks on a DAX candidate.
//! CONTEXT: These are heuristics, not a DAX parser. A formula that fails
//! them is still returned so a person can fix it by hand.

use parser::{tokenize, Token};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DaxValidation {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Checks delimiter balance, emptiness, and a bare `=` at the top level
/// that was probably meant as a comparison. Strings, comments and `[column]`
/// references are single tokens, so delimiters inside them do not count.
pub fn validate_dax(dax: &str) -> DaxValidation {
    let mut issues = Vec::new();

    if dax.trim().is_empty() {
        issues.push("Empty formula".to_string());
        return DaxValidation {
            valid: false,
            issues,
        };
    }

    let (mut parens, mut brackets) = (0i64, 0i64);
    count_delimiters(dax, &mut parens, &mut brackets);
    if parens != 0 {
        issues.push("Unbalanced parentheses".to_string());
    }
    if brackets != 0 {
        issues.push("Unbalanced brackets".to_string());
    }

    if has_top_level_assignment(dax) {
        issues.push("Assignment operator found - may need to be comparison".to_string());
    }

    DaxValidation {
        valid: issues.is_empty(),
        issues,
    }
}

fn count_delimiters(dax: &str, parens: &mut i64, brackets: &mut i64) {
    for lexeme in tokenize(dax) {
        match &lexeme.token {
            Token::LParen => *parens += 1,
            Token::RParen => *parens -= 1,
            Token::Illegal(']') => *brackets -= 1,
            Token::Field(name) => {
                // An unclosed `[` swallows the rest of the text; scan it as code.
                if lexeme.text != format!("[{}]", name.replace(']', "]]")) {
                    *brackets += 1;
                    count_delimiters(&lexeme.text[1..], parens, brackets);
                }
            }
            _ => {}
        }
    }
}

/// A single `=` outside any parentheses, not in first position.
fn has_top_level_assignment(dax: &str) -> bool {
    let mut depth = 0usize;
    tokenize(dax)
        .iter()
        .enumerate()
        .any(|(idx, lexeme)| match lexeme.token {
            Token::LParen | Token::LBrace => {
                depth += 1;
                false
            }
            Token::RParen | Token::RBrace => {
                depth = depth.saturating_sub(1);
                false
            }
            Token::Equals => depth == 0 && idx > 0,
            _ => false,
        })
}
