//! FILENAME: parser/src/lib.rs
//! PURPOSE: Library root for the Tableau formula parser.
//! CONTEXT: This module exposes the lexer, the structural recognizer and the
//! node types the DAX converter uses to classify and rewrite calculated fields.
//!
//! PIPELINE: Formula String --> Lexer --> Lexemes --> Parser --> Constructs --> Rewriter
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, %, ^
//! - Comparison: =, ==, <>, !=, <, >, <=, >=
//! - String concatenation: &
//! - Field references: [Sales], [Order Date]
//! - Level-of-detail blocks: {FIXED [Region] : SUM([Sales])}
//! - IF/ELSEIF/ELSE/END and CASE/WHEN/ELSE/END blocks
//! - Function calls with top-level argument splitting
//! - Comments: // and /* */

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

// Register the separate tests module
#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use ast::{
    Branch, Call, CaseBlock, Conditional, ConditionalForm, FormulaFacts, FormulaKind, IfBlock,
    LodBlock, LodKeyword, Span, TableCalcFunction,
};
pub use lexer::{render, tokenize, Lexer};
pub use parser::{classify, scan, ParseError, ParseResult, Parser};
pub use token::{Lexeme, Token};
