//! FILENAME: parser/src/parser.rs
//! PURPOSE: Structural recognizer that finds dialect constructs in a lexeme stream.
//! CONTEXT: This is the second stage of the formula pipeline. It does not
//! build a full expression tree; it locates the constructs the DAX rewriter
//! replaces in place and reports the formula's dialect.
//!
//! GRAMMAR (of the recognized constructs only):
//!   lod_block    --> "{" [IDENTIFIER dimensions] ":" expression "}"
//!                  | "{" expression "}"
//!   dimensions   --> expression ("," expression)*
//!   if_block     --> IF expr THEN expr (ELSEIF expr THEN expr)* [ELSE expr] END
//!   case_block   --> CASE expr (WHEN expr THEN expr)+ [ELSE expr] END
//!   call         --> IDENTIFIER "(" [expression ("," expression)*] ")"
//!
//! Keywords are only significant outside parentheses and braces, and nested
//! IF/CASE blocks are skipped as a whole while scanning an enclosing block.

use crate::ast::{
    Branch, Call, CaseBlock, Conditional, ConditionalForm, FormulaFacts, FormulaKind, IfBlock,
    LodBlock, LodKeyword, Span, TableCalcFunction,
};
use crate::lexer::{render, tokenize};
use crate::token::{Lexeme, Token};

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Where an IF or CASE scan currently stands.
#[derive(Debug, PartialEq, Clone, Copy)]
enum BlockState {
    Subject,
    Condition,
    Value,
    Otherwise,
}

/// The Parser holds the lexeme slice being inspected.
pub struct Parser<'a> {
    lexemes: &'a [Lexeme],
}

impl<'a> Parser<'a> {
    pub fn new(lexemes: &'a [Lexeme]) -> Self {
        Parser { lexemes }
    }

    pub fn lexemes(&self) -> &'a [Lexeme] {
        self.lexemes
    }

    fn token(&self, idx: usize) -> &Token {
        self.lexemes
            .get(idx)
            .map(|l| &l.token)
            .unwrap_or(&Token::EOF)
    }

    /// Index of the next non-comment lexeme at or after `idx`.
    pub fn next_significant(&self, idx: usize) -> Option<usize> {
        (idx..self.lexemes.len()).find(|&i| !matches!(self.token(i), Token::Comment(_)))
    }

    /// True when the span holds anything besides comments.
    fn is_filled(&self, span: &Span) -> bool {
        span.clone().any(|i| !matches!(self.token(i), Token::Comment(_)))
    }

    /// True when the identifier at `idx` is directly followed by '('.
    pub fn is_call_at(&self, idx: usize) -> bool {
        matches!(self.token(idx), Token::Identifier(_))
            && self
                .next_significant(idx + 1)
                .is_some_and(|next| self.token(next) == &Token::LParen)
    }

    /// Finds the ')' or '}' closing the delimiter opened at `open`.
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for idx in open..self.lexemes.len() {
            match self.token(idx) {
                Token::LParen | Token::LBrace => depth += 1,
                Token::RParen | Token::RBrace => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Splits a span on commas that sit outside any parentheses or braces.
    /// An empty span yields no pieces.
    pub fn split_top_level(&self, span: Span) -> Vec<Span> {
        if !self.is_filled(&span) {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        let mut depth = 0usize;
        let mut piece_start = span.start;
        for idx in span.clone() {
            match self.token(idx) {
                Token::LParen | Token::LBrace => depth += 1,
                Token::RParen | Token::RBrace => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 => {
                    pieces.push(piece_start..idx);
                    piece_start = idx + 1;
                }
                _ => {}
            }
        }
        pieces.push(piece_start..span.end);
        pieces
    }

    // ========================================================================
    // LEVEL OF DETAIL
    // ========================================================================

    /// All outermost LOD blocks, left to right.
    pub fn lod_blocks(&self) -> Vec<LodBlock> {
        let mut blocks = Vec::new();
        let mut idx = 0;
        while idx < self.lexemes.len() {
            if self.token(idx) == &Token::LBrace {
                if let Ok(block) = self.parse_lod(idx) {
                    idx = block.span.end;
                    blocks.push(block);
                    continue;
                }
            }
            idx += 1;
        }
        blocks
    }

    /// Parses the LOD block whose '{' sits at `open`.
    pub fn parse_lod(&self, open: usize) -> ParseResult<LodBlock> {
        let close = self
            .matching_close(open)
            .filter(|&close| self.token(close) == &Token::RBrace)
            .ok_or_else(|| ParseError::new("Unclosed level-of-detail block"))?;

        let mut depth = 0usize;
        let mut colon = None;
        for idx in open + 1..close {
            match self.token(idx) {
                Token::LParen | Token::LBrace => depth += 1,
                Token::RParen | Token::RBrace => depth = depth.saturating_sub(1),
                Token::Colon if depth == 0 => {
                    colon = Some(idx);
                    break;
                }
                _ => {}
            }
        }

        // {expr} without keyword: table-scoped, same as FIXED with no dimensions
        let Some(colon) = colon else {
            if !self.is_filled(&(open + 1..close)) {
                return Err(ParseError::new("Empty level-of-detail block"));
            }
            return Ok(LodBlock {
                span: open..close + 1,
                keyword: LodKeyword::Fixed,
                dimensions: Vec::new(),
                inner: open + 1..close,
            });
        };

        let inner = colon + 1..close;
        if !self.is_filled(&inner) {
            return Err(ParseError::new("Level-of-detail block has no expression"));
        }

        let head = self.next_significant(open + 1).filter(|&i| i < colon);
        let (keyword, dimensions) = match head.map(|i| (i, self.token(i))) {
            Some((i, Token::Identifier(name))) => (
                LodKeyword::from_identifier(name),
                self.split_top_level(i + 1..colon),
            ),
            Some(_) => (
                LodKeyword::Other(render(&self.lexemes[open + 1..colon])),
                Vec::new(),
            ),
            None => (LodKeyword::Fixed, Vec::new()),
        };

        Ok(LodBlock {
            span: open..close + 1,
            keyword,
            dimensions: dimensions
                .into_iter()
                .filter(|d| self.is_filled(d))
                .collect(),
            inner,
        })
    }

    // ========================================================================
    // CONDITIONALS
    // ========================================================================

    /// All outermost IF and CASE blocks, left to right.
    pub fn conditionals(&self) -> Vec<Conditional> {
        let mut blocks = Vec::new();
        let mut idx = 0;
        while idx < self.lexemes.len() {
            let parsed = match self.token(idx) {
                t if t.is_keyword("IF") => self.parse_if(idx).map(Conditional::If).ok(),
                t if t.is_keyword("CASE") => self.parse_case(idx).map(Conditional::Case).ok(),
                _ => None,
            };
            match parsed {
                Some(block) => {
                    idx = block.span().end;
                    blocks.push(block);
                }
                None => idx += 1,
            }
        }
        blocks
    }

    /// Parses `IF ... END` starting at the IF keyword.
    pub fn parse_if(&self, start: usize) -> ParseResult<IfBlock> {
        let mut branches = Vec::new();
        let mut condition: Option<Span> = None;
        let mut state = BlockState::Condition;

        let end = self.scan_block(start, |parser, keyword, idx, segment| {
            match (state, keyword) {
                (BlockState::Condition, "THEN") => {
                    parser.require(&segment, "IF condition")?;
                    condition = Some(segment);
                    state = BlockState::Value;
                }
                (BlockState::Value, "ELSEIF" | "ELSE" | "END") => {
                    let condition = condition
                        .take()
                        .ok_or_else(|| ParseError::new("THEN without condition"))?;
                    parser.require(&segment, "THEN value")?;
                    branches.push(Branch {
                        condition,
                        value: segment,
                    });
                    state = match keyword {
                        "ELSEIF" => BlockState::Condition,
                        "ELSE" => BlockState::Otherwise,
                        _ => return Ok(Some(None)),
                    };
                }
                (BlockState::Otherwise, "END") => {
                    parser.require(&segment, "ELSE value")?;
                    return Ok(Some(Some(segment)));
                }
                _ => {
                    return Err(ParseError::new(format!(
                        "Unexpected {} at position {} in IF block",
                        keyword, idx
                    )))
                }
            }
            Ok(None)
        })?;

        Ok(IfBlock {
            span: start..end.0 + 1,
            branches,
            otherwise: end.1,
        })
    }

    /// Parses `CASE ... END` starting at the CASE keyword.
    pub fn parse_case(&self, start: usize) -> ParseResult<CaseBlock> {
        let mut subject: Option<Span> = None;
        let mut arms = Vec::new();
        let mut when: Option<Span> = None;
        let mut state = BlockState::Subject;

        let end = self.scan_block(start, |parser, keyword, idx, segment| {
            match (state, keyword) {
                (BlockState::Subject, "WHEN") => {
                    parser.require(&segment, "CASE subject")?;
                    subject = Some(segment);
                    state = BlockState::Condition;
                }
                (BlockState::Condition, "THEN") => {
                    parser.require(&segment, "WHEN value")?;
                    when = Some(segment);
                    state = BlockState::Value;
                }
                (BlockState::Value, "WHEN" | "ELSE" | "END") => {
                    let condition = when
                        .take()
                        .ok_or_else(|| ParseError::new("THEN without WHEN"))?;
                    parser.require(&segment, "THEN result")?;
                    arms.push(Branch {
                        condition,
                        value: segment,
                    });
                    state = match keyword {
                        "WHEN" => BlockState::Condition,
                        "ELSE" => BlockState::Otherwise,
                        _ => return Ok(Some(None)),
                    };
                }
                (BlockState::Otherwise, "END") => {
                    parser.require(&segment, "ELSE value")?;
                    return Ok(Some(Some(segment)));
                }
                _ => {
                    return Err(ParseError::new(format!(
                        "Unexpected {} at position {} in CASE block",
                        keyword, idx
                    )))
                }
            }
            Ok(None)
        })?;

        let subject = subject.ok_or_else(|| ParseError::new("CASE without WHEN"))?;
        Ok(CaseBlock {
            span: start..end.0 + 1,
            subject,
            arms,
            otherwise: end.1,
        })
    }

    fn require(&self, segment: &Span, what: &str) -> ParseResult<()> {
        if self.is_filled(segment) {
            Ok(())
        } else {
            Err(ParseError::new(format!("Missing {}", what)))
        }
    }

    /// Walks a block opened at `start`, calling `on_keyword` for every
    /// structural keyword that belongs to this block with the segment of
    /// lexemes since the previous keyword. The callback returns
    /// `Some(otherwise)` once END is reached. Yields the END index.
    fn scan_block<F>(&self, start: usize, mut on_keyword: F) -> ParseResult<(usize, Option<Span>)>
    where
        F: FnMut(&Self, &str, usize, Span) -> ParseResult<Option<Option<Span>>>,
    {
        let mut depth = 0usize;
        let mut nested = 0usize;
        let mut segment_start = start + 1;

        for idx in start + 1..self.lexemes.len() {
            match self.token(idx) {
                Token::LParen | Token::LBrace => depth += 1,
                Token::RParen | Token::RBrace => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ParseError::new("Unbalanced delimiter inside block"))?;
                }
                Token::Identifier(name) if depth == 0 => match name.as_str() {
                    "IF" | "CASE" => nested += 1,
                    "END" if nested > 0 => nested -= 1,
                    "THEN" | "ELSEIF" | "ELSE" | "WHEN" | "END" if nested == 0 => {
                        let segment = segment_start..idx;
                        segment_start = idx + 1;
                        if let Some(otherwise) = on_keyword(self, name.as_str(), idx, segment)? {
                            return Ok((idx, otherwise));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Err(ParseError::new("Block is missing END"))
    }

    // ========================================================================
    // FUNCTION CALLS
    // ========================================================================

    /// All outermost calls whose uppercased name satisfies `wanted`.
    pub fn calls<F>(&self, wanted: F) -> Vec<Call>
    where
        F: Fn(&str) -> bool,
    {
        let mut calls = Vec::new();
        let mut idx = 0;
        while idx < self.lexemes.len() {
            let matched = match self.token(idx) {
                Token::Identifier(name) if wanted(name) && self.is_call_at(idx) => {
                    self.parse_call(idx).ok()
                }
                _ => None,
            };
            match matched {
                Some(call) => {
                    idx = call.span.end;
                    calls.push(call);
                }
                None => idx += 1,
            }
        }
        calls
    }

    /// Parses `NAME(...)` with the name at `start`.
    pub fn parse_call(&self, start: usize) -> ParseResult<Call> {
        let name = match self.token(start) {
            Token::Identifier(name) => name.clone(),
            other => {
                return Err(ParseError::new(format!(
                    "Expected function name, found {:?}",
                    other
                )))
            }
        };

        let open = self
            .next_significant(start + 1)
            .filter(|&i| self.token(i) == &Token::LParen)
            .ok_or_else(|| ParseError::new(format!("Expected '(' after {}", name)))?;
        let close = self
            .matching_close(open)
            .filter(|&i| self.token(i) == &Token::RParen)
            .ok_or_else(|| ParseError::new(format!("Unclosed call to {}", name)))?;

        Ok(Call {
            span: start..close + 1,
            name,
            args: self.split_top_level(open + 1..close),
        })
    }

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================

    /// Decides the dialect: LOD first, then conditional, then table calculation.
    pub fn classify(&self) -> FormulaKind {
        if let Some(block) = self.lod_blocks().into_iter().next() {
            return FormulaKind::Lod {
                dimensions: block
                    .dimensions
                    .iter()
                    .map(|d| self.dimension_name(d))
                    .collect(),
                inner: render(&self.lexemes[block.inner.clone()]),
                keyword: block.keyword,
            };
        }

        if let Some(block) = self.conditionals().into_iter().next() {
            return FormulaKind::Conditional {
                form: match block {
                    Conditional::If(_) => ConditionalForm::If,
                    Conditional::Case(_) => ConditionalForm::Case,
                },
            };
        }

        let called: Vec<&str> = (0..self.lexemes.len())
            .filter(|&i| self.is_call_at(i))
            .filter_map(|i| match self.token(i) {
                Token::Identifier(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        if let Some(function) = TableCalcFunction::ALL
            .iter()
            .find(|f| called.contains(&f.name()))
        {
            return FormulaKind::TableCalc {
                function: *function,
            };
        }

        FormulaKind::Standard
    }

    /// Name of a dimension span with its brackets removed: [Region] --> Region
    pub fn dimension_name(&self, span: &Span) -> String {
        let significant: Vec<&Lexeme> = self.lexemes[span.clone()]
            .iter()
            .filter(|l| !matches!(l.token, Token::Comment(_)))
            .collect();
        match significant.as_slice() {
            [Lexeme {
                token: Token::Field(name),
                ..
            }] => name.clone(),
            _ => render(&self.lexemes[span.clone()])
                .trim_matches(|c| c == '[' || c == ']')
                .to_string(),
        }
    }

    /// Collects function names, field references and literals.
    pub fn facts(&self) -> FormulaFacts {
        let mut facts = FormulaFacts::default();
        for (idx, lexeme) in self.lexemes.iter().enumerate() {
            match &lexeme.token {
                Token::Identifier(name) if self.is_call_at(idx) => {
                    push_unique(&mut facts.functions, name);
                }
                Token::Field(name) => push_unique(&mut facts.fields, name),
                Token::String(s) | Token::SingleQuoted(s) => facts.strings.push(s.clone()),
                Token::Number(n) => facts.numbers.push(n.clone()),
                _ => {}
            }
        }
        facts
    }
}

fn push_unique(items: &mut Vec<String>, value: &str) {
    if !items.iter().any(|existing| existing == value) {
        items.push(value.to_string());
    }
}

/// Convenience function to classify a formula string directly.
pub fn classify(formula: &str) -> FormulaKind {
    let lexemes = tokenize(formula);
    Parser::new(&lexemes).classify()
}

/// Convenience function to collect the facts of a formula string directly.
pub fn scan(formula: &str) -> FormulaFacts {
    let lexemes = tokenize(formula);
    Parser::new(&lexemes).facts()
}
