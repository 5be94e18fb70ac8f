//! FILENAME: parser/src/token.rs
//! PURPOSE: Token definitions for the Tableau formula lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by
//! the structural parser and the DAX rewriter. Every token travels inside a
//! `Lexeme` that also keeps the exact source text and the whitespace before it,
//! so a rewritten formula keeps the author's layout.

/// Tokens recognized by the formula lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    /// Numeric literal, kept as written (e.g. "1.50").
    Number(String),
    /// Double-quoted string literal: "East"
    String(String),
    /// Single-quoted text: a string literal in Tableau, a quoted table name in DAX.
    SingleQuoted(String),
    Boolean(bool),
    /// Function names and keywords, normalized to UPPERCASE.
    Identifier(String),
    /// Bracketed field reference: [Sales]
    Field(String),

    // Operators
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Caret,
    Ampersand,
    Equals,
    DoubleEquals,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LParen,
    RParen,
    /// Opens a level-of-detail block: {FIXED ...}
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,

    /// `// line` or `/* block */` comment, text included.
    Comment(String),

    /// Text a rewriter has already converted and spliced back into the
    /// stream. The lexer never produces it.
    Verbatim(String),

    // Special
    EOF,
    Illegal(char),
}

impl Token {
    /// True for an identifier equal (case-insensitively) to `keyword`.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Identifier(name) if name.eq_ignore_ascii_case(keyword))
    }

    /// Operators that bind looser than `*` and `/`. A division operand never
    /// extends across one of these.
    pub fn is_division_boundary(&self) -> bool {
        match self {
            Token::Plus
            | Token::Minus
            | Token::Ampersand
            | Token::Equals
            | Token::DoubleEquals
            | Token::NotEqual
            | Token::LessThan
            | Token::GreaterThan
            | Token::LessEqual
            | Token::GreaterEqual
            | Token::Comma
            | Token::Colon => true,
            Token::Identifier(name) => matches!(
                name.as_str(),
                "AND" | "OR" | "NOT" | "THEN" | "ELSE" | "ELSEIF" | "WHEN" | "END" | "IF" | "CASE"
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::SingleQuoted(s) => write!(f, "'{}'", s),
            Token::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Field(s) => write!(f, "[{}]", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Asterisk => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::Ampersand => write!(f, "&"),
            Token::Equals => write!(f, "="),
            Token::DoubleEquals => write!(f, "=="),
            Token::NotEqual => write!(f, "<>"),
            Token::LessThan => write!(f, "<"),
            Token::GreaterThan => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Comment(c) => write!(f, "{}", c),
            Token::Verbatim(s) => write!(f, "{}", s),
            Token::EOF => write!(f, "EOF"),
            Token::Illegal(c) => write!(f, "ILLEGAL({})", c),
        }
    }
}

/// A token together with its source text and the whitespace that preceded it.
#[derive(Debug, PartialEq, Clone)]
pub struct Lexeme {
    pub token: Token,
    pub text: String,
    pub leading: String,
}

impl Lexeme {
    pub fn new(token: Token, text: impl Into<String>, leading: impl Into<String>) -> Self {
        Lexeme {
            token,
            text: text.into(),
            leading: leading.into(),
        }
    }

    /// Spliced replacement text that keeps the whitespace of what it replaces.
    pub fn verbatim(text: impl Into<String>, leading: impl Into<String>) -> Self {
        let text = text.into();
        Lexeme {
            token: Token::Verbatim(text.clone()),
            text,
            leading: leading.into(),
        }
    }

    /// True when the lexeme directly follows the previous one with no whitespace.
    pub fn is_attached(&self) -> bool {
        self.leading.is_empty()
    }
}
