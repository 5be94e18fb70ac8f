//! FILENAME: parser/src/lexer.rs
//! PURPOSE: Scans a raw Tableau formula and produces a stream of Lexemes.
//! CONTEXT: This is the first stage of the formula pipeline. It handles
//! whitespace capture, number parsing, both string quote styles, bracketed
//! field references, comments, and multi-character operators like <= and ==.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % ^ & ( ) { } , : . = < >
//! - Multi char: <= >= <> != ==
//! - Field references: [Order Date], with ]] as an escaped bracket
//! - Comments: // to end of line, /* block */

use crate::token::{Lexeme, Token};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    source: &'a str,
    input: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            source: input,
            input: input.char_indices().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.next_lexeme().token
    }

    /// Advances the lexer and returns the next token with its source text.
    pub fn next_lexeme(&mut self) -> Lexeme {
        let leading = self.skip_whitespace();
        let start = self.offset();

        let token = match self.input.next().map(|(_, ch)| ch) {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => self.read_slash(),
            Some('%') => Token::Percent,
            Some('^') => Token::Caret,
            Some('&') => Token::Ampersand,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('{') => Token::LBrace,
            Some('}') => Token::RBrace,
            Some(',') => Token::Comma,
            Some(':') => Token::Colon,

            // Handle = and ==
            Some('=') => {
                if self.next_if('=') {
                    Token::DoubleEquals
                } else {
                    Token::Equals
                }
            }

            // Handle != (Tableau inequality)
            Some('!') => {
                if self.next_if('=') {
                    Token::NotEqual
                } else {
                    Token::Illegal('!')
                }
            }

            // Handle < and potentially <= or <>
            Some('<') => self.read_less_than_operator(),

            // Handle > and potentially >=
            Some('>') => self.read_greater_than_operator(),

            Some('"') => self.read_quoted('"').map_or_else(Token::String, Token::String),

            Some('\'') => self
                .read_quoted('\'')
                .map_or_else(Token::SingleQuoted, Token::SingleQuoted),

            Some('[') => self.read_field(),

            // Numbers start with a digit, or a dot followed by a digit
            Some(ch) if ch.is_ascii_digit() => self.read_number(ch),
            Some('.') => match self.input.peek() {
                Some(&(_, next)) if next.is_ascii_digit() => self.read_number('.'),
                _ => Token::Dot,
            },

            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            // End of input
            None => Token::EOF,

            // Unknown character
            Some(ch) => Token::Illegal(ch),
        };

        let end = self.offset();
        Lexeme::new(token, &self.source[start..end], leading)
    }

    /// Byte offset of the next unread character.
    fn offset(&mut self) -> usize {
        self.input
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.source.len())
    }

    fn next_if(&mut self, expected: char) -> bool {
        if matches!(self.input.peek(), Some(&(_, ch)) if ch == expected) {
            self.input.next();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> String {
        let mut skipped = String::new();
        while let Some(&(_, ch)) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            skipped.push(ch);
            self.input.next();
        }
        skipped
    }

    /// Handles '/', '//' line comments and '/* */' block comments.
    fn read_slash(&mut self) -> Token {
        if self.next_if('/') {
            let mut comment = String::from("//");
            while let Some(&(_, ch)) = self.input.peek() {
                if ch == '\n' {
                    break;
                }
                comment.push(ch);
                self.input.next();
            }
            return Token::Comment(comment);
        }

        if self.next_if('*') {
            let mut comment = String::from("/*");
            let mut previous = '\0';
            for (_, ch) in self.input.by_ref() {
                comment.push(ch);
                if previous == '*' && ch == '/' {
                    break;
                }
                previous = ch;
            }
            return Token::Comment(comment);
        }

        Token::Slash
    }

    /// Handles operators starting with '<': <, <=, <>
    fn read_less_than_operator(&mut self) -> Token {
        if self.next_if('=') {
            Token::LessEqual
        } else if self.next_if('>') {
            Token::NotEqual
        } else {
            Token::LessThan
        }
    }

    /// Handles operators starting with '>': >, >=
    fn read_greater_than_operator(&mut self) -> Token {
        if self.next_if('=') {
            Token::GreaterEqual
        } else {
            Token::GreaterThan
        }
    }

    /// Reads a quoted literal. A doubled quote inside is an escaped quote.
    /// Returns Err with the partial contents when EOF arrives before the
    /// closing quote; the caller keeps the text as written either way.
    fn read_quoted(&mut self, quote: char) -> Result<String, String> {
        let mut result = String::new();
        while let Some((_, ch)) = self.input.next() {
            if ch == quote {
                if self.next_if(quote) {
                    result.push(quote);
                    continue;
                }
                return Ok(result);
            }
            result.push(ch);
        }
        Err(result)
    }

    /// Reads a bracketed field reference: [Order Date]. ']]' escapes a bracket.
    fn read_field(&mut self) -> Token {
        let mut name = String::new();
        while let Some((_, ch)) = self.input.next() {
            if ch == ']' {
                if self.next_if(']') {
                    name.push(']');
                    continue;
                }
                break;
            }
            name.push(ch);
        }
        Token::Field(name)
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&(_, ch)) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else if ch == 'e' || ch == 'E' {
                // Exponent only when digits follow: 1e5, 2.5E-3
                let mut lookahead = self.input.clone();
                lookahead.next();
                let signed = matches!(lookahead.peek(), Some(&(_, '+' | '-')));
                if signed {
                    lookahead.next();
                }
                if !matches!(lookahead.peek(), Some(&(_, d)) if d.is_ascii_digit()) {
                    break;
                }
                number_str.push(ch);
                self.input.next();
                if signed {
                    if let Some((_, sign)) = self.input.next() {
                        number_str.push(sign);
                    }
                }
            } else {
                break;
            }
        }

        Token::Number(number_str)
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&(_, ch)) = self.input.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        match ident.to_uppercase().as_str() {
            "TRUE" => Token::Boolean(true),
            "FALSE" => Token::Boolean(false),
            _ => Token::Identifier(ident.to_uppercase()), // Normalize to UPPERCASE
        }
    }
}

/// Returns true if `ch` can start an identifier.
fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

/// Lexes the whole formula. The trailing EOF lexeme is not included.
pub fn tokenize(input: &str) -> Vec<Lexeme> {
    let mut lexer = Lexer::new(input);
    let mut lexemes = Vec::new();
    loop {
        let lexeme = lexer.next_lexeme();
        if lexeme.token == Token::EOF {
            break;
        }
        lexemes.push(lexeme);
    }
    lexemes
}

/// Writes lexemes back out as text, preserving inner whitespace.
/// Leading and trailing whitespace of the whole run is trimmed.
pub fn render(lexemes: &[Lexeme]) -> String {
    let mut out = String::new();
    for (idx, lexeme) in lexemes.iter().enumerate() {
        if idx > 0 {
            out.push_str(&lexeme.leading);
        }
        out.push_str(&lexeme.text);
    }
    out.trim().to_string()
}
