//! A pull-style SQL lexer. The parser calls [`Lexer::next_token`] one token
//! at a time; nothing runs behind its back.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Primary,
    Key,
    Text,
    Integer,
    // Recognized so the parser can refuse them by name.
    Update,
    Delete,
    Drop,
    Where,
    Set,
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    HashMap::from([
        ("CREATE", Keyword::Create),
        ("TABLE", Keyword::Table),
        ("INSERT", Keyword::Insert),
        ("INTO", Keyword::Into),
        ("VALUES", Keyword::Values),
        ("SELECT", Keyword::Select),
        ("FROM", Keyword::From),
        ("PRIMARY", Keyword::Primary),
        ("KEY", Keyword::Key),
        ("TEXT", Keyword::Text),
        ("INTEGER", Keyword::Integer),
        ("UPDATE", Keyword::Update),
        ("DELETE", Keyword::Delete),
        ("DROP", Keyword::Drop),
        ("WHERE", Keyword::Where),
        ("SET", Keyword::Set),
    ])
});

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// End of input. Hitting this mid-statement is what makes a statement
    /// "incomplete" rather than wrong.
    Eos,
    Keyword(Keyword),
    Identifier(String),
    Number(i64),
    Str(String),
    Comma,
    LParen,
    RParen,
    Semicolon,
    Asterisk,
    Plus,
    Minus,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Eos => write!(f, "end of input"),
            TokenKind::Keyword(k) => write!(f, "{:?}", k),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Str(s) => write!(f, "string '{}'", s),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Asterisk => write!(f, "'*'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
        }
    }
}

/// A token plus its byte span in the input, so the parser can slice the
/// original statement text back out.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    /// Produces the next token. An unterminated string literal reports
    /// [`Error::Incomplete`] so a shell can keep reading lines.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        self.skip_whitespace();
        let start = self.pos;

        let c = match self.rest().chars().next() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eos,
                    start,
                    end: start,
                })
            }
        };

        let kind = match c {
            ',' => self.punct(TokenKind::Comma),
            '(' => self.punct(TokenKind::LParen),
            ')' => self.punct(TokenKind::RParen),
            ';' => self.punct(TokenKind::Semicolon),
            '*' => self.punct(TokenKind::Asterisk),
            '+' => self.punct(TokenKind::Plus),
            '-' => self.punct(TokenKind::Minus),
            '\'' => self.string_literal()?,
            '0'..='9' => self.number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.word(),
            c => {
                return Err(err!(Syntax, "Unexpected character '{}' at byte {}.", c, start));
            }
        };

        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn word(&mut self) -> TokenKind {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..len];
        self.pos += len;

        match KEYWORDS.get(word.to_ascii_uppercase().as_str()) {
            Some(&keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(word.to_string()),
        }
    }

    fn number(&mut self) -> Result<TokenKind, Error> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = &rest[..len];
        let value = digits
            .parse::<i64>()
            .map_err(|_| err!(Syntax, "Integer literal '{}' is out of range.", digits))?;
        self.pos += len;
        Ok(TokenKind::Number(value))
    }

    /// A single-quoted literal; `''` is an escaped quote.
    fn string_literal(&mut self) -> Result<TokenKind, Error> {
        let mut text = String::new();
        let mut chars = self.rest().char_indices().skip(1).peekable();

        while let Some((at, c)) = chars.next() {
            if c != '\'' {
                text.push(c);
                continue;
            }
            match chars.peek() {
                Some((_, '\'')) => {
                    chars.next();
                    text.push('\'');
                }
                _ => {
                    self.pos += at + 1;
                    return Ok(TokenKind::Str(text));
                }
            }
        }
        Err(Error::Incomplete)
    }
}
