use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, LexErrorKind, Result};
use crate::intern::Atom;
use crate::position::RowCol;

/// Largest integer magnitude an Interlisp cell can hold (50 bits)
pub const MAX_INTEGER_MAGNITUDE: u64 = (1 << 50) - 1;

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Position of the first character
    pub pos: RowCol,
    /// Footprint in the source, escapes and delimiters included
    pub len: u16,
    /// Token text with escapes removed; string values exclude the quotes
    pub value: Vec<u8>,
    /// Canonical atom for `Atom` tokens
    #[serde(skip)]
    pub atom: Option<Atom>,
    /// Error class for `Invalid` tokens
    pub error: Option<LexErrorKind>,
    /// Path of the source the token was read from
    #[serde(skip)]
    pub source: Option<Arc<str>>,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, pos: RowCol, len: usize, value: Vec<u8>) -> Self {
        Token {
            kind,
            pos,
            len: len.min(u16::MAX as usize) as u16,
            value,
            atom: None,
            error: None,
            source: None,
        }
    }

    /// Creates an `Invalid` token; the message is kept in `value`
    pub fn invalid(kind: LexErrorKind, pos: RowCol, len: usize, message: &str) -> Self {
        let mut token = Token::new(TokenKind::Invalid, pos, len, message.as_bytes().to_vec());
        token.error = Some(kind);
        token
    }

    /// Neither end of input nor an error
    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, TokenKind::Eof | TokenKind::Invalid)
    }

    /// End of input
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Token text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Error for an `Invalid` token
    pub fn to_error(&self) -> Error {
        Error::lex(
            self.error.unwrap_or(LexErrorKind::InvalidNumber),
            self.pos,
            self.text(),
        )
    }

    /// Decodes an `Integer` token; a trailing `Q` selects octal
    pub fn integer(&self) -> Result<i64> {
        let text = self.text();
        let (digits, radix) = match text.strip_suffix('Q') {
            Some(octal) => (octal, 8),
            None => (text.as_str(), 10),
        };
        let overflow = || Error::IntegerMagnitudeOverflow {
            pos: self.pos,
            literal: text.clone(),
        };
        let value = i64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
            std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => overflow(),
            _ => Error::lex(
                LexErrorKind::InvalidNumber,
                self.pos,
                format!("invalid number {}", text),
            ),
        })?;
        if value.unsigned_abs() > MAX_INTEGER_MAGNITUDE {
            return Err(overflow());
        }
        Ok(value)
    }

    /// Decodes a `Float` token
    pub fn float(&self) -> Result<f64> {
        self.text().parse().map_err(|_| {
            Error::lex(
                LexErrorKind::InvalidNumber,
                self.pos,
                format!("invalid float {}", self.text()),
            )
        })
    }
}

/// All token types of the Interlisp reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Lexical error, see [`Token::error`]
    Invalid,
    /// End of input
    Eof,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Complete string literal
    String,
    /// Interned atom
    Atom,
    /// Floating point literal
    Float,
    /// Decimal or `Q`-suffixed octal integer literal
    Integer,
    /// `(* ... )` comment
    Comment,
    /// String still open at the end of a line (line mode only)
    DblQuote,
    /// Comment still open at the end of a line (line mode only)
    CommentOpen,
}

impl TokenKind {
    /// Name used in diagnostics and dumps
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Invalid => "Invalid",
            TokenKind::Eof => "Eof",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::String => "string",
            TokenKind::Atom => "atom",
            TokenKind::Float => "float",
            TokenKind::Integer => "integer",
            TokenKind::Comment => "comment",
            TokenKind::DblQuote => "open string",
            TokenKind::CommentOpen => "open comment",
        }
    }

    /// True for the two kinds a line lexer hands back for unfinished tokens
    pub fn is_open(&self) -> bool {
        matches!(self, TokenKind::DblQuote | TokenKind::CommentOpen)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
