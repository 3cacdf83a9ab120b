//! Error types for the Interlisp reader

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::RowCol;

/// Lexical error classes reported on `Invalid` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LexErrorKind {
    /// Malformed number literal (bad octal digit, bad exponent, unparsable float)
    InvalidNumber,
    /// String without closing `"` in packed mode
    UnterminatedString,
    /// `(*` comment without its closing `)` in packed mode
    UnterminatedComment,
    /// `)` closing a comment while a `[` inside it is still open
    MismatchedBracket,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LexErrorKind::InvalidNumber => "invalid number",
            LexErrorKind::UnterminatedString => "unterminated string",
            LexErrorKind::UnterminatedComment => "unterminated comment",
            LexErrorKind::MismatchedBracket => "unterminated bracket in comment",
        };
        f.write_str(s)
    }
}

/// Structural error classes raised by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseErrorKind {
    /// `)` or `]` where an expression was expected
    UnexpectedCloser,
    /// A `[` list terminated by `)`
    MalformedBracketNesting,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedCloser => f.write_str("unexpected closing delimiter"),
            ParseErrorKind::MalformedBracketNesting => f.write_str("malformed bracket nesting"),
        }
    }
}

/// Interlisp reader errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Lexical error surfaced by an `Invalid` token
    ///
    /// **Triggered by:** `19Q`, `1E`, an unterminated `"` or `(*` in packed mode
    #[error("Lexical error at {pos}: {message}")]
    Lex {
        /// Error class
        kind: LexErrorKind,
        /// Start of the offending token
        pos: RowCol,
        /// Error description
        message: String,
    },

    /// Structural error in the S-expression nesting
    ///
    /// **Triggered by:** a stray `)` at top level, `[A B)`
    #[error("Syntax error at {pos}: {message}")]
    Parse {
        /// Error class
        kind: ParseErrorKind,
        /// Position of the offending delimiter
        pos: RowCol,
        /// Error description
        message: String,
    },

    /// Input ended inside an open list
    #[error("Unexpected end of file at {pos}")]
    UnexpectedEof {
        /// Position where the input ended
        pos: RowCol,
    },

    /// Row or column outside the representable range; the value was clamped
    #[error("Row/column out of range: {row}:{col}")]
    RowColOverflow {
        /// Requested row
        row: u32,
        /// Requested column
        col: u32,
    },

    /// Integer literal whose magnitude does not fit in 50 bits
    #[error("Integer literal out of range at {pos}: {literal}")]
    IntegerMagnitudeOverflow {
        /// Start of the literal
        pos: RowCol,
        /// Literal text as written
        literal: String,
    },

    /// Source file could not be read
    #[error("Cannot read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Error description
        message: String,
    },

    /// Worker pool for parallel parsing could not be created
    #[error("Thread pool error: {message}")]
    ThreadPool {
        /// Error description
        message: String,
    },

    /// Cross reference export failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
    },
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Parsing of the file stops
    Fatal,
    /// The file is skipped, the batch continues
    Recoverable,
    /// Reported, processing continues with an approximate value
    Warning,
}

impl Error {
    /// Create a lexical error
    pub fn lex(kind: LexErrorKind, pos: RowCol, message: impl Into<String>) -> Self {
        Error::Lex {
            kind,
            pos,
            message: message.into(),
        }
    }

    /// Create a structural error
    pub fn parse(kind: ParseErrorKind, pos: RowCol, message: impl Into<String>) -> Self {
        Error::Parse {
            kind,
            pos,
            message: message.into(),
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::Lex { .. } => ErrorSeverity::Fatal,
            Error::Parse { .. } => ErrorSeverity::Fatal,
            Error::UnexpectedEof { .. } => ErrorSeverity::Fatal,
            Error::IntegerMagnitudeOverflow { .. } => ErrorSeverity::Fatal,

            Error::ThreadPool { .. } => ErrorSeverity::Fatal,
            Error::Serialization { .. } => ErrorSeverity::Fatal,

            Error::Io { .. } => ErrorSeverity::Recoverable,

            Error::RowColOverflow { .. } => ErrorSeverity::Warning,
        }
    }

    /// Source position the diagnostic refers to, invalid if there is none
    pub fn position(&self) -> RowCol {
        match self {
            Error::Lex { pos, .. }
            | Error::Parse { pos, .. }
            | Error::UnexpectedEof { pos }
            | Error::IntegerMagnitudeOverflow { pos, .. } => *pos,
            Error::RowColOverflow { .. }
            | Error::Io { .. }
            | Error::ThreadPool { .. }
            | Error::Serialization { .. } => RowCol::INVALID,
        }
    }

    /// Message without the position prefix, as shown next to a file in a diagnostics list
    pub fn message(&self) -> String {
        match self {
            Error::Lex { message, .. } | Error::Parse { message, .. } => message.clone(),
            Error::UnexpectedEof { .. } => "unexpected end of file".to_string(),
            Error::IntegerMagnitudeOverflow { literal, .. } => {
                format!("integer out of range: {}", literal)
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_warning() {
        let err = Error::RowColOverflow { row: 600_000, col: 1 };
        assert_eq!(err.classify(), ErrorSeverity::Warning);
        assert!(!err.position().is_valid());
    }

    #[test]
    fn test_message_and_position() {
        let pos = RowCol::new(3, 7);
        let err = Error::parse(ParseErrorKind::UnexpectedCloser, pos, "unexpected token ')'");
        assert_eq!(err.classify(), ErrorSeverity::Fatal);
        assert_eq!(err.position(), pos);
        assert_eq!(err.message(), "unexpected token ')'");
        assert_eq!(err.to_string(), "Syntax error at 3:7: unexpected token ')'");
    }
}
