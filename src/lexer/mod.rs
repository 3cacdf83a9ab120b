//! Lexical analysis for Interlisp
//!
//! Converts source bytes into tokens following the Interlisp reader rules:
//! `%` escapes, `Q`-suffixed octal integers, nestable `(* ... )` comments and
//! the `[`/`]` super-brackets. [`Lexer`] works on a complete buffer,
//! [`tokenize_line`] on one line at a time with an explicit [`LineState`].

pub mod resume;
mod scanner;
mod token;

pub use resume::{join_line_tokens, tokenize_line, LineLexer, LineMode, LineState};
pub use scanner::{is_atom_delimiter, CommentState, Lexer};
pub use token::{Token, TokenKind, MAX_INTEGER_MAGNITUDE};

use serde::{Deserialize, Serialize};

/// Lexer switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerOptions {
    /// Hand out `Comment` tokens instead of skipping them
    pub emit_comments: bool,
    /// Report unterminated strings and comments as errors
    pub packed: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        LexerOptions {
            emit_comments: false,
            packed: true,
        }
    }
}

impl Lexer {
    /// Creates a lexer with the given switches
    pub fn with_options(interner: std::sync::Arc<crate::intern::Interner>, options: LexerOptions) -> Self {
        let mut lexer = Lexer::new(interner);
        lexer.set_emit_comments(options.emit_comments);
        lexer.set_packed(options.packed);
        lexer
    }
}
