#![allow(missing_docs)]
//! # Interlisp - Reader and Cross Reference for Interlisp Sources
//!
//! A lexer, reader and cross-referencer for legacy **Interlisp** source files,
//! meant to back code browsers and editors that navigate large corpora of
//! historical Lisp code.
//!
//! ## Features
//!
//! - **Faithful lexing** - `%` escapes, `Q` octal integers, nestable `(* ... )` comments
//! - **Bracket shorthand** - `]` closes every open `(` up to the matching `[`
//! - **Cross reference** - every atom occurrence with its role (call, declaration, assignment, ...)
//! - **Line-at-a-time lexing** - resumable state for editor highlighting
//! - **Parallel project indexing** - many files, one shared intern table
//!
//! ## Quick Start
//!
//! ```rust
//! use interlisp::{Interner, Reader, Role};
//!
//! # fn main() -> interlisp::Result<()> {
//! let code = r#"
//!     (DEFINEQ
//!       (SQUARE (LAMBDA (X) (TIMES X X))))
//! "#;
//!
//! let interner = Interner::shared();
//! let mut reader = Reader::new(interner.clone());
//! reader.parse(code.as_bytes(), Some("SQUARE.LSP"))?;
//!
//! let square = interner.intern_str("SQUARE");
//! assert_eq!(reader.xref().refs(&square)[0].role, Role::Decl);
//!
//! let x = interner.intern_str("X");
//! let roles: Vec<Role> = reader.xref().refs(&x).iter().map(|r| r.role).collect();
//! assert_eq!(roles, vec![Role::Param, Role::Use, Role::Use]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Tokens
//!
//! ```rust
//! use interlisp::{Interner, Lexer, TokenKind};
//!
//! # fn main() -> interlisp::Result<()> {
//! let mut lexer = Lexer::new(Interner::shared());
//! let tokens = lexer.tokens(b"(SETQ MASK 777Q)", None)?;
//! assert_eq!(tokens[3].kind, TokenKind::Integer);
//! assert_eq!(tokens[3].integer()?, 511);
//! # Ok(())
//! # }
//! ```
//!
//! ### Line-at-a-time lexing
//!
//! ```rust
//! use interlisp::{tokenize_line, Interner, LineMode, LineState};
//!
//! let interner = Interner::shared();
//! let (_, state) = tokenize_line(&interner, b"(F \"open", 1, LineState::START);
//! assert_eq!(state.mode, LineMode::String);
//!
//! // the packed form is what an editor stores per line
//! let stored = state.to_packed();
//! let (tokens, state) = tokenize_line(&interner, b"string\")", 2, LineState::from_packed(stored));
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(state, LineState::START);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source bytes → Lexer → Tokens → Reader → List tree + Xref + Atom properties
//!                                                  ↓
//!                                   Project (many files) → queries
//! ```
//!
//! ### Main Components
//!
//! - [`Interner`] - session-wide atom table, identity comparison
//! - [`Lexer`] - tokens from a complete buffer
//! - [`tokenize_line`] - tokens from one line, with carried [`LineState`]
//! - [`Reader`] - list tree, cross reference and property table of one file
//! - [`find_node_at`] - innermost list and atom at a source position
//! - [`Project`] - parallel parsing and queries across files
//!
//! ## Error Handling
//!
//! The first error of a file aborts its parse and is kept by the reader:
//!
//! ```rust
//! # use interlisp::{Error, Interner, Reader};
//! let mut reader = Reader::new(Interner::shared());
//! let err = reader.parse(b"(A (B (C ] D)", None).unwrap_err();
//! assert!(matches!(err, Error::Parse { .. }));
//! assert!(reader.ast().is_nil());
//! ```

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod project;

// Re-export main types
pub use error::{Error, ErrorSeverity, LexErrorKind, ParseErrorKind, Result};
pub use intern::{Atom, Interner};
pub use lexer::{
    join_line_tokens, tokenize_line, Lexer, LexerOptions, LineLexer, LineMode, LineState, Token,
    TokenKind,
};
pub use parser::{
    find_node_at, AtomProps, AtomTable, ListNode, NodeAt, Object, ParsedFile, Reader, Ref, Role,
    Xref,
};
pub use position::RowCol;
pub use project::{FileDiagnostic, Project, ProjectConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
