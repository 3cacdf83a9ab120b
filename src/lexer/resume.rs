//! Line-at-a-time lexing
//!
//! Editors re-lex one line at a time and keep an opaque state per line. A
//! string or comment may run over several lines, so the state records which
//! token is still open together with the comment nesting and the bracket depth
//! reached at the end of the line.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::scanner::{CommentState, Lexer};
use super::token::{Token, TokenKind};
use crate::intern::Interner;

/// What is open at the end of a line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineMode {
    /// Nothing
    #[default]
    Code,
    /// A string
    String,
    /// A `(*` comment
    Comment,
}

/// State carried from the end of one line to the start of the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineState {
    /// Open token kind
    pub mode: LineMode,
    /// Inside a string within an open comment
    pub comment_in_string: bool,
    /// `(`/`[` minus `)`/`]` so far, saturating
    pub brace_depth: u8,
    /// Nesting inside an open comment
    pub comment_level: u16,
    /// Comment levels opened by `[`, bit `n` for level `n`; a level opened
    /// twice or from level 32 on cannot be carried across lines
    pub comment_brackets: u32,
}

impl LineState {
    /// State at the start of a file
    pub const START: LineState = LineState {
        mode: LineMode::Code,
        comment_in_string: false,
        brace_depth: 0,
        comment_level: 0,
        comment_brackets: 0,
    };

    /// `sub_state | brace_depth << 8 | comment_level << 16 | comment_brackets << 32`
    pub fn to_packed(&self) -> u64 {
        let mode = match self.mode {
            LineMode::Code => 0u64,
            LineMode::String => 1,
            LineMode::Comment => 2,
        };
        let sub_state = mode | (self.comment_in_string as u64) << 2;
        sub_state
            | (self.brace_depth as u64) << 8
            | (self.comment_level as u64) << 16
            | (self.comment_brackets as u64) << 32
    }

    /// Inverse of [`LineState::to_packed`]; unknown modes read as `Code`
    pub fn from_packed(packed: u64) -> Self {
        let mode = match packed & 0x3 {
            1 => LineMode::String,
            2 => LineMode::Comment,
            _ => LineMode::Code,
        };
        LineState {
            mode,
            comment_in_string: packed & 0x4 != 0,
            brace_depth: (packed >> 8) as u8,
            comment_level: (packed >> 16) as u16,
            comment_brackets: (packed >> 32) as u32,
        }
    }

    fn comment_state(&self) -> CommentState {
        CommentState::from_mask(self.comment_level, self.comment_brackets, self.comment_in_string)
    }
}

/// Reusable line lexer
pub struct LineLexer {
    lexer: Lexer,
}

impl LineLexer {
    /// Creates a line lexer interning into `interner`
    pub fn new(interner: Arc<Interner>) -> Self {
        LineLexer {
            lexer: Lexer::new(interner),
        }
    }

    /// Lexes `line` (without its line break) as line `row`, continuing from
    /// `state`; returns the tokens and the state for the next line
    pub fn tokenize_line(&mut self, line: &[u8], row: u32, state: LineState) -> (Vec<Token>, LineState) {
        self.lexer.set_line(line, row);
        let mut tokens = Vec::new();
        let mut next = LineState {
            brace_depth: state.brace_depth,
            ..LineState::START
        };

        match state.mode {
            LineMode::Code => {}
            LineMode::String => {
                let t = self.lexer.read_partial_string();
                let open = t.kind == TokenKind::DblQuote;
                tokens.push(t);
                if open {
                    next.mode = LineMode::String;
                    return (tokens, next);
                }
            }
            LineMode::Comment => {
                self.lexer.set_comment_state(state.comment_state());
                let t = self.lexer.read_partial_comment();
                let open = t.kind == TokenKind::CommentOpen;
                tokens.push(t);
                if open {
                    return (tokens, self.open_comment(next));
                }
            }
        }

        loop {
            let t = self.lexer.next_token();
            match t.kind {
                TokenKind::Eof => break,
                TokenKind::LParen | TokenKind::LBracket => {
                    next.brace_depth = next.brace_depth.saturating_add(1)
                }
                TokenKind::RParen | TokenKind::RBracket => {
                    next.brace_depth = next.brace_depth.saturating_sub(1)
                }
                TokenKind::DblQuote => next.mode = LineMode::String,
                TokenKind::CommentOpen => next = self.open_comment(next),
                _ => {}
            }
            tokens.push(t);
        }
        if next.mode != state.mode {
            tracing::trace!(row, from = ?state.mode, to = ?next.mode, "line state changed");
        }
        (tokens, next)
    }

    fn open_comment(&self, state: LineState) -> LineState {
        let comment = self.lexer.comment_state();
        LineState {
            mode: LineMode::Comment,
            comment_in_string: comment.in_string,
            comment_level: comment.level,
            comment_brackets: comment.bracket_mask(),
            ..state
        }
    }
}

/// One-shot form of [`LineLexer::tokenize_line`]
pub fn tokenize_line(interner: &Arc<Interner>, line: &[u8], row: u32, state: LineState) -> (Vec<Token>, LineState) {
    LineLexer::new(interner.clone()).tokenize_line(line, row, state)
}

/// Merges the per-line pieces of strings and comments spanning several lines
/// into single tokens, as a whole-buffer lex would produce them; each line
/// break adds one to the length and a `\n` to the value
pub fn join_line_tokens(lines: &[Vec<Token>]) -> Vec<Token> {
    let mut joined = Vec::new();
    let mut open: Option<Token> = None;
    for line in lines {
        for (i, t) in line.iter().enumerate() {
            if i == 0 {
                if let Some(mut head) = open.take() {
                    head.len = head.len.saturating_add(1).saturating_add(t.len);
                    head.value.push(b'\n');
                    head.value.extend_from_slice(&t.value);
                    if t.kind.is_open() {
                        open = Some(head);
                    } else {
                        head.kind = t.kind;
                        head.error = t.error;
                        joined.push(head);
                    }
                    continue;
                }
            }
            if t.kind.is_open() {
                open = Some(t.clone());
            } else {
                joined.push(t.clone());
            }
        }
    }
    joined.extend(open);
    joined
}
