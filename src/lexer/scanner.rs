use std::collections::VecDeque;
use std::sync::Arc;

use super::token::{Token, TokenKind};
use crate::error::{LexErrorKind, Result};
use crate::intern::Interner;
use crate::position::RowCol;

/// Control byte used by the legacy files as a two-byte escape; the byte after
/// it carries no text
const CTRL_F: u8 = 0x06;

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn is_print(c: u8) -> bool {
    (0x20..=0x7e).contains(&c)
}

/// Characters that end an atom unless escaped with `%`
pub fn is_atom_delimiter(c: u8) -> bool {
    is_space(c) || matches!(c, b'(' | b')' | b'[' | b']' | b'"')
}

fn ends_atom(c: Option<u8>) -> bool {
    match c {
        None => true,
        Some(c) => is_atom_delimiter(c) || !is_print(c),
    }
}

/// Nesting state inside a `(* ... )` comment.
///
/// `brackets` lists the level each still open `[` was opened at, innermost
/// last. A `)` only lowers `level`; it never pops an entry, so a `[` closed
/// by `)` stays recorded and makes the closing `)` of the comment an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentState {
    /// Open parens and brackets inside the comment
    pub level: u16,
    /// Levels opened by `[`
    pub brackets: Vec<u16>,
    /// Inside a `"` string within the comment
    pub in_string: bool,
}

impl CommentState {
    /// Rebuilds a state from a bracket bitmask, bit `n` standing for a `[`
    /// opened at level `n`
    pub fn from_mask(level: u16, mask: u32, in_string: bool) -> Self {
        CommentState {
            level,
            brackets: (0..32).filter(|bit| mask & (1 << bit) != 0).collect(),
            in_string,
        }
    }

    /// Bracket levels below 32 as a bitmask; repeated and deeper levels are
    /// not representable and get folded or dropped
    pub fn bracket_mask(&self) -> u32 {
        self.brackets
            .iter()
            .filter(|&&level| level < 32)
            .fold(0, |mask, &level| mask | 1 << level)
    }

    fn open(&mut self, bracket: bool) {
        if bracket {
            self.brackets.push(self.level);
        }
        self.level = self.level.saturating_add(1);
    }

    /// Closes back to the level of the innermost open `[`; false if there is none
    fn close_bracket(&mut self) -> bool {
        match self.brackets.pop() {
            Some(level) => {
                self.level = level;
                true
            }
            None => false,
        }
    }
}

enum CommentEnd {
    Closed,
    /// An unmatched `]` ended the comment; the `]` was pushed back
    ClosedByBracket,
    Mismatched,
    Open,
}

/// Lexer for Interlisp source text
///
/// Works on bytes; positions are counted in printable characters, the
/// clutter bytes found in legacy files are dropped without taking a column.
pub struct Lexer {
    interner: Arc<Interner>,
    source: Vec<u8>,
    offset: usize,
    /// Characters pushed back by the number/atom scanners, last is next
    pushback: Vec<u8>,
    /// Position of the next character
    row: u32,
    col: u32,
    /// Start of the token being scanned
    start: (u32, u32),
    path: Option<Arc<str>>,
    /// Tokens handed back by the reader
    buffer: VecDeque<Token>,
    emit_comments: bool,
    packed: bool,
    quote_depth: u32,
    comment: CommentState,
}

impl Lexer {
    /// Creates a lexer interning its atoms into `interner`
    pub fn new(interner: Arc<Interner>) -> Self {
        Lexer {
            interner,
            source: Vec::new(),
            offset: 0,
            pushback: Vec::new(),
            row: 1,
            col: 1,
            start: (1, 1),
            path: None,
            buffer: VecDeque::new(),
            emit_comments: false,
            packed: true,
            quote_depth: 0,
            comment: CommentState::default(),
        }
    }

    /// The intern table atoms go to
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Starts lexing a complete buffer from line 1
    pub fn set_source(&mut self, source: &[u8], path: Option<&str>) {
        self.reset(source, 1);
        self.path = path.map(Arc::from);
    }

    /// Starts lexing a single line of a larger document; unterminated strings
    /// and comments come back as `DblQuote`/`CommentOpen`
    pub fn set_line(&mut self, line: &[u8], row: u32) {
        self.reset(line, row);
        self.packed = false;
        self.emit_comments = true;
    }

    fn reset(&mut self, source: &[u8], row: u32) {
        self.source.clear();
        self.source.extend_from_slice(source);
        self.offset = 0;
        self.pushback.clear();
        self.row = row;
        self.col = 1;
        self.start = (row, 1);
        self.buffer.clear();
        self.quote_depth = 0;
        self.comment = CommentState::default();
    }

    /// When off, comment tokens are skipped by [`Lexer::next_token`]
    pub fn set_emit_comments(&mut self, on: bool) {
        self.emit_comments = on;
    }

    /// Packed mode reports unterminated strings and comments as errors
    pub fn set_packed(&mut self, on: bool) {
        self.packed = on;
    }

    /// Enters a quoted form: `%` is an ordinary atom character until the
    /// matching [`Lexer::end_quote`]
    pub fn start_quote(&mut self) {
        self.quote_depth += 1;
    }

    /// Leaves a quoted form
    pub fn end_quote(&mut self) {
        self.quote_depth = self.quote_depth.saturating_sub(1);
    }

    /// Position of the next character
    pub fn position(&self) -> RowCol {
        RowCol::new(self.row, self.col)
    }

    /// Comment nesting left by the last comment scan
    pub fn comment_state(&self) -> &CommentState {
        &self.comment
    }

    /// Sets the nesting [`Lexer::read_partial_comment`] resumes with
    pub fn set_comment_state(&mut self, state: CommentState) {
        self.comment = state;
    }

    /// Returns the next token, `Eof` at the end of input
    pub fn next_token(&mut self) -> Token {
        if let Some(t) = self.buffer.pop_back() {
            return t;
        }
        let mut t = self.next_token_imp();
        if !self.emit_comments {
            while matches!(t.kind, TokenKind::Comment | TokenKind::CommentOpen) {
                t = self.next_token_imp();
            }
        }
        t
    }

    /// Pushes a token back; it is returned by the next [`Lexer::next_token`]
    pub fn unget(&mut self, token: Token) {
        self.buffer.push_front(token);
    }

    /// Lexes a complete buffer, stopping at the end or at the first error
    pub fn tokens(&mut self, source: &[u8], path: Option<&str>) -> Result<Vec<Token>> {
        self.set_source(source, path);
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            match t.kind {
                TokenKind::Eof => return Ok(tokens),
                TokenKind::Invalid => return Err(t.to_error()),
                _ => tokens.push(t),
            }
        }
    }

    /// Continues a string left open on a previous line: scans up to the
    /// closing quote, returning `String`, or `DblQuote` when the line ends first
    pub fn read_partial_string(&mut self) -> Token {
        self.start = (self.row, self.col);
        let mut value = Vec::new();
        let (len, closed) = self.scan_string_body(&mut value);
        let kind = if closed {
            TokenKind::String
        } else {
            TokenKind::DblQuote
        };
        self.token(kind, len, value)
    }

    /// Continues a comment left open on a previous line using the nesting
    /// set by [`Lexer::set_comment_state`]
    pub fn read_partial_comment(&mut self) -> Token {
        self.start = (self.row, self.col);
        let mut value = Vec::new();
        let mut len = 0;
        let mut state = std::mem::take(&mut self.comment);
        let end = self.scan_comment_body(&mut state, &mut value, &mut len);
        self.finish_comment(end, state, len, value)
    }

    fn next_token_imp(&mut self) -> Token {
        self.skip_whitespace();
        self.start = (self.row, self.col);
        let c = match self.readc() {
            Some(c) => c,
            None => return self.token(TokenKind::Eof, 0, Vec::new()),
        };
        match c {
            b'0'..=b'9' => {
                self.ungetc(c);
                self.number()
            }
            b'+' | b'-' | b'.' => {
                let digit_follows = self.peekc().map_or(false, |d| d.is_ascii_digit());
                self.ungetc(c);
                if digit_follows {
                    self.number()
                } else {
                    self.atom()
                }
            }
            b'"' => self.string(),
            b'(' if self.peekc() == Some(b'*') => self.comment(),
            b'(' => self.token(TokenKind::LParen, 1, vec![c]),
            b'[' => self.token(TokenKind::LBracket, 1, vec![c]),
            b')' => self.token(TokenKind::RParen, 1, vec![c]),
            b']' => self.token(TokenKind::RBracket, 1, vec![c]),
            _ => {
                self.ungetc(c);
                self.atom()
            }
        }
    }

    fn token(&self, kind: TokenKind, len: usize, value: Vec<u8>) -> Token {
        let mut t = Token::new(kind, RowCol::new(self.start.0, self.start.1), len, value);
        t.source = self.path.clone();
        t
    }

    fn invalid(&self, kind: LexErrorKind, len: usize, message: &str) -> Token {
        let mut t = Token::invalid(kind, RowCol::new(self.start.0, self.start.1), len, message);
        t.source = self.path.clone();
        t
    }

    fn next_byte(&mut self) -> Option<u8> {
        let c = *self.source.get(self.offset)?;
        self.offset += 1;
        if c == b'\r' {
            if self.source.get(self.offset) == Some(&b'\n') {
                self.offset += 1;
            }
            return Some(b'\n');
        }
        Some(c)
    }

    /// Reads the next meaningful character; clutter bytes are dropped
    fn readc(&mut self) -> Option<u8> {
        if let Some(c) = self.pushback.pop() {
            if c != CTRL_F {
                self.col += 1;
            }
            return Some(c);
        }
        loop {
            let c = self.next_byte()?;
            if c == b'\n' {
                self.row += 1;
                self.col = 1;
                return Some(c);
            }
            if c == CTRL_F {
                return Some(c);
            }
            if is_space(c) || is_print(c) {
                self.col += 1;
                return Some(c);
            }
        }
    }

    fn peekc(&self) -> Option<u8> {
        if let Some(&c) = self.pushback.last() {
            return Some(c);
        }
        let mut offset = self.offset;
        while let Some(&c) = self.source.get(offset) {
            if c == b'\r' {
                return Some(b'\n');
            }
            if c == CTRL_F || is_space(c) || is_print(c) {
                return Some(c);
            }
            offset += 1;
        }
        None
    }

    /// Whitespace is never pushed back; it is skipped before every token anyway
    fn ungetc(&mut self, c: u8) {
        if is_space(c) {
            return;
        }
        if c != CTRL_F {
            self.col -= 1;
        }
        self.pushback.push(c);
    }

    fn ungetstr(&mut self, s: &[u8]) {
        for &c in s.iter().rev() {
            self.ungetc(c);
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.readc() {
            if c == CTRL_F {
                self.skip_control_operand();
            } else if !is_space(c) {
                self.ungetc(c);
                return;
            }
        }
    }

    fn skip_control_operand(&mut self) {
        let c = match self.pushback.pop() {
            Some(c) => Some(c),
            None => self.next_byte(),
        };
        match c {
            Some(b'\n') => {
                self.row += 1;
                self.col = 1;
            }
            Some(c) if is_print(c) || is_space(c) => self.col += 1,
            _ => {}
        }
    }

    fn number(&mut self) -> Token {
        #[derive(PartialEq)]
        enum Status {
            Idle,
            DecSeq,
            DecOrOctSeq,
            Fraction,
            Exponent,
            Exponent2,
        }

        let mut status = Status::Idle;
        let mut number = Vec::new();
        let mut c = self.readc();
        number.extend(c);
        if matches!(c, Some(b'+' | b'-')) {
            status = Status::DecOrOctSeq;
            c = self.readc();
            number.extend(c);
        } else if c == Some(b'.') {
            status = Status::Fraction;
            c = self.readc();
            number.extend(c);
        }

        loop {
            let digit = c.filter(u8::is_ascii_digit);
            match status {
                Status::Idle => {
                    status = match digit {
                        Some(b'8' | b'9') => Status::DecSeq,
                        _ => Status::DecOrOctSeq,
                    }
                }
                Status::DecOrOctSeq | Status::DecSeq => {
                    if c == Some(b'Q') {
                        if status == Status::DecSeq {
                            return self.invalid(
                                LexErrorKind::InvalidNumber,
                                number.len(),
                                "invalid octal number",
                            );
                        }
                        return self.token(TokenKind::Integer, number.len(), number);
                    } else if c == Some(b'.') {
                        status = Status::Fraction;
                    } else if c == Some(b'E') {
                        status = Status::Exponent;
                    } else if ends_atom(c) {
                        return self.finish_number(TokenKind::Integer, number, c);
                    } else if digit.is_none() {
                        self.ungetstr(&number);
                        return self.atom();
                    } else if matches!(digit, Some(b'8' | b'9')) {
                        status = Status::DecSeq;
                    }
                }
                Status::Fraction => {
                    if c == Some(b'E') {
                        status = Status::Exponent;
                    } else if ends_atom(c) {
                        return self.finish_number(TokenKind::Float, number, c);
                    } else if digit.is_none() {
                        self.ungetstr(&number);
                        return self.atom();
                    }
                }
                Status::Exponent => {
                    if matches!(c, Some(b'+' | b'-')) || digit.is_some() {
                        status = Status::Exponent2;
                    } else {
                        return self.invalid(
                            LexErrorKind::InvalidNumber,
                            number.len(),
                            "invalid exponent",
                        );
                    }
                }
                Status::Exponent2 => {
                    if ends_atom(c) {
                        return self.finish_number(TokenKind::Float, number, c);
                    } else if digit.is_none() {
                        self.ungetstr(&number);
                        return self.atom();
                    }
                }
            }
            c = self.readc();
            number.extend(c);
        }
    }

    /// Drops the delimiter that ended the number and hands it back
    fn finish_number(&mut self, kind: TokenKind, mut number: Vec<u8>, delimiter: Option<u8>) -> Token {
        if let Some(d) = delimiter {
            number.pop();
            self.ungetc(d);
        }
        let t = self.token(kind, number.len(), number);
        if kind == TokenKind::Float && t.float().is_err() {
            return self.invalid(LexErrorKind::InvalidNumber, t.len as usize, "invalid float");
        }
        t
    }

    fn atom(&mut self) -> Token {
        let mut name = Vec::new();
        let mut extra = 0;
        while let Some(mut c) = self.readc() {
            if c == b'%' && self.quote_depth == 0 {
                extra += 1;
                match self.readc() {
                    Some(escaped) => c = escaped,
                    None => break,
                }
            } else if is_atom_delimiter(c) || !is_print(c) {
                self.ungetc(c);
                break;
            }
            name.push(c);
        }
        let atom = self.interner.intern(&name);
        let mut t = self.token(TokenKind::Atom, name.len() + extra, name);
        t.atom = Some(atom);
        t
    }

    /// Opening quote already consumed
    fn string(&mut self) -> Token {
        let mut value = Vec::new();
        let (len, closed) = self.scan_string_body(&mut value);
        let len = len + 1;
        if closed {
            self.token(TokenKind::String, len, value)
        } else if self.packed {
            self.invalid(LexErrorKind::UnterminatedString, len, "unterminated string")
        } else {
            self.token(TokenKind::DblQuote, len, value)
        }
    }

    /// Returns the footprint scanned and whether the closing quote was found
    fn scan_string_body(&mut self, value: &mut Vec<u8>) -> (usize, bool) {
        let mut len = 0;
        while let Some(c) = self.readc() {
            match c {
                CTRL_F => continue,
                b'%' => {
                    len += 1;
                    match self.readc() {
                        Some(escaped) => {
                            value.push(escaped);
                            len += 1;
                        }
                        None => break,
                    }
                }
                b'"' => return (len + 1, true),
                _ => {
                    value.push(c);
                    len += 1;
                }
            }
        }
        (len, false)
    }

    /// `(` consumed, `*` next
    fn comment(&mut self) -> Token {
        let mut value = vec![b'('];
        let mut len = 1;
        value.extend(self.readc());
        len += 1;
        let mut state = CommentState::default();
        let end = self.scan_comment_body(&mut state, &mut value, &mut len);
        self.finish_comment(end, state, len, value)
    }

    fn finish_comment(&mut self, end: CommentEnd, state: CommentState, len: usize, value: Vec<u8>) -> Token {
        match end {
            CommentEnd::Closed | CommentEnd::ClosedByBracket => {
                self.comment = CommentState::default();
                self.token(TokenKind::Comment, len, value)
            }
            CommentEnd::Mismatched => {
                self.comment = CommentState::default();
                self.invalid(
                    LexErrorKind::MismatchedBracket,
                    len,
                    "unterminated bracket in comment",
                )
            }
            CommentEnd::Open => {
                self.comment = state;
                if self.packed {
                    self.invalid(LexErrorKind::UnterminatedComment, len, "unterminated comment")
                } else {
                    self.token(TokenKind::CommentOpen, len, value)
                }
            }
        }
    }

    fn scan_comment_body(&mut self, state: &mut CommentState, value: &mut Vec<u8>, len: &mut usize) -> CommentEnd {
        while let Some(c) = self.readc() {
            match c {
                CTRL_F => continue,
                b'%' => {
                    *len += 1;
                    match self.readc() {
                        Some(escaped) => {
                            value.push(escaped);
                            *len += 1;
                        }
                        None => return CommentEnd::Open,
                    }
                    continue;
                }
                b'"' => state.in_string = !state.in_string,
                _ if state.in_string => {}
                b'(' => state.open(false),
                b'[' => state.open(true),
                b']' => {
                    if !state.close_bracket() {
                        // closes the comment and stays in the input, so it
                        // can go on closing lists up to the matching '['
                        self.ungetc(c);
                        value.push(b')');
                        *len += 1;
                        return CommentEnd::ClosedByBracket;
                    }
                }
                b')' => {
                    if state.level == 0 {
                        if !state.brackets.is_empty() {
                            return CommentEnd::Mismatched;
                        }
                        value.push(c);
                        *len += 1;
                        return CommentEnd::Closed;
                    }
                    state.level -= 1;
                }
                _ => {}
            }
            value.push(c);
            *len += 1;
        }
        CommentEnd::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn lexer() -> Lexer {
        Lexer::new(Interner::shared())
    }

    fn lex(source: &str) -> Vec<Token> {
        let mut l = lexer();
        l.set_emit_comments(true);
        l.tokens(source.as_bytes(), None).unwrap()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).iter().map(|t| t.kind).collect()
    }

    fn first(source: &str) -> Token {
        let mut l = lexer();
        l.set_emit_comments(true);
        l.set_source(source.as_bytes(), None);
        l.next_token()
    }

    #[test]
    fn test_simple_sexpr() {
        let tokens = lex("(PLUS 1 2)");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].kind, TokenKind::LParen);
        assert_eq!(tokens[1].kind, TokenKind::Atom);
        assert_eq!(tokens[1].value, b"PLUS");
        assert_eq!(tokens[2].integer().unwrap(), 1);
        assert_eq!(tokens[3].integer().unwrap(), 2);
        assert_eq!(tokens[4].kind, TokenKind::RParen);
    }

    #[test]
    fn test_positions() {
        let tokens = lex("(A\n  BC)");
        assert_eq!(tokens[0].pos, RowCol::new(1, 1));
        assert_eq!(tokens[1].pos, RowCol::new(1, 2));
        assert_eq!(tokens[2].pos, RowCol::new(2, 3));
        assert_eq!(tokens[2].len, 2);
        assert_eq!(tokens[3].pos, RowCol::new(2, 5));
    }

    #[test]
    fn test_crlf_is_one_line_break() {
        let tokens = lex("A\r\nB\rC");
        assert_eq!(tokens[1].pos, RowCol::new(2, 1));
        assert_eq!(tokens[2].pos, RowCol::new(3, 1));
    }

    #[test]
    fn test_atom_interned() {
        let mut l = lexer();
        let tokens = l.tokens(b"FOO BAR FOO", None).unwrap();
        assert_eq!(tokens[0].atom, tokens[2].atom);
        assert_ne!(tokens[0].atom, tokens[1].atom);
        assert_eq!(l.interner().len(), 2);
    }

    #[test]
    fn test_escaped_atom() {
        let t = first("A%(B%%C ");
        assert_eq!(t.kind, TokenKind::Atom);
        assert_eq!(t.value, b"A(B%C");
        assert_eq!(t.len as usize, t.value.len() + 2);
    }

    #[test]
    fn test_quote_mode_keeps_percent() {
        let mut l = lexer();
        l.set_source(b"A%B", None);
        l.start_quote();
        let t = l.next_token();
        l.end_quote();
        assert_eq!(t.value, b"A%B");
        assert_eq!(t.len, 3);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(first("42").integer().unwrap(), 42);
        assert_eq!(first("-7 ").integer().unwrap(), -7);
        assert_eq!(first("17Q").integer().unwrap(), 15);
        assert_eq!(first("17Q").len, 3);
        assert_eq!(first("1.5)").float().unwrap(), 1.5);
        assert_eq!(first(".25").float().unwrap(), 0.25);
        assert_eq!(first("1E3").float().unwrap(), 1000.0);
        assert_eq!(first("2.5E-1 ").float().unwrap(), 0.25);
    }

    #[test]
    fn test_number_followed_by_paren() {
        assert_eq!(
            kinds("(1)"),
            vec![TokenKind::LParen, TokenKind::Integer, TokenKind::RParen]
        );
    }

    #[test]
    fn test_invalid_octal() {
        let t = first("19Q");
        assert_eq!(t.kind, TokenKind::Invalid);
        assert_eq!(t.error, Some(LexErrorKind::InvalidNumber));
        assert_eq!(first("-9Q").kind, TokenKind::Invalid);
    }

    #[test]
    fn test_invalid_exponent() {
        let t = first("1EX");
        assert_eq!(t.kind, TokenKind::Invalid);
        assert_eq!(t.error, Some(LexErrorKind::InvalidNumber));
    }

    #[test]
    fn test_malformed_numbers_become_atoms() {
        for text in ["1A", "1.2.3", "12QQ1", "+1-", "3.5X"] {
            let t = first(text);
            if text == "12QQ1" {
                // the octal literal ends at its Q
                assert_eq!(t.kind, TokenKind::Integer);
                continue;
            }
            assert_eq!(t.kind, TokenKind::Atom, "{}", text);
            assert_eq!(t.value, text.as_bytes());
        }
    }

    #[test]
    fn test_sign_without_digit_is_atom() {
        let tokens = lex("(A . B) (+ 1)");
        assert_eq!(tokens[2].value, b".");
        assert_eq!(tokens[6].value, b"+");
        assert_eq!(tokens[7].integer().unwrap(), 1);
    }

    #[test]
    fn test_string() {
        let t = first("\"a %\"b\" X");
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(t.value, b"a \"b");
        assert_eq!(t.len, 7);
    }

    #[test]
    fn test_multiline_string() {
        let tokens = lex("\"ab\ncd\" E");
        assert_eq!(tokens[0].value, b"ab\ncd");
        assert_eq!(tokens[0].len, 7);
        assert_eq!(tokens[1].pos, RowCol::new(2, 5));
    }

    #[test]
    fn test_unterminated_string_packed() {
        let mut l = lexer();
        let err = l.tokens(b"(A \"open", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Lex {
                kind: LexErrorKind::UnterminatedString,
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_string_unpacked() {
        let mut l = lexer();
        l.set_packed(false);
        l.set_source(b"\"open", None);
        let t = l.next_token();
        assert_eq!(t.kind, TokenKind::DblQuote);
        assert_eq!(t.len, 5);
        assert_eq!(t.value, b"open");
    }

    #[test]
    fn test_comment_nests() {
        let tokens = lex("(* a (b) \"c)\" [d] *) X");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].value, b"(* a (b) \"c)\" [d] *)");
        assert_eq!(tokens[0].len, 20);
        assert_eq!(tokens[1].value, b"X");
    }

    #[test]
    fn test_comments_filtered_by_default() {
        let mut l = lexer();
        let tokens = l.tokens(b"(* note) A", None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, b"A");
    }

    #[test]
    fn test_unmatched_bracket_closes_comment() {
        let tokens = lex("[A (* x ]");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LBracket,
                TokenKind::Atom,
                TokenKind::Comment,
                TokenKind::RBracket
            ]
        );
        assert_eq!(tokens[2].value, b"(* x )");
        assert_eq!(tokens[2].len, 6);
        assert_eq!(tokens[3].pos, RowCol::new(1, 9));
    }

    #[test]
    fn test_mismatched_bracket_in_comment() {
        // the ')' closes the '[' level, the second one finds the stale bracket
        let t = first("(* [ ) )");
        assert_eq!(t.kind, TokenKind::Invalid);
        assert_eq!(t.error, Some(LexErrorKind::MismatchedBracket));
    }

    #[test]
    fn test_bracket_closed_by_paren_stays_open() {
        // the '[' popped by the first ')' is still pending when the
        // comment's own ')' arrives
        let mut l = lexer();
        l.set_emit_comments(true);
        l.set_source(b"(* [ ) ( ) ) X", None);
        let t = l.next_token();
        assert_eq!(t.kind, TokenKind::Invalid);
        assert_eq!(t.error, Some(LexErrorKind::MismatchedBracket));
        assert_eq!(t.value, b"unterminated bracket in comment");
    }

    #[test]
    fn test_brackets_tracked_past_32_levels() {
        let source = format!("(* {} [ ] {}) X", "(".repeat(40), ")".repeat(40));
        let tokens = lex(&source);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].value, b"X");
    }

    #[test]
    fn test_bracket_mask_round_trip() {
        let state = CommentState {
            level: 4,
            brackets: vec![0, 2, 40],
            in_string: false,
        };
        assert_eq!(state.bracket_mask(), 0b101);
        assert_eq!(CommentState::from_mask(4, 0b101, false).brackets, vec![0, 2]);
    }

    #[test]
    fn test_unterminated_comment() {
        assert_eq!(first("(* abc").error, Some(LexErrorKind::UnterminatedComment));

        let mut l = lexer();
        l.set_packed(false);
        l.set_emit_comments(true);
        l.set_source(b"(* a [b", None);
        let t = l.next_token();
        assert_eq!(t.kind, TokenKind::CommentOpen);
        assert_eq!(l.comment_state().level, 1);
        assert_eq!(l.comment_state().brackets, vec![0]);
    }

    #[test]
    fn test_clutter_is_dropped() {
        let tokens = lex("A\x01B \x06\x01C");
        assert_eq!(tokens[0].value, b"AB");
        assert_eq!(tokens[1].value, b"C");
    }

    #[test]
    fn test_control_pair_ends_atom() {
        let tokens = lex("FOO\x06XBAR");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].value, b"FOO");
        assert_eq!(tokens[1].value, b"BAR");
    }

    #[test]
    fn test_unget_returns_same_token() {
        let mut l = lexer();
        l.set_source(b"A B", None);
        let a = l.next_token();
        l.unget(a.clone());
        assert_eq!(l.next_token(), a);
        assert_eq!(l.next_token().value, b"B");
        assert!(l.next_token().is_eof());
    }

    #[test]
    fn test_source_path_on_tokens() {
        let mut l = lexer();
        let tokens = l.tokens(b"X", Some("LISP/FOO")).unwrap();
        assert_eq!(tokens[0].source.as_deref(), Some("LISP/FOO"));
    }
}
