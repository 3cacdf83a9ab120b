use std::sync::Arc;

use super::object::{ListNode, Object};
use super::xref::{AtomTable, Ref, Role, Xref};
use crate::error::{Error, ParseErrorKind, Result};
use crate::intern::{Atom, Interner};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::position::RowCol;

/// Atoms the reader gives a meaning to
struct Keywords {
    nil: Atom,
    stop: Atom,
    defineq: Atom,
    quote: Atom,
    function: Atom,
    lambda: Atom,
    nlambda: Atom,
    prog: Atom,
    putprop: Atom,
    putprops: Atom,
    assignments: [Atom; 7],
    values: [Atom; 3],
}

impl Keywords {
    fn new(interner: &Interner) -> Self {
        let i = |name: &str| interner.intern_str(name);
        Keywords {
            nil: i("NIL"),
            stop: i("STOP"),
            defineq: i("DEFINEQ"),
            quote: i("QUOTE"),
            function: i("FUNCTION"),
            lambda: i("LAMBDA"),
            nlambda: i("NLAMBDA"),
            prog: i("PROG"),
            putprop: i("PUTPROP"),
            putprops: i("PUTPROPS"),
            assignments: ["PUTPROP", "PUTPROPS", "SET", "SETQ", "SETQQ", "RPAQ", "RPAQQ"].map(i),
            values: ["RPAQ", "RPAQQ", "SETQQ"].map(i),
        }
    }

    fn is_lambda(&self, atom: &Atom) -> bool {
        *atom == self.lambda || *atom == self.nlambda
    }
}

/// What the elements of a list bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    None,
    /// Parameter list of a lambda
    Params,
    /// Variable list of a `PROG`
    Locals,
    /// `(VAR INIT)` pair inside a `PROG` variable list
    LocalPair,
}

/// A list whose closing delimiter has not been read yet
struct Frame {
    node: ListNode,
    /// Position of the opening delimiter
    pos: RowCol,
    bracketed: bool,
    /// First atom of the enclosing list
    outer_first: Option<Atom>,
    binding: Binding,
    quoted: bool,
}

impl Frame {
    fn new(pos: RowCol, bracketed: bool, outer_first: Option<Atom>, binding: Binding, quoted: bool) -> Self {
        Frame {
            node: ListNode::default(),
            pos,
            bracketed,
            outer_first,
            binding,
            quoted,
        }
    }
}

/// `Some(true)` for `[`, `Some(false)` for `(`
fn opens_list(t: &Token) -> Option<bool> {
    match t.kind {
        TokenKind::LParen => Some(false),
        TokenKind::LBracket => Some(true),
        _ => None,
    }
}

/// Shares a completed list, pointing its element lists back at it
fn link_children(node: ListNode) -> Arc<ListNode> {
    Arc::new_cyclic(|me| {
        for element in &node.elements {
            if let Object::List(child) = element {
                child.set_outer(me.clone());
            }
        }
        node
    })
}

/// Everything a successful parse produced for one file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path given to [`Reader::parse`]
    pub path: Option<Arc<str>>,
    /// Top-level list
    pub ast: Object,
    /// Atom occurrences
    pub xref: Xref,
    /// Properties set by `PUTPROP` and friends
    pub atoms: AtomTable,
}

/// Builds the list tree, cross reference and property table of one file
///
/// The first error is kept: a failed reader answers every later
/// [`Reader::parse`] with the same error.
pub struct Reader {
    lexer: Lexer,
    keywords: Keywords,
    path: Option<Arc<str>>,
    ast: Object,
    xref: Xref,
    atoms: AtomTable,
    error: Option<Error>,
}

impl Reader {
    /// Creates a reader interning into `interner`
    pub fn new(interner: Arc<Interner>) -> Self {
        Reader {
            keywords: Keywords::new(&interner),
            lexer: Lexer::new(interner),
            path: None,
            ast: Object::Nil,
            xref: Xref::default(),
            atoms: AtomTable::default(),
            error: None,
        }
    }

    /// Parses a complete file
    ///
    /// Reading stops at the end of input or at a top-level `NIL` or `STOP`.
    /// On error the tree is discarded and [`Reader::ast`] is `Nil`.
    pub fn parse(&mut self, source: &[u8], path: Option<&str>) -> Result<()> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        tracing::debug!(path = path.unwrap_or("<memory>"), bytes = source.len(), "parsing");

        self.path = path.map(Arc::from);
        self.ast = Object::Nil;
        self.xref.clear();
        self.atoms.clear();
        self.lexer.set_source(source, path);

        match self.top_level() {
            Ok(root) => {
                let root = link_children(root);
                tracing::debug!(
                    path = path.unwrap_or("<memory>"),
                    elements = root.len(),
                    atoms = self.xref.len(),
                    refs = self.xref.ref_count(),
                    "parsed"
                );
                self.ast = Object::List(root);
                Ok(())
            }
            Err(error) => {
                tracing::debug!(path = path.unwrap_or("<memory>"), %error, "parse failed");
                self.xref.clear();
                self.atoms.clear();
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Top-level list of the last successful parse, `Nil` otherwise
    pub fn ast(&self) -> &Object {
        &self.ast
    }

    /// Atom occurrences of the last parse
    pub fn xref(&self) -> &Xref {
        &self.xref
    }

    /// Atom properties of the last parse
    pub fn atom_properties(&self) -> &AtomTable {
        &self.atoms
    }

    /// The kept error
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Message of the kept error
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(Error::message)
    }

    /// Position of the kept error, invalid if there is none
    pub fn error_position(&self) -> RowCol {
        self.error.as_ref().map_or(RowCol::INVALID, Error::position)
    }

    /// The intern table atoms go to
    pub fn interner(&self) -> &Arc<Interner> {
        self.lexer.interner()
    }

    /// Hands out the results of the last parse
    pub fn into_parsed(self) -> ParsedFile {
        ParsedFile {
            path: self.path,
            ast: self.ast,
            xref: self.xref,
            atoms: self.atoms,
        }
    }

    /// Reads top-level expressions into the root list
    ///
    /// Lists are read with an explicit stack of open frames, so nesting depth
    /// is bounded by memory and not by the call stack.
    fn top_level(&mut self) -> Result<ListNode> {
        let mut root = ListNode::default();
        let mut open: Vec<Frame> = Vec::new();
        loop {
            let frame = match open.last_mut() {
                Some(frame) => frame,
                None => {
                    let t = self.lexer.next_token();
                    if t.is_eof() {
                        return Ok(root);
                    }
                    let (pos, len) = (t.pos, t.len);
                    let first = root.first_atom().cloned();
                    if let Some(bracketed) = opens_list(&t) {
                        open.push(Frame::new(pos, bracketed, first, Binding::None, false));
                        continue;
                    }
                    let element = self.leaf(t)?;
                    if let Object::Atom(atom) = &element {
                        if *atom == self.keywords.nil || *atom == self.keywords.stop {
                            return Ok(root);
                        }
                        self.xref.record(atom, Ref { pos, len, role: Role::Use });
                    }
                    root.push(element, pos);
                    continue;
                }
            };

            // everything after a leading QUOTE is read verbatim
            let quoted = frame.quoted || frame.node.first_atom() == Some(&self.keywords.quote);
            if quoted {
                self.lexer.start_quote();
            }
            let t = self.lexer.next_token();
            if quoted {
                self.lexer.end_quote();
            }

            match t.kind {
                TokenKind::Eof => return Err(Error::UnexpectedEof { pos: t.pos }),
                TokenKind::Invalid => return Err(t.to_error()),
                TokenKind::RParen => {
                    frame.node.end = t.pos;
                    if frame.bracketed {
                        return Err(Error::parse(
                            ParseErrorKind::MalformedBracketNesting,
                            t.pos,
                            "terminating '[' by ')'",
                        ));
                    }
                    self.close(&mut open, &mut root);
                    continue;
                }
                TokenKind::RBracket => {
                    // closes every '(' list up to the nearest '['
                    frame.node.end = t.pos;
                    if !frame.bracketed {
                        self.lexer.unget(t);
                    }
                    self.close(&mut open, &mut root);
                    continue;
                }
                _ => {}
            }

            let (pos, len) = (t.pos, t.len);
            let index = frame.node.len();
            let first = frame.node.first_atom().cloned();
            if let Some(bracketed) = opens_list(&t) {
                let binding = match (&first, index) {
                    (Some(head), 1) if self.keywords.is_lambda(head) => Binding::Params,
                    (Some(head), 1) if *head == self.keywords.prog => Binding::Locals,
                    _ if frame.binding == Binding::Locals => Binding::LocalPair,
                    _ => Binding::None,
                };
                open.push(Frame::new(pos, bracketed, first, binding, quoted));
                continue;
            }

            let element = self.leaf(t)?;
            if let Object::Atom(atom) = &element {
                let role = self.role(atom, index, first.as_ref(), frame.outer_first.as_ref(), frame.binding);
                self.xref.record(atom, Ref { pos, len, role });
            }
            frame.node.push(element, pos);
        }
    }

    /// Completes the innermost open list and appends it to the list around it
    fn close(&mut self, open: &mut Vec<Frame>, root: &mut ListNode) {
        let frame = match open.pop() {
            Some(frame) => frame,
            None => return,
        };
        let node = link_children(frame.node);
        self.record_properties(&node);
        let outer = match open.last_mut() {
            Some(outer) => &mut outer.node,
            None => root,
        };
        outer.push(Object::List(node), frame.pos);
    }

    /// Converts a token that is not a list opener into an object
    fn leaf(&self, t: Token) -> Result<Object> {
        match t.kind {
            TokenKind::Integer => Ok(Object::Integer(t.integer()?)),
            TokenKind::Float => Ok(Object::Float(t.float()?)),
            TokenKind::String => Ok(Object::string(t.value)),
            TokenKind::Atom => match t.atom {
                Some(atom) => Ok(Object::Atom(atom)),
                None => Ok(Object::Atom(self.lexer.interner().intern(&t.value))),
            },
            TokenKind::RParen | TokenKind::RBracket => Err(Error::parse(
                ParseErrorKind::UnexpectedCloser,
                t.pos,
                format!("unexpected token '{}'", t.kind),
            )),
            TokenKind::Eof => Err(Error::UnexpectedEof { pos: t.pos }),
            _ => Err(t.to_error()),
        }
    }

    fn role(
        &self,
        atom: &Atom,
        index: usize,
        first: Option<&Atom>,
        outer_first: Option<&Atom>,
        binding: Binding,
    ) -> Role {
        let k = &self.keywords;
        match binding {
            Binding::Params => return Role::Param,
            Binding::Locals => return Role::Local,
            Binding::LocalPair if index == 0 => return Role::Local,
            _ => {}
        }
        if index == 0 {
            return if outer_first == Some(&k.defineq) {
                Role::Decl
            } else {
                Role::Call
            };
        }
        match first {
            Some(head) if index == 1 => {
                if k.assignments.contains(head) {
                    Role::Lhs
                } else if k.is_lambda(head) && *atom != k.nil {
                    Role::Param
                } else if *head == k.function {
                    Role::Func
                } else {
                    Role::Use
                }
            }
            _ => Role::Use,
        }
    }

    /// Fills the property table from a completed `PUTPROP`, `PUTPROPS`,
    /// `RPAQ`, `RPAQQ` or `SETQQ` form
    fn record_properties(&mut self, node: &ListNode) {
        let head = match node.first_atom() {
            Some(head) => head,
            None => return,
        };
        let k = &self.keywords;
        let e = &node.elements;
        if *head == k.putprop && e.len() == 4 {
            if let (Some(atom), Some(key)) = (self.quoted_atom(&e[1]), self.quoted_atom(&e[2])) {
                self.atoms.put_prop(atom, key, e[3].clone());
            }
        } else if *head == k.putprops && e.len() >= 6 && e.len() % 2 == 0 {
            if let Some(atom) = self.quoted_atom(&e[1]) {
                for pair in e[2..].chunks(2) {
                    if let Some(key) = self.quoted_atom(&pair[0]) {
                        self.atoms.put_prop(atom.clone(), key, pair[1].clone());
                    }
                }
            }
        } else if k.values.contains(head) && e.len() == 3 {
            if let Some(atom) = self.quoted_atom(&e[1]) {
                self.atoms.set_value(atom, e[2].clone());
            }
        }
    }

    /// `A` or `(QUOTE A)`
    fn quoted_atom(&self, object: &Object) -> Option<Atom> {
        match object {
            Object::Atom(atom) => Some(atom.clone()),
            Object::List(list) if list.len() == 2 && list.first_atom() == Some(&self.keywords.quote) => {
                list.elements[1].as_atom().cloned()
            }
            _ => None,
        }
    }
}
