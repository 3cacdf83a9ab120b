use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock, Weak};

use crate::intern::Atom;
use crate::position::RowCol;

/// An S-expression value
///
/// Cloning shares `String` and `List` payloads; a payload is freed when its
/// last handle is dropped.
#[derive(Debug, Clone, Default)]
pub enum Object {
    /// Empty value, also the result of a failed parse
    #[default]
    Nil,
    /// Integer of at most 50 bits magnitude
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Interned atom, compared by identity
    Atom(Atom),
    /// String literal
    String(Arc<StringBuf>),
    /// `( ... )` or `[ ... ]` list
    List(Arc<ListNode>),
}

impl Object {
    /// Wraps string bytes
    pub fn string(bytes: Vec<u8>) -> Self {
        Object::String(Arc::new(StringBuf { bytes }))
    }

    /// True for [`Object::Nil`]
    pub fn is_nil(&self) -> bool {
        matches!(self, Object::Nil)
    }

    /// The atom, if this is one
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Object::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// The list node, if this is a list
    pub fn as_list(&self) -> Option<&Arc<ListNode>> {
        match self {
            Object::List(l) => Some(l),
            _ => None,
        }
    }

    /// The integer, if this is one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is one
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Object::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string bytes, if this is a string
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Name of the variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Nil => "nil",
            Object::Integer(_) => "integer",
            Object::Float(_) => "float",
            Object::Atom(_) => "atom",
            Object::String(_) => "string",
            Object::List(_) => "list",
        }
    }

    /// Multi-line dump of the tree; every element but the last of a list is
    /// followed by its source position as `(*row:col)`. The root list is
    /// printed without parentheses.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, level: usize) -> fmt::Result {
        let list = match self {
            Object::List(list) => list,
            other => return write!(out, "{}", other),
        };
        let nested = list.outer().is_some();
        if nested {
            out.push('(');
        }
        let n = list.elements.len();
        for (i, element) in list.elements.iter().enumerate() {
            if i > 0 {
                out.push_str(&" ".repeat(level * 3));
            }
            element.render_into(out, level + 1)?;
            if n > 1 && i < n - 1 {
                let pos = list.element_positions[i];
                writeln!(out, " (*{}:{})", pos.row(), pos.col())?;
            }
        }
        if nested {
            out.push(')');
        }
        Ok(())
    }
}

impl PartialEq for Object {
    /// Strings compare by content, lists by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Nil, Object::Nil) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::Atom(a), Object::Atom(b)) => a == b,
            (Object::String(a), Object::String(b)) => a.bytes == b.bytes,
            (Object::List(a), Object::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Short one-line summary; lists show as `( FIRST ... N )`
impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Nil => f.write_str("NIL"),
            Object::Integer(i) => write!(f, "{}", i),
            Object::Float(x) => write!(f, "{}", x),
            Object::Atom(a) => write!(f, "{}", a),
            Object::String(s) => f.write_str(&s.text()),
            Object::List(l) => match l.elements.first() {
                None => f.write_str("()"),
                Some(first) => write!(f, "( {} ... {} )", first, l.elements.len()),
            },
        }
    }
}

/// Payload of a string object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringBuf {
    bytes: Vec<u8>,
}

impl StringBuf {
    /// Raw bytes, escapes removed
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lossy text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A list with the source position of each element
///
/// The back link to the enclosing list does not own it. It is set once,
/// when the enclosing list is complete; the top-level list of a file has none.
#[derive(Debug, Default)]
pub struct ListNode {
    /// Elements in source order
    pub elements: Vec<Object>,
    /// Start of each element, parallel to `elements`
    pub element_positions: Vec<RowCol>,
    /// Position of the closing delimiter
    pub end: RowCol,
    outer: OnceLock<Weak<ListNode>>,
}

impl ListNode {
    /// Creates an empty list inside `outer`
    pub fn new(outer: Weak<ListNode>) -> Self {
        ListNode {
            elements: Vec::new(),
            element_positions: Vec::new(),
            end: RowCol::INVALID,
            outer: OnceLock::from(outer),
        }
    }

    /// Links this list to its enclosing list; a list already linked keeps
    /// its first link
    pub fn set_outer(&self, outer: Weak<ListNode>) {
        let _ = self.outer.set(outer);
    }

    /// Appends an element read at `pos`
    pub fn push(&mut self, element: Object, pos: RowCol) {
        self.elements.push(element);
        self.element_positions.push(pos);
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True for `()`
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element when it is an atom
    pub fn first_atom(&self) -> Option<&Atom> {
        self.elements.first().and_then(Object::as_atom)
    }

    /// The enclosing list, `None` for the root or once it was dropped
    pub fn outer(&self) -> Option<Arc<ListNode>> {
        self.outer.get().and_then(Weak::upgrade)
    }

    /// First element of the enclosing list, `Nil` if there is none
    pub fn outer_first(&self) -> Object {
        self.outer()
            .and_then(|outer| outer.elements.first().cloned())
            .unwrap_or_default()
    }

    /// Position of this list's opening delimiter, looked up in the enclosing
    /// list; invalid for the root
    pub fn start(&self) -> RowCol {
        let outer = match self.outer() {
            Some(outer) => outer,
            None => return RowCol::INVALID,
        };
        outer
            .elements
            .iter()
            .position(|e| matches!(e, Object::List(l) if std::ptr::eq(Arc::as_ptr(l), self)))
            .and_then(|i| outer.element_positions.get(i).copied())
            .unwrap_or(RowCol::INVALID)
    }
}

impl Drop for ListNode {
    // Nested lists are released from a work list so that dropping a deep
    // tree does not recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.elements);
        while let Some(element) = pending.pop() {
            if let Object::List(list) = element {
                if let Ok(mut node) = Arc::try_unwrap(list) {
                    pending.append(&mut node.elements);
                }
            }
        }
    }
}
