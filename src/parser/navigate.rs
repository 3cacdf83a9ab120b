use std::sync::Arc;

use super::object::{ListNode, Object};
use crate::position::RowCol;

/// Result of a position lookup: the innermost list containing the position
/// and, when the position is on an atom, that atom's index
#[derive(Debug, Clone)]
pub struct NodeAt {
    /// Innermost enclosing list
    pub list: Arc<ListNode>,
    /// Matched element, `None` on the list's delimiters or whitespace
    pub index: Option<usize>,
}

impl NodeAt {
    /// The matched element
    pub fn element(&self) -> Option<&Object> {
        self.index.and_then(|i| self.list.elements.get(i))
    }

    /// Start of the matched element
    pub fn position(&self) -> Option<RowCol> {
        self.index.and_then(|i| self.list.element_positions.get(i).copied())
    }
}

fn list_contains(start: RowCol, end: RowCol, line: u32, col: u32) -> bool {
    let (r, e) = ((start.row(), start.col()), (end.row(), end.col()));
    (line > r.0 && line < e.0)
        || (line == r.0 && r.0 == e.0 && col >= r.1 && col <= e.1)
        || (line == r.0 && r.0 != e.0 && col >= r.1)
        || (line == e.0 && r.0 != e.0 && col <= e.1)
}

/// Finds the innermost list and atom at 1-based `line`/`col`
///
/// Numbers and strings are never matched.
pub fn find_node_at(list: &Arc<ListNode>, line: u32, col: u32) -> NodeAt {
    let mut current = list.clone();
    loop {
        let mut inner = None;
        for (i, (element, &pos)) in current.elements.iter().zip(&current.element_positions).enumerate() {
            match element {
                Object::Atom(atom) => {
                    let start = pos.col();
                    if line == pos.row() && col >= start && col < start + atom.display_len() as u32 {
                        return NodeAt {
                            list: current.clone(),
                            index: Some(i),
                        };
                    }
                }
                Object::List(child) if list_contains(pos, child.end, line, col) => {
                    inner = Some(child.clone());
                    break;
                }
                _ => {}
            }
        }
        match inner {
            Some(child) => current = child,
            None => {
                return NodeAt {
                    list: current,
                    index: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::parser::Reader;

    fn ast(source: &str) -> Arc<ListNode> {
        let mut reader = Reader::new(Interner::shared());
        reader.parse(source.as_bytes(), None).unwrap();
        reader.ast().as_list().unwrap().clone()
    }

    fn atom_at(root: &Arc<ListNode>, line: u32, col: u32) -> Option<String> {
        find_node_at(root, line, col)
            .element()
            .and_then(Object::as_atom)
            .map(|a| a.name())
    }

    #[test]
    fn test_finds_atom() {
        let root = ast("(DEFINEQ (FOO (LAMBDA (X)\n  (PLUS X 1))))");
        assert_eq!(atom_at(&root, 1, 2).as_deref(), Some("DEFINEQ"));
        assert_eq!(atom_at(&root, 1, 12).as_deref(), Some("FOO"));
        assert_eq!(atom_at(&root, 2, 5).as_deref(), Some("PLUS"));
        assert_eq!(atom_at(&root, 2, 9).as_deref(), Some("X"));
    }

    #[test]
    fn test_atom_end_is_exclusive() {
        let root = ast("(AB C)");
        assert_eq!(atom_at(&root, 1, 3).as_deref(), Some("AB"));
        let hit = find_node_at(&root, 1, 4);
        assert_eq!(hit.index, None);
        assert_eq!(hit.list.len(), 2);
    }

    #[test]
    fn test_escaped_atom_width() {
        let root = ast("(A%(B X)");
        assert_eq!(atom_at(&root, 1, 5).as_deref(), Some("A(B"));
        assert_eq!(atom_at(&root, 1, 7).as_deref(), Some("X"));
    }

    #[test]
    fn test_numbers_and_strings_do_not_match() {
        let root = ast("(F 123 \"str\")");
        let hit = find_node_at(&root, 1, 5);
        assert_eq!(hit.index, None);
        assert_eq!(hit.list.first_atom().unwrap().name(), "F");
        assert_eq!(find_node_at(&root, 1, 9).index, None);
    }

    #[test]
    fn test_outside_any_list() {
        let root = ast("(A)\n\n(B)");
        let hit = find_node_at(&root, 2, 1);
        assert!(Arc::ptr_eq(&hit.list, &root));
        assert!(hit.index.is_none());
    }

    #[test]
    fn test_multiline_list_bounds() {
        let root = ast("(F\n   (G\n  H)  )");
        let hit = find_node_at(&root, 2, 10);
        assert_eq!(hit.list.first_atom().unwrap().name(), "G");
        let hit = find_node_at(&root, 3, 5);
        assert_eq!(hit.list.first_atom().unwrap().name(), "F");
        assert_eq!(hit.position(), None);
    }
}
