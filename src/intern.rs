//! Atom interning
//!
//! Every atom read from source goes through an [`Interner`] so that later
//! comparisons are identity comparisons. One interner is meant to live for a
//! parsing session and can be shared between threads parsing different files.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Serialize, Serializer};

/// Canonical handle of an interned byte string.
///
/// Equality and hashing use the address of the shared cell, never the
/// content; two atoms from the same interner are equal iff their bytes are.
#[derive(Clone)]
pub struct Atom(Arc<[u8]>);

impl Atom {
    /// The atom's bytes as read (escapes removed)
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy textual form of the atom
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty atom
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Width of the atom as written in source, where every atom delimiter
    /// inside the name needs a `%` in front of it
    pub fn display_len(&self) -> usize {
        self.0
            .iter()
            .map(|&b| if crate::lexer::is_atom_delimiter(b) { 2 } else { 1 })
            .sum()
    }

    /// True when the atom's bytes equal `name`
    pub fn is(&self, name: &str) -> bool {
        &*self.0 == name.as_bytes()
    }

    fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.name())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// Session-scoped intern table
///
/// Backed by a sharded concurrent map; insertion of a new atom happens under
/// the shard's write lock, so racing `intern` calls for the same bytes agree
/// on one canonical cell.
#[derive(Default)]
pub struct Interner {
    cells: DashMap<Arc<[u8]>, ()>,
}

impl Interner {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table behind an `Arc`, ready to be shared by lexers
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the canonical atom for `bytes`, inserting it when new
    pub fn intern(&self, bytes: &[u8]) -> Atom {
        if let Some(found) = self.cells.get(bytes) {
            return Atom(found.key().clone());
        }
        let entry = self.cells.entry(Arc::from(bytes)).or_insert(());
        Atom(entry.key().clone())
    }

    /// Interns a textual name
    pub fn intern_str(&self, name: &str) -> Atom {
        self.intern(name.as_bytes())
    }

    /// Looks up an atom without inserting it
    pub fn get(&self, bytes: &[u8]) -> Option<Atom> {
        self.cells.get(bytes).map(|found| Atom(found.key().clone()))
    }

    /// Number of distinct atoms
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when nothing was interned yet
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All interned names, sorted; used for atom name completion
    pub fn all_interned(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cells
            .iter()
            .map(|cell| String::from_utf8_lossy(cell.key()).into_owned())
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_twice_is_identical() {
        let table = Interner::new();
        let a = table.intern(b"DEFINEQ");
        let b = table.intern(b"DEFINEQ");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_equal_content_from_other_table_differs() {
        let one = Interner::new();
        let two = Interner::new();
        assert_ne!(one.intern(b"FOO"), two.intern(b"FOO"));
    }

    #[test]
    fn test_get_does_not_insert() {
        let table = Interner::new();
        assert!(table.get(b"X").is_none());
        let x = table.intern(b"X");
        assert_eq!(table.get(b"X"), Some(x));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_all_interned_sorted() {
        let table = Interner::new();
        for name in ["SETQ", "CAR", "LAMBDA"] {
            table.intern_str(name);
        }
        assert_eq!(table.all_interned(), vec!["CAR", "LAMBDA", "SETQ"]);
    }

    #[test]
    fn test_display_len_counts_escapes() {
        let table = Interner::new();
        assert_eq!(table.intern(b"A(B").display_len(), 4);
        assert_eq!(table.intern(b"AB").display_len(), 2);
    }

    #[test]
    fn test_concurrent_intern_agrees() {
        let table = Interner::shared();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .map(|i| table.intern(format!("ATOM{}", i % 50).as_bytes()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<Atom>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for atoms in &results[1..] {
            assert_eq!(atoms, &results[0]);
        }
        assert_eq!(table.len(), 50);
    }
}
