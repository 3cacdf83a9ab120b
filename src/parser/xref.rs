use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize, Serializer};

use super::object::Object;
use crate::intern::Atom;
use crate::position::RowCol;

/// How an atom occurrence is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Any other occurrence
    Use,
    /// First element of a list
    Call,
    /// Function name directly under `DEFINEQ`
    Decl,
    /// Target of `SETQ`, `RPAQQ`, `PUTPROPS` and friends
    Lhs,
    /// Argument of `(FUNCTION x)`
    Func,
    /// Parameter of a `LAMBDA`/`NLAMBDA`
    Param,
    /// Variable bound by `PROG`
    Local,
}

/// One occurrence of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    /// Start of the occurrence
    pub pos: RowCol,
    /// Length in the source
    pub len: u16,
    /// Use at this occurrence
    pub role: Role,
}

/// Cross reference of one file: atom to occurrences in parse order
#[derive(Debug, Clone, Default)]
pub struct Xref {
    refs: HashMap<Atom, Vec<Ref>>,
}

impl Xref {
    /// Records an occurrence
    pub fn record(&mut self, atom: &Atom, r: Ref) {
        self.refs.entry(atom.clone()).or_default().push(r);
    }

    /// Occurrences of `atom`, empty if it does not occur
    pub fn refs(&self, atom: &Atom) -> &[Ref] {
        self.refs.get(atom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over all atoms and their occurrences
    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &Vec<Ref>)> {
        self.refs.iter()
    }

    /// Number of distinct atoms
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// True when no atom was recorded
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Total number of occurrences
    pub fn ref_count(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }

    /// Forgets every occurrence
    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

/// Serialized as a name-sorted map
impl Serialize for Xref {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let sorted: BTreeMap<String, &Vec<Ref>> =
            self.refs.iter().map(|(atom, refs)| (atom.name(), refs)).collect();
        sorted.serialize(serializer)
    }
}

/// Properties attached to an atom by `PUTPROP`, `PUTPROPS`, `RPAQ`, `RPAQQ`
/// and `SETQQ`
#[derive(Debug, Clone, Default)]
pub struct AtomProps {
    /// Top-level value
    pub value: Object,
    /// Property list
    pub props: HashMap<Atom, Object>,
    /// Reserved; no form fills it
    pub vector: Vec<Object>,
}

/// Atom property table of one file
#[derive(Debug, Clone, Default)]
pub struct AtomTable {
    atoms: HashMap<Atom, AtomProps>,
}

impl AtomTable {
    /// Properties of `atom`
    pub fn get(&self, atom: &Atom) -> Option<&AtomProps> {
        self.atoms.get(atom)
    }

    /// Property `key` of `atom`
    pub fn prop(&self, atom: &Atom, key: &Atom) -> Option<&Object> {
        self.atoms.get(atom).and_then(|p| p.props.get(key))
    }

    /// Adds or overwrites a property
    pub fn put_prop(&mut self, atom: Atom, key: Atom, value: Object) {
        self.atoms.entry(atom).or_default().props.insert(key, value);
    }

    /// Sets the atom's value
    pub fn set_value(&mut self, atom: Atom, value: Object) {
        self.atoms.entry(atom).or_default().value = value;
    }

    /// Iterates over all atoms with properties
    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &AtomProps)> {
        self.atoms.iter()
    }

    /// Number of atoms with properties
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// True when no form set a property or value
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Removes every atom's properties
    pub fn clear(&mut self) {
        self.atoms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn test_refs_keep_insertion_order() {
        let table = Interner::new();
        let foo = table.intern_str("FOO");
        let mut xref = Xref::default();
        xref.record(&foo, Ref { pos: RowCol::new(3, 1), len: 3, role: Role::Use });
        xref.record(&foo, Ref { pos: RowCol::new(1, 1), len: 3, role: Role::Decl });
        let refs = xref.refs(&foo);
        assert_eq!(refs[0].role, Role::Use);
        assert_eq!(refs[1].role, Role::Decl);
        assert_eq!(xref.ref_count(), 2);
        assert!(xref.refs(&table.intern_str("BAR")).is_empty());
    }

    #[test]
    fn test_xref_json_sorted_by_name() {
        let table = Interner::new();
        let mut xref = Xref::default();
        for name in ["ZED", "ALPHA"] {
            xref.record(&table.intern_str(name), Ref { pos: RowCol::new(1, 1), len: 1, role: Role::Call });
        }
        let json = serde_json::to_string(&xref).unwrap();
        assert!(json.find("ALPHA").unwrap() < json.find("ZED").unwrap());
        assert!(json.contains("\"role\":\"Call\""));
    }

    #[test]
    fn test_put_prop_overwrites() {
        let table = Interner::new();
        let (atom, key) = (table.intern_str("FOO"), table.intern_str("COLOR"));
        let mut props = AtomTable::default();
        props.put_prop(atom.clone(), key.clone(), Object::Integer(1));
        props.put_prop(atom.clone(), key.clone(), Object::Integer(2));
        assert_eq!(props.prop(&atom, &key), Some(&Object::Integer(2)));
        assert!(props.get(&atom).unwrap().value.is_nil());
        assert!(props.get(&atom).unwrap().vector.is_empty());
        assert_eq!(props.len(), 1);
        props.clear();
        assert!(props.is_empty());
    }
}
