//! Interlisp reader
//!
//! Builds a list tree from the token stream of one file, together with the
//! cross reference of every atom occurrence and the property table filled by
//! `PUTPROP`-style forms.

mod navigate;
mod object;
mod reader;
mod xref;

pub use navigate::{find_node_at, NodeAt};
pub use object::{ListNode, Object, StringBuf};
pub use reader::{ParsedFile, Reader};
pub use xref::{AtomProps, AtomTable, Ref, Role, Xref};
