//! Project-wide index over many Interlisp files
//!
//! Parses files in parallel with one shared intern table and answers cross
//! reference and position queries across all of them.

mod index;

pub use index::{FileDiagnostic, Project, ProjectConfig};
