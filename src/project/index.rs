use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::intern::{Atom, Interner};
use crate::parser::{find_node_at, NodeAt, Object, ParsedFile, Reader, Ref};
use crate::position::RowCol;

/// Configuration for parsing a set of files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Maximum number of files parsed at once (default: num_cpus)
    pub max_parallelism: usize,
    /// Stop the batch on the first failing file instead of recording it
    pub fail_fast: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// A file that could not be read or parsed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiagnostic {
    /// File path
    pub path: String,
    /// Error position, invalid for I/O failures
    pub pos: RowCol,
    /// Error message
    pub message: String,
}

impl FileDiagnostic {
    fn new(path: &str, error: &Error) -> Self {
        FileDiagnostic {
            path: path.to_string(),
            pos: error.position(),
            message: error.message(),
        }
    }
}

/// Parsed files of a project sharing one [`Interner`]
pub struct Project {
    config: ProjectConfig,
    interner: Arc<Interner>,
    files: RwLock<BTreeMap<String, Arc<ParsedFile>>>,
    diagnostics: RwLock<Vec<FileDiagnostic>>,
}

impl Project {
    /// Creates an empty project
    pub fn new(config: ProjectConfig) -> Self {
        Project {
            config,
            interner: Interner::shared(),
            files: RwLock::new(BTreeMap::new()),
            diagnostics: RwLock::new(Vec::new()),
        }
    }

    /// The intern table shared by all files
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Reads and parses files from disk
    ///
    /// Returns the number of files parsed successfully.
    pub fn parse_files<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Result<usize> {
        self.run(paths, |path| {
            let path = path.as_ref();
            let name = path.to_string_lossy().into_owned();
            let parsed = std::fs::read(path)
                .map_err(|e| Error::Io {
                    path: name.clone(),
                    message: e.to_string(),
                })
                .and_then(|source| parse_one(&self.interner, &name, &source));
            (name, parsed)
        })
    }

    /// Parses in-memory sources given as `(path, bytes)`
    pub fn parse_sources(&self, sources: Vec<(String, Vec<u8>)>) -> Result<usize> {
        self.run(&sources, |(path, source)| {
            (path.clone(), parse_one(&self.interner, path, source))
        })
    }

    fn run<T, F>(&self, items: &[T], parse: F) -> Result<usize>
    where
        T: Sync,
        F: Fn(&T) -> (String, Result<ParsedFile>) + Send + Sync,
    {
        if items.is_empty() {
            return Ok(0);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_parallelism.clamp(1, items.len()))
            .build()
            .map_err(|e| Error::ThreadPool {
                message: format!("Failed to create thread pool: {}", e),
            })?;

        let results: Vec<(String, Result<ParsedFile>)> = pool.install(|| items.par_iter().map(&parse).collect());

        if self.config.fail_fast {
            if let Some((path, Err(error))) = results.iter().find(|(_, r)| r.is_err()) {
                tracing::warn!(path = path.as_str(), %error, "parse failed, batch stopped");
                return Err(error.clone());
            }
        }

        let mut parsed = 0;
        let mut files = self.files.write();
        let mut diagnostics = self.diagnostics.write();
        for (path, result) in results {
            diagnostics.retain(|d| d.path != path);
            match result {
                Ok(file) => {
                    files.insert(path, Arc::new(file));
                    parsed += 1;
                }
                Err(error) => {
                    tracing::warn!(path = path.as_str(), %error, "skipping file");
                    diagnostics.push(FileDiagnostic::new(&path, &error));
                    files.remove(&path);
                }
            }
        }
        tracing::debug!(parsed, failed = diagnostics.len(), "project parsed");
        Ok(parsed)
    }

    /// Parses one file again, replacing its previous result
    pub fn reparse_source(&self, path: &str, source: &[u8]) -> Result<()> {
        let result = parse_one(&self.interner, path, source);
        // same lock order as `run`
        let mut files = self.files.write();
        let mut diagnostics = self.diagnostics.write();
        diagnostics.retain(|d| d.path != path);
        match result {
            Ok(file) => {
                files.insert(path.to_string(), Arc::new(file));
                Ok(())
            }
            Err(error) => {
                tracing::warn!(path, %error, "reparse failed");
                diagnostics.push(FileDiagnostic::new(path, &error));
                files.remove(path);
                Err(error)
            }
        }
    }

    /// Parse result of `path`
    pub fn file(&self, path: &str) -> Option<Arc<ParsedFile>> {
        self.files.read().get(path).cloned()
    }

    /// Top-level list of `path`
    pub fn ast(&self, path: &str) -> Option<Object> {
        self.file(path).map(|f| f.ast.clone())
    }

    /// Paths of all parsed files, sorted
    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    /// Files that failed, in the order they were reported
    pub fn diagnostics(&self) -> Vec<FileDiagnostic> {
        self.diagnostics.read().clone()
    }

    /// Occurrences of `atom` per file, in path order
    pub fn xref_for(&self, atom: &Atom) -> Vec<(String, Vec<Ref>)> {
        self.files
            .read()
            .iter()
            .filter_map(|(path, file)| {
                let refs = file.xref.refs(atom);
                (!refs.is_empty()).then(|| (path.clone(), refs.to_vec()))
            })
            .collect()
    }

    /// Like [`Project::xref_for`], by name; unknown names have no occurrences
    pub fn xref_for_name(&self, name: &str) -> Vec<(String, Vec<Ref>)> {
        match self.interner.get(name.as_bytes()) {
            Some(atom) => self.xref_for(&atom),
            None => Vec::new(),
        }
    }

    /// Innermost list and atom at a 1-based position of `path`
    pub fn find_node_at(&self, path: &str, line: u32, col: u32) -> Option<NodeAt> {
        let file = self.file(path)?;
        let root = file.ast.as_list()?;
        Some(find_node_at(root, line, col))
    }

    /// Every interned atom name, sorted, for name completion
    pub fn atom_names(&self) -> Vec<String> {
        self.interner.all_interned()
    }

    /// Cross reference of all files as JSON: path to atom to occurrences
    pub fn xref_json(&self) -> Result<String> {
        let files = self.files.read();
        let export: BTreeMap<&str, &crate::parser::Xref> =
            files.iter().map(|(path, file)| (path.as_str(), &file.xref)).collect();
        serde_json::to_string_pretty(&export).map_err(|e| Error::Serialization {
            message: e.to_string(),
        })
    }
}

fn parse_one(interner: &Arc<Interner>, path: &str, source: &[u8]) -> Result<ParsedFile> {
    let mut reader = Reader::new(interner.clone());
    reader.parse(source, Some(path))?;
    Ok(reader.into_parsed())
}
