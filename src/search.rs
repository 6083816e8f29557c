// src/search.rs

//! File search across configured roots
//!
//! Recipes name their auxiliary inputs (patches, templates) by relative
//! path; [`SearchPath`] resolves those names to absolute paths by probing
//! a configured list of roots in order and returning the first match.
//! A miss is fatal: a recipe that references a file nobody can find is a
//! declaration error, not something to paper over.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Ordered list of directories to resolve recipe inputs against
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    /// Create a search path from a list of roots
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Create a search path with a single root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Append a root at the end of the probe order
    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// The configured roots in probe order
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `relative` to the first matching file across the roots.
    ///
    /// `source` names the thing being looked for in the error message
    /// (the recipe name, typically).
    pub fn find(&self, relative: impl AsRef<Path>, source: &str) -> Result<PathBuf> {
        let relative = relative.as_ref();
        for root in &self.roots {
            let candidate = root.join(relative);
            if candidate.is_file() {
                debug!("{}: resolved {} to {}", source, relative.display(), candidate.display());
                return Ok(candidate);
            }
        }
        Err(Error::NotFound(format!(
            "{}: {} not found in any of {} search root(s)",
            source,
            relative.display(),
            self.roots.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_matching_root_wins() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(a.path().join("fix.patch"), "from a").unwrap();
        std::fs::write(b.path().join("fix.patch"), "from b").unwrap();

        let search = SearchPath::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        let found = search.find("fix.patch", "test").unwrap();
        assert_eq!(found, a.path().join("fix.patch"));
    }

    #[test]
    fn test_falls_through_to_later_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(b.path().join("only-in-b.conf"), "x").unwrap();

        let search = SearchPath::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        let found = search.find("only-in-b.conf", "test").unwrap();
        assert_eq!(found, b.path().join("only-in-b.conf"));
    }

    #[test]
    fn test_miss_is_not_found() {
        let a = TempDir::new().unwrap();
        let search = SearchPath::with_root(a.path());
        let err = search.find("ghost.patch", "mypkg").unwrap_err();
        match err {
            Error::NotFound(msg) => {
                assert!(msg.contains("mypkg"));
                assert!(msg.contains("ghost.patch"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_directories_do_not_match() {
        let a = TempDir::new().unwrap();
        std::fs::create_dir(a.path().join("subdir")).unwrap();
        let search = SearchPath::with_root(a.path());
        assert!(search.find("subdir", "test").is_err());
    }
}
