//! The pre-scanner.
//!
//! A single pass over all files in a batch, using the same grammars as full
//! extraction but the reduced `top_level_symbols` walk. Produces the map
//! `symbol name → defining files` that is the resolver's only cross-file
//! input. Ambiguous names keep every defining file, in the batch's sorted
//! walk order, which makes downstream resolution deterministic.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::IndexResult;
use crate::parsing::ExtractorSet;
use crate::parsing::extractor::read_source;

/// `symbol name → [absolute defining file paths]`, insertion-ordered.
#[derive(Debug, Default, Clone)]
pub struct SymbolMap {
    entries: IndexMap<String, Vec<PathBuf>>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, symbol: impl Into<String>, path: &Path) {
        let files = self.entries.entry(symbol.into()).or_default();
        if !files.iter().any(|p| p == path) {
            files.push(path.to_path_buf());
        }
    }

    pub fn files_for(&self, symbol: &str) -> Option<&[PathBuf]> {
        self.entries.get(symbol).map(|v| v.as_slice())
    }

    pub fn first_file(&self, symbol: &str) -> Option<&Path> {
        self.entries
            .get(symbol)
            .and_then(|v| v.first())
            .map(|p| p.as_path())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`SymbolMap`] over a batch of files.
pub struct PreScanner {
    extractors: ExtractorSet,
}

impl PreScanner {
    pub fn new() -> Self {
        Self {
            extractors: ExtractorSet::new(),
        }
    }

    /// Scan the batch in order. Files that vanished or fail to read are
    /// skipped; a pre-scan miss only degrades resolution, never the batch.
    pub fn scan(&mut self, files: &[PathBuf]) -> SymbolMap {
        let mut map = SymbolMap::new();
        for path in files {
            if let Err(e) = self.scan_file(path, &mut map) {
                tracing::warn!("pre-scan skipped {}: {e}", path.display());
            }
        }
        tracing::debug!(
            "pre-scanned {} files, {} distinct symbols",
            files.len(),
            map.len()
        );
        map
    }

    fn scan_file(&mut self, path: &Path, map: &mut SymbolMap) -> IndexResult<()> {
        let source = read_source(path)?;
        if source.trim().is_empty() {
            return Ok(());
        }
        let extractor = self.extractors.for_path(path)?;
        for symbol in extractor.top_level_symbols(&source) {
            map.record(symbol, path);
        }
        Ok(())
    }
}

impl Default for PreScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn symbol_map_keeps_ambiguous_names_as_lists() {
        let mut map = SymbolMap::new();
        map.record("helper", Path::new("/a.py"));
        map.record("helper", Path::new("/b.py"));
        map.record("helper", Path::new("/a.py")); // duplicate

        let files = map.files_for("helper").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(map.first_file("helper").unwrap(), Path::new("/a.py"));
    }

    #[test]
    fn scan_collects_across_languages() {
        let dir = TempDir::new().unwrap();
        let py = dir.path().join("a.py");
        let c = dir.path().join("b.c");
        fs::write(&py, "def shared(): pass\nclass Only: pass\n").unwrap();
        fs::write(&c, "void shared(void) {}\n").unwrap();

        let mut scanner = PreScanner::new();
        let map = scanner.scan(&[py.clone(), c.clone()]);

        let shared = map.files_for("shared").unwrap();
        assert_eq!(shared, &[py.clone(), c]);
        assert_eq!(map.first_file("Only").unwrap(), py);
    }

    #[test]
    fn scan_order_determines_first_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "def dup(): pass\n").unwrap();
        fs::write(&b, "def dup(): pass\n").unwrap();

        let mut scanner = PreScanner::new();
        let forward = scanner.scan(&[a.clone(), b.clone()]);
        assert_eq!(forward.first_file("dup").unwrap(), a);

        let mut scanner = PreScanner::new();
        let reversed = scanner.scan(&[b.clone(), a]);
        assert_eq!(reversed.first_file("dup").unwrap(), b);
    }

    #[test]
    fn missing_files_are_skipped() {
        let mut scanner = PreScanner::new();
        let map = scanner.scan(&[PathBuf::from("/no/such/file.py")]);
        assert!(map.is_empty());
    }
}
