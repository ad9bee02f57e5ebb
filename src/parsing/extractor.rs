//! The extractor contract and shared tree-walking helpers.
//!
//! Every language implements [`Extractor`]: given a file's source, produce
//! one [`FileIr`]. Extractors never panic on malformed input; a parse failure
//! returns an IR with a populated `error` field and empty collections.
//! Extractors hold a private parser and are re-entrant across files.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::Node;

use crate::error::{IndexError, IndexResult};
use crate::ir::FileIr;
use crate::parsing::{GrammarRegistry, Language};

/// Maximum recursion depth for tree traversal, guarding against
/// pathologically nested input blowing the stack.
pub const MAX_TREE_DEPTH: usize = 500;

/// Common interface for all language extractors.
pub trait Extractor: Send + std::fmt::Debug {
    /// The language this extractor handles.
    fn language(&self) -> Language;

    /// Parse source and emit the file's IR. Must not fail: syntactic
    /// breakage surfaces in `FileIr::error`.
    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr;

    /// Reduced pass for the pre-scanner: top-level definition names only.
    fn top_level_symbols(&mut self, source: &str) -> Vec<String>;
}

/// One extractor per language, owned by a single worker.
///
/// Parsers are allocated lazily from the frozen registry and reused across
/// files on that worker.
pub struct ExtractorSet {
    extractors: HashMap<Language, Box<dyn Extractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// The extractor for a path's language, or an error for unsupported
    /// extensions.
    pub fn for_path(&mut self, path: &Path) -> IndexResult<&mut Box<dyn Extractor>> {
        let language =
            Language::from_path(path).ok_or_else(|| IndexError::UnsupportedFileType {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            })?;
        Ok(self
            .extractors
            .entry(language)
            .or_insert_with(|| build_extractor(language)))
    }

    /// Extract a file from disk: read (UTF-8 with replacement), then parse.
    ///
    /// Empty or whitespace-only files produce an empty IR.
    pub fn extract_file(&mut self, path: &Path, is_dependency: bool) -> IndexResult<FileIr> {
        let source = read_source(path)?;
        let extractor = self.for_path(path)?;
        if source.trim().is_empty() {
            return Ok(FileIr::empty(
                path.to_path_buf(),
                extractor.language(),
                is_dependency,
            ));
        }
        Ok(extractor.extract(path, &source, is_dependency))
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the extractor for a language.
pub fn build_extractor(language: Language) -> Box<dyn Extractor> {
    let registry = GrammarRegistry::global();
    match language {
        Language::Python => Box::new(super::python::PythonExtractor::new(registry)),
        Language::C => Box::new(super::c::CExtractor::new(registry)),
        Language::Cpp => Box::new(super::cpp::CppExtractor::new(registry)),
        Language::Java => Box::new(super::java::JavaExtractor::new(registry)),
        Language::Css => Box::new(super::css::CssExtractor::new(registry)),
        Language::JavaScript => {
            Box::new(super::javascript::JsExtractor::new(registry, Language::JavaScript))
        }
        Language::TypeScript => {
            Box::new(super::javascript::JsExtractor::new(registry, Language::TypeScript))
        }
        Language::Go => Box::new(super::go::GoExtractor::new(registry)),
        Language::Rust => Box::new(super::rust_lang::RustExtractor::new(registry)),
        Language::Ruby => Box::new(super::ruby::RubyExtractor::new(registry)),
    }
}

/// Read a file as UTF-8, replacing invalid byte sequences.
pub fn read_source(path: &Path) -> IndexResult<String> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(IndexError::MissingFile {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Source text of a node.
#[inline]
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// 1-based start line of a node.
#[inline]
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line of a node.
#[inline]
pub fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// Depth guard for recursive walkers. Returns false when the subtree should
/// be skipped.
#[inline]
pub fn check_depth(depth: usize, node: Node<'_>) -> bool {
    if depth > MAX_TREE_DEPTH {
        tracing::warn!(
            "maximum tree depth ({}) exceeded at line {}; skipping subtree",
            MAX_TREE_DEPTH,
            start_line(node)
        );
        return false;
    }
    true
}

/// Walk upward and return the nearest ancestor whose kind is in `kinds`.
pub fn nearest_ancestor<'tree>(node: Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_source_replaces_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.py");
        fs::write(&path, b"def f():\n    return b\"\xff\xfe\"\n").unwrap();

        let source = read_source(&path).unwrap();
        assert!(source.contains('\u{FFFD}'));
        assert!(source.starts_with("def f()"));
    }

    #[test]
    fn read_source_missing_file_is_missing_file_error() {
        let err = read_source(Path::new("/no/such/file.py")).unwrap_err();
        assert!(matches!(err, IndexError::MissingFile { .. }));
    }

    #[test]
    fn extract_file_empty_input_yields_empty_ir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.py");
        fs::write(&path, "   \n\t\n").unwrap();

        let mut set = ExtractorSet::new();
        let ir = set.extract_file(&path, false).unwrap();
        assert!(ir.error.is_none());
        assert!(ir.functions.is_empty());
        assert!(ir.classes.is_empty());
    }

    #[test]
    fn extractor_set_rejects_unknown_extension() {
        let mut set = ExtractorSet::new();
        let err = set.for_path(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFileType { .. }));
    }

    #[test]
    fn extractors_are_reused_per_language() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "def one(): pass\n").unwrap();
        fs::write(&b, "def two(): pass\n").unwrap();

        let mut set = ExtractorSet::new();
        let ir_a = set.extract_file(&a, false).unwrap();
        let ir_b = set.extract_file(&b, false).unwrap();
        assert_eq!(ir_a.functions[0].name, "one");
        assert_eq!(ir_b.functions[0].name, "two");
    }
}
