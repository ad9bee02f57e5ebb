//! The grammar registry.
//!
//! Owns one compiled tree-sitter grammar per supported language. Grammar
//! handles are immutable and shared safely across workers; `Parser` instances
//! are not, so [`GrammarRegistry::parser_for`] allocates a fresh parser per
//! call and workers reuse it across files. The registry is constructed once
//! at process start and frozen.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::parsing::Language;

static REGISTRY: OnceLock<GrammarRegistry> = OnceLock::new();

pub struct GrammarRegistry {
    grammars: HashMap<Language, tree_sitter::Language>,
}

impl GrammarRegistry {
    /// The process-wide registry, compiled on first access.
    pub fn global() -> &'static GrammarRegistry {
        REGISTRY.get_or_init(GrammarRegistry::compile)
    }

    fn compile() -> Self {
        let mut grammars = HashMap::new();
        grammars.insert(Language::Python, tree_sitter_python::LANGUAGE.into());
        grammars.insert(Language::C, tree_sitter_c::LANGUAGE.into());
        grammars.insert(Language::Cpp, tree_sitter_cpp::LANGUAGE.into());
        grammars.insert(Language::Java, tree_sitter_java::LANGUAGE.into());
        grammars.insert(Language::Css, tree_sitter_css::LANGUAGE.into());
        grammars.insert(
            Language::JavaScript,
            tree_sitter_javascript::LANGUAGE.into(),
        );
        grammars.insert(
            Language::TypeScript,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        );
        grammars.insert(Language::Go, tree_sitter_go::LANGUAGE.into());
        grammars.insert(Language::Rust, tree_sitter_rust::LANGUAGE.into());
        grammars.insert(Language::Ruby, tree_sitter_ruby::LANGUAGE.into());
        Self { grammars }
    }

    /// The compiled grammar for a language.
    pub fn grammar(&self, language: Language) -> &tree_sitter::Language {
        // Every Language variant is inserted in compile(); a miss is a bug.
        &self.grammars[&language]
    }

    /// Map an extension to its language and allocate a parser for it.
    ///
    /// Returns `None` for extensions outside the registry. The returned
    /// parser belongs to the calling worker; it must not be shared.
    pub fn parser_for(&self, extension: &str) -> Option<(Language, tree_sitter::Parser)> {
        let language = Language::from_extension(extension)?;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(self.grammar(language))
            .expect("registry grammar version matches linked tree-sitter");
        Some((language, parser))
    }

    /// Allocate a parser for a known language.
    pub fn parser(&self, language: Language) -> tree_sitter::Parser {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(self.grammar(language))
            .expect("registry grammar version matches linked tree-sitter");
        parser
    }

    /// Every extension the registry recognizes.
    pub fn all_supported_extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<&'static str> = Language::ALL
            .iter()
            .flat_map(|l| l.extensions().iter().copied())
            .collect();
        exts.sort_unstable();
        exts
    }

    /// Whether a path's extension is indexable.
    pub fn supports_path(&self, path: &std::path::Path) -> bool {
        Language::from_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_language() {
        let registry = GrammarRegistry::global();
        for lang in Language::ALL {
            // grammar() panics on a missing entry; reaching here is the test.
            let _ = registry.grammar(*lang);
        }
    }

    #[test]
    fn parser_for_known_and_unknown_extensions() {
        let registry = GrammarRegistry::global();

        let (language, _parser) = registry.parser_for("py").unwrap();
        assert_eq!(language, Language::Python);

        assert!(registry.parser_for("md").is_none());
    }

    #[test]
    fn parsers_are_independent_instances() {
        let registry = GrammarRegistry::global();
        let (_, mut a) = registry.parser_for("rs").unwrap();
        let (_, mut b) = registry.parser_for("rs").unwrap();

        let t1 = a.parse("fn main() {}", None).unwrap();
        let t2 = b.parse("fn other() {}", None).unwrap();
        assert_eq!(t1.root_node().kind(), t2.root_node().kind());
    }

    #[test]
    fn supported_extensions_are_sorted_and_complete() {
        let exts = GrammarRegistry::global().all_supported_extensions();
        assert!(exts.contains(&"py"));
        assert!(exts.contains(&"css"));
        assert!(exts.contains(&"java"));
        let mut sorted = exts.clone();
        sorted.sort_unstable();
        assert_eq!(exts, sorted);
    }
}
