//! CSS extractor.
//!
//! Captures rule sets with their selectors and declarations, `@import`,
//! `@media` (as MediaQuery records containing their rules), `@keyframes`,
//! `@supports`, and `@namespace`. Selector specificity is
//! `100·ids + 10·classes + 1·elements`; the cascade pass that turns
//! specificity into OVERRIDDEN_BY edges runs later, over the emitted IR.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{FileIr, ImportIr, MediaQueryIr, PropertyIr, RuleIr, SelectorIr};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_RULE_SET: &str = "rule_set";
const NODE_SELECTORS: &str = "selectors";
const NODE_BLOCK: &str = "block";
const NODE_DECLARATION: &str = "declaration";
const NODE_IMPORT: &str = "import_statement";
const NODE_MEDIA: &str = "media_statement";
const NODE_KEYFRAMES: &str = "keyframes_statement";
const NODE_SUPPORTS: &str = "supports_statement";
const NODE_NAMESPACE: &str = "namespace_statement";

/// Selector node kinds collected from a `selectors` list.
const SELECTOR_KINDS: &[&str] = &[
    "tag_name",
    "class_selector",
    "id_selector",
    "universal_selector",
    "descendant_selector",
    "child_selector",
    "sibling_selector",
    "adjacent_sibling_selector",
    "pseudo_class_selector",
    "pseudo_element_selector",
    "attribute_selector",
];

#[derive(Clone, Default)]
struct CssScope {
    media_line: Option<u32>,
    rule: Option<(String, u32)>,
}

pub struct CssExtractor {
    parser: Parser,
}

impl std::fmt::Debug for CssExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CssExtractor").finish()
    }
}

impl CssExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Css),
        }
    }

    fn walk(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        scope: &CssScope,
        depth: usize,
    ) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_RULE_SET => {
                self.handle_rule_set(node, source, ir, scope, depth);
                return;
            }
            NODE_MEDIA => {
                self.handle_media(node, source, ir, scope, depth);
                return;
            }
            NODE_IMPORT => self.handle_import(node, source, ir),
            NODE_KEYFRAMES | NODE_SUPPORTS | NODE_NAMESPACE => {
                self.handle_at_rule(node, source, ir, scope);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, scope, depth + 1);
        }
    }

    fn handle_rule_set(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        scope: &CssScope,
        depth: usize,
    ) {
        let line = start_line(node);
        let mut selectors = Vec::new();
        let mut block = None;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                NODE_SELECTORS => {
                    let mut sel_cursor = child.walk();
                    for sel in child.named_children(&mut sel_cursor) {
                        if SELECTOR_KINDS.contains(&sel.kind()) {
                            selectors.push(node_text(sel, source).trim().to_string());
                        }
                    }
                }
                NODE_BLOCK => block = Some(child),
                _ => {}
            }
        }
        if selectors.is_empty() {
            return;
        }
        let name = selectors[0].clone();
        let selector_text = selectors.join(", ");

        ir.rules.push(RuleIr {
            name: name.clone(),
            selector_text,
            line_number: line,
            end_line: end_line(node),
            specificity: specificity(&name),
            selectors: selectors.clone(),
            source_text: node_text(node, source).trim().to_string(),
            at_keyword: None,
            enclosing_media_line: scope.media_line,
            enclosing_rule: scope.rule.clone(),
        });

        for selector in &selectors {
            ir.selectors.push(SelectorIr {
                name: selector.clone(),
                line_number: line,
                specificity: specificity(selector),
                rule_name: Some(name.clone()),
                rule_line: Some(line),
                source_text: selector.clone(),
            });
        }

        if let Some(block) = block {
            let inner = CssScope {
                media_line: scope.media_line,
                rule: Some((name.clone(), line)),
            };
            let mut block_cursor = block.walk();
            for child in block.named_children(&mut block_cursor) {
                if child.kind() == NODE_DECLARATION {
                    self.handle_declaration(child, source, ir, &name, line);
                } else {
                    self.walk(child, source, ir, &inner, depth + 1);
                }
            }
        }
    }

    fn handle_declaration(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        rule_name: &str,
        rule_line: u32,
    ) {
        let mut property_name = None;
        let mut values = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "property_name" {
                property_name = Some(node_text(child, source).to_string());
            } else {
                values.push(node_text(child, source).to_string());
            }
        }
        let Some(property_name) = property_name else {
            return;
        };
        let value = if values.is_empty() {
            None
        } else {
            Some(values.join(" "))
        };
        ir.properties.push(PropertyIr {
            name: property_name,
            line_number: start_line(node),
            value,
            rule_name: Some(rule_name.to_string()),
            rule_line: Some(rule_line),
            source_text: node_text(node, source).trim().to_string(),
        });
    }

    fn handle_media(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        scope: &CssScope,
        depth: usize,
    ) {
        let line = start_line(node);
        let mut conditions = Vec::new();
        let mut block = None;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == NODE_BLOCK {
                block = Some(child);
            } else {
                conditions.push(node_text(child, source).trim().to_string());
            }
        }

        ir.media_queries.push(MediaQueryIr {
            name: format!("media_{line}"),
            line_number: line,
            end_line: end_line(node),
            conditions,
            source_text: node_text(node, source).trim().to_string(),
        });

        if let Some(block) = block {
            let inner = CssScope {
                media_line: Some(line),
                rule: scope.rule.clone(),
            };
            let mut block_cursor = block.walk();
            for child in block.named_children(&mut block_cursor) {
                self.walk(child, source, ir, &inner, depth + 1);
            }
        }
    }

    fn handle_import(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let url = find_string_value(node, source, 0);
        let mut import = ImportIr::new(
            url.clone().unwrap_or_else(|| "unknown".to_string()),
            start_line(node),
        );
        import.name = import.full_name.clone();
        import.url = url;
        ir.imports.push(import);
    }

    /// `@keyframes`, `@supports`, and `@namespace` become rule records with
    /// the at-keyword set; their inner rule sets are walked normally.
    fn handle_at_rule(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, scope: &CssScope) {
        let keyword = match node.kind() {
            NODE_KEYFRAMES => "keyframes",
            NODE_SUPPORTS => "supports",
            _ => "namespace",
        };
        let name = match node.kind() {
            NODE_KEYFRAMES => {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "keyframes_name")
                    .map(|c| node_text(c, source).to_string());
                found.unwrap_or_else(|| format!("@{keyword}"))
            }
            _ => format!("@{keyword}"),
        };

        ir.rules.push(RuleIr {
            name,
            selector_text: String::new(),
            line_number: start_line(node),
            end_line: end_line(node),
            specificity: 0,
            selectors: Vec::new(),
            source_text: node_text(node, source).trim().to_string(),
            at_keyword: Some(keyword.to_string()),
            enclosing_media_line: scope.media_line,
            enclosing_rule: scope.rule.clone(),
        });
    }
}

/// Selector specificity: `100·#ids + 10·#classes + 1·#elements`.
pub fn specificity(selector: &str) -> i64 {
    let ids = selector.matches('#').count() as i64;
    let classes = selector.matches('.').count() as i64;
    let elements = selector
        .split_whitespace()
        .filter(|part| {
            !part.is_empty() && !part.starts_with(['.', '#', ':', '[', '>', '+', '~', '*'])
        })
        .count() as i64;
    ids * 100 + classes * 10 + elements
}

fn find_string_value(node: Node<'_>, source: &str, depth: usize) -> Option<String> {
    if depth > 8 {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string_value" {
            return Some(
                node_text(child, source)
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string(),
            );
        }
        if let Some(found) = find_string_value(child, source, depth + 1) {
            return Some(found);
        }
    }
    None
}

impl Extractor for CssExtractor {
    fn language(&self) -> Language {
        Language::Css
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Css, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Css,
                is_dependency,
                "tree-sitter failed to produce a parse tree",
            );
        };
        self.walk(tree.root_node(), source, &mut ir, &CssScope::default(), 0);
        ir.dedup();
        ir
    }

    fn top_level_symbols(&mut self, source: &str) -> Vec<String> {
        let Some(tree) = self.parser.parse(source, None) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        collect_rule_names(tree.root_node(), source, &mut names, 0);
        names
    }
}

/// First selector of every rule set; these participate in cross-file
/// resolution of shared selectors.
fn collect_rule_names(node: Node<'_>, source: &str, names: &mut Vec<String>, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    if node.kind() == NODE_RULE_SET {
        let mut cursor = node.walk();
        if let Some(selectors) = node
            .children(&mut cursor)
            .find(|c| c.kind() == NODE_SELECTORS)
        {
            let mut sel_cursor = selectors.walk();
            if let Some(first) = selectors
                .named_children(&mut sel_cursor)
                .find(|s| SELECTOR_KINDS.contains(&s.kind()))
            {
                names.push(node_text(first, source).trim().to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_rule_names(child, source, names, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileIr {
        let mut extractor = CssExtractor::new(GrammarRegistry::global());
        extractor.extract(Path::new("/test.css"), source, false)
    }

    #[test]
    fn specificity_weights() {
        assert_eq!(specificity("p"), 1);
        assert_eq!(specificity("#id p"), 101);
        assert_eq!(specificity(".a .b"), 20);
        assert_eq!(specificity("#x .y span"), 111);
        assert_eq!(specificity("*"), 0);
    }

    #[test]
    fn rules_selectors_properties() {
        let ir = extract("p { color: red; }\n#id p { color: blue; }\n");
        assert_eq!(ir.rules.len(), 2);
        assert_eq!(ir.rules[0].name, "p");
        assert_eq!(ir.rules[0].specificity, 1);
        assert_eq!(ir.rules[1].name, "#id p");
        assert_eq!(ir.rules[1].specificity, 101);

        assert_eq!(ir.properties.len(), 2);
        assert_eq!(ir.properties[0].name, "color");
        assert_eq!(ir.properties[0].value.as_deref(), Some("red"));
        assert_eq!(ir.properties[0].rule_name.as_deref(), Some("p"));
    }

    #[test]
    fn multi_selector_rule() {
        let ir = extract("h1, h2 { margin: 0; }\n");
        assert_eq!(ir.rules.len(), 1);
        assert_eq!(ir.rules[0].selectors, vec!["h1", "h2"]);
        assert_eq!(ir.rules[0].selector_text, "h1, h2");
        assert_eq!(ir.selectors.len(), 2);
    }

    #[test]
    fn import_statement_url() {
        let ir = extract("@import \"theme.css\";\nbody { margin: 0; }\n");
        assert_eq!(ir.imports.len(), 1);
        assert_eq!(ir.imports[0].url.as_deref(), Some("theme.css"));
        assert_eq!(ir.imports[0].full_name, "theme.css");
    }

    #[test]
    fn media_query_contains_rules() {
        let ir = extract(
            "@media screen and (max-width: 600px) {\n  nav { display: none; }\n}\n",
        );
        assert_eq!(ir.media_queries.len(), 1);
        assert_eq!(ir.media_queries[0].name, "media_1");
        assert!(!ir.media_queries[0].conditions.is_empty());

        assert_eq!(ir.rules.len(), 1);
        assert_eq!(ir.rules[0].name, "nav");
        assert_eq!(ir.rules[0].enclosing_media_line, Some(1));
    }

    #[test]
    fn keyframes_recorded_as_at_rule() {
        let ir = extract(
            "@keyframes fade {\n  from { opacity: 0; }\n  to { opacity: 1; }\n}\n",
        );
        let kf = ir
            .rules
            .iter()
            .find(|r| r.at_keyword.as_deref() == Some("keyframes"))
            .unwrap();
        assert_eq!(kf.name, "fade");
    }

    #[test]
    fn top_level_symbols_are_first_selectors() {
        let mut extractor = CssExtractor::new(GrammarRegistry::global());
        let names = extractor.top_level_symbols("p { color: red; }\n.nav a { color: blue; }\n");
        assert_eq!(names, vec!["p", ".nav a"]);
    }
}
