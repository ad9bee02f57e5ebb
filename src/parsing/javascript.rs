//! JavaScript/TypeScript extractor.
//!
//! One walker serves both dialects; the grammar is chosen by the language
//! tag at construction. Captures function declarations, class methods,
//! arrow/function expressions bound by declaration, classes with `extends`
//! (and TypeScript `implements`), imports with aliases, call sites, and
//! top-level variable bindings.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImplementIr, ImportIr, InheritIr,
    TypeKind, VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION_DECL: &str = "function_declaration";
const NODE_GENERATOR_DECL: &str = "generator_function_declaration";
const NODE_METHOD: &str = "method_definition";
const NODE_CLASS_DECL: &str = "class_declaration";
const NODE_CLASS: &str = "class";
const NODE_IMPORT: &str = "import_statement";
const NODE_CALL: &str = "call_expression";
const NODE_VARIABLE_DECLARATOR: &str = "variable_declarator";
const NODE_ARROW: &str = "arrow_function";
const NODE_FUNCTION_EXPR: &str = "function_expression";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_MEMBER: &str = "member_expression";

const FUNCTION_SCOPES: &[&str] = &[
    NODE_FUNCTION_DECL,
    NODE_GENERATOR_DECL,
    NODE_METHOD,
    NODE_ARROW,
    NODE_FUNCTION_EXPR,
];
const CLASS_SCOPES: &[&str] = &[NODE_CLASS_DECL, NODE_CLASS];

const COMPLEXITY_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

pub struct JsExtractor {
    parser: Parser,
    language: Language,
}

impl std::fmt::Debug for JsExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsExtractor")
            .field("language", &self.language)
            .finish()
    }
}

impl JsExtractor {
    pub fn new(registry: &GrammarRegistry, language: Language) -> Self {
        Self {
            parser: registry.parser(language),
            language,
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION_DECL | NODE_GENERATOR_DECL => self.handle_function(node, source, ir),
            NODE_METHOD => self.handle_method(node, source, ir),
            NODE_CLASS_DECL => self.handle_class(node, source, ir),
            // TypeScript only; the kind never appears in JavaScript trees.
            "interface_declaration" => self.handle_interface(node, source, ir),
            NODE_IMPORT => self.handle_import(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_VARIABLE_DECLARATOR => self.handle_declarator(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_function(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut func = FunctionIr::new(node_text(name_node, source), start_line(node));
        func.end_line = end_line(node);
        func.args = parameter_names(node, source);
        func.source_text = node_text(node, source).to_string();
        func.cyclomatic_complexity = complexity(node);
        func.context = context_of(node, source);
        ir.functions.push(func);
    }

    fn handle_method(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let class = enclosing_class_name(node, source);

        let mut func = FunctionIr::new(name.clone(), start_line(node));
        func.full_name = match &class {
            Some(class) => format!("{class}.{name}"),
            None => name.clone(),
        };
        func.end_line = end_line(node);
        func.args = parameter_names(node, source);
        func.source_text = node_text(node, source).to_string();
        func.cyclomatic_complexity = complexity(node);
        func.is_constructor = name == "constructor";
        func.context = context_of(node, source);
        ir.functions.push(func);
    }

    fn handle_class(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let line = start_line(node);

        let mut class = ClassIr::new(name.clone(), line, TypeKind::Class);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.context = context_of(node, source);

        collect_heritage(node, source, &mut |base, implements| {
            if implements {
                ir.implements.push(ImplementIr {
                    class_name: name.clone(),
                    interface_name: base.clone(),
                    line_number: line,
                });
            } else {
                ir.inherits.push(InheritIr {
                    derived: name.clone(),
                    base: base.clone(),
                    line_number: line,
                });
            }
            class.bases.push(base);
        });
        ir.classes.push(class);
    }

    fn handle_interface(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut class = ClassIr::new(
            node_text(name_node, source),
            start_line(node),
            TypeKind::Interface,
        );
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        ir.classes.push(class);
    }

    fn handle_import(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let module = node_text(source_node, source)
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        let line = start_line(node);

        let mut pushed = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for item in child.named_children(&mut clause_cursor) {
                match item.kind() {
                    NODE_IDENTIFIER => {
                        let mut import = ImportIr::new(module.clone(), line);
                        import.alias = Some(node_text(item, source).to_string());
                        ir.imports.push(import);
                        pushed = true;
                    }
                    "named_imports" => {
                        let mut named_cursor = item.walk();
                        for spec in item.named_children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let imported = spec
                                .child_by_field_name("name")
                                .map(|n| node_text(n, source).to_string())
                                .unwrap_or_default();
                            let mut import =
                                ImportIr::new(format!("{module}.{imported}"), line);
                            import.name = imported;
                            import.alias = spec
                                .child_by_field_name("alias")
                                .map(|a| node_text(a, source).to_string());
                            ir.imports.push(import);
                            pushed = true;
                        }
                    }
                    "namespace_import" => {
                        let mut import = ImportIr::new(module.clone(), line);
                        import.is_wildcard = true;
                        import.alias = first_child_of_kind(item, NODE_IDENTIFIER)
                            .map(|n| node_text(n, source).to_string());
                        ir.imports.push(import);
                        pushed = true;
                    }
                    _ => {}
                }
            }
        }
        if !pushed {
            ir.imports.push(ImportIr::new(module, line));
        }
    }

    fn handle_call(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (name, full_name) = match function.kind() {
            NODE_IDENTIFIER => {
                let text = node_text(function, source).to_string();
                (text.clone(), text)
            }
            NODE_MEMBER => {
                let full = node_text(function, source).to_string();
                let short = function
                    .child_by_field_name("property")
                    .map(|p| node_text(p, source).to_string())
                    .unwrap_or_else(|| full.clone());
                (short, full)
            }
            _ => return,
        };

        let mut call = CallIr::new(name, start_line(node));
        call.full_name = full_name;
        call.context = context_of(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_declarator(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != NODE_IDENTIFIER {
            return;
        }
        let name = node_text(name_node, source).to_string();
        let value = node.child_by_field_name("value");

        // A function bound to a name is a function, mirroring the Python
        // lambda rule.
        if let Some(value) = value.filter(|v| {
            matches!(v.kind(), NODE_ARROW | NODE_FUNCTION_EXPR | "function")
        }) {
            let mut func = FunctionIr::new(name, start_line(node));
            func.end_line = end_line(node);
            func.args = parameter_names(value, source);
            func.source_text = node_text(node, source).to_string();
            func.cyclomatic_complexity = complexity(value);
            func.context = context_of(node, source);
            ir.functions.push(func);
            return;
        }

        // Only top-level bindings become Variable nodes.
        if nearest_ancestor(node, FUNCTION_SCOPES).is_some() {
            return;
        }
        let mut var = VariableIr::new(name, start_line(node));
        var.value = value.map(|v| node_text(v, source).to_string());
        var.context = context_of(node, source);
        ir.variables.push(var);
    }
}

fn parameter_names(node: Node<'_>, source: &str) -> Vec<String> {
    let Some(params) = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
    else {
        return Vec::new();
    };
    if params.kind() == NODE_IDENTIFIER {
        return vec![node_text(params, source).to_string()];
    }
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            NODE_IDENTIFIER => names.push(node_text(param, source).to_string()),
            "required_parameter" | "optional_parameter" => {
                if let Some(pattern) = param.child_by_field_name("pattern") {
                    if pattern.kind() == NODE_IDENTIFIER {
                        names.push(node_text(pattern, source).to_string());
                    }
                }
            }
            "rest_pattern" => {
                if let Some(inner) = first_child_of_kind(param, NODE_IDENTIFIER) {
                    names.push(node_text(inner, source).to_string());
                }
            }
            "assignment_pattern" => {
                if let Some(left) = param.child_by_field_name("left") {
                    if left.kind() == NODE_IDENTIFIER {
                        names.push(node_text(left, source).to_string());
                    }
                }
            }
            _ => {}
        }
    }
    names
}

/// Walk a class heritage clause. JavaScript has `extends <expr>`; TypeScript
/// splits into `extends_clause` and `implements_clause`.
fn collect_heritage(
    class_node: Node<'_>,
    source: &str,
    sink: &mut impl FnMut(String, bool),
) {
    let mut cursor = class_node.walk();
    for child in class_node.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut heritage_cursor = child.walk();
        let mut saw_clause = false;
        for clause in child.named_children(&mut heritage_cursor) {
            match clause.kind() {
                "extends_clause" => {
                    saw_clause = true;
                    let mut c = clause.walk();
                    for ty in clause.named_children(&mut c) {
                        if matches!(ty.kind(), NODE_IDENTIFIER | NODE_MEMBER | "type_identifier") {
                            sink(node_text(ty, source).to_string(), false);
                        }
                    }
                }
                "implements_clause" => {
                    saw_clause = true;
                    let mut c = clause.walk();
                    for ty in clause.named_children(&mut c) {
                        if matches!(ty.kind(), "type_identifier" | NODE_IDENTIFIER | "generic_type") {
                            let name = node_text(ty, source);
                            let base = name.split('<').next().unwrap_or(name).to_string();
                            sink(base, true);
                        }
                    }
                }
                _ => {}
            }
        }
        if !saw_clause {
            // JavaScript grammar: class_heritage is `extends` + expression.
            let mut c = child.walk();
            for expr in child.named_children(&mut c) {
                if matches!(expr.kind(), NODE_IDENTIFIER | NODE_MEMBER) {
                    sink(node_text(expr, source).to_string(), false);
                }
            }
        }
    }
}

fn enclosing_class_name(node: Node<'_>, source: &str) -> Option<String> {
    nearest_ancestor(node, CLASS_SCOPES)
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| node_text(n, source).to_string())
}

fn context_of(node: Node<'_>, source: &str) -> Option<EnclosingContext> {
    let function = nearest_ancestor(node, FUNCTION_SCOPES);
    let function_name = function.and_then(|f| match f.kind() {
        NODE_ARROW | NODE_FUNCTION_EXPR => {
            // Named through the declarator that binds it, if any.
            f.parent()
                .filter(|p| p.kind() == NODE_VARIABLE_DECLARATOR)
                .and_then(|p| p.child_by_field_name("name"))
                .map(|n| node_text(n, source).to_string())
        }
        _ => f
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string()),
    });
    let class = enclosing_class_name(node, source);
    let line = function
        .map(start_line)
        .or_else(|| nearest_ancestor(node, CLASS_SCOPES).map(start_line))?;
    if function_name.is_none() && class.is_none() {
        return None;
    }
    Some(EnclosingContext::new(function_name, class, line))
}

fn first_child_of_kind<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn complexity(node: Node<'_>) -> u32 {
    let mut count = 1;
    count_complexity(node, &mut count, 0);
    count
}

fn count_complexity(node: Node<'_>, count: &mut u32, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if COMPLEXITY_KINDS.contains(&child.kind()) {
            *count += 1;
        } else if child.kind() == "binary_expression" {
            if let Some(op) = child.child_by_field_name("operator") {
                if matches!(op.kind(), "&&" | "||" | "??") {
                    *count += 1;
                }
            }
        }
        count_complexity(child, count, depth + 1);
    }
}

impl Extractor for JsExtractor {
    fn language(&self) -> Language {
        self.language
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), self.language, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                self.language,
                is_dependency,
                "tree-sitter failed to produce a parse tree",
            );
        };
        self.walk(tree.root_node(), source, &mut ir, 0);
        ir.dedup();
        ir
    }

    fn top_level_symbols(&mut self, source: &str) -> Vec<String> {
        let Some(tree) = self.parser.parse(source, None) else {
            return Vec::new();
        };
        let root = tree.root_node();
        let mut names = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let target = if child.kind() == "export_statement" {
                child.child_by_field_name("declaration").unwrap_or(child)
            } else {
                child
            };
            match target.kind() {
                NODE_FUNCTION_DECL | NODE_GENERATOR_DECL | NODE_CLASS_DECL
                | "interface_declaration" => {
                    if let Some(name) = target.child_by_field_name("name") {
                        names.push(node_text(name, source).to_string());
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    let mut decl_cursor = target.walk();
                    for declarator in target.named_children(&mut decl_cursor) {
                        if declarator.kind() != NODE_VARIABLE_DECLARATOR {
                            continue;
                        }
                        let is_function = declarator
                            .child_by_field_name("value")
                            .is_some_and(|v| {
                                matches!(v.kind(), NODE_ARROW | NODE_FUNCTION_EXPR | "function")
                            });
                        if is_function {
                            if let Some(name) = declarator.child_by_field_name("name") {
                                names.push(node_text(name, source).to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileIr {
        let mut extractor = JsExtractor::new(GrammarRegistry::global(), Language::JavaScript);
        extractor.extract(Path::new("/test.js"), source, false)
    }

    #[test]
    fn functions_and_arrow_bindings() {
        let ir = extract(
            "function greet(name) { return name; }\nconst twice = (x) => x * 2;\n",
        );
        let names: Vec<&str> = ir.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "twice"]);
        assert_eq!(ir.functions[1].args, vec!["x"]);
        assert!(ir.variables.is_empty());
    }

    #[test]
    fn class_extends_and_methods() {
        let ir = extract(
            "class Dog extends Animal {\n  constructor() { super(); }\n  bark() { return 1; }\n}\n",
        );
        assert_eq!(ir.classes[0].bases, vec!["Animal"]);
        assert_eq!(ir.inherits.len(), 1);
        let bark = ir.functions.iter().find(|f| f.name == "bark").unwrap();
        assert_eq!(bark.full_name, "Dog.bark");
        let ctor = ir.functions.iter().find(|f| f.name == "constructor").unwrap();
        assert!(ctor.is_constructor);
    }

    #[test]
    fn imports_with_aliases() {
        let ir = extract(
            "import fs from 'fs';\nimport { join, resolve as abs } from 'path';\nimport * as util from 'util';\n",
        );
        assert_eq!(ir.imports.len(), 4);
        assert_eq!(ir.imports[0].alias.as_deref(), Some("fs"));
        assert_eq!(ir.imports[1].name, "join");
        assert_eq!(ir.imports[2].alias.as_deref(), Some("abs"));
        assert!(ir.imports[3].is_wildcard);
    }

    #[test]
    fn member_calls_record_full_text() {
        let ir = extract("function f() { db.connect(url); }\n");
        let call = ir.calls.iter().find(|c| c.name == "connect").unwrap();
        assert_eq!(call.full_name, "db.connect");
        assert_eq!(call.args, vec!["url"]);
        assert_eq!(
            call.context.as_ref().unwrap().function.as_deref(),
            Some("f")
        );
    }

    #[test]
    fn top_level_variables_only() {
        let ir = extract("const LIMIT = 5;\nfunction f() { const local = 1; }\n");
        assert_eq!(ir.variables.len(), 1);
        assert_eq!(ir.variables[0].name, "LIMIT");
    }

    #[test]
    fn typescript_implements_clause() {
        let mut extractor =
            JsExtractor::new(GrammarRegistry::global(), Language::TypeScript);
        let ir = extractor.extract(
            Path::new("/test.ts"),
            "interface Walker {}\nclass Dog extends Animal implements Walker {}\n",
            false,
        );
        assert_eq!(ir.inherits.len(), 1);
        assert_eq!(ir.implements.len(), 1);
        assert_eq!(ir.implements[0].interface_name, "Walker");
    }
}
