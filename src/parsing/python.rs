//! Python extractor.
//!
//! Captures `def` (including nested), `class`, imports with aliases,
//! decorators, docstrings, lambdas bound by assignment, call sites with
//! enclosing context, and module/class-level variables. Cyclomatic
//! complexity counts branching constructs, boolean operators,
//! comprehensions, and `case` clauses.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImportIr, InheritIr, TypeKind,
    VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION: &str = "function_definition";
const NODE_CLASS: &str = "class_definition";
const NODE_DECORATED: &str = "decorated_definition";
const NODE_IMPORT: &str = "import_statement";
const NODE_IMPORT_FROM: &str = "import_from_statement";
const NODE_CALL: &str = "call";
const NODE_ASSIGNMENT: &str = "assignment";
const NODE_LAMBDA: &str = "lambda";
const NODE_ATTRIBUTE: &str = "attribute";
const NODE_IDENTIFIER: &str = "identifier";

/// Node kinds that contribute to cyclomatic complexity.
const COMPLEXITY_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "conditional_expression",
    "for_statement",
    "while_statement",
    "except_clause",
    "with_statement",
    "boolean_operator",
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
    "case_clause",
];

#[derive(Clone)]
struct Scope {
    is_class: bool,
    name: String,
    line: u32,
}

pub struct PythonExtractor {
    parser: Parser,
    scopes: Vec<Scope>,
    /// `var -> ClassName` bindings from `var = ClassName(...)` assignments,
    /// used to infer call receiver types.
    var_types: HashMap<String, String>,
}

impl std::fmt::Debug for PythonExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonExtractor")
            .field("var_types", &self.var_types)
            .finish()
    }
}

impl PythonExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Python),
            scopes: Vec::new(),
            var_types: HashMap::new(),
        }
    }

    fn current_context(&self) -> Option<EnclosingContext> {
        if self.scopes.is_empty() {
            return None;
        }
        let function = self.scopes.iter().rev().find(|s| !s.is_class);
        let class = self.scopes.iter().rev().find(|s| s.is_class);
        let line = function.or(class).map(|s| s.line)?;
        Some(EnclosingContext::new(
            function.map(|s| s.name.clone()),
            class.map(|s| s.name.clone()),
            line,
        ))
    }

    fn qualified(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else {
            let mut parts: Vec<&str> = self.scopes.iter().map(|s| s.name.as_str()).collect();
            parts.push(name);
            parts.join(".")
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION => {
                self.handle_function(node, source, ir, depth);
                return;
            }
            NODE_CLASS => {
                self.handle_class(node, source, ir, depth);
                return;
            }
            NODE_IMPORT => self.handle_import(node, source, ir),
            NODE_IMPORT_FROM => self.handle_import_from(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_ASSIGNMENT => self.handle_assignment(node, source, ir, depth),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_function(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();

        let mut func = FunctionIr::new(name.clone(), start_line(node));
        func.full_name = self.qualified(&name);
        func.end_line = end_line(node);
        func.args = self.parameter_names(node, source);
        func.source_text = node_text(node, source).to_string();
        func.docstring = self.docstring(node, source);
        func.cyclomatic_complexity = complexity(node);
        func.decorators = self.decorators(node, source);
        func.context = self.current_context();
        func.return_type = node
            .child_by_field_name("return_type")
            .map(|n| node_text(n, source).to_string());
        func.is_static = func.decorators.iter().any(|d| d == "staticmethod");
        ir.functions.push(func);

        self.scopes.push(Scope {
            is_class: false,
            name,
            line: start_line(node),
        });
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, source, ir, depth + 1);
            }
        }
        self.scopes.pop();
    }

    fn handle_class(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let line = start_line(node);

        let mut class = ClassIr::new(name.clone(), line, TypeKind::Class);
        class.full_name = self.qualified(&name);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.docstring = self.docstring(node, source);
        class.context = self.current_context();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if matches!(base.kind(), NODE_IDENTIFIER | NODE_ATTRIBUTE) {
                    let base_name = node_text(base, source).to_string();
                    ir.inherits.push(InheritIr {
                        derived: name.clone(),
                        base: base_name.clone(),
                        line_number: line,
                    });
                    class.bases.push(base_name);
                }
            }
        }
        ir.classes.push(class);

        self.scopes.push(Scope {
            is_class: true,
            name,
            line,
        });
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, source, ir, depth + 1);
            }
        }
        self.scopes.pop();
    }

    fn handle_import(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    ir.imports
                        .push(ImportIr::new(node_text(child, source), start_line(node)));
                }
                "aliased_import" => {
                    let Some(target) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let mut import =
                        ImportIr::new(node_text(target, source), start_line(node));
                    import.alias = child
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, source).to_string());
                    ir.imports.push(import);
                }
                _ => {}
            }
        }
    }

    fn handle_import_from(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let module = node
            .child_by_field_name("module_name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        let mut cursor = node.walk();
        let mut saw_name = false;
        for child in node.named_children(&mut cursor) {
            // The module_name field also matches dotted_name; skip it.
            if Some(child) == node.child_by_field_name("module_name") {
                continue;
            }
            match child.kind() {
                "dotted_name" => {
                    saw_name = true;
                    let item = node_text(child, source);
                    ir.imports.push(ImportIr::new(
                        format!("{module}.{item}"),
                        start_line(node),
                    ));
                }
                "aliased_import" => {
                    saw_name = true;
                    let Some(target) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let item = node_text(target, source);
                    let mut import =
                        ImportIr::new(format!("{module}.{item}"), start_line(node));
                    import.alias = child
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, source).to_string());
                    ir.imports.push(import);
                }
                "wildcard_import" => {
                    saw_name = true;
                    let mut import =
                        ImportIr::new(format!("{module}.*"), start_line(node));
                    import.is_wildcard = true;
                    import.name = module
                        .rsplit('.')
                        .next()
                        .unwrap_or(&module)
                        .to_string();
                    ir.imports.push(import);
                }
                _ => {}
            }
        }
        if !saw_name && !module.is_empty() {
            ir.imports.push(ImportIr::new(module, start_line(node)));
        }
    }

    fn handle_call(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (name, full_name, receiver) = match function.kind() {
            NODE_IDENTIFIER => {
                let text = node_text(function, source).to_string();
                (text.clone(), text, None)
            }
            NODE_ATTRIBUTE => {
                let attr = function
                    .child_by_field_name("attribute")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                if attr.is_empty() {
                    return;
                }
                let receiver = function
                    .child_by_field_name("object")
                    .filter(|o| o.kind() == NODE_IDENTIFIER)
                    .map(|o| node_text(o, source).to_string());
                (attr, node_text(function, source).to_string(), receiver)
            }
            _ => return,
        };

        let mut call = CallIr::new(name, start_line(node));
        call.full_name = full_name;
        call.args = self.argument_texts(node, source);
        call.context = self.current_context();
        call.receiver_type = receiver.and_then(|var| self.var_types.get(&var).cloned());
        ir.calls.push(call);
    }

    fn handle_assignment(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        _depth: usize,
    ) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != NODE_IDENTIFIER {
            return;
        }
        let name = node_text(left, source).to_string();
        let right = node.child_by_field_name("right");

        // A lambda bound to a name is a function.
        if let Some(right) = right.filter(|r| r.kind() == NODE_LAMBDA) {
            let mut func = FunctionIr::new(name.clone(), start_line(node));
            func.full_name = self.qualified(&name);
            func.end_line = end_line(node);
            func.args = self.lambda_parameter_names(right, source);
            func.source_text = node_text(node, source).to_string();
            func.cyclomatic_complexity = complexity(right);
            func.context = self.current_context();
            ir.functions.push(func);
            return;
        }

        // Record `x = ClassName(...)` for receiver-type inference.
        if let Some(call) = right.filter(|r| r.kind() == NODE_CALL) {
            if let Some(callee) = call
                .child_by_field_name("function")
                .filter(|f| f.kind() == NODE_IDENTIFIER)
            {
                self.var_types
                    .insert(name.clone(), node_text(callee, source).to_string());
            }
        }

        // Only module- and class-level bindings become Variable nodes.
        let inside_function = self.scopes.iter().any(|s| !s.is_class);
        if inside_function {
            return;
        }
        let mut var = VariableIr::new(name, start_line(node));
        var.value = right.map(|r| node_text(r, source).to_string());
        var.type_name = node
            .child_by_field_name("type")
            .map(|t| node_text(t, source).to_string());
        var.context = self.current_context();
        ir.variables.push(var);
    }

    fn parameter_names(&self, node: Node<'_>, source: &str) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                NODE_IDENTIFIER => names.push(node_text(param, source).to_string()),
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    if let Some(ident) = first_identifier(param) {
                        names.push(node_text(ident, source).to_string());
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(ident) = param.child_by_field_name("name") {
                        names.push(node_text(ident, source).to_string());
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn lambda_parameter_names(&self, lambda: Node<'_>, source: &str) -> Vec<String> {
        let Some(params) = lambda.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if param.kind() == NODE_IDENTIFIER {
                names.push(node_text(param, source).to_string());
            } else if let Some(ident) = first_identifier(param) {
                names.push(node_text(ident, source).to_string());
            }
        }
        names
    }

    fn argument_texts(&self, call: Node<'_>, source: &str) -> Vec<String> {
        let Some(args) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut texts = Vec::new();
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            texts.push(node_text(arg, source).to_string());
        }
        texts
    }

    /// First string-literal statement of the body, quotes stripped.
    fn docstring(&self, node: Node<'_>, source: &str) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        Some(strip_string_quotes(node_text(string, source)).to_string())
    }

    /// Decorator names from an enclosing `decorated_definition`, `@` removed.
    fn decorators(&self, node: Node<'_>, source: &str) -> Vec<String> {
        let Some(parent) = node.parent().filter(|p| p.kind() == NODE_DECORATED) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                let text = node_text(child, source).trim_start_matches('@');
                names.push(text.trim().to_string());
            }
        }
        names
    }
}

fn first_identifier<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == NODE_IDENTIFIER);
    found
}

fn strip_string_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
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
        }
        count_complexity(child, count, depth + 1);
    }
}

impl Extractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        self.scopes.clear();
        self.var_types.clear();

        let mut ir = FileIr::empty(path.to_path_buf(), Language::Python, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Python,
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
            let definition = if child.kind() == NODE_DECORATED {
                child.child_by_field_name("definition").unwrap_or(child)
            } else {
                child
            };
            if matches!(definition.kind(), NODE_FUNCTION | NODE_CLASS) {
                if let Some(name) = definition.child_by_field_name("name") {
                    names.push(node_text(name, source).to_string());
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileIr {
        let mut extractor = PythonExtractor::new(GrammarRegistry::global());
        extractor.extract(Path::new("/test.py"), source, false)
    }

    #[test]
    fn functions_and_nested_defs() {
        let ir = extract(
            "def outer(a, b=1, *args, **kwargs):\n    def inner():\n        pass\n    return inner\n",
        );
        assert_eq!(ir.functions.len(), 2);
        let outer = &ir.functions[0];
        assert_eq!(outer.name, "outer");
        assert_eq!(outer.line_number, 1);
        assert_eq!(outer.args, vec!["a", "b", "args", "kwargs"]);

        let inner = &ir.functions[1];
        assert_eq!(inner.full_name, "outer.inner");
        let ctx = inner.context.as_ref().unwrap();
        assert_eq!(ctx.function.as_deref(), Some("outer"));
        assert_eq!(ctx.line, 1);
    }

    #[test]
    fn docstring_and_decorators() {
        let ir = extract(
            "@staticmethod\n@cached\ndef f():\n    \"\"\"Doc line.\"\"\"\n    return 1\n",
        );
        let f = &ir.functions[0];
        assert_eq!(f.docstring.as_deref(), Some("Doc line."));
        assert_eq!(f.decorators, vec!["staticmethod", "cached"]);
        assert!(f.is_static);
    }

    #[test]
    fn class_with_bases_and_method_context() {
        let ir = extract(
            "class Dog(Animal):\n    def bark(self):\n        pass\n",
        );
        assert_eq!(ir.classes.len(), 1);
        assert_eq!(ir.classes[0].bases, vec!["Animal"]);
        assert_eq!(ir.inherits.len(), 1);
        assert_eq!(ir.inherits[0].derived, "Dog");
        assert_eq!(ir.inherits[0].base, "Animal");

        let bark = &ir.functions[0];
        assert_eq!(bark.full_name, "Dog.bark");
        assert_eq!(
            bark.context.as_ref().unwrap().class.as_deref(),
            Some("Dog")
        );
    }

    #[test]
    fn imports_preserve_aliases() {
        let ir = extract(
            "import os\nimport numpy as np\nfrom pathlib import Path\nfrom a.b import c as d\nfrom x import *\n",
        );
        assert_eq!(ir.imports.len(), 5);
        assert_eq!(ir.imports[0].full_name, "os");
        assert_eq!(ir.imports[1].full_name, "numpy");
        assert_eq!(ir.imports[1].alias.as_deref(), Some("np"));
        assert_eq!(ir.imports[2].full_name, "pathlib.Path");
        assert_eq!(ir.imports[2].name, "Path");
        assert_eq!(ir.imports[3].full_name, "a.b.c");
        assert_eq!(ir.imports[3].alias.as_deref(), Some("d"));
        assert!(ir.imports[4].is_wildcard);
    }

    #[test]
    fn calls_carry_context_and_args() {
        let ir = extract("def foo():\n    helper(1, x)\n");
        assert_eq!(ir.calls.len(), 1);
        let call = &ir.calls[0];
        assert_eq!(call.name, "helper");
        assert_eq!(call.line_number, 2);
        assert_eq!(call.args, vec!["1", "x"]);
        assert_eq!(
            call.context.as_ref().unwrap().function.as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn receiver_type_inferred_from_constructor_binding() {
        let ir = extract(
            "def run():\n    dog = Dog()\n    dog.bark()\n",
        );
        let bark = ir.calls.iter().find(|c| c.name == "bark").unwrap();
        assert_eq!(bark.full_name, "dog.bark");
        assert_eq!(bark.receiver_type.as_deref(), Some("Dog"));
    }

    #[test]
    fn lambda_bound_by_assignment_is_a_function() {
        let ir = extract("double = lambda x: x * 2\n");
        assert_eq!(ir.functions.len(), 1);
        assert_eq!(ir.functions[0].name, "double");
        assert_eq!(ir.functions[0].args, vec!["x"]);
        assert!(ir.variables.is_empty());
    }

    #[test]
    fn module_level_variables_only() {
        let ir = extract(
            "LIMIT = 100\ndef f():\n    local = 1\n",
        );
        assert_eq!(ir.variables.len(), 1);
        assert_eq!(ir.variables[0].name, "LIMIT");
        assert_eq!(ir.variables[0].value.as_deref(), Some("100"));
    }

    #[test]
    fn cyclomatic_complexity_counts_branches() {
        let ir = extract(
            "def f(items):\n    if items and len(items) > 1:\n        for i in items:\n            while i:\n                i -= 1\n    return [x for x in items]\n",
        );
        // 1 + if + boolean_operator + for + while + comprehension
        assert_eq!(ir.functions[0].cyclomatic_complexity, 6);
    }

    #[test]
    fn top_level_symbols_skip_nested() {
        let mut extractor = PythonExtractor::new(GrammarRegistry::global());
        let names = extractor.top_level_symbols(
            "def a():\n    def nested(): pass\nclass B:\n    def method(self): pass\n",
        );
        assert_eq!(names, vec!["a", "B"]);
    }
}
