//! Ruby extractor.
//!
//! Captures methods (including singleton methods), classes with superclasses,
//! modules, `require`/`require_relative` as imports, call sites, and
//! top-level or class-level assignments as variables.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImportIr, InheritIr, TypeKind,
    VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_METHOD: &str = "method";
const NODE_SINGLETON_METHOD: &str = "singleton_method";
const NODE_CLASS: &str = "class";
const NODE_MODULE: &str = "module";
const NODE_CALL: &str = "call";
const NODE_ASSIGNMENT: &str = "assignment";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_CONSTANT: &str = "constant";

const METHOD_KINDS: &[&str] = &[NODE_METHOD, NODE_SINGLETON_METHOD];
const TYPE_KINDS: &[&str] = &[NODE_CLASS, NODE_MODULE];

pub struct RubyExtractor {
    parser: Parser,
}

impl std::fmt::Debug for RubyExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RubyExtractor").finish()
    }
}

impl RubyExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Ruby),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_METHOD | NODE_SINGLETON_METHOD => self.handle_method(node, source, ir),
            NODE_CLASS => self.handle_class(node, source, ir),
            NODE_MODULE => self.handle_module(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_ASSIGNMENT => self.handle_assignment(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_method(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let class = enclosing_type_name(node, source);

        let mut func = FunctionIr::new(name.clone(), start_line(node));
        func.full_name = match &class {
            Some(class) => format!("{class}.{name}"),
            None => name,
        };
        func.end_line = end_line(node);
        func.source_text = node_text(node, source).to_string();
        func.is_static = node.kind() == NODE_SINGLETON_METHOD;
        func.context = context_of(node, source);
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                match param.kind() {
                    NODE_IDENTIFIER => func.args.push(node_text(param, source).to_string()),
                    "optional_parameter" | "keyword_parameter" | "splat_parameter"
                    | "hash_splat_parameter" | "block_parameter" => {
                        if let Some(inner) = param
                            .child_by_field_name("name")
                            .or_else(|| first_identifier(param))
                        {
                            func.args.push(node_text(inner, source).to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
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
        if let Some(superclass) = node.child_by_field_name("superclass") {
            let mut cursor = superclass.walk();
            for child in superclass.named_children(&mut cursor) {
                if matches!(child.kind(), NODE_CONSTANT | "scope_resolution") {
                    let base = node_text(child, source)
                        .rsplit("::")
                        .next()
                        .unwrap_or("")
                        .to_string();
                    if !base.is_empty() {
                        ir.inherits.push(InheritIr {
                            derived: name.clone(),
                            base: base.clone(),
                            line_number: line,
                        });
                        class.bases.push(base);
                    }
                }
            }
        }
        ir.classes.push(class);
    }

    fn handle_module(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut class = ClassIr::new(
            node_text(name_node, source),
            start_line(node),
            TypeKind::Module,
        );
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        ir.classes.push(class);
    }

    fn handle_call(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(method_node) = node.child_by_field_name("method") else {
            return;
        };
        let name = node_text(method_node, source).to_string();

        // require/require_relative are imports, not calls.
        if matches!(name.as_str(), "require" | "require_relative") {
            if let Some(args) = node.child_by_field_name("arguments") {
                let mut cursor = args.walk();
                if let Some(first) = args.named_children(&mut cursor).next() {
                    let target = node_text(first, source)
                        .trim_matches(|c| c == '"' || c == '\'')
                        .to_string();
                    ir.imports.push(ImportIr::new(target, start_line(node)));
                    return;
                }
            }
        }

        let mut call = CallIr::new(name.clone(), start_line(node));
        if let Some(receiver) = node.child_by_field_name("receiver") {
            call.full_name = format!("{}.{name}", node_text(receiver, source));
        }
        call.context = context_of(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_assignment(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        // Locals inside methods are dropped.
        if nearest_ancestor(node, METHOD_KINDS).is_some() {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if !matches!(left.kind(), NODE_IDENTIFIER | NODE_CONSTANT) {
            return;
        }
        let mut var = VariableIr::new(node_text(left, source), start_line(node));
        var.value = node
            .child_by_field_name("right")
            .map(|r| node_text(r, source).to_string());
        var.modifiers.is_const = left.kind() == NODE_CONSTANT;
        var.context = context_of(node, source);
        ir.variables.push(var);
    }
}

fn enclosing_type_name(node: Node<'_>, source: &str) -> Option<String> {
    nearest_ancestor(node, TYPE_KINDS)
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| node_text(n, source).to_string())
}

fn context_of(node: Node<'_>, source: &str) -> Option<EnclosingContext> {
    let method = nearest_ancestor(node, METHOD_KINDS);
    let function = method
        .and_then(|m| m.child_by_field_name("name"))
        .map(|n| node_text(n, source).to_string());
    let class = enclosing_type_name(node, source);
    let line = method
        .map(start_line)
        .or_else(|| nearest_ancestor(node, TYPE_KINDS).map(start_line))?;
    if function.is_none() && class.is_none() {
        return None;
    }
    Some(EnclosingContext::new(function, class, line))
}

fn first_identifier<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == NODE_IDENTIFIER);
    found
}

impl Extractor for RubyExtractor {
    fn language(&self) -> Language {
        Language::Ruby
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Ruby, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Ruby,
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
        let mut names = Vec::new();
        collect_names(tree.root_node(), source, &mut names, 0);
        names
    }
}

fn collect_names(node: Node<'_>, source: &str, names: &mut Vec<String>, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    if matches!(node.kind(), NODE_METHOD | NODE_SINGLETON_METHOD | NODE_CLASS | NODE_MODULE) {
        if let Some(name) = node.child_by_field_name("name") {
            names.push(node_text(name, source).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_names(child, source, names, depth + 1);
    }
}
