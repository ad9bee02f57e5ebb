//! Go extractor.
//!
//! Captures functions, methods (receiver type becomes the class context),
//! struct and interface types, imports with aliases, call sites, and
//! package-level var/const declarations.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImportIr, TypeKind, VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION: &str = "function_declaration";
const NODE_METHOD: &str = "method_declaration";
const NODE_TYPE_SPEC: &str = "type_spec";
const NODE_IMPORT_SPEC: &str = "import_spec";
const NODE_CALL: &str = "call_expression";
const NODE_VAR_SPEC: &str = "var_spec";
const NODE_CONST_SPEC: &str = "const_spec";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_SELECTOR: &str = "selector_expression";

pub struct GoExtractor {
    parser: Parser,
}

impl std::fmt::Debug for GoExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoExtractor").finish()
    }
}

impl GoExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Go),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION => self.handle_function(node, source, ir, None),
            NODE_METHOD => {
                let receiver = receiver_type(node, source);
                self.handle_function(node, source, ir, receiver);
            }
            NODE_TYPE_SPEC => self.handle_type_spec(node, source, ir),
            NODE_IMPORT_SPEC => self.handle_import_spec(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_VAR_SPEC | NODE_CONST_SPEC => self.handle_var_spec(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_function(
        &mut self,
        node: Node<'_>,
        source: &str,
        ir: &mut FileIr,
        receiver: Option<String>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let mut func = FunctionIr::new(name.clone(), start_line(node));
        if let Some(receiver) = &receiver {
            func.full_name = format!("{receiver}.{name}");
            func.context = Some(EnclosingContext::new(
                None,
                Some(receiver.clone()),
                start_line(node),
            ));
        }
        func.end_line = end_line(node);
        func.source_text = node_text(node, source).to_string();
        func.return_type = node
            .child_by_field_name("result")
            .map(|r| node_text(r, source).to_string());
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if param.kind() == "parameter_declaration" {
                    let mut p_cursor = param.walk();
                    for child in param.named_children(&mut p_cursor) {
                        if child.kind() == NODE_IDENTIFIER {
                            func.args.push(node_text(child, source).to_string());
                        }
                    }
                }
            }
        }
        ir.functions.push(func);
    }

    fn handle_type_spec(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let kind = match type_node.kind() {
            "struct_type" => TypeKind::Struct,
            "interface_type" => TypeKind::Interface,
            _ => TypeKind::Typedef,
        };
        let mut class = ClassIr::new(node_text(name_node, source), start_line(node), kind);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        ir.classes.push(class);
    }

    fn handle_import_spec(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let path = node_text(path_node, source).trim_matches('"').to_string();
        let mut import = ImportIr::new(path, start_line(node));
        import.alias = node
            .child_by_field_name("name")
            .filter(|n| n.kind() == "package_identifier")
            .map(|n| node_text(n, source).to_string());
        ir.imports.push(import);
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
            NODE_SELECTOR => {
                let full = node_text(function, source).to_string();
                let short = function
                    .child_by_field_name("field")
                    .map(|f| node_text(f, source).to_string())
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

    fn handle_var_spec(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        // Only package-level specs; locals inside functions are dropped.
        if nearest_ancestor(node, &[NODE_FUNCTION, NODE_METHOD]).is_some() {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut var = VariableIr::new(node_text(name_node, source), start_line(node));
        var.type_name = node
            .child_by_field_name("type")
            .map(|t| node_text(t, source).to_string());
        var.value = node
            .child_by_field_name("value")
            .map(|v| node_text(v, source).to_string());
        var.modifiers.is_const = node.kind() == NODE_CONST_SPEC;
        ir.variables.push(var);
    }
}

/// The receiver's base type name: `(s *Server)` -> `Server`.
fn receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for param in receiver.named_children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        let ty = param.child_by_field_name("type")?;
        let text = node_text(ty, source).trim_start_matches(['*', '&']);
        return Some(text.to_string());
    }
    None
}

fn context_of(node: Node<'_>, source: &str) -> Option<EnclosingContext> {
    let def = nearest_ancestor(node, &[NODE_FUNCTION, NODE_METHOD])?;
    let function = def
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string());
    let class = if def.kind() == NODE_METHOD {
        receiver_type(def, source)
    } else {
        None
    };
    Some(EnclosingContext::new(function, class, start_line(def)))
}

impl Extractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Go, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Go,
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
    match node.kind() {
        NODE_FUNCTION | NODE_METHOD | NODE_TYPE_SPEC => {
            if let Some(name) = node.child_by_field_name("name") {
                names.push(node_text(name, source).to_string());
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_names(child, source, names, depth + 1);
    }
}
