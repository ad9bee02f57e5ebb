//! C++ extractor.
//!
//! Captures function definitions (including qualified and pointer
//! declarators), classes with base-class clauses, includes, scoped-identifier
//! and field-expression calls (the full call text is recorded), and member
//! declarations.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImportIr, InheritIr, TypeKind,
    VarModifiers, VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION_DEF: &str = "function_definition";
const NODE_FUNCTION_DECLARATOR: &str = "function_declarator";
const NODE_POINTER_DECLARATOR: &str = "pointer_declarator";
const NODE_REFERENCE_DECLARATOR: &str = "reference_declarator";
const NODE_CLASS: &str = "class_specifier";
const NODE_STRUCT: &str = "struct_specifier";
const NODE_INCLUDE: &str = "preproc_include";
const NODE_CALL: &str = "call_expression";
const NODE_FIELD_DECLARATION: &str = "field_declaration";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_QUALIFIED_IDENTIFIER: &str = "qualified_identifier";
const NODE_SCOPED_IDENTIFIER: &str = "scoped_identifier";
const NODE_FIELD_EXPRESSION: &str = "field_expression";

pub struct CppExtractor {
    parser: Parser,
}

impl std::fmt::Debug for CppExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CppExtractor").finish()
    }
}

impl CppExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Cpp),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION_DEF => self.handle_function(node, source, ir),
            NODE_CLASS => self.handle_class(node, source, ir, TypeKind::Class),
            NODE_STRUCT => self.handle_class(node, source, ir, TypeKind::Struct),
            NODE_INCLUDE => self.handle_include(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_FIELD_DECLARATION => self.handle_member(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_function(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(declarator) = find_function_declarator(node) else {
            return;
        };
        let Some(name_node) = declarator.child_by_field_name("declarator") else {
            return;
        };
        // `Widget::resize` keeps the qualified text as full_name and the
        // trailing segment as the short name.
        let full_text = node_text(name_node, source).to_string();
        let short = full_text
            .rsplit("::")
            .next()
            .unwrap_or(&full_text)
            .to_string();

        let mut func = FunctionIr::new(short, start_line(node));
        func.full_name = full_text;
        func.end_line = end_line(node);
        func.source_text = node_text(node, source).to_string();
        func.docstring = preceding_comment(node, source);
        func.context = self.enclosing_context(node, source);
        if let Some(params) = declarator.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if param.kind() == "parameter_declaration" {
                    if let Some(name) = param
                        .child_by_field_name("declarator")
                        .and_then(|d| innermost_identifier(d))
                    {
                        func.args.push(node_text(name, source).to_string());
                    }
                } else if param.kind() == "variadic_parameter" {
                    func.args.push("...".to_string());
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "storage_class_specifier" if node_text(child, source) == "static" => {
                    func.is_static = true;
                }
                "primitive_type" | "type_identifier" | "sized_type_specifier" => {
                    func.return_type = Some(node_text(child, source).to_string());
                }
                _ => {}
            }
        }
        ir.functions.push(func);
    }

    fn handle_class(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, kind: TypeKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if node.child_by_field_name("body").is_none() {
            return;
        }
        let name = node_text(name_node, source).to_string();
        let line = start_line(node);

        let mut class = ClassIr::new(name.clone(), line, kind);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.docstring = preceding_comment(node, source);

        // base_class_clause: `: public Base, private Other`
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "base_class_clause" {
                let mut base_cursor = child.walk();
                for base in child.named_children(&mut base_cursor) {
                    if matches!(
                        base.kind(),
                        "type_identifier" | NODE_QUALIFIED_IDENTIFIER
                    ) {
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
        }
        ir.classes.push(class);
    }

    fn handle_include(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = node_text(path_node, source);
        let path = raw.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
        let mut import = ImportIr::new(path.clone(), start_line(node));
        import.name = path;
        import.is_system = path_node.kind() == "system_lib_string";
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
            NODE_QUALIFIED_IDENTIFIER | NODE_SCOPED_IDENTIFIER => {
                let full = node_text(function, source).to_string();
                let short = full.rsplit("::").next().unwrap_or(&full).to_string();
                (short, full)
            }
            NODE_FIELD_EXPRESSION => {
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
        call.context = self.enclosing_context(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_member(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        // Method declarations inside a class body are function declarators.
        if declarator.kind() == NODE_FUNCTION_DECLARATOR {
            return;
        }
        let mut modifiers = VarModifiers::default();
        let Some(name_node) = innermost_field_identifier(declarator, &mut modifiers) else {
            return;
        };
        let mut var = VariableIr::new(node_text(name_node, source), start_line(node));
        var.type_name = node
            .child_by_field_name("type")
            .map(|t| node_text(t, source).to_string());
        var.modifiers = modifiers;
        var.context = self.enclosing_context(node, source);
        ir.variables.push(var);
    }

    fn enclosing_context(&self, node: Node<'_>, source: &str) -> Option<EnclosingContext> {
        let class = nearest_ancestor(node, &[NODE_CLASS, NODE_STRUCT])
            .and_then(|c| c.child_by_field_name("name"))
            .map(|n| node_text(n, source).to_string());
        let function = nearest_ancestor(node, &[NODE_FUNCTION_DEF]);
        let function_name = function
            .and_then(find_function_declarator)
            .and_then(|d| d.child_by_field_name("declarator"))
            .map(|n| {
                let full = node_text(n, source);
                full.rsplit("::").next().unwrap_or(full).to_string()
            });
        let line = function
            .map(start_line)
            .or_else(|| nearest_ancestor(node, &[NODE_CLASS, NODE_STRUCT]).map(start_line))?;
        if function_name.is_none() && class.is_none() {
            return None;
        }
        Some(EnclosingContext::new(function_name, class, line))
    }
}

fn find_function_declarator<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let mut declarator = node.child_by_field_name("declarator")?;
    loop {
        match declarator.kind() {
            NODE_FUNCTION_DECLARATOR => return Some(declarator),
            NODE_POINTER_DECLARATOR | NODE_REFERENCE_DECLARATOR => {
                declarator = declarator.child_by_field_name("declarator")?;
            }
            _ => return None,
        }
    }
}

fn innermost_identifier<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    match node.kind() {
        NODE_IDENTIFIER => Some(node),
        NODE_POINTER_DECLARATOR | NODE_REFERENCE_DECLARATOR | "array_declarator" => node
            .child_by_field_name("declarator")
            .and_then(innermost_identifier),
        _ => None,
    }
}

fn innermost_field_identifier<'tree>(
    node: Node<'tree>,
    modifiers: &mut VarModifiers,
) -> Option<Node<'tree>> {
    match node.kind() {
        "field_identifier" => Some(node),
        NODE_POINTER_DECLARATOR => {
            modifiers.is_pointer = true;
            node.child_by_field_name("declarator")
                .and_then(|d| innermost_field_identifier(d, modifiers))
        }
        "array_declarator" => {
            modifiers.is_array = true;
            node.child_by_field_name("declarator")
                .and_then(|d| innermost_field_identifier(d, modifiers))
        }
        _ => None,
    }
}

fn preceding_comment(node: Node<'_>, source: &str) -> Option<String> {
    let sibling = node.prev_sibling()?;
    if sibling.kind() == "comment" {
        Some(node_text(sibling, source).to_string())
    } else {
        None
    }
}

impl Extractor for CppExtractor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Cpp, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Cpp,
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
        NODE_FUNCTION_DEF => {
            if let Some(name) = find_function_declarator(node)
                .and_then(|d| d.child_by_field_name("declarator"))
            {
                let full = node_text(name, source);
                names.push(full.rsplit("::").next().unwrap_or(full).to_string());
            }
        }
        NODE_CLASS | NODE_STRUCT => {
            if node.child_by_field_name("body").is_some() {
                if let Some(name) = node.child_by_field_name("name") {
                    names.push(node_text(name, source).to_string());
                }
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_names(child, source, names, depth + 1);
    }
}
