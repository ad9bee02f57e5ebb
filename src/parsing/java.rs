//! Java extractor.
//!
//! Captures classes, interfaces, enums, and annotation types; methods and
//! constructors (constructor flag set); `import` and `import static` with the
//! wildcard flag; `extends` and `implements` clauses; method invocations and
//! constructor calls. Nested classes use dotted full-names.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImplementIr, ImportIr, InheritIr,
    TypeKind,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_CLASS: &str = "class_declaration";
const NODE_INTERFACE: &str = "interface_declaration";
const NODE_ENUM: &str = "enum_declaration";
const NODE_ANNOTATION: &str = "annotation_type_declaration";
const NODE_METHOD: &str = "method_declaration";
const NODE_CONSTRUCTOR: &str = "constructor_declaration";
const NODE_IMPORT: &str = "import_declaration";
const NODE_INVOCATION: &str = "method_invocation";
const NODE_OBJECT_CREATION: &str = "object_creation_expression";
const NODE_IDENTIFIER: &str = "identifier";

const TYPE_KINDS: &[&str] = &[NODE_CLASS, NODE_INTERFACE, NODE_ENUM, NODE_ANNOTATION];
const CALLABLE_KINDS: &[&str] = &[NODE_METHOD, NODE_CONSTRUCTOR];

pub struct JavaExtractor {
    parser: Parser,
}

impl std::fmt::Debug for JavaExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JavaExtractor").finish()
    }
}

impl JavaExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Java),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_CLASS | NODE_INTERFACE | NODE_ENUM | NODE_ANNOTATION => {
                self.handle_type(node, source, ir);
            }
            NODE_METHOD | NODE_CONSTRUCTOR => self.handle_callable(node, source, ir),
            NODE_IMPORT => self.handle_import(node, source, ir),
            NODE_INVOCATION => self.handle_invocation(node, source, ir),
            NODE_OBJECT_CREATION => self.handle_object_creation(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_type(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let line = start_line(node);
        let kind = match node.kind() {
            NODE_INTERFACE => TypeKind::Interface,
            NODE_ENUM => TypeKind::Enum,
            NODE_ANNOTATION => TypeKind::Annotation,
            _ => TypeKind::Class,
        };

        let mut class = ClassIr::new(name.clone(), line, kind);
        class.full_name = match enclosing_class_name(node, source) {
            Some(outer) => format!("{outer}.{name}"),
            None => name.clone(),
        };
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.docstring = javadoc_for(node, source);
        class.context = self.context_of(node, source);

        // extends: a single superclass.
        if let Some(superclass) = node.child_by_field_name("superclass") {
            let mut cursor = superclass.walk();
            for child in superclass.named_children(&mut cursor) {
                if matches!(child.kind(), "type_identifier" | "generic_type" | "scoped_type_identifier") {
                    let base = base_type_name(child, source);
                    ir.inherits.push(InheritIr {
                        derived: name.clone(),
                        base: base.clone(),
                        line_number: line,
                    });
                    class.bases.push(base);
                }
            }
        }

        // implements: one record per interface in the type list.
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            collect_interface_names(interfaces, source, |interface| {
                ir.implements.push(ImplementIr {
                    class_name: name.clone(),
                    interface_name: interface.clone(),
                    line_number: line,
                });
                class.bases.push(interface);
            });
        }

        ir.classes.push(class);
    }

    fn handle_callable(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let class_context = enclosing_class_name(node, source);

        let mut func = FunctionIr::new(name.clone(), start_line(node));
        func.full_name = match &class_context {
            Some(class) => format!("{class}.{name}"),
            None => name,
        };
        func.end_line = end_line(node);
        func.source_text = node_text(node, source).to_string();
        func.docstring = javadoc_for(node, source);
        func.is_constructor = node.kind() == NODE_CONSTRUCTOR;
        func.context = self.context_of(node, source);
        func.return_type = node
            .child_by_field_name("type")
            .map(|t| node_text(t, source).to_string());

        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if matches!(param.kind(), "formal_parameter" | "spread_parameter") {
                    if let Some(p_name) = param.child_by_field_name("name") {
                        func.args.push(node_text(p_name, source).to_string());
                    }
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" && node_text(child, source).contains("static") {
                func.is_static = true;
            }
        }
        ir.functions.push(func);
    }

    fn handle_import(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let text = node_text(node, source);
        let is_static = text.contains("import static");
        let is_wildcard = text.contains(".*");

        let mut path = None;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if matches!(child.kind(), "scoped_identifier" | NODE_IDENTIFIER) {
                path = Some(node_text(child, source).to_string());
            }
        }
        let Some(mut path) = path else { return };
        if is_wildcard {
            path.push_str(".*");
        }

        let mut import = ImportIr::new(path.clone(), start_line(node));
        import.is_static = is_static;
        import.is_wildcard = is_wildcard;
        if is_wildcard {
            import.name = path
                .trim_end_matches(".*")
                .rsplit('.')
                .next()
                .unwrap_or(&path)
                .to_string();
        }
        ir.imports.push(import);
    }

    fn handle_invocation(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, source).to_string();
        let mut call = CallIr::new(name.clone(), start_line(node));
        if let Some(object) = node.child_by_field_name("object") {
            call.full_name = format!("{}.{name}", node_text(object, source));
        }
        call.context = self.context_of(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_object_creation(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let name = base_type_name(type_node, source);
        let mut call = CallIr::new(name.clone(), start_line(node));
        call.receiver_type = Some(name);
        call.context = self.context_of(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn context_of(&self, node: Node<'_>, source: &str) -> Option<EnclosingContext> {
        let callable = nearest_ancestor(node, CALLABLE_KINDS);
        let function = callable
            .and_then(|c| c.child_by_field_name("name"))
            .map(|n| node_text(n, source).to_string());
        let class = enclosing_class_name(node, source);
        let line = callable
            .map(start_line)
            .or_else(|| nearest_ancestor(node, TYPE_KINDS).map(start_line))?;
        if function.is_none() && class.is_none() {
            return None;
        }
        Some(EnclosingContext::new(function, class, line))
    }
}

/// Name of the nearest enclosing type declaration, if any.
fn enclosing_class_name(node: Node<'_>, source: &str) -> Option<String> {
    nearest_ancestor(node, TYPE_KINDS)
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| node_text(n, source).to_string())
}

/// Strip generics and packages: `List<String>` -> `List`, `a.b.C` -> `C`.
fn base_type_name(node: Node<'_>, source: &str) -> String {
    let text = node_text(node, source);
    let no_generics = text.split('<').next().unwrap_or(text);
    no_generics
        .rsplit('.')
        .next()
        .unwrap_or(no_generics)
        .trim()
        .to_string()
}

fn collect_interface_names(interfaces: Node<'_>, source: &str, mut sink: impl FnMut(String)) {
    // super_interfaces > type_list > type_identifier | generic_type
    let mut cursor = interfaces.walk();
    for child in interfaces.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut list_cursor = child.walk();
            for ty in child.named_children(&mut list_cursor) {
                sink(base_type_name(ty, source));
            }
        }
    }
}

/// JavaDoc (or adjacent comments) directly above a declaration.
fn javadoc_for(node: Node<'_>, source: &str) -> Option<String> {
    let sibling = node.prev_sibling()?;
    if !matches!(sibling.kind(), "block_comment" | "line_comment") {
        return None;
    }
    let raw = node_text(sibling, source).trim();
    let cleaned = raw
        .strip_prefix("/**")
        .or_else(|| raw.strip_prefix("/*"))
        .and_then(|s| s.strip_suffix("*/"))
        .unwrap_or_else(|| raw.trim_start_matches("//"));
    Some(cleaned.trim().to_string())
}

impl Extractor for JavaExtractor {
    fn language(&self) -> Language {
        Language::Java
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Java, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Java,
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
        collect_type_names(tree.root_node(), source, &mut names, 0);
        names
    }
}

fn collect_type_names(node: Node<'_>, source: &str, names: &mut Vec<String>, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    if TYPE_KINDS.contains(&node.kind()) {
        if let Some(name) = node.child_by_field_name("name") {
            names.push(node_text(name, source).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_type_names(child, source, names, depth + 1);
    }
}
