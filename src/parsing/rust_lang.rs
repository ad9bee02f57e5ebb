//! Rust extractor.
//!
//! Captures free functions and impl methods (the impl type becomes the class
//! context), structs, enums, traits, `use` declarations with aliases, call
//! sites, statics/consts, and `macro_rules!` definitions. Trait impls yield
//! IMPLEMENTS records from the type to the trait.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImplementIr, ImportIr, MacroIr,
    TypeKind, VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION: &str = "function_item";
const NODE_IMPL: &str = "impl_item";
const NODE_STRUCT: &str = "struct_item";
const NODE_ENUM: &str = "enum_item";
const NODE_TRAIT: &str = "trait_item";
const NODE_USE: &str = "use_declaration";
const NODE_CALL: &str = "call_expression";
const NODE_STATIC: &str = "static_item";
const NODE_CONST: &str = "const_item";
const NODE_MACRO_DEF: &str = "macro_definition";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_SCOPED_IDENTIFIER: &str = "scoped_identifier";
const NODE_FIELD_EXPRESSION: &str = "field_expression";

pub struct RustExtractor {
    parser: Parser,
}

impl std::fmt::Debug for RustExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustExtractor").finish()
    }
}

impl RustExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::Rust),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION => self.handle_function(node, source, ir),
            NODE_IMPL => self.handle_impl(node, source, ir),
            NODE_STRUCT => self.handle_type(node, source, ir, TypeKind::Struct),
            NODE_ENUM => self.handle_type(node, source, ir, TypeKind::Enum),
            NODE_TRAIT => self.handle_type(node, source, ir, TypeKind::Trait),
            NODE_USE => self.handle_use(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_STATIC | NODE_CONST => self.handle_static(node, source, ir),
            NODE_MACRO_DEF => self.handle_macro(node, source, ir),
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
        let name = node_text(name_node, source).to_string();
        let impl_type = enclosing_impl_type(node, source);

        let mut func = FunctionIr::new(name.clone(), start_line(node));
        if let Some(ty) = &impl_type {
            func.full_name = format!("{ty}.{name}");
            func.context = Some(EnclosingContext::new(None, Some(ty.clone()), start_line(node)));
        }
        func.end_line = end_line(node);
        func.source_text = node_text(node, source).to_string();
        func.docstring = doc_comment_above(node, source);
        func.return_type = node
            .child_by_field_name("return_type")
            .map(|r| node_text(r, source).to_string());
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                match param.kind() {
                    "parameter" => {
                        if let Some(pattern) = param.child_by_field_name("pattern") {
                            if pattern.kind() == NODE_IDENTIFIER {
                                func.args.push(node_text(pattern, source).to_string());
                            }
                        }
                    }
                    "self_parameter" => func.args.push("self".to_string()),
                    _ => {}
                }
            }
        }
        ir.functions.push(func);
    }

    fn handle_impl(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        // `impl Trait for Type` records the implementation; inherent impls
        // only provide method context.
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        if let Some(trait_node) = node.child_by_field_name("trait") {
            ir.implements.push(ImplementIr {
                class_name: base_name(node_text(type_node, source)),
                interface_name: base_name(node_text(trait_node, source)),
                line_number: start_line(node),
            });
        }
    }

    fn handle_type(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, kind: TypeKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut class = ClassIr::new(node_text(name_node, source), start_line(node), kind);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.docstring = doc_comment_above(node, source);
        ir.classes.push(class);
    }

    fn handle_use(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(argument) = node.child_by_field_name("argument") else {
            return;
        };
        match argument.kind() {
            "use_as_clause" => {
                let Some(path) = argument.child_by_field_name("path") else {
                    return;
                };
                let mut import = ImportIr::new(
                    node_text(path, source).replace("::", "."),
                    start_line(node),
                );
                import.alias = argument
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, source).to_string());
                ir.imports.push(import);
            }
            "use_wildcard" => {
                let text = node_text(argument, source)
                    .trim_end_matches("::*")
                    .replace("::", ".");
                let mut import = ImportIr::new(format!("{text}.*"), start_line(node));
                import.is_wildcard = true;
                import.name = text.rsplit('.').next().unwrap_or(&text).to_string();
                ir.imports.push(import);
            }
            _ => {
                // Plain paths and scoped lists keep their full written form.
                ir.imports.push(ImportIr::new(
                    node_text(argument, source).replace("::", "."),
                    start_line(node),
                ));
            }
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
            NODE_SCOPED_IDENTIFIER => {
                let full = node_text(function, source).to_string();
                let short = full.rsplit("::").next().unwrap_or(&full).to_string();
                (short, full.replace("::", "."))
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
        call.context = context_of(node, source);
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_static(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        if nearest_ancestor(node, &[NODE_FUNCTION]).is_some() {
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
        var.modifiers.is_const = node.kind() == NODE_CONST;
        var.modifiers.is_static = node.kind() == NODE_STATIC;
        ir.variables.push(var);
    }

    fn handle_macro(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        ir.macros.push(MacroIr {
            name: node_text(name_node, source).to_string(),
            line_number: start_line(node),
            end_line: end_line(node),
            value: None,
            parameters: Vec::new(),
            is_function_like: true,
            source_text: node_text(node, source).to_string(),
        });
    }
}

/// `Vec<T>` -> `Vec`, `a::b::C` -> `C`.
fn base_name(text: &str) -> String {
    let no_generics = text.split('<').next().unwrap_or(text);
    no_generics
        .rsplit("::")
        .next()
        .unwrap_or(no_generics)
        .trim()
        .to_string()
}

fn enclosing_impl_type(node: Node<'_>, source: &str) -> Option<String> {
    let impl_node = nearest_ancestor(node, &[NODE_IMPL])?;
    let ty = impl_node.child_by_field_name("type")?;
    Some(base_name(node_text(ty, source)))
}

fn context_of(node: Node<'_>, source: &str) -> Option<EnclosingContext> {
    let function = nearest_ancestor(node, &[NODE_FUNCTION])?;
    let name = function
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string());
    let class = enclosing_impl_type(function, source);
    Some(EnclosingContext::new(name, class, start_line(function)))
}

/// Leading `///` lines joined, if present.
fn doc_comment_above(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        if sibling.kind() != "line_comment" {
            break;
        }
        let text = node_text(sibling, source);
        let Some(doc) = text.strip_prefix("///") else {
            break;
        };
        lines.push(doc.trim().to_string());
        current = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

impl Extractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::Rust, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::Rust,
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
    if matches!(
        node.kind(),
        NODE_FUNCTION | NODE_STRUCT | NODE_ENUM | NODE_TRAIT | NODE_MACRO_DEF
    ) {
        if let Some(name) = node.child_by_field_name("name") {
            names.push(node_text(name, source).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_names(child, source, names, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileIr {
        let mut extractor = RustExtractor::new(GrammarRegistry::global());
        extractor.extract(Path::new("/test.rs"), source, false)
    }

    #[test]
    fn functions_and_impl_methods() {
        let ir = extract(
            "fn free(a: u32) -> u32 { a }\n\nstruct Server;\n\nimpl Server {\n    fn start(&self, port: u16) {}\n}\n",
        );
        assert_eq!(ir.functions.len(), 2);
        assert_eq!(ir.functions[0].name, "free");
        assert_eq!(ir.functions[0].args, vec!["a"]);
        assert_eq!(ir.functions[1].full_name, "Server.start");
        assert_eq!(
            ir.functions[1].context.as_ref().unwrap().class.as_deref(),
            Some("Server")
        );
    }

    #[test]
    fn trait_impl_records_implementation() {
        let ir = extract(
            "trait Runner { fn run(&self); }\nstruct Job;\nimpl Runner for Job { fn run(&self) {} }\n",
        );
        assert_eq!(ir.implements.len(), 1);
        assert_eq!(ir.implements[0].class_name, "Job");
        assert_eq!(ir.implements[0].interface_name, "Runner");
        let trait_class = ir.classes.iter().find(|c| c.name == "Runner").unwrap();
        assert_eq!(trait_class.kind, TypeKind::Trait);
    }

    #[test]
    fn use_declarations() {
        let ir = extract(
            "use std::collections::HashMap;\nuse std::io as stdio;\nuse std::fmt::*;\n",
        );
        assert_eq!(ir.imports.len(), 3);
        assert_eq!(ir.imports[0].full_name, "std.collections.HashMap");
        assert_eq!(ir.imports[0].name, "HashMap");
        assert_eq!(ir.imports[1].alias.as_deref(), Some("stdio"));
        assert!(ir.imports[2].is_wildcard);
    }

    #[test]
    fn statics_consts_and_macros() {
        let ir = extract(
            "static LIMIT: u32 = 10;\nconst NAME: &str = \"x\";\nmacro_rules! twice { ($e:expr) => { $e * 2 }; }\n",
        );
        assert_eq!(ir.variables.len(), 2);
        assert!(ir.variables[0].modifiers.is_static);
        assert!(ir.variables[1].modifiers.is_const);
        assert_eq!(ir.macros.len(), 1);
        assert_eq!(ir.macros[0].name, "twice");
    }

    #[test]
    fn scoped_and_method_calls() {
        let ir = extract("fn f() { helper(); util::go(); value.render(); }\n");
        let names: Vec<&str> = ir.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["helper", "go", "render"]);
        assert_eq!(ir.calls[1].full_name, "util.go");
        assert_eq!(ir.calls[2].full_name, "value.render");
    }

    #[test]
    fn doc_comments_attach() {
        let ir = extract("/// Adds numbers.\n/// Carefully.\nfn add() {}\n");
        assert_eq!(
            ir.functions[0].docstring.as_deref(),
            Some("Adds numbers.\nCarefully.")
        );
    }
}
