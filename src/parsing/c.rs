//! C extractor.
//!
//! Captures function definitions (including pointer-returning declarators),
//! structs, unions, enums, typedefs, preprocessor includes (system vs local),
//! `#define` macros with function-like parameters, call sites, and global
//! variables. Function-local declarations are dropped.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::ir::{
    CallIr, ClassIr, EnclosingContext, FileIr, FunctionIr, ImportIr, MacroIr, TypeKind,
    VarModifiers, VariableIr,
};
use crate::parsing::extractor::{
    Extractor, check_depth, end_line, nearest_ancestor, node_text, start_line,
};
use crate::parsing::{GrammarRegistry, Language};

const NODE_FUNCTION_DEF: &str = "function_definition";
const NODE_FUNCTION_DECLARATOR: &str = "function_declarator";
const NODE_POINTER_DECLARATOR: &str = "pointer_declarator";
const NODE_ARRAY_DECLARATOR: &str = "array_declarator";
const NODE_STRUCT: &str = "struct_specifier";
const NODE_UNION: &str = "union_specifier";
const NODE_ENUM: &str = "enum_specifier";
const NODE_TYPEDEF: &str = "type_definition";
const NODE_INCLUDE: &str = "preproc_include";
const NODE_DEFINE: &str = "preproc_def";
const NODE_DEFINE_FN: &str = "preproc_function_def";
const NODE_CALL: &str = "call_expression";
const NODE_DECLARATION: &str = "declaration";
const NODE_IDENTIFIER: &str = "identifier";

const COMPLEXITY_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "do_statement",
    "switch_statement",
    "case_statement",
    "conditional_expression",
    "goto_statement",
];

pub struct CExtractor {
    parser: Parser,
}

impl std::fmt::Debug for CExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CExtractor").finish()
    }
}

impl CExtractor {
    pub fn new(registry: &GrammarRegistry) -> Self {
        Self {
            parser: registry.parser(Language::C),
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, depth: usize) {
        if !check_depth(depth, node) {
            return;
        }

        match node.kind() {
            NODE_FUNCTION_DEF => self.handle_function(node, source, ir),
            NODE_STRUCT => self.handle_type(node, source, ir, TypeKind::Struct),
            NODE_UNION => self.handle_type(node, source, ir, TypeKind::Union),
            NODE_ENUM => self.handle_type(node, source, ir, TypeKind::Enum),
            NODE_TYPEDEF => self.handle_typedef(node, source, ir),
            NODE_INCLUDE => self.handle_include(node, source, ir),
            NODE_DEFINE | NODE_DEFINE_FN => self.handle_macro(node, source, ir),
            NODE_CALL => self.handle_call(node, source, ir),
            NODE_DECLARATION => self.handle_declaration(node, source, ir),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, ir, depth + 1);
        }
    }

    fn handle_function(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some((name_node, params_node)) = function_declarator_parts(node) else {
            return;
        };
        let name = node_text(name_node, source).to_string();

        let mut func = FunctionIr::new(name, start_line(node));
        func.end_line = end_line(node);
        func.args = parameter_names(params_node, source);
        func.source_text = node_text(node, source).to_string();
        func.docstring = preceding_comment(node, source);
        func.cyclomatic_complexity = complexity(node);
        func.context = enclosing_function(node, source)
            .map(|(f, line)| EnclosingContext::new(Some(f), None, line));

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "storage_class_specifier" => {
                    if node_text(child, source) == "static" {
                        func.is_static = true;
                    }
                }
                "primitive_type" | "type_identifier" | "sized_type_specifier" => {
                    func.return_type = Some(node_text(child, source).to_string());
                }
                _ => {}
            }
        }
        ir.functions.push(func);
    }

    fn handle_type(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr, kind: TypeKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        // Bare references like `struct foo x;` repeat the specifier without a
        // body; only definitions carry one.
        if node.child_by_field_name("body").is_none() {
            return;
        }
        let name = node_text(name_node, source).to_string();
        let mut class = ClassIr::new(name, start_line(node), kind);
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        class.docstring = preceding_comment(node, source);
        class.context = enclosing_function(node, source)
            .map(|(f, line)| EnclosingContext::new(Some(f), None, line));
        ir.classes.push(class);
    }

    fn handle_typedef(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        if declarator.kind() != "type_identifier" {
            return;
        }
        let mut class = ClassIr::new(
            node_text(declarator, source),
            start_line(node),
            TypeKind::Typedef,
        );
        class.end_line = end_line(node);
        class.source_text = node_text(node, source).to_string();
        ir.classes.push(class);
    }

    fn handle_include(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = node_text(path_node, source);
        let is_system = path_node.kind() == "system_lib_string";
        let path = raw.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();

        let mut import = ImportIr::new(path.clone(), start_line(node));
        import.name = path;
        import.is_system = is_system;
        ir.imports.push(import);
    }

    fn handle_macro(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let value = node
            .child_by_field_name("value")
            .map(|v| node_text(v, source).trim().to_string());
        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for child in params.named_children(&mut cursor) {
                if child.kind() == NODE_IDENTIFIER {
                    parameters.push(node_text(child, source).to_string());
                }
            }
        }

        ir.macros.push(MacroIr {
            name: node_text(name_node, source).to_string(),
            line_number: start_line(node),
            end_line: end_line(node),
            value,
            is_function_like: node.kind() == NODE_DEFINE_FN,
            parameters,
            source_text: node_text(node, source).trim_end().to_string(),
        });
    }

    fn handle_call(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() != NODE_IDENTIFIER {
            return;
        }
        let mut call = CallIr::new(node_text(function, source), start_line(node));
        call.context = enclosing_function(node, source)
            .map(|(f, line)| EnclosingContext::new(Some(f), None, line));
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                call.args.push(node_text(arg, source).to_string());
            }
        }
        ir.calls.push(call);
    }

    fn handle_declaration(&mut self, node: Node<'_>, source: &str, ir: &mut FileIr) {
        // Locals are dropped; only globals enter the variables collection.
        if nearest_ancestor(node, &[NODE_FUNCTION_DEF]).is_some() {
            return;
        }

        let mut modifiers = VarModifiers::default();
        let mut type_name = None;
        let mut name = None;
        let mut value = None;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "storage_class_specifier" => match node_text(child, source) {
                    "static" => modifiers.is_static = true,
                    "extern" => modifiers.is_extern = true,
                    _ => {}
                },
                "type_qualifier" => {
                    if node_text(child, source) == "const" {
                        modifiers.is_const = true;
                    }
                }
                "primitive_type" | "type_identifier" | "sized_type_specifier" => {
                    type_name = Some(node_text(child, source).to_string());
                }
                "init_declarator" => {
                    if let Some(declarator) = child.child_by_field_name("declarator") {
                        name = declarator_name(declarator, source, &mut modifiers);
                    }
                    if let Some(v) = child.child_by_field_name("value") {
                        value = Some(node_text(v, source).to_string());
                    }
                }
                NODE_IDENTIFIER => {
                    if name.is_none() {
                        name = Some(node_text(child, source).to_string());
                    }
                }
                NODE_POINTER_DECLARATOR | NODE_ARRAY_DECLARATOR => {
                    if name.is_none() {
                        name = declarator_name(child, source, &mut modifiers);
                    }
                }
                _ => {}
            }
        }

        let Some(name) = name else { return };
        // Function prototypes parse as declarations with a function
        // declarator; those are not variables.
        if node_text(node, source).contains('(') && value.is_none() && !modifiers.is_pointer {
            let mut inner = node.walk();
            if node
                .children(&mut inner)
                .any(|c| has_descendant_kind(c, NODE_FUNCTION_DECLARATOR, 0))
            {
                return;
            }
        }

        let mut var = VariableIr::new(name, start_line(node));
        var.type_name = type_name;
        var.value = value;
        var.modifiers = modifiers;
        ir.variables.push(var);
    }
}

/// Resolve the identifier inside (possibly pointer/array) declarators.
fn declarator_name(
    node: Node<'_>,
    source: &str,
    modifiers: &mut VarModifiers,
) -> Option<String> {
    match node.kind() {
        NODE_IDENTIFIER => Some(node_text(node, source).to_string()),
        NODE_POINTER_DECLARATOR => {
            modifiers.is_pointer = true;
            node.child_by_field_name("declarator")
                .and_then(|inner| declarator_name(inner, source, modifiers))
        }
        NODE_ARRAY_DECLARATOR => {
            modifiers.is_array = true;
            node.child_by_field_name("declarator")
                .and_then(|inner| declarator_name(inner, source, modifiers))
        }
        _ => None,
    }
}

/// The identifier and parameter list of a function definition, looking
/// through pointer declarators.
fn function_declarator_parts<'tree>(
    node: Node<'tree>,
) -> Option<(Node<'tree>, Option<Node<'tree>>)> {
    let mut declarator = node.child_by_field_name("declarator")?;
    while declarator.kind() == NODE_POINTER_DECLARATOR {
        declarator = declarator.child_by_field_name("declarator")?;
    }
    if declarator.kind() != NODE_FUNCTION_DECLARATOR {
        return None;
    }
    let params = declarator.child_by_field_name("parameters");
    let mut name = declarator.child_by_field_name("declarator")?;
    while name.kind() == NODE_POINTER_DECLARATOR {
        name = name.child_by_field_name("declarator")?;
    }
    if name.kind() != NODE_IDENTIFIER {
        return None;
    }
    Some((name, params))
}

fn parameter_names(params: Option<Node<'_>>, source: &str) -> Vec<String> {
    let Some(params) = params else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "parameter_declaration" => {
                if let Some(declarator) = param.child_by_field_name("declarator") {
                    let mut unused = VarModifiers::default();
                    if let Some(name) = declarator_name(declarator, source, &mut unused) {
                        names.push(name);
                    }
                }
            }
            "variadic_parameter" => names.push("...".to_string()),
            _ => {}
        }
    }
    names
}

/// Name and line of the function definition containing this node, if any.
fn enclosing_function(node: Node<'_>, source: &str) -> Option<(String, u32)> {
    let def = nearest_ancestor(node, &[NODE_FUNCTION_DEF])?;
    let (name, _) = function_declarator_parts(def)?;
    Some((node_text(name, source).to_string(), start_line(def)))
}

/// The comment immediately preceding a node, used as its documentation.
fn preceding_comment(node: Node<'_>, source: &str) -> Option<String> {
    let sibling = node.prev_sibling()?;
    if sibling.kind() == "comment" {
        Some(node_text(sibling, source).to_string())
    } else {
        None
    }
}

fn has_descendant_kind(node: Node<'_>, kind: &str, depth: usize) -> bool {
    if depth > 32 {
        return false;
    }
    if node.kind() == kind {
        return true;
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| has_descendant_kind(c, kind, depth + 1))
}

fn complexity(node: Node<'_>) -> u32 {
    let mut count = 1;
    count_nodes(node, &mut count, 0);
    count
}

fn count_nodes(node: Node<'_>, count: &mut u32, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if COMPLEXITY_KINDS.contains(&child.kind()) {
            *count += 1;
        } else if child.kind() == "binary_expression" {
            // Only short-circuit operators branch.
            if let Some(op) = child.child_by_field_name("operator") {
                let text = op.kind();
                if text == "&&" || text == "||" {
                    *count += 1;
                }
            }
        }
        count_nodes(child, count, depth + 1);
    }
}

impl Extractor for CExtractor {
    fn language(&self) -> Language {
        Language::C
    }

    fn extract(&mut self, path: &Path, source: &str, is_dependency: bool) -> FileIr {
        let mut ir = FileIr::empty(path.to_path_buf(), Language::C, is_dependency);
        let Some(tree) = self.parser.parse(source, None) else {
            return FileIr::with_error(
                path.to_path_buf(),
                Language::C,
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
        collect_definition_names(tree.root_node(), source, &mut names, 0);
        names
    }
}

/// Definition names at any nesting: functions, structs, unions, enums,
/// typedefs, and macros all participate in cross-file resolution.
fn collect_definition_names(node: Node<'_>, source: &str, names: &mut Vec<String>, depth: usize) {
    if depth > crate::parsing::extractor::MAX_TREE_DEPTH {
        return;
    }
    match node.kind() {
        NODE_FUNCTION_DEF => {
            if let Some((name, _)) = function_declarator_parts(node) {
                names.push(node_text(name, source).to_string());
            }
        }
        NODE_STRUCT | NODE_UNION | NODE_ENUM => {
            if node.child_by_field_name("body").is_some() {
                if let Some(name) = node.child_by_field_name("name") {
                    names.push(node_text(name, source).to_string());
                }
            }
        }
        NODE_TYPEDEF => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if declarator.kind() == "type_identifier" {
                    names.push(node_text(declarator, source).to_string());
                }
            }
        }
        NODE_DEFINE | NODE_DEFINE_FN => {
            if let Some(name) = node.child_by_field_name("name") {
                names.push(node_text(name, source).to_string());
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definition_names(child, source, names, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileIr {
        let mut extractor = CExtractor::new(GrammarRegistry::global());
        extractor.extract(Path::new("/test.c"), source, false)
    }

    #[test]
    fn functions_with_pointer_declarators() {
        let ir = extract(
            "static int add(int a, int b) { return a + b; }\nchar *name_of(int id) { return 0; }\n",
        );
        assert_eq!(ir.functions.len(), 2);
        assert_eq!(ir.functions[0].name, "add");
        assert!(ir.functions[0].is_static);
        assert_eq!(ir.functions[0].return_type.as_deref(), Some("int"));
        assert_eq!(ir.functions[0].args, vec!["a", "b"]);
        assert_eq!(ir.functions[1].name, "name_of");
    }

    #[test]
    fn include_distinguishes_system_and_local() {
        let ir = extract("#include <stdio.h>\n#include \"util.h\"\n");
        assert_eq!(ir.imports.len(), 2);
        assert_eq!(ir.imports[0].full_name, "stdio.h");
        assert!(ir.imports[0].is_system);
        assert_eq!(ir.imports[1].full_name, "util.h");
        assert!(!ir.imports[1].is_system);
    }

    #[test]
    fn structs_unions_enums_typedefs() {
        let ir = extract(
            "struct point { int x; int y; };\nunion value { int i; float f; };\nenum color { RED, GREEN };\ntypedef unsigned long size_type;\n",
        );
        let kinds: Vec<TypeKind> = ir.classes.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TypeKind::Struct,
                TypeKind::Union,
                TypeKind::Enum,
                TypeKind::Typedef
            ]
        );
        assert_eq!(ir.classes[0].name, "point");
        assert_eq!(ir.classes[3].name, "size_type");
    }

    #[test]
    fn macros_capture_parameters_and_value() {
        let ir = extract("#define LIMIT 100\n#define SQUARE(x) ((x) * (x))\n");
        assert_eq!(ir.macros.len(), 2);
        assert_eq!(ir.macros[0].name, "LIMIT");
        assert_eq!(ir.macros[0].value.as_deref(), Some("100"));
        assert!(!ir.macros[0].is_function_like);
        assert_eq!(ir.macros[1].name, "SQUARE");
        assert!(ir.macros[1].is_function_like);
        assert_eq!(ir.macros[1].parameters, vec!["x"]);
    }

    #[test]
    fn locals_dropped_globals_kept() {
        let ir = extract(
            "static const int limit = 10;\nint *cursor;\nvoid run(void) { int local = 1; }\n",
        );
        let names: Vec<&str> = ir.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["limit", "cursor"]);
        assert!(ir.variables[0].modifiers.is_static);
        assert!(ir.variables[0].modifiers.is_const);
        assert!(ir.variables[1].modifiers.is_pointer);
    }

    #[test]
    fn calls_carry_enclosing_function() {
        let ir = extract("void run(void) { helper(1); }\n");
        assert_eq!(ir.calls.len(), 1);
        assert_eq!(ir.calls[0].name, "helper");
        assert_eq!(
            ir.calls[0].context.as_ref().unwrap().function.as_deref(),
            Some("run")
        );
    }

    #[test]
    fn top_level_symbols_include_macros_and_types() {
        let mut extractor = CExtractor::new(GrammarRegistry::global());
        let names = extractor.top_level_symbols(
            "#define MAX 1\nstruct s { int a; };\nvoid go(void) {}\n",
        );
        assert!(names.contains(&"MAX".to_string()));
        assert!(names.contains(&"s".to_string()));
        assert!(names.contains(&"go".to_string()));
    }
}
