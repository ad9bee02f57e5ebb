//! The language-neutral intermediate representation.
//!
//! Every extractor returns one [`FileIr`] per file. The IR is the sole
//! interface between extractors and the rest of the pipeline; nothing
//! extractor-specific leaks upward. All line numbers are 1-based.

use crate::parsing::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// The enclosing function/class discovered by walking upward from a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclosingContext {
    pub function: Option<String>,
    pub class: Option<String>,
    /// Start line of the innermost enclosing definition.
    pub line: u32,
}

impl EnclosingContext {
    pub fn new(function: Option<String>, class: Option<String>, line: u32) -> Self {
        Self {
            function,
            class,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionIr {
    pub name: String,
    /// Dotted/qualified form, e.g. `Outer.method`.
    pub full_name: String,
    pub line_number: u32,
    pub end_line: u32,
    pub args: Vec<String>,
    pub source_text: String,
    pub docstring: Option<String>,
    pub cyclomatic_complexity: u32,
    pub context: Option<EnclosingContext>,
    pub decorators: Vec<String>,
    pub is_static: bool,
    pub is_constructor: bool,
    pub return_type: Option<String>,
}

impl FunctionIr {
    pub fn new(name: impl Into<String>, line_number: u32) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            line_number,
            end_line: line_number,
            args: Vec::new(),
            source_text: String::new(),
            docstring: None,
            cyclomatic_complexity: 1,
            context: None,
            decorators: Vec::new(),
            is_static: false,
            is_constructor: false,
            return_type: None,
        }
    }
}

/// What kind of type-like entity a [`ClassIr`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Union,
    Enum,
    Interface,
    Annotation,
    Trait,
    Typedef,
    Module,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
            TypeKind::Interface => "interface",
            TypeKind::Annotation => "annotation",
            TypeKind::Trait => "trait",
            TypeKind::Typedef => "typedef",
            TypeKind::Module => "module",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIr {
    pub name: String,
    /// Dotted form for nested classes, e.g. `Outer.Inner`.
    pub full_name: String,
    pub line_number: u32,
    pub end_line: u32,
    pub bases: Vec<String>,
    pub source_text: String,
    pub docstring: Option<String>,
    pub kind: TypeKind,
    pub context: Option<EnclosingContext>,
}

impl ClassIr {
    pub fn new(name: impl Into<String>, line_number: u32, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            line_number,
            end_line: line_number,
            bases: Vec::new(),
            source_text: String::new(),
            docstring: None,
            kind,
            context: None,
        }
    }
}

/// Storage/qualifier flags captured for variable declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarModifiers {
    pub is_const: bool,
    pub is_static: bool,
    pub is_extern: bool,
    pub is_pointer: bool,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableIr {
    pub name: String,
    pub line_number: u32,
    pub value: Option<String>,
    pub type_name: Option<String>,
    pub modifiers: VarModifiers,
    pub context: Option<EnclosingContext>,
}

impl VariableIr {
    pub fn new(name: impl Into<String>, line_number: u32) -> Self {
        Self {
            name: name.into(),
            line_number,
            value: None,
            type_name: None,
            modifiers: VarModifiers::default(),
            context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIr {
    /// Short name used for matching (last path segment).
    pub name: String,
    /// Full module path as written, e.g. `java.util.List` or `os.path`.
    pub full_name: String,
    pub line_number: u32,
    pub alias: Option<String>,
    /// C/C++: `<system>` include as opposed to `"local"`.
    pub is_system: bool,
    /// Java `import static`.
    pub is_static: bool,
    /// Java wildcard import (`.*`).
    pub is_wildcard: bool,
    /// Stylesheet import target.
    pub url: Option<String>,
}

impl ImportIr {
    pub fn new(full_name: impl Into<String>, line_number: u32) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(&full_name)
            .to_string();
        Self {
            name,
            full_name,
            line_number,
            alias: None,
            is_system: false,
            is_static: false,
            is_wildcard: false,
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIr {
    /// Callee short name (`method` for `obj.method`).
    pub name: String,
    /// Full call text in dotted/qualified form (`obj.method`, `ns::f`).
    pub full_name: String,
    pub line_number: u32,
    pub args: Vec<String>,
    /// Receiver type inferred syntactically (e.g. from `x = ClassName()`).
    pub receiver_type: Option<String>,
    pub context: Option<EnclosingContext>,
}

impl CallIr {
    pub fn new(name: impl Into<String>, line_number: u32) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            line_number,
            args: Vec::new(),
            receiver_type: None,
            context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroIr {
    pub name: String,
    pub line_number: u32,
    pub end_line: u32,
    pub value: Option<String>,
    pub parameters: Vec<String>,
    pub is_function_like: bool,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleIr {
    /// First selector; the rule's display name.
    pub name: String,
    /// All selectors joined, e.g. `h1, h2`.
    pub selector_text: String,
    pub line_number: u32,
    pub end_line: u32,
    pub selectors: Vec<String>,
    pub specificity: i64,
    pub source_text: String,
    /// Set for at-rules rendered as rules (`keyframes`, `supports`, ...).
    pub at_keyword: Option<String>,
    /// Line of the enclosing media query, when nested inside one.
    pub enclosing_media_line: Option<u32>,
    /// Name and line of the enclosing rule, when nested.
    pub enclosing_rule: Option<(String, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorIr {
    pub name: String,
    pub line_number: u32,
    pub specificity: i64,
    /// Name of the rule this selector belongs to.
    pub rule_name: Option<String>,
    pub rule_line: Option<u32>,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyIr {
    pub name: String,
    pub line_number: u32,
    pub value: Option<String>,
    pub rule_name: Option<String>,
    pub rule_line: Option<u32>,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaQueryIr {
    /// Synthetic name, `media_<line>`.
    pub name: String,
    pub line_number: u32,
    pub end_line: u32,
    pub conditions: Vec<String>,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritIr {
    pub derived: String,
    pub base: String,
    pub line_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementIr {
    pub class_name: String,
    pub interface_name: String,
    pub line_number: u32,
}

/// Per-file extraction result. One record per parsed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIr {
    pub file_path: PathBuf,
    pub language: Language,
    pub is_dependency: bool,
    /// Set when the file could not be parsed; collections are then empty.
    pub error: Option<String>,
    pub functions: Vec<FunctionIr>,
    pub classes: Vec<ClassIr>,
    pub variables: Vec<VariableIr>,
    pub imports: Vec<ImportIr>,
    pub calls: Vec<CallIr>,
    pub macros: Vec<MacroIr>,
    pub rules: Vec<RuleIr>,
    pub selectors: Vec<SelectorIr>,
    pub properties: Vec<PropertyIr>,
    pub media_queries: Vec<MediaQueryIr>,
    pub inherits: Vec<InheritIr>,
    pub implements: Vec<ImplementIr>,
}

impl FileIr {
    pub fn empty(file_path: PathBuf, language: Language, is_dependency: bool) -> Self {
        Self {
            file_path,
            language,
            is_dependency,
            error: None,
            functions: Vec::new(),
            classes: Vec::new(),
            variables: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            macros: Vec::new(),
            rules: Vec::new(),
            selectors: Vec::new(),
            properties: Vec::new(),
            media_queries: Vec::new(),
            inherits: Vec::new(),
            implements: Vec::new(),
        }
    }

    pub fn with_error(
        file_path: PathBuf,
        language: Language,
        is_dependency: bool,
        error: impl Into<String>,
    ) -> Self {
        let mut ir = Self::empty(file_path, language, is_dependency);
        ir.error = Some(error.into());
        ir
    }

    /// Deduplicate every collection by its natural key (`name`:`line`).
    pub fn dedup(&mut self) {
        dedup_by_key(&mut self.functions, |f| (f.full_name.clone(), f.line_number));
        dedup_by_key(&mut self.classes, |c| (c.full_name.clone(), c.line_number));
        dedup_by_key(&mut self.variables, |v| (v.name.clone(), v.line_number));
        dedup_by_key(&mut self.imports, |i| (i.full_name.clone(), i.line_number));
        dedup_by_key(&mut self.calls, |c| {
            (format!("{}:{}", c.full_name, context_tag(&c.context)), c.line_number)
        });
        dedup_by_key(&mut self.macros, |m| (m.name.clone(), m.line_number));
        dedup_by_key(&mut self.rules, |r| (r.selector_text.clone(), r.line_number));
        dedup_by_key(&mut self.selectors, |s| (s.name.clone(), s.line_number));
        dedup_by_key(&mut self.properties, |p| (p.name.clone(), p.line_number));
        dedup_by_key(&mut self.media_queries, |m| (m.name.clone(), m.line_number));
        dedup_by_key(&mut self.inherits, |i| {
            (format!("{}->{}", i.derived, i.base), i.line_number)
        });
        dedup_by_key(&mut self.implements, |i| {
            (format!("{}->{}", i.class_name, i.interface_name), i.line_number)
        });
    }

    /// Names defined in this file, used by resolution rule 2.
    pub fn defines(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
            || self.classes.iter().any(|c| c.name == name)
            || self.macros.iter().any(|m| m.name == name)
    }
}

fn context_tag(ctx: &Option<EnclosingContext>) -> String {
    match ctx {
        Some(c) => format!(
            "{}.{}",
            c.class.as_deref().unwrap_or(""),
            c.function.as_deref().unwrap_or("")
        ),
        None => String::new(),
    }
}

fn dedup_by_key<T, K, F>(items: &mut Vec<T>, mut key: F)
where
    K: std::hash::Hash + Eq,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}
