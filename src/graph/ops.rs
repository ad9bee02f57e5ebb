//! Typed write operations against the property graph.
//!
//! Every `Merge*` operation is idempotent: it creates the node or edge if
//! absent and merges properties if present. Node identity lives in
//! [`NodeKey`], so uniqueness (one node per identity tuple) is structural
//! rather than enforced after the fact.

use serde::{Deserialize, Serialize};

use crate::graph::value::Props;

/// Node labels of the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Repository,
    Directory,
    File,
    Function,
    Class,
    Variable,
    Module,
    Parameter,
    Macro,
    Rule,
    Selector,
    Property,
    MediaQuery,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Repository => "Repository",
            NodeLabel::Directory => "Directory",
            NodeLabel::File => "File",
            NodeLabel::Function => "Function",
            NodeLabel::Class => "Class",
            NodeLabel::Variable => "Variable",
            NodeLabel::Module => "Module",
            NodeLabel::Parameter => "Parameter",
            NodeLabel::Macro => "Macro",
            NodeLabel::Rule => "Rule",
            NodeLabel::Selector => "Selector",
            NodeLabel::Property => "Property",
            NodeLabel::MediaQuery => "MediaQuery",
        }
    }
}

/// Stable node identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    /// Repository, keyed by absolute path.
    Repository { path: String },
    /// Directory, keyed by absolute path.
    Directory { path: String },
    /// File, keyed by absolute path.
    File { path: String },
    /// Module, keyed by global name.
    Module { name: String },
    /// Everything contained in a file: (label, name, file_path, line).
    /// Parameters use the owning function's line number.
    Entity {
        label: NodeLabel,
        name: String,
        file_path: String,
        line_number: u32,
    },
}

impl NodeKey {
    pub fn entity(label: NodeLabel, name: impl Into<String>, file_path: impl Into<String>, line_number: u32) -> Self {
        NodeKey::Entity {
            label,
            name: name.into(),
            file_path: file_path.into(),
            line_number,
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            NodeKey::Repository { .. } => NodeLabel::Repository,
            NodeKey::Directory { .. } => NodeLabel::Directory,
            NodeKey::File { .. } => NodeLabel::File,
            NodeKey::Module { .. } => NodeLabel::Module,
            NodeKey::Entity { label, .. } => *label,
        }
    }

    /// The file this node belongs to, when identity carries one.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            NodeKey::File { path } => Some(path),
            NodeKey::Entity { file_path, .. } => Some(file_path),
            _ => None,
        }
    }
}

/// Directed relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Calls,
    Inherits,
    Implements,
    Imports,
    HasParameter,
    HasSelector,
    HasProperty,
    OverriddenBy,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::HasParameter => "HAS_PARAMETER",
            EdgeKind::HasSelector => "HAS_SELECTOR",
            EdgeKind::HasProperty => "HAS_PROPERTY",
            EdgeKind::OverriddenBy => "OVERRIDDEN_BY",
        }
    }
}

/// A write operation a backend must apply with MERGE semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create uniqueness constraints and, where supported, the full-text
    /// index. Missing full-text support is non-fatal.
    EnsureSchema,
    /// Create-if-absent, then merge properties.
    MergeNode { key: NodeKey, props: Props },
    /// Create endpoints if absent, create-if-absent the edge, merge props.
    MergeEdge {
        from: NodeKey,
        to: NodeKey,
        kind: EdgeKind,
        props: Props,
    },
    /// Remove a File node, every entity whose identity carries its path,
    /// all their edges, modules nothing imports anymore, and directories
    /// left empty. Never removes the Repository.
    DeleteFileSubtree { file_path: String },
    /// Remove a Repository and everything reachable under it.
    DeleteRepository { path: String },
}
