//! The graph writer.
//!
//! Translates IR records into idempotent write operations. Writing a file is
//! always preceded by deleting that file's subtree so re-indexing converges.
//! Within one file, writes are ordered: File node, directory chain, contained
//! entities, parameters, nested containment, imports. Cross-file edges
//! (CALLS, INHERITS, IMPLEMENTS) are a second pass run only after every file
//! in the batch has committed, which guarantees the endpoints exist; the CSS
//! cascade pass runs after that.

use std::path::Path;
use std::sync::Arc;

use crate::error::IndexResult;
use crate::graph::backend::{
    GraphBackend, GraphSession, GraphStats, ReadQuery, ReadResult, RepositoryInfo,
};
use crate::graph::ops::{EdgeKind, NodeKey, NodeLabel, WriteOp};
use crate::graph::value::{Props, set_prop};
use crate::index::metadata::FileMetadata;
use crate::ir::{FileIr, RuleIr};
use crate::resolve::Resolver;

/// The repository a batch is being indexed into.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub root: std::path::PathBuf,
    pub name: String,
    pub is_dependency: bool,
}

impl RepoContext {
    pub fn new(root: impl Into<std::path::PathBuf>, is_dependency: bool) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        Self {
            root,
            name,
            is_dependency,
        }
    }

    fn path_string(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}

pub struct GraphWriter {
    backend: Arc<dyn GraphBackend>,
}

impl GraphWriter {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }

    /// Create uniqueness constraints (and the full-text index where the
    /// backend supports one) at startup.
    pub fn ensure_schema(&self) -> IndexResult<()> {
        let mut session = self.backend.open_session()?;
        session.apply(WriteOp::EnsureSchema)?;
        session.commit()?;
        Ok(())
    }

    /// Stored metadata of a previously indexed file, if any.
    pub fn stored_metadata(&self, path: &Path) -> IndexResult<Option<FileMetadata>> {
        let mut session = self.backend.open_session()?;
        match session.read(ReadQuery::FileMetadata {
            path: path.to_string_lossy().into_owned(),
        })? {
            ReadResult::Metadata(meta) => Ok(meta),
            _ => Ok(None),
        }
    }

    pub fn repositories(&self) -> IndexResult<Vec<RepositoryInfo>> {
        let mut session = self.backend.open_session()?;
        match session.read(ReadQuery::Repositories)? {
            ReadResult::Repositories(repos) => Ok(repos),
            _ => Ok(Vec::new()),
        }
    }

    pub fn repository_files(&self, repo_path: &Path) -> IndexResult<Vec<String>> {
        let mut session = self.backend.open_session()?;
        match session.read(ReadQuery::RepositoryFiles {
            repo_path: repo_path.to_string_lossy().into_owned(),
        })? {
            ReadResult::Files(files) => Ok(files),
            _ => Ok(Vec::new()),
        }
    }

    pub fn stats(&self, repo_path: Option<&Path>) -> IndexResult<GraphStats> {
        let mut session = self.backend.open_session()?;
        match session.read(ReadQuery::Stats {
            repo_path: repo_path.map(|p| p.to_string_lossy().into_owned()),
        })? {
            ReadResult::Stats(stats) => Ok(stats),
            _ => Ok(GraphStats::default()),
        }
    }

    /// First-pass write of one file: delete-then-insert of its subtree,
    /// batched in a single session.
    pub fn write_file(
        &self,
        repo: &RepoContext,
        ir: &FileIr,
        meta: &FileMetadata,
    ) -> IndexResult<()> {
        let file_path = ir.file_path.to_string_lossy().into_owned();
        let mut session = self.backend.open_session()?;

        session.apply(WriteOp::DeleteFileSubtree {
            file_path: file_path.clone(),
        })?;

        // Repository node.
        let mut repo_props = Props::new();
        set_prop(&mut repo_props, "name", repo.name.as_str());
        set_prop(&mut repo_props, "is_dependency", repo.is_dependency);
        session.apply(WriteOp::MergeNode {
            key: NodeKey::Repository {
                path: repo.path_string(),
            },
            props: repo_props,
        })?;

        // File node.
        let relative = ir
            .file_path
            .strip_prefix(&repo.root)
            .unwrap_or(&ir.file_path)
            .to_string_lossy()
            .into_owned();
        let mut file_props = Props::new();
        set_prop(
            &mut file_props,
            "name",
            ir.file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        );
        set_prop(&mut file_props, "relative_path", relative);
        set_prop(&mut file_props, "is_dependency", ir.is_dependency);
        set_prop(&mut file_props, "language", ir.language.tag());
        set_prop(&mut file_props, "content_hash", meta.content_hash.as_str());
        set_prop(&mut file_props, "size", meta.size);
        set_prop(&mut file_props, "last_modified", meta.last_modified);
        set_prop(&mut file_props, "last_indexed", meta.last_indexed);
        set_prop(&mut file_props, "parser_version", meta.parser_version.as_str());
        set_prop(&mut file_props, "repository_path", repo.path_string());
        set_prop(&mut file_props, "error", ir.error.clone());
        let file_key = NodeKey::File {
            path: file_path.clone(),
        };
        session.apply(WriteOp::MergeNode {
            key: file_key.clone(),
            props: file_props,
        })?;

        self.write_directory_chain(session.as_mut(), repo, &ir.file_path, &file_key)?;
        self.write_entities(session.as_mut(), ir, &file_path, &file_key)?;
        self.write_imports(session.as_mut(), ir, &file_key)?;

        session.commit()?;
        Ok(())
    }

    /// Directory nodes between the repository root and the file, each
    /// CONTAINed by its parent. A file directly in the root hangs off the
    /// Repository itself.
    fn write_directory_chain(
        &self,
        session: &mut dyn GraphSession,
        repo: &RepoContext,
        file_path: &Path,
        file_key: &NodeKey,
    ) -> IndexResult<()> {
        let mut chain = Vec::new();
        let mut current = file_path.parent();
        while let Some(dir) = current {
            if dir == repo.root || !dir.starts_with(&repo.root) {
                break;
            }
            chain.push(dir.to_path_buf());
            current = dir.parent();
        }
        chain.reverse();

        let mut parent = NodeKey::Repository {
            path: repo.path_string(),
        };
        for dir in chain {
            let dir_key = NodeKey::Directory {
                path: dir.to_string_lossy().into_owned(),
            };
            let mut props = Props::new();
            set_prop(
                &mut props,
                "name",
                dir.file_name().map(|n| n.to_string_lossy().into_owned()),
            );
            session.apply(WriteOp::MergeNode {
                key: dir_key.clone(),
                props,
            })?;
            session.apply(WriteOp::MergeEdge {
                from: parent,
                to: dir_key.clone(),
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
            parent = dir_key;
        }
        session.apply(WriteOp::MergeEdge {
            from: parent,
            to: file_key.clone(),
            kind: EdgeKind::Contains,
            props: Props::new(),
        })?;
        Ok(())
    }

    fn write_entities(
        &self,
        session: &mut dyn GraphSession,
        ir: &FileIr,
        file_path: &str,
        file_key: &NodeKey,
    ) -> IndexResult<()> {
        // Classes first so methods and members can attach to them.
        for class in &ir.classes {
            let key = NodeKey::entity(NodeLabel::Class, &class.name, file_path, class.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "full_name", class.full_name.as_str());
            set_prop(&mut props, "end_line", class.end_line);
            set_prop(&mut props, "bases", class.bases.clone());
            set_prop(&mut props, "source", class.source_text.as_str());
            set_prop(&mut props, "docstring", class.docstring.clone());
            set_prop(&mut props, "kind", class.kind.as_str());
            set_prop(&mut props, "language", ir.language.tag());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;

            // Nested classes hang off their enclosing class.
            let parent = class
                .context
                .as_ref()
                .and_then(|ctx| ctx.class.as_ref())
                .and_then(|outer| self.class_key(ir, file_path, outer))
                .unwrap_or_else(|| file_key.clone());
            session.apply(WriteOp::MergeEdge {
                from: parent,
                to: key,
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
        }

        for func in &ir.functions {
            let key =
                NodeKey::entity(NodeLabel::Function, &func.name, file_path, func.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "full_name", func.full_name.as_str());
            set_prop(&mut props, "end_line", func.end_line);
            set_prop(&mut props, "args", func.args.clone());
            set_prop(&mut props, "source", func.source_text.as_str());
            set_prop(&mut props, "docstring", func.docstring.clone());
            set_prop(
                &mut props,
                "cyclomatic_complexity",
                func.cyclomatic_complexity,
            );
            set_prop(
                &mut props,
                "context",
                func.context.as_ref().map(|ctx| {
                    ctx.function
                        .clone()
                        .or_else(|| ctx.class.clone())
                        .unwrap_or_default()
                }),
            );
            set_prop(&mut props, "decorators", func.decorators.clone());
            set_prop(&mut props, "language", ir.language.tag());
            set_prop(&mut props, "is_static", func.is_static);
            set_prop(&mut props, "is_constructor", func.is_constructor);
            set_prop(&mut props, "return_type", func.return_type.clone());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;

            // Containment: enclosing function (nested defs), else class
            // (methods), else the file.
            let parent = match &func.context {
                Some(ctx) if ctx.function.is_some() => NodeKey::entity(
                    NodeLabel::Function,
                    ctx.function.as_deref().unwrap_or_default(),
                    file_path,
                    ctx.line,
                ),
                Some(ctx) if ctx.class.is_some() => self
                    .class_key(ir, file_path, ctx.class.as_deref().unwrap_or_default())
                    .unwrap_or_else(|| file_key.clone()),
                _ => file_key.clone(),
            };
            session.apply(WriteOp::MergeEdge {
                from: parent,
                to: key.clone(),
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;

            // Parameters, keyed by the owning function's line.
            for arg in &func.args {
                let param_key =
                    NodeKey::entity(NodeLabel::Parameter, arg, file_path, func.line_number);
                session.apply(WriteOp::MergeNode {
                    key: param_key.clone(),
                    props: Props::new(),
                })?;
                session.apply(WriteOp::MergeEdge {
                    from: key.clone(),
                    to: param_key,
                    kind: EdgeKind::HasParameter,
                    props: Props::new(),
                })?;
            }
        }

        for var in &ir.variables {
            let key =
                NodeKey::entity(NodeLabel::Variable, &var.name, file_path, var.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "value", var.value.clone());
            set_prop(&mut props, "type", var.type_name.clone());
            set_prop(&mut props, "language", ir.language.tag());
            set_prop(&mut props, "is_const", var.modifiers.is_const);
            set_prop(&mut props, "is_static", var.modifiers.is_static);
            set_prop(&mut props, "is_extern", var.modifiers.is_extern);
            set_prop(&mut props, "is_pointer", var.modifiers.is_pointer);
            set_prop(&mut props, "is_array", var.modifiers.is_array);
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;

            let parent = var
                .context
                .as_ref()
                .and_then(|ctx| ctx.class.as_ref())
                .and_then(|class| self.class_key(ir, file_path, class))
                .unwrap_or_else(|| file_key.clone());
            session.apply(WriteOp::MergeEdge {
                from: parent,
                to: key,
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
        }

        for mac in &ir.macros {
            let key = NodeKey::entity(NodeLabel::Macro, &mac.name, file_path, mac.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "value", mac.value.clone());
            set_prop(&mut props, "parameters", mac.parameters.clone());
            set_prop(&mut props, "is_function_like", mac.is_function_like);
            set_prop(&mut props, "source", mac.source_text.as_str());
            set_prop(&mut props, "end_line", mac.end_line);
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;
            session.apply(WriteOp::MergeEdge {
                from: file_key.clone(),
                to: key,
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
        }

        self.write_stylesheet_entities(session, ir, file_path, file_key)?;
        Ok(())
    }

    fn write_stylesheet_entities(
        &self,
        session: &mut dyn GraphSession,
        ir: &FileIr,
        file_path: &str,
        file_key: &NodeKey,
    ) -> IndexResult<()> {
        for mq in &ir.media_queries {
            let key =
                NodeKey::entity(NodeLabel::MediaQuery, &mq.name, file_path, mq.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "conditions", mq.conditions.clone());
            set_prop(&mut props, "end_line", mq.end_line);
            set_prop(&mut props, "source", mq.source_text.as_str());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;
            session.apply(WriteOp::MergeEdge {
                from: file_key.clone(),
                to: key,
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
        }

        for rule in &ir.rules {
            let key = NodeKey::entity(NodeLabel::Rule, &rule.name, file_path, rule.line_number);
            let mut props = Props::new();
            set_prop(&mut props, "selector_text", rule.selector_text.as_str());
            set_prop(&mut props, "specificity", rule.specificity);
            set_prop(&mut props, "end_line", rule.end_line);
            set_prop(&mut props, "source", rule.source_text.as_str());
            set_prop(&mut props, "at_keyword", rule.at_keyword.clone());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;

            // Nested rule -> enclosing rule; rule under a media query ->
            // the MediaQuery node; otherwise the file.
            let parent = if let Some((parent_name, parent_line)) = &rule.enclosing_rule {
                NodeKey::entity(NodeLabel::Rule, parent_name, file_path, *parent_line)
            } else if let Some(media_line) = rule.enclosing_media_line {
                NodeKey::entity(
                    NodeLabel::MediaQuery,
                    format!("media_{media_line}"),
                    file_path,
                    media_line,
                )
            } else {
                file_key.clone()
            };
            session.apply(WriteOp::MergeEdge {
                from: parent,
                to: key,
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
        }

        for selector in &ir.selectors {
            let key = NodeKey::entity(
                NodeLabel::Selector,
                &selector.name,
                file_path,
                selector.line_number,
            );
            let mut props = Props::new();
            set_prop(&mut props, "specificity", selector.specificity);
            set_prop(&mut props, "source", selector.source_text.as_str());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;
            session.apply(WriteOp::MergeEdge {
                from: file_key.clone(),
                to: key.clone(),
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
            if let (Some(rule_name), Some(rule_line)) =
                (&selector.rule_name, selector.rule_line)
            {
                session.apply(WriteOp::MergeEdge {
                    from: NodeKey::entity(NodeLabel::Rule, rule_name, file_path, rule_line),
                    to: key,
                    kind: EdgeKind::HasSelector,
                    props: Props::new(),
                })?;
            }
        }

        for property in &ir.properties {
            let key = NodeKey::entity(
                NodeLabel::Property,
                &property.name,
                file_path,
                property.line_number,
            );
            let mut props = Props::new();
            set_prop(&mut props, "value", property.value.clone());
            set_prop(&mut props, "source", property.source_text.as_str());
            session.apply(WriteOp::MergeNode {
                key: key.clone(),
                props,
            })?;
            session.apply(WriteOp::MergeEdge {
                from: file_key.clone(),
                to: key.clone(),
                kind: EdgeKind::Contains,
                props: Props::new(),
            })?;
            if let (Some(rule_name), Some(rule_line)) =
                (&property.rule_name, property.rule_line)
            {
                session.apply(WriteOp::MergeEdge {
                    from: NodeKey::entity(NodeLabel::Rule, rule_name, file_path, rule_line),
                    to: key,
                    kind: EdgeKind::HasProperty,
                    props: Props::new(),
                })?;
            }
        }
        Ok(())
    }

    fn write_imports(
        &self,
        session: &mut dyn GraphSession,
        ir: &FileIr,
        file_key: &NodeKey,
    ) -> IndexResult<()> {
        for import in &ir.imports {
            let module_name = import.full_name.trim_end_matches(".*").to_string();
            if module_name.is_empty() {
                continue;
            }
            let module_key = NodeKey::Module {
                name: module_name.clone(),
            };
            let mut props = Props::new();
            set_prop(&mut props, "url", import.url.clone());
            set_prop(&mut props, "is_system", import.is_system);
            if let Some(alias) = &import.alias {
                set_prop(&mut props, "aliases", vec![alias.clone()]);
            }
            session.apply(WriteOp::MergeNode {
                key: module_key.clone(),
                props,
            })?;

            let mut edge_props = Props::new();
            set_prop(&mut edge_props, "line_number", import.line_number);
            set_prop(&mut edge_props, "alias", import.alias.clone());
            set_prop(&mut edge_props, "is_static", import.is_static);
            set_prop(&mut edge_props, "is_wildcard", import.is_wildcard);
            session.apply(WriteOp::MergeEdge {
                from: file_key.clone(),
                to: module_key,
                kind: EdgeKind::Imports,
                props: edge_props,
            })?;
        }
        Ok(())
    }

    /// Second pass: cross-file CALLS / INHERITS / IMPLEMENTS for one file.
    pub fn write_cross_file_edges(&self, ir: &FileIr, resolver: &Resolver<'_>) -> IndexResult<()> {
        let file_path = ir.file_path.to_string_lossy().into_owned();
        let mut session = self.backend.open_session()?;

        for call in &ir.calls {
            let target = resolver.resolve_call(ir, call);
            let target_path = target.to_string_lossy().into_owned();

            let caller = match &call.context {
                Some(ctx) if ctx.function.is_some() => NodeKey::entity(
                    NodeLabel::Function,
                    ctx.function.as_deref().unwrap_or_default(),
                    file_path.as_str(),
                    ctx.line,
                ),
                _ => NodeKey::File {
                    path: file_path.clone(),
                },
            };

            // The callee endpoint is a Function when one with that name
            // exists in the target file, else the target File node.
            let callee = match session.read(ReadQuery::EntityLine {
                label: NodeLabel::Function,
                file_path: target_path.clone(),
                name: call.name.clone(),
            })? {
                ReadResult::Line(Some(line)) => NodeKey::entity(
                    NodeLabel::Function,
                    call.name.as_str(),
                    target_path.as_str(),
                    line,
                ),
                _ => NodeKey::File {
                    path: target_path.clone(),
                },
            };

            let mut props = Props::new();
            set_prop(&mut props, "line_number", call.line_number);
            set_prop(&mut props, "args", call.args.clone());
            set_prop(&mut props, "full_name", call.full_name.as_str());
            session.apply(WriteOp::MergeEdge {
                from: caller,
                to: callee,
                kind: EdgeKind::Calls,
                props,
            })?;
        }

        for inherit in &ir.inherits {
            self.link_type_edge(
                session.as_mut(),
                ir,
                resolver,
                &file_path,
                &inherit.derived,
                inherit.line_number,
                &inherit.base,
                EdgeKind::Inherits,
            )?;
        }
        for implement in &ir.implements {
            self.link_type_edge(
                session.as_mut(),
                ir,
                resolver,
                &file_path,
                &implement.class_name,
                implement.line_number,
                &implement.interface_name,
                EdgeKind::Implements,
            )?;
        }

        session.commit()?;
        Ok(())
    }

    /// INHERITS / IMPLEMENTS between Class nodes. An unresolved base drops
    /// the INHERITS edge silently; an unresolved interface (e.g. one from
    /// the platform library) is modelled like an external module, global by
    /// name, so the IMPLEMENTS edge survives without breaking containment.
    #[allow(clippy::too_many_arguments)]
    fn link_type_edge(
        &self,
        session: &mut dyn GraphSession,
        ir: &FileIr,
        resolver: &Resolver<'_>,
        file_path: &str,
        derived: &str,
        derived_line: u32,
        base: &str,
        kind: EdgeKind,
    ) -> IndexResult<()> {
        let base_short = base.rsplit(['.', ':']).next().unwrap_or(base);
        let from = NodeKey::entity(NodeLabel::Class, derived, file_path, derived_line);

        let resolved = resolver.resolve_base(ir, base).and_then(|target| {
            let target_path = target.to_string_lossy().into_owned();
            let line = match session.read(ReadQuery::EntityLine {
                label: NodeLabel::Class,
                file_path: target_path.clone(),
                name: base_short.to_string(),
            }) {
                Ok(ReadResult::Line(line)) => line,
                _ => None,
            };
            line.map(|l| NodeKey::entity(NodeLabel::Class, base_short, target_path, l))
        });

        let to = match (resolved, kind) {
            (Some(to), _) => to,
            (None, EdgeKind::Implements) => {
                let module = NodeKey::Module {
                    name: base_short.to_string(),
                };
                let mut props = Props::new();
                set_prop(&mut props, "kind", "interface");
                session.apply(WriteOp::MergeNode {
                    key: module.clone(),
                    props,
                })?;
                module
            }
            (None, _) => return Ok(()),
        };

        session.apply(WriteOp::MergeEdge {
            from,
            to,
            kind,
            props: Props::new(),
        })?;
        Ok(())
    }

    /// Cascade pass: within one stylesheet, when two rules target the same
    /// subject, the weaker one points at the stronger, later one.
    pub fn write_cascade(&self, ir: &FileIr) -> IndexResult<()> {
        let file_path = ir.file_path.to_string_lossy().into_owned();
        let rules: Vec<&RuleIr> = ir.rules.iter().filter(|r| r.at_keyword.is_none()).collect();
        if rules.len() < 2 {
            return Ok(());
        }

        let mut session = self.backend.open_session()?;
        for weaker in &rules {
            for stronger in &rules {
                if !shares_subject(weaker, stronger) {
                    continue;
                }
                if stronger.specificity > weaker.specificity
                    && stronger.line_number > weaker.line_number
                {
                    let mut props = Props::new();
                    set_prop(
                        &mut props,
                        "specificity_diff",
                        stronger.specificity - weaker.specificity,
                    );
                    session.apply(WriteOp::MergeEdge {
                        from: NodeKey::entity(
                            NodeLabel::Rule,
                            &weaker.name,
                            file_path.as_str(),
                            weaker.line_number,
                        ),
                        to: NodeKey::entity(
                            NodeLabel::Rule,
                            &stronger.name,
                            file_path.as_str(),
                            stronger.line_number,
                        ),
                        kind: EdgeKind::OverriddenBy,
                        props,
                    })?;
                }
            }
        }
        session.commit()?;
        Ok(())
    }

    /// Delete one file's subtree.
    pub fn delete_file(&self, path: &Path) -> IndexResult<()> {
        let mut session = self.backend.open_session()?;
        session.apply(WriteOp::DeleteFileSubtree {
            file_path: path.to_string_lossy().into_owned(),
        })?;
        session.commit()?;
        Ok(())
    }

    /// Delete a repository and everything under it (explicit request only).
    pub fn delete_repository(&self, path: &Path) -> IndexResult<()> {
        let mut session = self.backend.open_session()?;
        session.apply(WriteOp::DeleteRepository {
            path: path.to_string_lossy().into_owned(),
        })?;
        session.commit()?;
        Ok(())
    }

    /// The Class node key for a name defined in this file, if present.
    fn class_key(&self, ir: &FileIr, file_path: &str, class_name: &str) -> Option<NodeKey> {
        ir.classes
            .iter()
            .find(|c| c.name == class_name)
            .map(|c| NodeKey::entity(NodeLabel::Class, &c.name, file_path, c.line_number))
    }
}

/// Two rules conflict when they target the same subject: the last compound
/// of their first selector (`#id p` and `p` both target `p`).
fn shares_subject(a: &RuleIr, b: &RuleIr) -> bool {
    match (subject(&a.name), subject(&b.name)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn subject(selector: &str) -> Option<&str> {
    selector.split_whitespace().last()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, line: u32, specificity: i64) -> RuleIr {
        RuleIr {
            name: name.to_string(),
            selector_text: name.to_string(),
            line_number: line,
            end_line: line,
            selectors: vec![name.to_string()],
            specificity,
            source_text: String::new(),
            at_keyword: None,
            enclosing_media_line: None,
            enclosing_rule: None,
        }
    }

    #[test]
    fn subjects_compare_by_last_compound() {
        assert!(shares_subject(&rule("p", 1, 1), &rule("#id p", 2, 101)));
        assert!(shares_subject(&rule("a", 1, 1), &rule("#x a", 2, 101)));
        assert!(!shares_subject(&rule("p", 1, 1), &rule("#id span", 2, 101)));
    }

    #[test]
    fn subject_of_compound_selectors() {
        assert_eq!(subject("#id p"), Some("p"));
        assert_eq!(subject("p"), Some("p"));
        assert_eq!(subject(".nav .item a"), Some("a"));
        assert_eq!(subject(""), None);
    }
}
