//! The embedded in-process backend.
//!
//! Reference implementation of the backend protocol. Node identity is the
//! map key, so uniqueness is structural; every merge operation is
//! idempotent; file deletion cascades through contained entities, prunes
//! empty directories upward, and drops modules nothing imports anymore.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::graph::backend::{
    GraphBackend, GraphSession, GraphStats, ReadQuery, ReadResult, RepositoryInfo,
};
use crate::graph::ops::{EdgeKind, NodeKey, NodeLabel, WriteOp};
use crate::graph::value::{Props, Value};
use crate::index::metadata::FileMetadata;

type EdgeTriple = (NodeKey, EdgeKind, NodeKey);

#[derive(Default, Debug)]
struct Store {
    nodes: BTreeMap<NodeKey, Props>,
    edges: BTreeMap<EdgeTriple, Props>,
    schema_ready: bool,
}

impl Store {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::EnsureSchema => {
                if !self.schema_ready {
                    // Uniqueness constraints are structural here; the
                    // full-text index is not supported, which is non-fatal.
                    tracing::debug!("memory backend: schema ready (no full-text index)");
                    self.schema_ready = true;
                }
            }
            WriteOp::MergeNode { key, props } => {
                let existing = self.nodes.entry(key).or_default();
                for (k, v) in props {
                    existing.insert(k, v);
                }
            }
            WriteOp::MergeEdge {
                from,
                to,
                kind,
                props,
            } => {
                // MERGE creates missing endpoints, so edges never dangle.
                self.nodes.entry(from.clone()).or_default();
                self.nodes.entry(to.clone()).or_default();
                let existing = self.edges.entry((from, kind, to)).or_default();
                for (k, v) in props {
                    existing.insert(k, v);
                }
            }
            WriteOp::DeleteFileSubtree { file_path } => self.delete_file_subtree(&file_path),
            WriteOp::DeleteRepository { path } => self.delete_repository(&path),
        }
    }

    fn delete_file_subtree(&mut self, file_path: &str) {
        // Every entity's identity carries its file path, so the subtree is
        // exactly the File node plus all entities keyed to that path.
        let doomed: BTreeSet<NodeKey> = self
            .nodes
            .keys()
            .filter(|key| {
                !matches!(key, NodeKey::Repository { .. } | NodeKey::Directory { .. })
                    && key.file_path() == Some(file_path)
            })
            .cloned()
            .collect();
        if doomed.is_empty() {
            return;
        }

        self.remove_nodes(&doomed);
        self.prune_orphan_modules();
        self.prune_empty_directories(file_path);
    }

    fn delete_repository(&mut self, repo_path: &str) {
        let repo_key = NodeKey::Repository {
            path: repo_path.to_string(),
        };
        if !self.nodes.contains_key(&repo_key) {
            return;
        }

        // Everything reachable from the repository via CONTAINS.
        let mut doomed = BTreeSet::new();
        let mut frontier = vec![repo_key];
        while let Some(current) = frontier.pop() {
            if !doomed.insert(current.clone()) {
                continue;
            }
            for ((from, kind, to), _) in self.edges.iter() {
                if *kind == EdgeKind::Contains && *from == current && !doomed.contains(to) {
                    frontier.push(to.clone());
                }
            }
        }
        // Entities hang off files by identity, not always by CONTAINS depth.
        let file_paths: BTreeSet<String> = doomed
            .iter()
            .filter_map(|k| match k {
                NodeKey::File { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        let entities: Vec<NodeKey> = self
            .nodes
            .keys()
            .filter(|key| {
                matches!(key, NodeKey::Entity { .. })
                    && key.file_path().is_some_and(|p| file_paths.contains(p))
            })
            .cloned()
            .collect();
        doomed.extend(entities);

        self.remove_nodes(&doomed);
        self.prune_orphan_modules();
    }

    fn remove_nodes(&mut self, doomed: &BTreeSet<NodeKey>) {
        self.nodes.retain(|key, _| !doomed.contains(key));
        self.edges
            .retain(|(from, _, to), _| !doomed.contains(from) && !doomed.contains(to));
    }

    /// Module nodes persist only while something still references them
    /// (a File import, or a class implementing an external interface).
    fn prune_orphan_modules(&mut self) {
        let imported: BTreeSet<NodeKey> = self
            .edges
            .keys()
            .map(|(_, _, to)| to.clone())
            .collect();
        let orphans: BTreeSet<NodeKey> = self
            .nodes
            .keys()
            .filter(|key| matches!(key, NodeKey::Module { .. }) && !imported.contains(key))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            self.remove_nodes(&orphans);
        }
    }

    /// Walk upward from the deleted file, removing directories that no
    /// longer contain anything. The Repository node is never removed.
    fn prune_empty_directories(&mut self, file_path: &str) {
        let mut current = Path::new(file_path).parent();
        while let Some(dir) = current {
            let dir_key = NodeKey::Directory {
                path: dir.to_string_lossy().into_owned(),
            };
            if !self.nodes.contains_key(&dir_key) {
                break;
            }
            let has_children = self
                .edges
                .keys()
                .any(|(from, kind, _)| *kind == EdgeKind::Contains && *from == dir_key);
            if has_children {
                break;
            }
            let mut doomed = BTreeSet::new();
            doomed.insert(dir_key);
            self.remove_nodes(&doomed);
            current = dir.parent();
        }
    }

    fn read(&self, query: ReadQuery) -> ReadResult {
        match query {
            ReadQuery::FileMetadata { path } => {
                let key = NodeKey::File { path: path.clone() };
                let metadata = self.nodes.get(&key).and_then(|props| {
                    Some(FileMetadata {
                        path,
                        content_hash: props.get("content_hash")?.as_str()?.to_string(),
                        last_modified: props.get("last_modified")?.as_f64()?,
                        size: props.get("size")?.as_i64()? as u64,
                        last_indexed: props.get("last_indexed")?.as_f64()?,
                        parser_version: props
                            .get("parser_version")?
                            .as_str()?
                            .to_string(),
                    })
                });
                ReadResult::Metadata(metadata)
            }
            ReadQuery::EntityLine {
                label,
                file_path,
                name,
            } => {
                let line = self
                    .nodes
                    .keys()
                    .filter_map(|key| match key {
                        NodeKey::Entity {
                            label: l,
                            name: n,
                            file_path: f,
                            line_number,
                        } if *l == label && *n == name && *f == file_path => Some(*line_number),
                        _ => None,
                    })
                    .min();
                ReadResult::Line(line)
            }
            ReadQuery::RepositoryFiles { repo_path } => {
                let files = self
                    .nodes
                    .iter()
                    .filter_map(|(key, props)| match key {
                        NodeKey::File { path }
                            if props
                                .get("repository_path")
                                .and_then(Value::as_str)
                                == Some(repo_path.as_str()) =>
                        {
                            Some(path.clone())
                        }
                        _ => None,
                    })
                    .collect();
                ReadResult::Files(files)
            }
            ReadQuery::Repositories => {
                let repos = self
                    .nodes
                    .iter()
                    .filter_map(|(key, props)| match key {
                        NodeKey::Repository { path } => Some(RepositoryInfo {
                            path: path.clone(),
                            name: props
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            is_dependency: props
                                .get("is_dependency")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                            file_count: self.file_count(path),
                        }),
                        _ => None,
                    })
                    .collect();
                ReadResult::Repositories(repos)
            }
            ReadQuery::Stats { repo_path } => {
                let mut stats = GraphStats::default();
                for (key, props) in &self.nodes {
                    if let Some(repo) = &repo_path {
                        if !self.node_in_repo(key, props, repo) {
                            continue;
                        }
                    }
                    *stats
                        .nodes_by_label
                        .entry(key.label().as_str().to_string())
                        .or_default() += 1;
                }
                for ((from, kind, _), _) in &self.edges {
                    if let Some(repo) = &repo_path {
                        let props = self.nodes.get(from);
                        if !props.is_some_and(|p| self.node_in_repo(from, p, repo)) {
                            continue;
                        }
                    }
                    *stats
                        .edges_by_kind
                        .entry(kind.as_str().to_string())
                        .or_default() += 1;
                }
                ReadResult::Stats(stats)
            }
        }
    }

    fn file_count(&self, repo_path: &str) -> usize {
        self.nodes
            .iter()
            .filter(|(key, props)| {
                matches!(key, NodeKey::File { .. })
                    && props.get("repository_path").and_then(Value::as_str)
                        == Some(repo_path)
            })
            .count()
    }

    fn node_in_repo(&self, key: &NodeKey, props: &Props, repo_path: &str) -> bool {
        match key {
            NodeKey::Repository { path } => path == repo_path,
            NodeKey::Directory { path } => Path::new(path).starts_with(repo_path),
            NodeKey::File { .. } => {
                props.get("repository_path").and_then(Value::as_str) == Some(repo_path)
            }
            NodeKey::Entity { file_path, .. } => Path::new(file_path).starts_with(repo_path),
            NodeKey::Module { .. } => false,
        }
    }
}

/// Embedded in-memory property-graph backend.
#[derive(Debug)]
pub struct MemoryBackend {
    store: Arc<RwLock<Store>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            closed: AtomicBool::new(false),
        }
    }

    /// Deterministic serialization of the full graph state, for comparing
    /// runs in tests and diagnostics.
    pub fn snapshot(&self) -> String {
        let store = self.store.read();
        let nodes: Vec<_> = store.nodes.iter().collect();
        let edges: Vec<_> = store.edges.iter().collect();
        serde_json::to_string_pretty(&serde_json::json!({
            "nodes": nodes,
            "edges": edges,
        }))
        .expect("graph state serializes")
    }

    pub fn node_props(&self, key: &NodeKey) -> Option<Props> {
        self.store.read().nodes.get(key).cloned()
    }

    pub fn nodes_with_label(&self, label: NodeLabel) -> Vec<NodeKey> {
        self.store
            .read()
            .nodes
            .keys()
            .filter(|k| k.label() == label)
            .cloned()
            .collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<(NodeKey, NodeKey, Props)> {
        self.store
            .read()
            .edges
            .iter()
            .filter(|((_, k, _), _)| *k == kind)
            .map(|((from, _, to), props)| (from.clone(), to.clone(), props.clone()))
            .collect()
    }

    pub fn contains_edge(&self, from: &NodeKey, kind: EdgeKind, to: &NodeKey) -> bool {
        self.store
            .read()
            .edges
            .contains_key(&(from.clone(), kind, to.clone()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBackend for MemoryBackend {
    fn open_session(&self) -> StoreResult<Box<dyn GraphSession + '_>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(Box::new(MemorySession {
            store: Arc::clone(&self.store),
            pending: Vec::new(),
            committed: false,
        }))
    }

    fn probe(&self, _timeout: Duration) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MemorySession {
    store: Arc<RwLock<Store>>,
    pending: Vec<WriteOp>,
    committed: bool,
}

impl GraphSession for MemorySession {
    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        if self.committed {
            return Err(StoreError::SessionConsumed);
        }
        self.pending.push(op);
        Ok(())
    }

    fn read(&mut self, query: ReadQuery) -> StoreResult<ReadResult> {
        Ok(self.store.read().read(query))
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.committed {
            return Err(StoreError::SessionConsumed);
        }
        self.committed = true;
        let mut store = self.store.write();
        for op in self.pending.drain(..) {
            store.apply(op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::value::set_prop;

    fn file_key(path: &str) -> NodeKey {
        NodeKey::File {
            path: path.to_string(),
        }
    }

    fn merge_node(session: &mut dyn GraphSession, key: NodeKey, props: Props) {
        session.apply(WriteOp::MergeNode { key, props }).unwrap();
    }

    #[test]
    fn merge_is_idempotent() {
        let backend = MemoryBackend::new();
        for _ in 0..3 {
            let mut session = backend.open_session().unwrap();
            let mut props = Props::new();
            set_prop(&mut props, "name", "a.py");
            merge_node(session.as_mut(), file_key("/r/a.py"), props);
            session
                .apply(WriteOp::MergeEdge {
                    from: NodeKey::Repository {
                        path: "/r".to_string(),
                    },
                    to: file_key("/r/a.py"),
                    kind: EdgeKind::Contains,
                    props: Props::new(),
                })
                .unwrap();
            session.commit().unwrap();
        }
        assert_eq!(backend.nodes_with_label(NodeLabel::File).len(), 1);
        assert_eq!(backend.edges_of_kind(EdgeKind::Contains).len(), 1);
    }

    #[test]
    fn merge_updates_properties() {
        let backend = MemoryBackend::new();
        let mut session = backend.open_session().unwrap();
        let mut props = Props::new();
        set_prop(&mut props, "size", 10u64);
        merge_node(session.as_mut(), file_key("/a.py"), props);
        session.commit().unwrap();

        let mut session = backend.open_session().unwrap();
        let mut props = Props::new();
        set_prop(&mut props, "size", 20u64);
        merge_node(session.as_mut(), file_key("/a.py"), props);
        session.commit().unwrap();

        let props = backend.node_props(&file_key("/a.py")).unwrap();
        assert_eq!(props.get("size").unwrap().as_i64(), Some(20));
    }

    #[test]
    fn uncommitted_sessions_discard_writes() {
        let backend = MemoryBackend::new();
        {
            let mut session = backend.open_session().unwrap();
            merge_node(session.as_mut(), file_key("/a.py"), Props::new());
            // dropped without commit
        }
        assert!(backend.nodes_with_label(NodeLabel::File).is_empty());
    }

    #[test]
    fn delete_file_subtree_cascades_and_prunes() {
        let backend = MemoryBackend::new();
        let mut session = backend.open_session().unwrap();
        let repo = NodeKey::Repository {
            path: "/r".to_string(),
        };
        let dir = NodeKey::Directory {
            path: "/r/src".to_string(),
        };
        let file = file_key("/r/src/a.py");
        let func = NodeKey::entity(NodeLabel::Function, "foo", "/r/src/a.py", 1);
        let module = NodeKey::Module {
            name: "os".to_string(),
        };
        merge_node(session.as_mut(), repo.clone(), Props::new());
        merge_node(session.as_mut(), dir.clone(), Props::new());
        merge_node(session.as_mut(), file.clone(), Props::new());
        merge_node(session.as_mut(), func.clone(), Props::new());
        for (from, to) in [
            (repo.clone(), dir.clone()),
            (dir.clone(), file.clone()),
            (file.clone(), func.clone()),
        ] {
            session
                .apply(WriteOp::MergeEdge {
                    from,
                    to,
                    kind: EdgeKind::Contains,
                    props: Props::new(),
                })
                .unwrap();
        }
        session
            .apply(WriteOp::MergeEdge {
                from: file.clone(),
                to: module.clone(),
                kind: EdgeKind::Imports,
                props: Props::new(),
            })
            .unwrap();
        session.commit().unwrap();

        let mut session = backend.open_session().unwrap();
        session
            .apply(WriteOp::DeleteFileSubtree {
                file_path: "/r/src/a.py".to_string(),
            })
            .unwrap();
        session.commit().unwrap();

        // File, function, orphaned module, and empty directory are gone.
        assert!(backend.node_props(&file).is_none());
        assert!(backend.node_props(&func).is_none());
        assert!(backend.node_props(&module).is_none());
        assert!(backend.node_props(&dir).is_none());
        // The repository survives.
        assert!(backend.node_props(&repo).is_some());
    }

    #[test]
    fn shared_directories_and_modules_survive() {
        let backend = MemoryBackend::new();
        let mut session = backend.open_session().unwrap();
        let dir = NodeKey::Directory {
            path: "/r/src".to_string(),
        };
        let a = file_key("/r/src/a.py");
        let b = file_key("/r/src/b.py");
        let module = NodeKey::Module {
            name: "os".to_string(),
        };
        merge_node(session.as_mut(), dir.clone(), Props::new());
        merge_node(session.as_mut(), a.clone(), Props::new());
        merge_node(session.as_mut(), b.clone(), Props::new());
        for file in [a.clone(), b.clone()] {
            session
                .apply(WriteOp::MergeEdge {
                    from: dir.clone(),
                    to: file.clone(),
                    kind: EdgeKind::Contains,
                    props: Props::new(),
                })
                .unwrap();
            session
                .apply(WriteOp::MergeEdge {
                    from: file,
                    to: module.clone(),
                    kind: EdgeKind::Imports,
                    props: Props::new(),
                })
                .unwrap();
        }
        session.commit().unwrap();

        let mut session = backend.open_session().unwrap();
        session
            .apply(WriteOp::DeleteFileSubtree {
                file_path: "/r/src/a.py".to_string(),
            })
            .unwrap();
        session.commit().unwrap();

        // b.py still holds the directory and the module alive.
        assert!(backend.node_props(&dir).is_some());
        assert!(backend.node_props(&module).is_some());
        assert!(backend.node_props(&a).is_none());
    }

    #[test]
    fn closed_backend_refuses_sessions() {
        let backend = MemoryBackend::new();
        backend.close();
        assert!(backend.open_session().is_err());
        assert!(backend.probe(Duration::from_secs(1)).is_err());
    }
}
