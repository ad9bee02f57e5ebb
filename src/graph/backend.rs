//! The abstract property-graph backend protocol.
//!
//! A backend hands out sessions; a session buffers write operations and
//! applies them atomically on commit. Reads run against committed state.
//! `DATABASE_TYPE` selects the implementation at startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{IndexError, IndexResult, StoreResult};
use crate::graph::memory::MemoryBackend;
use crate::graph::ops::{NodeLabel, WriteOp};
use crate::index::metadata::FileMetadata;

/// Typed read queries the core needs from any backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadQuery {
    /// Stored metadata of a File node, if indexed before.
    FileMetadata { path: String },
    /// First (lowest) line of an entity with this label and name in a file.
    EntityLine {
        label: NodeLabel,
        file_path: String,
        name: String,
    },
    /// Absolute paths of files belonging to a repository.
    RepositoryFiles { repo_path: String },
    /// Every Repository node.
    Repositories,
    /// Node and edge counts, optionally scoped to one repository.
    Stats { repo_path: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Metadata(Option<FileMetadata>),
    Line(Option<u32>),
    Files(Vec<String>),
    Repositories(Vec<RepositoryInfo>),
    Stats(GraphStats),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryInfo {
    pub path: String,
    pub name: String,
    pub is_dependency: bool,
    pub file_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub nodes_by_label: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> usize {
        self.nodes_by_label.values().sum()
    }

    pub fn total_edges(&self) -> usize {
        self.edges_by_kind.values().sum()
    }
}

/// A transactional session. Writes buffer until [`GraphSession::commit`];
/// dropping an uncommitted session discards them. Sessions release their
/// backend resources deterministically on every exit path.
pub trait GraphSession: Send {
    fn apply(&mut self, op: WriteOp) -> StoreResult<()>;
    fn read(&mut self, query: ReadQuery) -> StoreResult<ReadResult>;
    fn commit(&mut self) -> StoreResult<()>;
}

/// A property-graph backend.
pub trait GraphBackend: Send + Sync + std::fmt::Debug {
    fn open_session(&self) -> StoreResult<Box<dyn GraphSession + '_>>;

    /// Cheap liveness probe; must return within the timeout.
    fn probe(&self, timeout: Duration) -> StoreResult<()>;

    fn close(&self);
}

/// Select and open the backend configured by `DATABASE_TYPE` / settings.
pub fn open_backend(settings: &Settings) -> IndexResult<Arc<dyn GraphBackend>> {
    match settings.backend.database_type.as_str() {
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => Err(IndexError::config(format!(
            "unknown DATABASE_TYPE '{other}' (supported: memory)"
        ))),
    }
}

/// Probe a backend with the configured (≤ 5 s) budget.
pub fn probe_backend(backend: &dyn GraphBackend, settings: &Settings) -> IndexResult<()> {
    let timeout = Duration::from_secs(settings.backend.probe_timeout_secs.min(5));
    backend.probe(timeout).map_err(|e| IndexError::BackendUnavailable {
        reason: e.to_string(),
    })
}
