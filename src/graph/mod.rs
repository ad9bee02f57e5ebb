//! The property-graph layer: typed write operations, the backend protocol,
//! the embedded reference backend, and the graph writer.

pub mod backend;
pub mod memory;
pub mod ops;
pub mod query;
pub mod value;
pub mod writer;

pub use backend::{
    GraphBackend, GraphSession, GraphStats, ReadQuery, ReadResult, RepositoryInfo, open_backend,
};
pub use memory::MemoryBackend;
pub use ops::{EdgeKind, NodeKey, NodeLabel, WriteOp};
pub use query::ensure_read_only;
pub use value::{Props, Value};
pub use writer::{GraphWriter, RepoContext};
