//! Repository indexing into a persistent property graph.
//!
//! The pipeline is: grammar registry → per-language extraction into a
//! language-neutral IR → pre-scan symbol map → graph writes (per-file first
//! pass, cross-file second pass, CSS cascade last) → incremental updates
//! driven by file metadata and the filesystem watcher.

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod ir;
pub mod logging;
pub mod parsing;
pub mod resolve;
pub mod watcher;

pub use config::Settings;
pub use error::{IndexError, IndexResult, StoreError};
pub use graph::{GraphBackend, GraphWriter, MemoryBackend};
pub use index::{ChangeReason, FileMetadata, IndexPipeline, JobManager, JobStatus};
pub use ir::FileIr;
pub use parsing::{GrammarRegistry, Language};
pub use resolve::{Resolver, SymbolMap};

/// Bumped whenever extraction output changes shape; files indexed under an
/// older version are re-emitted on the next pass.
pub const PARSER_VERSION: &str = "1.0.0";
