//! Filesystem watching and incremental re-indexing.

pub mod debouncer;
pub mod watcher;

pub use debouncer::Debouncer;
pub use watcher::{RepoWatcher, WatcherState};
