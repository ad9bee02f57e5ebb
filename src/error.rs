//! Error types for the indexing core.
//!
//! The taxonomy follows the failure modes of the pipeline: configuration and
//! backend availability abort an operation, per-file parse failures are
//! embedded in that file's IR, a vanished file cancels its job, and a rejected
//! write fails the batch with the backend message attached.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Backend URI/credentials missing or unparsable. Surfaced immediately.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Cannot establish a backend session. Not retried automatically.
    #[error("Graph backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// Single-file syntactic failure. Embedded in the file's IR; never aborts
    /// the batch.
    #[error("Failed to parse {language} file '{}': {reason}", path.display())]
    Parse {
        path: PathBuf,
        language: String,
        reason: String,
    },

    /// A path vanished mid-batch. The job transitions to CANCELLED.
    #[error("File disappeared during indexing: '{}'", path.display())]
    MissingFile { path: PathBuf },

    /// The backend rejected a write. Fatal for the batch.
    #[error("Graph write failed during {phase}: {message}")]
    Write { phase: &'static str, message: String },

    /// The OS event source failed. The watcher stops and reports.
    #[error("File watcher error: {reason}")]
    Watch { reason: String },

    #[error("Failed to read file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No grammar registered for extension '{extension}' of '{}'", path.display())]
    UnsupportedFileType { path: PathBuf, extension: String },
}

impl IndexError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Whether this error cancels the job rather than failing it.
    pub fn cancels_job(&self) -> bool {
        matches!(self, Self::MissingFile { .. })
    }
}

/// Errors raised by a property-graph backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend is closed")]
    Closed,

    #[error("session already committed")]
    SessionConsumed,

    #[error("operation not supported by this backend: {operation}")]
    Unsupported { operation: String },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for IndexError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Closed => IndexError::BackendUnavailable {
                reason: "backend is closed".to_string(),
            },
            other => IndexError::Write {
                phase: "write",
                message: other.to_string(),
            },
        }
    }
}

/// Result alias for indexing operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;
