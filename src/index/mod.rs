//! Indexing: file metadata triage, job tracking, and the batch pipeline.

pub mod jobs;
pub mod metadata;
pub mod pipeline;

pub use jobs::{IndexJob, JobManager, JobStatus};
pub use metadata::{ChangeReason, FileMetadata, has_file_changed};
pub use pipeline::{IndexPipeline, IndexReport};
