//! Long-running index job tracking.
//!
//! Jobs are shared between the pipeline, the watcher, and the CLI, so the
//! manager guards every mutation; updates from different threads are
//! linearizable. A "no such file" error cancels the job rather than failing
//! it; every other error fails it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone)]
pub struct IndexJob {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: Option<PathBuf>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    cancel: CancellationToken,
}

impl IndexJob {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            status: JobStatus::Pending,
            total_files: 0,
            processed_files: 0,
            current_file: None,
            start_time: None,
            end_time: None,
            errors: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Progress percentage, derived.
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.processed_files as f64 / self.total_files as f64) * 100.0
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Shared registry of index jobs.
#[derive(Default)]
pub struct JobManager {
    jobs: DashMap<String, IndexJob>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job in PENDING state and return its id.
    pub fn create_job(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(id.clone(), IndexJob::new(id.clone()));
        id
    }

    pub fn get(&self, id: &str) -> Option<IndexJob> {
        self.jobs.get(id).map(|j| j.clone())
    }

    pub fn list(&self) -> Vec<IndexJob> {
        let mut jobs: Vec<IndexJob> = self.jobs.iter().map(|j| j.clone()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Apply a mutation under the manager's guard.
    pub fn update<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut IndexJob),
    {
        if let Some(mut job) = self.jobs.get_mut(id) {
            f(&mut job);
        }
    }

    pub fn start(&self, id: &str, total_files: usize) {
        self.update(id, |job| {
            job.status = JobStatus::Running;
            job.total_files = total_files;
            job.start_time = Some(Utc::now());
        });
    }

    pub fn file_processed(&self, id: &str, current: &std::path::Path) {
        self.update(id, |job| {
            job.processed_files += 1;
            job.current_file = Some(current.to_path_buf());
        });
    }

    pub fn complete(&self, id: &str) {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.end_time = Some(Utc::now());
            job.current_file = None;
        });
    }

    pub fn cancel(&self, id: &str) {
        if let Some(job) = self.jobs.get(id) {
            job.cancel.cancel();
        }
        self.update(id, |job| {
            job.status = JobStatus::Cancelled;
            job.end_time = Some(Utc::now());
        });
    }

    /// Record a terminal error. MissingFile cancels; everything else fails.
    pub fn finish_with_error(&self, id: &str, error: &IndexError) {
        let status = if error.cancels_job() {
            JobStatus::Cancelled
        } else {
            JobStatus::Failed
        };
        self.update(id, |job| {
            job.errors.push(error.to_string());
            job.status = status;
            job.end_time = Some(Utc::now());
        });
    }

    /// Record a non-fatal, per-file error.
    pub fn record_error(&self, id: &str, error: impl std::fmt::Display) {
        self.update(id, |job| job.errors.push(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn lifecycle_pending_running_completed() {
        let manager = JobManager::new();
        let id = manager.create_job();
        assert_eq!(manager.get(&id).unwrap().status, JobStatus::Pending);

        manager.start(&id, 4);
        let job = manager.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.total_files, 4);
        assert!(job.start_time.is_some());

        manager.file_processed(&id, Path::new("/a.py"));
        manager.file_processed(&id, Path::new("/b.py"));
        let job = manager.get(&id).unwrap();
        assert_eq!(job.processed_files, 2);
        assert!((job.progress() - 50.0).abs() < f64::EPSILON);

        manager.complete(&id);
        let job = manager.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.status.is_terminal());
        assert!(job.end_time.is_some());
    }

    #[test]
    fn missing_file_cancels_other_errors_fail() {
        let manager = JobManager::new();

        let id = manager.create_job();
        manager.finish_with_error(
            &id,
            &IndexError::MissingFile {
                path: PathBuf::from("/gone.py"),
            },
        );
        assert_eq!(manager.get(&id).unwrap().status, JobStatus::Cancelled);

        let id = manager.create_job();
        manager.finish_with_error(
            &id,
            &IndexError::Write {
                phase: "entities",
                message: "backend said no".to_string(),
            },
        );
        let job = manager.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.errors[0].contains("backend said no"));
    }

    #[test]
    fn cancel_sets_token_and_status() {
        let manager = JobManager::new();
        let id = manager.create_job();
        let token = manager.get(&id).unwrap().cancel_token();
        assert!(!token.is_cancelled());

        manager.cancel(&id);
        assert!(token.is_cancelled());
        assert_eq!(manager.get(&id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn progress_with_zero_total_is_zero() {
        let manager = JobManager::new();
        let id = manager.create_job();
        assert_eq!(manager.get(&id).unwrap().progress(), 0.0);
    }
}
