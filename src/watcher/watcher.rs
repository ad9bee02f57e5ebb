//! The filesystem watcher.
//!
//! Subscribes to recursive events under a watched root, coalesces bursts per
//! file, classifies create/modify/delete/move, and drives the incremental
//! pipeline. Extraction errors are recorded and never crash the loop.
//!
//! State machine per watched root: Idle -> Observing -> Draining (on stop)
//! -> Stopped. Stop is the only cancellation path; in-flight work completes
//! during Draining.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, IndexResult};
use crate::index::IndexPipeline;
use crate::parsing::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Observing,
    Draining,
    Stopped,
}

pub struct RepoWatcher {
    pipeline: Arc<IndexPipeline>,
    root: PathBuf,
    debounce_ms: u64,
    state: WatcherState,
    stop: CancellationToken,
}

impl RepoWatcher {
    pub fn new(pipeline: Arc<IndexPipeline>, root: PathBuf, debounce_ms: u64) -> Self {
        Self {
            pipeline,
            root,
            debounce_ms,
            state: WatcherState::Idle,
            stop: CancellationToken::new(),
        }
    }

    /// Token that transitions the watcher to Draining and then Stopped.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Run the event loop until stopped. Consumes the watcher; the final
    /// state is always Stopped on a clean exit.
    pub async fn watch(mut self) -> IndexResult<()> {
        let root = self.root.canonicalize().map_err(|e| IndexError::Watch {
            reason: format!("cannot watch {}: {e}", self.root.display()),
        })?;

        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(256);
        let mut os_watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                let _ = event_tx.blocking_send(res);
            })
            .map_err(|e| IndexError::Watch {
                reason: e.to_string(),
            })?;
        os_watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| IndexError::Watch {
                reason: format!("cannot watch {}: {e}", root.display()),
            })?;

        self.state = WatcherState::Observing;
        crate::log_event!("watcher", "observing", "{}", root.display());

        let mut debouncer = super::Debouncer::new(self.debounce_ms);
        let stop = self.stop.clone();
        loop {
            let tick = sleep(Duration::from_millis(100));
            tokio::pin!(tick);

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(Ok(event)) => self.classify(event, &mut debouncer).await,
                        Some(Err(e)) => {
                            // The OS event source failed: stop and report.
                            self.state = WatcherState::Stopped;
                            return Err(IndexError::Watch { reason: e.to_string() });
                        }
                        None => {
                            self.state = WatcherState::Stopped;
                            return Err(IndexError::Watch {
                                reason: "event channel closed".to_string(),
                            });
                        }
                    }
                }

                _ = &mut tick => {
                    for path in debouncer.take_ready() {
                        self.process_change(&path).await;
                    }
                }

                _ = stop.cancelled() => {
                    self.state = WatcherState::Draining;
                    crate::log_event!("watcher", "draining");
                    for path in debouncer.flush() {
                        self.process_change(&path).await;
                    }
                    self.state = WatcherState::Stopped;
                    crate::log_event!("watcher", "stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Classify an OS event into the debouncer or an immediate action.
    async fn classify(&self, event: Event, debouncer: &mut super::Debouncer) {
        for path in event.paths {
            if Language::from_path(&path).is_none() {
                continue;
            }
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    // Renames surface as Modify on some platforms; the
                    // exists-check at processing time sorts it out.
                    debouncer.touch(path);
                }
                EventKind::Remove(_) => {
                    debouncer.forget(&path);
                    if let Err(e) = self.pipeline.remove_file(&path).await {
                        tracing::error!("[watcher] delete failed for {}: {e}", path.display());
                    }
                }
                _ => {}
            }
        }
    }

    /// Process a debounced change: a vanished path is a delete (covers the
    /// delete half of a move); an existing one goes through triage and
    /// re-extraction.
    async fn process_change(&self, path: &Path) {
        if !path.exists() {
            if let Err(e) = self.pipeline.remove_file(path).await {
                tracing::error!("[watcher] delete failed for {}: {e}", path.display());
            }
            return;
        }
        crate::log_event!("watcher", "changed", "{}", path.display());
        if let Err(e) = self.pipeline.update_file(&self.root, path).await {
            tracing::error!("[watcher] re-index failed for {}: {e}", path.display());
        }
    }
}
