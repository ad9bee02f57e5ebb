//! The batch indexing pipeline.
//!
//! Full index: enumerate candidate files (sorted), pre-scan them into the
//! symbol map, extract on a bounded worker pool (one parser set per worker),
//! write each file's subtree in enumeration order, then run the cross-file
//! pass and finally the CSS cascade pass. The loop yields between files;
//! the yield is the cancellation point.
//!
//! Incremental: triage one file via stored metadata, re-extract and re-write
//! it, and re-run cross-file linking for that file only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::graph::{GraphBackend, GraphWriter, RepoContext};
use crate::index::jobs::JobManager;
use crate::index::metadata::{ChangeReason, FileMetadata, has_file_changed};
use crate::ir::FileIr;
use crate::parsing::{ExtractorSet, Language};
use crate::resolve::{PreScanner, Resolver, SymbolMap};

/// Outcome summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub total_files: usize,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
}

pub struct IndexPipeline {
    settings: Arc<Settings>,
    writer: GraphWriter,
    jobs: Arc<JobManager>,
}

type ExtractionResult = (usize, IndexResult<(FileIr, FileMetadata)>);

impl IndexPipeline {
    pub fn new(
        settings: Arc<Settings>,
        backend: Arc<dyn GraphBackend>,
        jobs: Arc<JobManager>,
    ) -> Self {
        Self {
            settings,
            writer: GraphWriter::new(backend),
            jobs,
        }
    }

    pub fn writer(&self) -> &GraphWriter {
        &self.writer
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    /// Candidate files under a path, filtered by registered extensions and
    /// the configured ignores, in sorted order. Sorted enumeration makes the
    /// pre-scan map (and therefore resolution) deterministic.
    pub fn enumerate_files(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if Language::from_path(path).is_some() {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
        }

        let ignore_dirs = &self.settings.indexing.ignore_dirs;
        let max_size = self.settings.indexing.max_file_size;
        let mut files: Vec<PathBuf> = WalkBuilder::new(path)
            .hidden(true)
            .git_ignore(true)
            .filter_entry({
                let ignore_dirs = ignore_dirs.clone();
                move |entry| {
                    let name = entry.file_name().to_string_lossy();
                    !(entry.file_type().is_some_and(|t| t.is_dir())
                        && ignore_dirs.iter().any(|d| d == name.as_ref()))
                }
            })
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|p| Language::from_path(p).is_some())
            .filter(|p| {
                max_size == 0
                    || std::fs::metadata(p).map(|m| m.len() <= max_size).unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    /// Full-index a path. `force` re-emits files the triage would skip.
    pub async fn index_path(
        &self,
        path: &Path,
        is_dependency: bool,
        job_id: Option<&str>,
        force: bool,
    ) -> IndexResult<IndexReport> {
        let root = canonicalize(path)?;
        let repo = RepoContext::new(root.clone(), is_dependency);
        self.writer.ensure_schema()?;

        let files = self.enumerate_files(&root);
        if let Some(id) = job_id {
            self.jobs.start(id, files.len());
        }
        let mut report = IndexReport {
            total_files: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            tracing::warn!("no indexable files found under {}", root.display());
            if let Some(id) = job_id {
                self.jobs.complete(id);
            }
            return Ok(report);
        }

        // Pre-scan pass: one walk over the whole batch.
        let scan_files = files.clone();
        let symbol_map = tokio::task::spawn_blocking(move || {
            PreScanner::new().scan(&scan_files)
        })
        .await
        .map_err(|e| IndexError::Write {
            phase: "pre-scan",
            message: e.to_string(),
        })?;

        // Main pass: triage on the orchestrator, extraction on the pool,
        // writes in enumeration order.
        let mut to_extract = Vec::new();
        for file in &files {
            if self.cancelled(job_id) {
                return self.finish_cancelled(job_id, report);
            }
            let stored = self.writer.stored_metadata(file)?;
            let (changed, reason) = has_file_changed(file, stored.as_ref());
            if !changed && !force {
                tracing::debug!("skipping {} ({})", file.display(), reason.as_str());
                report.skipped_files += 1;
                if let Some(id) = job_id {
                    self.jobs.file_processed(id, file);
                }
                continue;
            }
            if reason == ChangeReason::FileDeleted {
                report.failed_files += 1;
                if let Some(id) = job_id {
                    self.jobs.record_error(
                        id,
                        format!("file vanished before extraction: {}", file.display()),
                    );
                    self.jobs.file_processed(id, file);
                }
                continue;
            }
            to_extract.push(file.clone());
        }

        let mut irs: Vec<FileIr> = Vec::with_capacity(to_extract.len());
        if !to_extract.is_empty() {
            let (mut result_rx, expected) = self.extract_pool(to_extract, is_dependency);
            let mut pending: BTreeMap<usize, IndexResult<(FileIr, FileMetadata)>> =
                BTreeMap::new();
            let mut next_write = 0usize;
            let mut received = 0usize;

            while received < expected {
                let Some((idx, outcome)) = result_rx.recv().await else {
                    break;
                };
                received += 1;
                pending.insert(idx, outcome);

                // Drain in order so writes follow enumeration order.
                while let Some(outcome) = pending.remove(&next_write) {
                    next_write += 1;
                    match outcome {
                        Ok((ir, meta)) => {
                            if let Some(error) = &ir.error {
                                report.failed_files += 1;
                                if let Some(id) = job_id {
                                    self.jobs.record_error(
                                        id,
                                        format!("{}: {error}", ir.file_path.display()),
                                    );
                                }
                            } else {
                                report.indexed_files += 1;
                            }
                            self.writer.write_file(&repo, &ir, &meta).inspect_err(|e| {
                                if let Some(id) = job_id {
                                    self.jobs.finish_with_error(id, e);
                                }
                            })?;
                            if let Some(id) = job_id {
                                self.jobs.file_processed(id, &ir.file_path);
                            }
                            irs.push(ir);
                        }
                        Err(e) => {
                            if e.cancels_job() {
                                if let Some(id) = job_id {
                                    self.jobs.finish_with_error(id, &e);
                                }
                                return Err(e);
                            }
                            report.failed_files += 1;
                            if let Some(id) = job_id {
                                self.jobs.record_error(id, &e);
                            }
                        }
                    }

                    if self.cancelled(job_id) {
                        return self.finish_cancelled(job_id, report);
                    }
                    tokio::task::yield_now().await;
                }
            }
        }

        // Second pass: cross-file edges, only after every first-pass write
        // has committed.
        let resolver = Resolver::new(&symbol_map);
        for ir in &irs {
            if self.cancelled(job_id) {
                return self.finish_cancelled(job_id, report);
            }
            self.writer.write_cross_file_edges(ir, &resolver)?;
            tokio::task::yield_now().await;
        }

        // Cascade pass, after the cross-file pass.
        for ir in irs.iter().filter(|ir| ir.language == Language::Css) {
            self.writer.write_cascade(ir)?;
        }

        if let Some(id) = job_id {
            self.jobs.complete(id);
        }
        Ok(report)
    }

    /// Bounded extraction pool: each worker owns its parser set and pulls
    /// paths from a shared queue.
    fn extract_pool(
        &self,
        work: Vec<PathBuf>,
        is_dependency: bool,
    ) -> (tokio::sync::mpsc::Receiver<ExtractionResult>, usize) {
        let expected = work.len();
        let workers = self.settings.worker_count().min(expected.max(1));
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
        for item in work.into_iter().enumerate() {
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let (result_tx, result_rx) = tokio::sync::mpsc::channel(workers * 2);
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            std::thread::spawn(move || {
                let mut extractors = ExtractorSet::new();
                while let Ok((idx, path)) = work_rx.recv() {
                    let outcome = FileMetadata::capture(&path).and_then(|meta| {
                        extractors
                            .extract_file(&path, is_dependency)
                            .map(|ir| (ir, meta))
                    });
                    if result_tx.blocking_send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        (result_rx, expected)
    }

    /// Incremental update of a single file, driven by the watcher or the
    /// `update` command.
    pub async fn update_file(&self, repo_root: &Path, file: &Path) -> IndexResult<()> {
        let root = canonicalize(repo_root)?;
        let file = canonicalize(file)?;
        self.writer.ensure_schema()?;

        let stored = self.writer.stored_metadata(&file)?;
        let (changed, reason) = has_file_changed(&file, stored.as_ref());
        if !changed {
            tracing::debug!("{} unchanged ({})", file.display(), reason.as_str());
            return Ok(());
        }
        if reason == ChangeReason::FileDeleted {
            return self.remove_file(&file).await;
        }
        tracing::info!("re-indexing {} ({})", file.display(), reason.as_str());

        // The pre-scan map spans the repository so resolution sees every
        // candidate; only the changed file is re-emitted.
        let files = self.enumerate_files(&root);
        let target = file.clone();
        let (ir, meta, symbol_map) = tokio::task::spawn_blocking(
            move || -> IndexResult<(FileIr, FileMetadata, SymbolMap)> {
                let symbol_map = PreScanner::new().scan(&files);
                let meta = FileMetadata::capture(&target)?;
                let ir = ExtractorSet::new().extract_file(&target, false)?;
                Ok((ir, meta, symbol_map))
            },
        )
        .await
        .map_err(|e| IndexError::Write {
            phase: "extraction",
            message: e.to_string(),
        })??;

        let repo = RepoContext::new(root, false);
        self.writer.write_file(&repo, &ir, &meta)?;
        let resolver = Resolver::new(&symbol_map);
        self.writer.write_cross_file_edges(&ir, &resolver)?;
        if ir.language == Language::Css {
            self.writer.write_cascade(&ir)?;
        }
        Ok(())
    }

    /// Remove one file's subtree (delete events).
    pub async fn remove_file(&self, file: &Path) -> IndexResult<()> {
        tracing::info!("removing {} from graph", file.display());
        self.writer.delete_file(file)
    }

    fn cancelled(&self, job_id: Option<&str>) -> bool {
        job_id
            .and_then(|id| self.jobs.get(id))
            .is_some_and(|job| job.is_cancelled())
    }

    fn finish_cancelled(
        &self,
        job_id: Option<&str>,
        report: IndexReport,
    ) -> IndexResult<IndexReport> {
        if let Some(id) = job_id {
            self.jobs.cancel(id);
        }
        tracing::info!("index job cancelled; graph left consistent but partial");
        Ok(report)
    }
}

fn canonicalize(path: &Path) -> IndexResult<PathBuf> {
    path.canonicalize().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IndexError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            IndexError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryBackend;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline() -> (IndexPipeline, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let pipeline = IndexPipeline::new(
            Arc::new(Settings::default()),
            backend.clone() as Arc<dyn GraphBackend>,
            Arc::new(JobManager::new()),
        );
        (pipeline, backend)
    }

    #[test]
    fn enumerate_filters_and_sorts() {
        let (pipeline, _) = pipeline();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("a.py"), "y = 2\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not code\n").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "var x;\n").unwrap();

        let files = pipeline.enumerate_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
    }

    #[test]
    fn enumerate_single_file() {
        let (pipeline, _) = pipeline();
        let dir = TempDir::new().unwrap();
        let py = dir.path().join("one.py");
        fs::write(&py, "x = 1\n").unwrap();

        assert_eq!(pipeline.enumerate_files(&py), vec![py]);
        let txt = dir.path().join("one.txt");
        fs::write(&txt, "x\n").unwrap();
        assert!(pipeline.enumerate_files(&txt).is_empty());
    }

    #[tokio::test]
    async fn index_missing_path_is_missing_file() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .index_path(Path::new("/no/such/repo"), false, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::MissingFile { .. }));
    }

    #[tokio::test]
    async fn index_counts_skips_on_second_run() {
        let (pipeline, _) = pipeline();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "def foo(): pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def bar(): pass\n").unwrap();

        let first = pipeline
            .index_path(dir.path(), false, None, false)
            .await
            .unwrap();
        assert_eq!(first.indexed_files, 2);
        assert_eq!(first.skipped_files, 0);

        let second = pipeline
            .index_path(dir.path(), false, None, false)
            .await
            .unwrap();
        assert_eq!(second.indexed_files, 0);
        assert_eq!(second.skipped_files, 2);
    }
}
