use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};

use codegraph::config::Settings;
use codegraph::graph::backend::{open_backend, probe_backend};
use codegraph::index::{IndexPipeline, JobManager, JobStatus};
use codegraph::watcher::RepoWatcher;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Index source repositories into a property graph of code structure")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository (skips if already indexed with files)
    Index {
        /// Path to the repository root
        path: PathBuf,

        /// Index as a dependency rather than a project
        #[arg(long)]
        dependency: bool,

        /// Re-emit files even when unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a repository from the graph, then index it from scratch
    Reindex {
        path: PathBuf,
    },

    /// Re-emit only the files that changed since the last index
    Update {
        path: PathBuf,
    },

    /// Delete a repository and everything under it from the graph
    Delete {
        path: PathBuf,
    },

    /// Watch a repository and re-index files as they change
    Watch {
        path: PathBuf,
    },

    /// List indexed repositories
    List,

    /// Show node and edge counts, optionally for one repository
    Stats {
        path: Option<PathBuf>,
    },

    /// Remove every indexed repository from the graph
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    codegraph::logging::init_with_config(&settings.logging);

    let cli = Cli::parse();
    let settings = Arc::new(settings);
    let backend = open_backend(&settings)?;
    probe_backend(backend.as_ref(), &settings)?;
    let jobs = Arc::new(JobManager::new());
    let pipeline = Arc::new(IndexPipeline::new(
        settings.clone(),
        backend.clone(),
        jobs.clone(),
    ));

    match cli.command {
        Commands::Index {
            path,
            dependency,
            force,
        } => {
            if !force && already_indexed(&pipeline, &path)? {
                println!(
                    "Repository '{}' is already indexed. Use 'codegraph index --force' or 'codegraph update' instead.",
                    path.display()
                );
                return Ok(());
            }
            run_index(&pipeline, &jobs, &path, dependency, force).await?;
        }
        Commands::Reindex { path } => {
            let canonical = path
                .canonicalize()
                .with_context(|| format!("path does not exist: {}", path.display()))?;
            pipeline.writer().delete_repository(&canonical)?;
            println!("Deleted previous graph for {}", canonical.display());
            run_index(&pipeline, &jobs, &path, false, true).await?;
        }
        Commands::Update { path } => {
            let canonical = path
                .canonicalize()
                .with_context(|| format!("path does not exist: {}", path.display()))?;
            let report = pipeline.index_path(&canonical, false, None, false).await?;
            println!(
                "Updated {} file(s), {} unchanged, {} failed.",
                report.indexed_files, report.skipped_files, report.failed_files
            );
        }
        Commands::Delete { path } => {
            let canonical = path
                .canonicalize()
                .unwrap_or_else(|_| path.clone());
            pipeline.writer().delete_repository(&canonical)?;
            println!("Deleted repository: {}", canonical.display());
        }
        Commands::Watch { path } => {
            // Bring the graph up to date first, then follow changes.
            let report = pipeline.index_path(&path, false, None, false).await?;
            println!(
                "Initial sync: {} indexed, {} unchanged. Watching {} (Ctrl-C to stop).",
                report.indexed_files,
                report.skipped_files,
                path.display()
            );
            let watcher = RepoWatcher::new(
                pipeline.clone(),
                path.clone(),
                settings.watcher.debounce_ms,
            );
            let stop = watcher.stop_token();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                stop.cancel();
            });
            watcher.watch().await?;
        }
        Commands::List => {
            let repos = pipeline.writer().repositories()?;
            if repos.is_empty() {
                println!("No repositories indexed yet.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Path", "Type", "Files"]);
            for repo in repos {
                table.add_row(vec![
                    repo.name,
                    repo.path,
                    if repo.is_dependency {
                        "Dependency".to_string()
                    } else {
                        "Project".to_string()
                    },
                    repo.file_count.to_string(),
                ]);
            }
            println!("{table}");
        }
        Commands::Stats { path } => {
            let canonical = path
                .as_ref()
                .map(|p| p.canonicalize())
                .transpose()
                .context("stats path does not exist")?;
            let stats = pipeline.writer().stats(canonical.as_deref())?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Kind", "Count"]);
            for (label, count) in &stats.nodes_by_label {
                table.add_row(vec![format!("{label} nodes"), count.to_string()]);
            }
            for (kind, count) in &stats.edges_by_kind {
                table.add_row(vec![format!("{kind} edges"), count.to_string()]);
            }
            println!("{table}");
            println!(
                "{} nodes, {} edges total.",
                stats.total_nodes(),
                stats.total_edges()
            );
        }
        Commands::Clean => {
            let repos = pipeline.writer().repositories()?;
            if repos.is_empty() {
                println!("Nothing to clean.");
                return Ok(());
            }
            for repo in &repos {
                pipeline.writer().delete_repository(Path::new(&repo.path))?;
            }
            println!("Removed {} repositories from the graph.", repos.len());
        }
    }

    backend.close();
    Ok(())
}

fn already_indexed(pipeline: &IndexPipeline, path: &Path) -> Result<bool> {
    let Ok(canonical) = path.canonicalize() else {
        return Ok(false);
    };
    let repos = pipeline.writer().repositories()?;
    Ok(repos
        .iter()
        .any(|r| Path::new(&r.path) == canonical && r.file_count > 0))
}

async fn run_index(
    pipeline: &Arc<IndexPipeline>,
    jobs: &Arc<JobManager>,
    path: &Path,
    dependency: bool,
    force: bool,
) -> Result<()> {
    let job_id = jobs.create_job();
    let progress = spawn_progress_bar(jobs.clone(), job_id.clone());

    let started = std::time::Instant::now();
    let result = pipeline
        .index_path(path, dependency, Some(&job_id), force)
        .await;
    progress.abort();

    let job = jobs.get(&job_id);
    match result {
        Ok(report) => {
            println!(
                "Indexed {} file(s) ({} unchanged, {} failed) in {:.2}s.",
                report.indexed_files,
                report.skipped_files,
                report.failed_files,
                started.elapsed().as_secs_f64()
            );
            if let Some(job) = job {
                if job.status == JobStatus::Cancelled {
                    println!("Job was cancelled; the graph is consistent but partial.");
                }
                for error in &job.errors {
                    eprintln!("warning: {error}");
                }
            }
            Ok(())
        }
        Err(e) => {
            if let Some(job) = job {
                for error in &job.errors {
                    eprintln!("error: {error}");
                }
            }
            bail!("indexing failed: {e}");
        }
    }
}

/// Render job progress while the pipeline runs.
fn spawn_progress_bar(jobs: Arc<JobManager>, job_id: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .expect("static template parses"),
        );
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let Some(job) = jobs.get(&job_id) else {
                break;
            };
            if job.total_files > 0 {
                bar.set_length(job.total_files as u64);
                bar.set_position(job.processed_files as u64);
            }
            if let Some(current) = &job.current_file {
                if let Some(name) = current.file_name() {
                    bar.set_message(name.to_string_lossy().into_owned());
                }
            }
            if job.status.is_terminal() {
                break;
            }
        }
        bar.finish_and_clear();
    })
}
