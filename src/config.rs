//! Layered configuration.
//!
//! Settings resolve in order: built-in defaults, then `codegraph.toml`, then
//! environment variables prefixed with `CGC_` (double underscore separates
//! nested levels, e.g. `CGC_INDEXING__PARALLEL_THREADS=8`). Two variables are
//! read outside the figment layers because their names are fixed by the
//! deployment contract: `DATABASE_TYPE` selects the backend and
//! `CGC_LOG_LEVEL` sets the log filter.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "codegraph.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Worker pool size for extraction. Defaults to host parallelism.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Directory names skipped during file enumeration.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Skip files larger than this many bytes (0 disables the cap).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Backend kind; overridden by the `DATABASE_TYPE` environment variable.
    #[serde(default = "default_database_type")]
    pub database_type: String,

    /// Connection URI for remote backends. Unused by the embedded store.
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Liveness probe budget, in seconds. Capped at 5.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// Per-file event coalescing window, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watcher = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_ignore_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        "node_modules".to_string(),
        "target".to_string(),
        "__pycache__".to_string(),
        ".venv".to_string(),
        "venv".to_string(),
        "build".to_string(),
        "dist".to_string(),
    ]
}
fn default_max_file_size() -> u64 {
    2 * 1024 * 1024
}
fn default_database_type() -> String {
    "memory".to_string()
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_debounce_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            indexing: IndexingConfig::default(),
            backend: BackendConfig::default(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            ignore_dirs: default_ignore_dirs(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            database_type: default_database_type(),
            uri: None,
            username: None,
            password: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `codegraph.toml`, and `CGC_` env.
    pub fn load() -> Result<Self, figment::Error> {
        let mut settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CGC_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()?;
        settings.apply_fixed_env();
        Ok(settings)
    }

    /// Load from a specific TOML file (tests and tooling).
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        let mut settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()?;
        settings.apply_fixed_env();
        Ok(settings)
    }

    /// Apply the fixed-name environment variables of the deployment contract.
    fn apply_fixed_env(&mut self) {
        if let Ok(db) = std::env::var("DATABASE_TYPE") {
            if !db.is_empty() {
                self.backend.database_type = db.to_lowercase();
            }
        }
        if let Ok(uri) = std::env::var("CGC_BACKEND_URI") {
            if !uri.is_empty() {
                self.backend.uri = Some(uri);
            }
        }
    }

    /// Number of extraction workers, at least one.
    pub fn worker_count(&self) -> usize {
        self.indexing.parallel_threads.max(1)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> anyhow::Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(path.to_path_buf())
    }
}
