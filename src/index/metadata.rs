//! File metadata for incremental indexing.
//!
//! Change detection is layered so the cheap checks run first: stored
//! metadata presence, then size, then mtime, and only then the content
//! hash. The hash is SHA-256, streamed in 64 KiB blocks.

use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::PARSER_VERSION;
use crate::error::{IndexError, IndexResult};

const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Metadata captured from the filesystem and stored on the File node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    /// SHA-256 of the file content, lowercase hex.
    pub content_hash: String,
    /// Modification timestamp, seconds since the epoch.
    pub last_modified: f64,
    pub size: u64,
    /// When this metadata was captured (i.e. when we indexed).
    pub last_indexed: f64,
    pub parser_version: String,
}

impl FileMetadata {
    /// Capture the current state of a file from disk.
    pub fn capture(path: &Path) -> IndexResult<Self> {
        let stat = std::fs::metadata(path).map_err(|e| io_to_index(path, e))?;
        let content_hash = hash_file(path)?;
        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            content_hash,
            last_modified: system_time_secs(stat.modified().map_err(|e| io_to_index(path, e))?),
            size: stat.len(),
            last_indexed: now_secs(),
            parser_version: PARSER_VERSION.to_string(),
        })
    }
}

/// Why a file was (or was not) considered changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    NewFile,
    SizeChanged,
    ContentChanged,
    TimestampOnly,
    ParserUpgraded,
    Unchanged,
    FileDeleted,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::NewFile => "new_file",
            ChangeReason::SizeChanged => "size_changed",
            ChangeReason::ContentChanged => "content_changed",
            ChangeReason::TimestampOnly => "timestamp_only",
            ChangeReason::ParserUpgraded => "parser_upgraded",
            ChangeReason::Unchanged => "unchanged",
            ChangeReason::FileDeleted => "file_deleted",
        }
    }

    pub fn is_changed(&self) -> bool {
        !matches!(self, ChangeReason::Unchanged | ChangeReason::TimestampOnly)
    }
}

/// Decide whether a file must be re-indexed, short-circuiting from cheapest
/// to most expensive check.
pub fn has_file_changed(path: &Path, stored: Option<&FileMetadata>) -> (bool, ChangeReason) {
    let Some(stored) = stored else {
        return (true, ChangeReason::NewFile);
    };

    let stat = match std::fs::metadata(path) {
        Ok(stat) => stat,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (true, ChangeReason::FileDeleted);
        }
        Err(e) => {
            tracing::warn!("metadata check failed for {}: {e}; assuming changed", path.display());
            return (true, ChangeReason::ContentChanged);
        }
    };

    // Level 1: size.
    if stat.len() != stored.size {
        return (true, ChangeReason::SizeChanged);
    }

    // Level 2: mtime. A newer timestamp forces the hash comparison.
    let mtime = stat
        .modified()
        .map(system_time_secs)
        .unwrap_or(stored.last_modified);
    if mtime > stored.last_modified {
        // Level 3: content hash.
        match hash_file(path) {
            Ok(hash) if hash != stored.content_hash => {
                return (true, ChangeReason::ContentChanged);
            }
            Ok(_) => return (false, ChangeReason::TimestampOnly),
            Err(IndexError::MissingFile { .. }) => return (true, ChangeReason::FileDeleted),
            Err(e) => {
                tracing::warn!("hash failed for {}: {e}; assuming changed", path.display());
                return (true, ChangeReason::ContentChanged);
            }
        }
    }

    // Level 4: parser version.
    if stored.parser_version.as_str() < PARSER_VERSION {
        return (true, ChangeReason::ParserUpgraded);
    }

    (false, ChangeReason::Unchanged)
}

/// SHA-256 of a file's content, streamed in 64 KiB blocks.
pub fn hash_file(path: &Path) -> IndexResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| io_to_index(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|e| io_to_index(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn io_to_index(path: &Path, e: std::io::Error) -> IndexError {
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
}

fn system_time_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn now_secs() -> f64 {
    system_time_secs(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        let c = dir.path().join("c.py");
        fs::write(&a, "def f(): pass\n").unwrap();
        fs::write(&b, "def f(): pass\n").unwrap();
        fs::write(&c, "def g(): pass\n").unwrap();

        let ha = hash_file(&a).unwrap();
        let hb = hash_file(&b).unwrap();
        let hc = hash_file(&c).unwrap();
        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
        assert_eq!(ha.len(), 64);
    }

    #[test]
    fn no_stored_metadata_is_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();

        let (changed, reason) = has_file_changed(&path, None);
        assert!(changed);
        assert_eq!(reason, ChangeReason::NewFile);
    }

    #[test]
    fn size_change_short_circuits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let stored = FileMetadata::capture(&path).unwrap();

        fs::write(&path, "x = 1\ny = 2\n").unwrap();
        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(changed);
        assert_eq!(reason, ChangeReason::SizeChanged);
    }

    #[test]
    fn unchanged_when_mtime_not_newer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let stored = FileMetadata::capture(&path).unwrap();

        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(!changed);
        assert_eq!(reason, ChangeReason::Unchanged);
    }

    #[test]
    fn touch_without_edit_is_timestamp_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let mut stored = FileMetadata::capture(&path).unwrap();
        // Pretend the file was indexed in the past.
        stored.last_modified -= 100.0;

        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(!changed);
        assert_eq!(reason, ChangeReason::TimestampOnly);
    }

    #[test]
    fn same_size_edit_is_content_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let mut stored = FileMetadata::capture(&path).unwrap();
        stored.last_modified -= 100.0;

        fs::write(&path, "x = 2\n").unwrap();
        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(changed);
        assert_eq!(reason, ChangeReason::ContentChanged);
    }

    #[test]
    fn parser_upgrade_forces_reindex() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let mut stored = FileMetadata::capture(&path).unwrap();
        stored.parser_version = "0.9.0".to_string();

        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(changed);
        assert_eq!(reason, ChangeReason::ParserUpgraded);
    }

    #[test]
    fn deleted_file_reports_file_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1\n").unwrap();
        let stored = FileMetadata::capture(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let (changed, reason) = has_file_changed(&path, Some(&stored));
        assert!(changed);
        assert_eq!(reason, ChangeReason::FileDeleted);
    }
}
