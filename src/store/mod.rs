//! File-backed persistence for harvest progress, harvest output and the
//! download link list.
//!
//! Every store follows the same contract: a missing file reads as empty state,
//! and every write replaces the whole file atomically (temp file in the same
//! directory, fsync, rename), so a reader never observes a partially written
//! file even if the process dies mid-write.

mod links;
mod progress;
mod results;

pub use links::{DownloadLink, LinkListStore, LinkStatus, parse_link_list, render_link_list};
pub use progress::{ProgressSet, ProgressStore};
pub use results::ResultSink;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while reading or writing persisted state.
///
/// These are never swallowed: losing a write here breaks the resume guarantee.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading an existing state file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Writing (or atomically replacing) a state file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A state file exists but does not hold the expected JSON shape.
    #[error("malformed state in {path}: {source}")]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Reads a file to a string, returning `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, PersistError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistError::read(path, e)),
    }
}

/// Atomically replaces `path` with `content`.
///
/// The content is written to a temporary file next to the target, synced to
/// disk, then renamed over the target. Missing parent directories are created.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PersistError::write(path, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| PersistError::write(path, e))?;
    tmp.write_all(content)
        .and_then(|()| tmp.flush())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PersistError::write(path, e))?;

    tmp.persist(path)
        .map_err(|e| PersistError::write(path, e.error))?;
    Ok(())
}
