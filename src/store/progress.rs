//! Persisted set of fully processed page indices for one content kind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{PersistError, read_optional, write_atomic};

/// Page indices already processed. Ordered so the persisted array is stable.
pub type ProgressSet = BTreeSet<u32>;

/// Progress file for a single content kind.
///
/// Persisted as a JSON array of integers. The owning orchestrator is the only
/// writer within a run.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the processed pages. A missing file is an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file exists but cannot be read or
    /// is not a JSON array of page indices.
    pub fn load(&self) -> Result<ProgressSet, PersistError> {
        let Some(raw) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "no prior progress");
            return Ok(ProgressSet::new());
        };
        let pages: Vec<u32> =
            serde_json::from_str(&raw).map_err(|e| PersistError::parse(&self.path, e))?;
        debug!(path = %self.path.display(), pages = pages.len(), "loaded progress");
        Ok(pages.into_iter().collect())
    }

    /// Atomically overwrites the persisted set.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Write`] if the file cannot be replaced.
    pub fn save(&self, pages: &ProgressSet) -> Result<(), PersistError> {
        let pages: Vec<u32> = pages.iter().copied().collect();
        let body = serde_json::to_vec(&pages).map_err(|e| PersistError::parse(&self.path, e))?;
        write_atomic(&self.path, &body)
    }
}
