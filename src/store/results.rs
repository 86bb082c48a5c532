//! Append-only harvest output for one content kind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{PersistError, read_optional, write_atomic};
use crate::filter::ResultRecord;

/// Output file accumulating accepted records, persisted as a pretty-printed
/// JSON array.
///
/// Each flush is a read-modify-append-write of the whole file. Records are
/// keyed by `project_id`: a record whose id is already present is not
/// appended again, so re-processing a page after an interrupted run does not
/// duplicate output. Records with an empty id (older files) never match.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Creates a sink backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every persisted record. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<ResultRecord>, PersistError> {
        let Some(raw) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| PersistError::parse(&self.path, e))
    }

    /// Appends `records` in encounter order and writes the merged list back.
    ///
    /// Returns the number of records actually appended.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the existing output cannot be read or the
    /// merged output cannot be written.
    pub fn flush(&self, records: &[ResultRecord]) -> Result<usize, PersistError> {
        let mut existing = self.load()?;
        let mut seen: HashSet<String> = existing
            .iter()
            .filter(|record| !record.project_id.is_empty())
            .map(|record| record.project_id.clone())
            .collect();

        let before = existing.len();
        for record in records {
            if !record.project_id.is_empty() && !seen.insert(record.project_id.clone()) {
                debug!(
                    project_id = %record.project_id,
                    name = %record.name,
                    "record already in output, not appending"
                );
                continue;
            }
            existing.push(record.clone());
        }
        let appended = existing.len() - before;

        let body =
            serde_json::to_vec_pretty(&existing).map_err(|e| PersistError::parse(&self.path, e))?;
        write_atomic(&self.path, &body)?;

        info!(
            path = %self.path.display(),
            appended,
            total = existing.len(),
            "flushed results"
        );
        Ok(appended)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(project_id: &str, name: &str) -> ResultRecord {
        ResultRecord {
            name: name.to_string(),
            project_id: project_id.to_string(),
            version: "1.0.0".to_string(),
            download_url: Some(format!("https://cdn.example.com/{project_id}.jar")),
            icon_url: None,
            resolution: None,
            minecraft_versions: None,
        }
    }

    #[test]
    fn test_flush_into_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("mod_links.json"));

        let appended = sink.flush(&[record("a", "Alpha")]).unwrap();

        assert_eq!(appended, 1);
        assert_eq!(sink.load().unwrap(), vec![record("a", "Alpha")]);
    }

    #[test]
    fn test_flush_appends_in_encounter_order() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("out.json"));

        sink.flush(&[record("a", "Alpha")]).unwrap();
        sink.flush(&[record("c", "Gamma"), record("b", "Beta")]).unwrap();

        let names: Vec<_> = sink.load().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Alpha", "Gamma", "Beta"]);
    }

    #[test]
    fn test_flush_skips_known_project_ids() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("out.json"));

        sink.flush(&[record("a", "Alpha"), record("b", "Beta")]).unwrap();
        let appended = sink.flush(&[record("b", "Beta"), record("c", "Gamma")]).unwrap();

        assert_eq!(appended, 1);
        assert_eq!(sink.load().unwrap().len(), 3);
    }

    #[test]
    fn test_flush_empty_batch_keeps_existing_output() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("out.json"));
        sink.flush(&[record("a", "Alpha")]).unwrap();

        assert_eq!(sink.flush(&[]).unwrap(), 0);
        assert_eq!(sink.load().unwrap().len(), 1);
    }

    #[test]
    fn test_legacy_records_without_project_id_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(
            &path,
            r#"[{"name": "Old", "version": "0.1", "download_url": null, "icon_url": null}]"#,
        )
        .unwrap();
        let sink = ResultSink::new(&path);

        sink.flush(&[record("a", "Alpha")]).unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Old");
        assert!(records[0].project_id.is_empty());
    }
}
