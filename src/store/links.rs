//! Persisted download link list.
//!
//! The file holds one `"<url> - <status>"` record per line. A line without a
//! recognised status (an empty label, a dangling separator, or no separator
//! at all) is pending.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{PersistError, read_optional, write_atomic};

const STATUS_SEPARATOR: &str = " - ";

/// Download status of a link. Transitions only go from pending to done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not yet downloaded (or last attempt failed).
    Pending,
    /// Downloaded; never fetched again.
    Done,
}

impl LinkStatus {
    /// Returns the on-disk label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("done") {
            Self::Done
        } else {
            Self::Pending
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single entry of the link list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// Artifact URL.
    pub url: String,
    /// Current status.
    pub status: LinkStatus,
}

impl DownloadLink {
    /// Creates a pending link.
    #[must_use]
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: LinkStatus::Pending,
        }
    }

    /// Returns whether the link has already been downloaded.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == LinkStatus::Done
    }
}

/// Parses link-list text. Blank lines are ignored.
#[must_use]
pub fn parse_link_list(raw: &str) -> Vec<DownloadLink> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> DownloadLink {
    // Trimming eats the space after a separator with an empty label.
    if let Some(url) = line.strip_suffix(STATUS_SEPARATOR.trim_end()) {
        return DownloadLink::pending(url.trim_end());
    }
    match line.rsplit_once(STATUS_SEPARATOR) {
        Some((url, label)) => DownloadLink {
            url: url.trim().to_string(),
            status: LinkStatus::from_label(label),
        },
        None => DownloadLink::pending(line),
    }
}

/// Renders links back to the line format, one record per line.
#[must_use]
pub fn render_link_list(links: &[DownloadLink]) -> String {
    let mut out = String::new();
    for link in links {
        out.push_str(&link.url);
        out.push_str(STATUS_SEPARATOR);
        out.push_str(link.status.as_str());
        out.push('\n');
    }
    out
}

/// File-backed link list.
///
/// The store itself does no locking; callers that update it from several
/// tasks must serialise access (the download engine holds a mutex around the
/// in-memory list and every write).
#[derive(Debug, Clone)]
pub struct LinkListStore {
    path: PathBuf,
}

impl LinkListStore {
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

    /// Reads every link with its status. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Read`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Vec<DownloadLink>, PersistError> {
        Ok(read_optional(&self.path)?
            .map(|raw| parse_link_list(&raw))
            .unwrap_or_default())
    }

    /// Atomically rewrites the whole list.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Write`] if the file cannot be replaced.
    pub fn save(&self, links: &[DownloadLink]) -> Result<(), PersistError> {
        write_atomic(&self.path, render_link_list(links).as_bytes())
    }

    /// Adds each URL not already listed as a pending link, keeping existing
    /// entries and their statuses untouched. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the list cannot be read or written.
    pub fn merge_urls<I, S>(&self, urls: I) -> Result<usize, PersistError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut links = self.load()?;
        let mut known: HashSet<String> = links.iter().map(|link| link.url.clone()).collect();

        let before = links.len();
        for url in urls {
            let url = url.into();
            if url.trim().is_empty() || !known.insert(url.clone()) {
                continue;
            }
            debug!(url = %url, "adding pending link");
            links.push(DownloadLink::pending(url));
        }
        let added = links.len() - before;

        if added > 0 {
            self.save(&links)?;
        }
        info!(path = %self.path.display(), added, total = links.len(), "merged links");
        Ok(added)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_link_list_statuses() {
        let raw = "https://cdn.example.com/a.jar - done\n\
                   https://cdn.example.com/b.jar - pending\n\
                   https://cdn.example.com/c.jar\n\
                   \n\
                   https://cdn.example.com/d.jar - whatever\n";
        let links = parse_link_list(raw);

        assert_eq!(links.len(), 4);
        assert_eq!(links[0].status, LinkStatus::Done);
        assert_eq!(links[1].status, LinkStatus::Pending);
        assert_eq!(links[2].url, "https://cdn.example.com/c.jar");
        assert_eq!(links[2].status, LinkStatus::Pending);
        assert_eq!(links[3].status, LinkStatus::Pending);
    }

    #[test]
    fn test_parse_link_list_splits_on_last_separator() {
        let links = parse_link_list("https://cdn.example.com/a - b.zip - done");
        assert_eq!(links[0].url, "https://cdn.example.com/a - b.zip");
        assert!(links[0].is_done());
    }

    #[test]
    fn test_parse_link_list_empty_status_is_pending() {
        let raw = "https://cdn.example.com/a.zip - \nhttps://cdn.example.com/b.zip -\n";
        let links = parse_link_list(raw);

        assert_eq!(
            links,
            vec![
                DownloadLink::pending("https://cdn.example.com/a.zip"),
                DownloadLink::pending("https://cdn.example.com/b.zip"),
            ]
        );
        assert_eq!(
            render_link_list(&links),
            "https://cdn.example.com/a.zip - pending\nhttps://cdn.example.com/b.zip - pending\n"
        );
    }

    #[test]
    fn test_render_link_list_format() {
        let links = vec![
            DownloadLink::pending("https://x/a.jar"),
            DownloadLink {
                url: "https://x/b.jar".to_string(),
                status: LinkStatus::Done,
            },
        ];
        assert_eq!(
            render_link_list(&links),
            "https://x/a.jar - pending\nhttps://x/b.jar - done\n"
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LinkListStore::new(dir.path().join("links.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_merge_urls_preserves_existing_status() {
        let dir = TempDir::new().unwrap();
        let store = LinkListStore::new(dir.path().join("links.txt"));
        store
            .save(&[DownloadLink {
                url: "https://x/a.jar".to_string(),
                status: LinkStatus::Done,
            }])
            .unwrap();

        let added = store
            .merge_urls(["https://x/a.jar", "https://x/b.jar", "https://x/b.jar", ""])
            .unwrap();

        assert_eq!(added, 1);
        let links = store.load().unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].is_done());
        assert_eq!(links[1], DownloadLink::pending("https://x/b.jar"));
    }
}
