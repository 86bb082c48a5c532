//! Bounded-concurrency download stage over a persisted link list.
//!
//! The engine reads the link list, schedules every pending link as its own
//! Tokio task gated by a semaphore, and marks each link `done` in the list as
//! soon as its transfer completes. A failed transfer is logged and its link
//! left pending for the next run; no transfer is retried within a batch.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::{DownloadEngine, HttpClient};
//! use harvester_core::store::LinkListStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(4)?;
//! let store = LinkListStore::new("download_links.txt");
//! let client = Arc::new(HttpClient::new(300)?);
//! let stats = engine.download_pending(&store, client, Path::new("./downloads")).await?;
//! println!("Completed: {}, Failed: {}, Skipped: {}", stats.completed(), stats.failed(), stats.skipped());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::ArtifactFetcher;
use super::filename::{claim_unique_name, fallback_filename, filename_from_url};
use crate::store::{DownloadLink, LinkListStore, LinkStatus, PersistError};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The link list could not be read or written.
    #[error("link list error: {0}")]
    Links(#[from] PersistError),

    /// The destination directory could not be created.
    #[error("failed to create destination directory {path}: {source}")]
    Destination {
        /// Destination directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Completed downloads whose `done` status never reached the link list.
    /// They will be downloaded again by the next run.
    #[error("{count} completed download(s) could not be recorded as done in the link list")]
    StatusNotPersisted {
        /// Number of completed links affected.
        count: usize,
    },

    /// The blocking task writing the link list panicked or was cancelled.
    #[error("link list writer task failed: {0}")]
    Writer(#[source] tokio::task::JoinError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Statistics from a download batch run.
///
/// Uses atomic counters for thread-safe updates from concurrent download
/// tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    status_write_failures: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of links skipped because they were already done
    /// or repeat a URL scheduled earlier in the list.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of transfers attempted (completed + failed).
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.completed() + self.failed()
    }

    fn status_write_failures(&self) -> usize {
        self.status_write_failures.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn add_skipped(&self, count: usize) {
        self.skipped.fetch_add(count, Ordering::SeqCst);
    }

    fn increment_status_write_failures(&self) {
        self.status_write_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        let copy = Self::new();
        copy.completed.store(self.completed(), Ordering::SeqCst);
        copy.failed.store(self.failed(), Ordering::SeqCst);
        copy.skipped.store(self.skipped(), Ordering::SeqCst);
        copy.status_write_failures
            .store(self.status_write_failures(), Ordering::SeqCst);
        copy
    }
}

/// One scheduled transfer.
#[derive(Debug)]
struct DownloadJob {
    url: String,
    target: PathBuf,
}

/// Download engine for concurrent artifact downloads.
///
/// # Concurrency Model
///
/// - Each download runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task, so at most
///   `concurrency` transfers run at once
/// - Permits are released automatically when downloads complete (RAII)
/// - The in-memory link list sits behind one mutex; marking a link done and
///   rewriting the file happen under that lock, so near-simultaneous
///   completions never lose each other's updates
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl DownloadEngine {
    /// Creates a new download engine with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use harvester_core::download::DownloadEngine;
    ///
    /// let engine = DownloadEngine::new(4).unwrap();
    /// assert_eq!(engine.concurrency(), 4);
    /// ```
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating download engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Reads the link list with each link's status.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Links`] if the list cannot be read.
    pub fn enumerate_links(&self, store: &LinkListStore) -> Result<Vec<DownloadLink>, EngineError> {
        Ok(store.load()?)
    }

    /// Downloads every pending link into `dest_dir`.
    ///
    /// Links already `done` are skipped, and a URL listed several times is
    /// fetched once. Each successful transfer marks every entry for its URL
    /// `done` and rewrites the list in place. List writes run on the blocking
    /// pool, one at a time.
    ///
    /// Individual download failures do NOT cause this method to error; they
    /// are counted in the returned stats and stay pending.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Links`] if the list cannot be read
    /// - [`EngineError::Destination`] if `dest_dir` cannot be created
    /// - [`EngineError::StatusNotPersisted`] if completed links could not be
    ///   recorded as done
    /// - [`EngineError::Writer`] if a link-list write task panics
    /// - [`EngineError::SemaphoreClosed`] if the semaphore is closed
    #[instrument(skip(self, store, fetcher), fields(links = %store.path().display(), dest = %dest_dir.display()))]
    pub async fn download_pending<F>(
        &self,
        store: &LinkListStore,
        fetcher: Arc<F>,
        dest_dir: &Path,
    ) -> Result<DownloadStats, EngineError>
    where
        F: ArtifactFetcher + ?Sized + 'static,
    {
        let stats = Arc::new(DownloadStats::new());
        let mut links = store.load()?;

        let (jobs, skipped, resolved) = plan_jobs(&mut links, dest_dir);
        stats.add_skipped(skipped);

        if resolved > 0 {
            debug!(resolved, "marking repeated links of finished URLs as done");
            persist_links(store, links.clone()).await?;
        }

        if jobs.is_empty() {
            info!(skipped, "no pending downloads");
            return Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot()));
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| EngineError::Destination {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        info!(pending = jobs.len(), skipped, "starting downloads");

        let links = Arc::new(Mutex::new(links));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let fetcher = Arc::clone(&fetcher);
            let links = Arc::clone(&links);
            let store = store.clone();
            let stats = Arc::clone(&stats);

            handles.push(tokio::spawn(async move {
                let _permit = permit;

                match fetcher.fetch_to_file(&job.url, &job.target).await {
                    Ok(bytes) => {
                        debug!(url = %job.url, bytes, "transfer finished");
                        stats.increment_completed();
                        // The guard is held across the write so saves land in order.
                        let mut links = links.lock().await;
                        mark_done(&mut links, &job.url);
                        if let Err(e) = persist_links(&store, links.to_vec()).await {
                            warn!(url = %job.url, error = %e, "failed to record link as done");
                            stats.increment_status_write_failures();
                        }
                    }
                    Err(e) => {
                        warn!(url = %job.url, error = %e, "download failed; link left pending");
                        stats.increment_failed();
                    }
                }
            }));
        }

        debug!(
            task_count = handles.len(),
            "waiting for downloads to complete"
        );

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }

        let unrecorded = stats.status_write_failures();
        if unrecorded > 0 {
            // A later successful write carries every earlier mark, so one
            // final write may still recover.
            let links = links.lock().await;
            if let Err(e) = persist_links(store, links.to_vec()).await {
                warn!(error = %e, unrecorded, "link list still not writable");
                return Err(EngineError::StatusNotPersisted { count: unrecorded });
            }
        }

        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot());
        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "downloads complete"
        );
        Ok(stats)
    }
}

/// Splits the list into transfers to run.
///
/// Returns the jobs, the number of skipped entries, and how many pending
/// entries were flipped to done because their URL is already done elsewhere
/// in the list.
fn plan_jobs(links: &mut [DownloadLink], dest_dir: &Path) -> (Vec<DownloadJob>, usize, usize) {
    let done_urls: HashSet<String> = links
        .iter()
        .filter(|link| link.is_done())
        .map(|link| link.url.clone())
        .collect();

    let mut scheduled = HashSet::new();
    let mut names = HashSet::new();
    let mut jobs = Vec::new();
    let mut skipped = 0;
    let mut resolved = 0;

    for (index, link) in links.iter_mut().enumerate() {
        if link.is_done() {
            skipped += 1;
            continue;
        }
        if done_urls.contains(&link.url) {
            link.status = LinkStatus::Done;
            skipped += 1;
            resolved += 1;
            continue;
        }
        if !scheduled.insert(link.url.clone()) {
            skipped += 1;
            continue;
        }

        let filename = Url::parse(&link.url)
            .ok()
            .as_ref()
            .and_then(filename_from_url)
            .unwrap_or_else(|| fallback_filename(index));
        let filename = claim_unique_name(filename, &mut names);

        jobs.push(DownloadJob {
            url: link.url.clone(),
            target: dest_dir.join(filename),
        });
    }

    (jobs, skipped, resolved)
}

/// Rewrites the link list on the blocking pool; the atomic write fsyncs.
async fn persist_links(store: &LinkListStore, links: Vec<DownloadLink>) -> Result<(), EngineError> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.save(&links))
        .await
        .map_err(EngineError::Writer)??;
    Ok(())
}

fn mark_done(links: &mut [DownloadLink], url: &str) {
    for link in links.iter_mut().filter(|link| link.url == url) {
        link.status = LinkStatus::Done;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_new_valid_concurrency() {
        assert_eq!(DownloadEngine::new(1).unwrap().concurrency(), 1);
        assert_eq!(DownloadEngine::new(4).unwrap().concurrency(), 4);
        assert_eq!(DownloadEngine::new(100).unwrap().concurrency(), 100);
    }

    #[test]
    fn test_engine_new_invalid_concurrency() {
        assert!(matches!(
            DownloadEngine::new(0),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            DownloadEngine::new(101),
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_download_stats_thread_safe() {
        use std::thread;

        let stats = Arc::new(DownloadStats::new());
        let mut handles = Vec::new();

        for _ in 0..10 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats.increment_completed();
                    stats.increment_failed();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.completed(), 1000);
        assert_eq!(stats.failed(), 1000);
        assert_eq!(stats.attempted(), 2000);
        assert_eq!(stats.skipped(), 0);
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));

        let msg = EngineError::StatusNotPersisted { count: 3 }.to_string();
        assert!(msg.starts_with('3'));
    }

    #[test]
    fn test_plan_jobs_skips_done_and_repeated_urls() {
        let mut links = vec![
            DownloadLink::pending("https://cdn.example.com/a.jar"),
            DownloadLink {
                url: "https://cdn.example.com/b.jar".into(),
                status: LinkStatus::Done,
            },
            DownloadLink::pending("https://cdn.example.com/a.jar"),
            DownloadLink::pending("https://cdn.example.com/b.jar"),
            DownloadLink::pending("https://mirror.example.com/a.jar"),
        ];

        let (jobs, skipped, resolved) = plan_jobs(&mut links, Path::new("/dl"));

        assert_eq!(skipped, 3);
        assert_eq!(resolved, 1);
        assert!(links[3].is_done());
        let targets: Vec<_> = jobs.iter().map(|job| job.target.clone()).collect();
        assert_eq!(
            targets,
            vec![PathBuf::from("/dl/a.jar"), PathBuf::from("/dl/a_2.jar")]
        );
    }

    #[test]
    fn test_plan_jobs_fallback_name_uses_position() {
        let mut links = vec![
            DownloadLink::pending("https://cdn.example.com/x.zip"),
            DownloadLink::pending("https://cdn.example.com/"),
        ];
        let (jobs, _, _) = plan_jobs(&mut links, Path::new("/dl"));
        assert_eq!(jobs[1].target, PathBuf::from("/dl/download_1.bin"));
    }

    #[test]
    fn test_mark_done_updates_every_entry_for_url() {
        let mut links = vec![
            DownloadLink::pending("https://a"),
            DownloadLink::pending("https://b"),
            DownloadLink::pending("https://a"),
        ];
        mark_done(&mut links, "https://a");
        assert!(links[0].is_done());
        assert!(!links[1].is_done());
        assert!(links[2].is_done());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_persist_links_writes_from_blocking_pool() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LinkListStore::new(dir.path().join("nested").join("links.txt"));
        let mut links = vec![
            DownloadLink::pending("https://a"),
            DownloadLink::pending("https://b"),
        ];
        mark_done(&mut links, "https://b");

        persist_links(&store, links).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "https://a - pending\nhttps://b - done\n"
        );
    }

    #[tokio::test]
    async fn test_persist_links_surfaces_write_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        // The parent "directory" is a regular file, so the write must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let store = LinkListStore::new(blocker.join("links.txt"));

        let err = persist_links(&store, vec![DownloadLink::pending("https://a")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Links(_)), "got {err:?}");
    }
}
