//! Resumable page-by-page harvest of one content kind.
//!
//! [`HarvestOrchestrator`] walks catalog pages `0..max_pages`. Pages already
//! in the kind's progress set are skipped. Every other page is fetched, its
//! items evaluated in catalog order, the accepted records flushed to the
//! output file, and only then is the page added to the progress set and the
//! set saved. A crash therefore loses at most the page in flight, which the
//! next run redoes from scratch.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{CatalogClient, CatalogError, ContentKind};
use crate::config::KindSettings;
use crate::filter::{ItemFilter, Verdict};
use crate::store::{PersistError, ProgressStore, ResultSink};

/// Lifecycle of one harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    /// Between pages (or not started).
    Idle,
    /// Waiting on the catalog list endpoint.
    FetchingPage {
        /// Page being fetched.
        page: u32,
    },
    /// Running items of a page through the filter.
    EvaluatingItems {
        /// Page being evaluated.
        page: u32,
    },
    /// Writing accepted records and progress.
    Flushing {
        /// Page being flushed.
        page: u32,
    },
    /// Every page in range was processed or skipped, or the catalog ran out.
    Done,
    /// The run aborted; saved progress is intact.
    Failed,
}

impl fmt::Display for HarvestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingPage { page } => write!(f, "fetching page {page}"),
            Self::EvaluatingItems { page } => write!(f, "evaluating page {page}"),
            Self::Flushing { page } => write!(f, "flushing page {page}"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Errors that abort a harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The catalog rejected a page listing or a version lookup on that page.
    #[error("{kind} page {page} failed: {source}")]
    Page {
        /// Kind being harvested.
        kind: ContentKind,
        /// Page that failed; the next run resumes here.
        page: u32,
        /// Underlying catalog error.
        #[source]
        source: CatalogError,
    },

    /// Progress or output could not be persisted.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Summary of one harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Kind harvested.
    pub kind: ContentKind,
    /// Pages fetched, evaluated and saved this run.
    pub pages_processed: u32,
    /// Pages skipped because an earlier run finished them.
    pub pages_skipped: u32,
    /// Items accepted.
    pub accepted: usize,
    /// Items rejected by the filter.
    pub rejected: usize,
    /// Items skipped after a transient lookup failure.
    pub skipped: usize,
    /// State the run ended in.
    pub final_state: HarvestState,
}

impl HarvestReport {
    fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            pages_processed: 0,
            pages_skipped: 0,
            accepted: 0,
            rejected: 0,
            skipped: 0,
            final_state: HarvestState::Idle,
        }
    }
}

/// Drives the harvest of one content kind.
///
/// Owns its progress and output files exclusively; run one orchestrator per
/// kind. Several orchestrators may share one [`CatalogClient`] (and thereby
/// one rate budget) concurrently.
#[derive(Debug)]
pub struct HarvestOrchestrator {
    kind: ContentKind,
    filter: ItemFilter,
    catalog: Arc<CatalogClient>,
    progress: ProgressStore,
    sink: ResultSink,
    max_pages: u32,
    state: HarvestState,
}

impl HarvestOrchestrator {
    /// Creates an orchestrator for `settings.kind` scanning pages
    /// `0..max_pages`.
    #[must_use]
    pub fn new(settings: &KindSettings, catalog: Arc<CatalogClient>, max_pages: u32) -> Self {
        Self {
            kind: settings.kind,
            filter: ItemFilter::from_settings(settings),
            catalog,
            progress: ProgressStore::new(&settings.progress_file),
            sink: ResultSink::new(&settings.output_file),
            max_pages,
            state: HarvestState::Idle,
        }
    }

    /// Kind this orchestrator harvests.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HarvestState {
        self.state
    }

    /// Runs the harvest to completion or first fatal error.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::Page`] when the catalog answers a page listing or a
    ///   version lookup with a non-2xx status, or a page listing fails in
    ///   transport. Pages finished before it stay saved.
    /// - [`HarvestError::Persist`] when progress or output cannot be read or
    ///   written.
    #[instrument(skip(self), fields(kind = %self.kind, max_pages = self.max_pages))]
    pub async fn run(&mut self) -> Result<HarvestReport, HarvestError> {
        let mut report = HarvestReport::new(self.kind);

        match self.run_pages(&mut report).await {
            Ok(()) => {
                self.transition(HarvestState::Done);
                report.final_state = HarvestState::Done;
                info!(
                    pages_processed = report.pages_processed,
                    pages_skipped = report.pages_skipped,
                    accepted = report.accepted,
                    rejected = report.rejected,
                    skipped = report.skipped,
                    "harvest finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(HarvestState::Failed);
                error!(
                    error = %e,
                    pages_processed = report.pages_processed,
                    "harvest aborted; saved progress retained"
                );
                Err(e)
            }
        }
    }

    async fn run_pages(&mut self, report: &mut HarvestReport) -> Result<(), HarvestError> {
        let mut progress = self.progress.load()?;
        debug!(done_pages = progress.len(), "loaded progress");

        for page in 0..self.max_pages {
            if progress.contains(&page) {
                debug!(page, "page already processed, skipping");
                report.pages_skipped += 1;
                continue;
            }

            self.transition(HarvestState::FetchingPage { page });
            let items = self
                .catalog
                .list_page(self.kind, page)
                .await
                .map_err(|source| self.page_error(page, source))?;

            if items.is_empty() {
                info!(page, "catalog returned no items, stopping");
                break;
            }

            self.transition(HarvestState::EvaluatingItems { page });
            let mut accepted = Vec::new();
            for item in &items {
                match self.filter.evaluate(item, self.catalog.as_ref()).await {
                    Ok(Verdict::Accepted(record)) => {
                        info!(page, project_id = %item.project_id, name = %item.title, version = %record.version, "accepted");
                        accepted.push(record);
                    }
                    Ok(Verdict::Rejected(reason)) => {
                        info!(page, project_id = %item.project_id, name = %item.title, %reason, "rejected");
                        report.rejected += 1;
                    }
                    Err(e) if e.is_transient() => {
                        warn!(page, project_id = %item.project_id, name = %item.title, error = %e, "version lookup failed, skipping item");
                        report.skipped += 1;
                    }
                    Err(source) => return Err(self.page_error(page, source)),
                }
            }

            self.transition(HarvestState::Flushing { page });
            self.sink.flush(&accepted)?;
            progress.insert(page);
            self.progress.save(&progress)?;

            report.accepted += accepted.len();
            report.pages_processed += 1;
            info!(page, accepted = accepted.len(), items = items.len(), "page complete");
            self.transition(HarvestState::Idle);
        }

        Ok(())
    }

    fn page_error(&self, page: u32, source: CatalogError) -> HarvestError {
        HarvestError::Page {
            kind: self.kind,
            page,
            source,
        }
    }

    fn transition(&mut self, next: HarvestState) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}
