//! Harvester Core Library
//!
//! Resumable, rate-limited harvesting of a paginated content catalog, plus a
//! bounded-concurrency download stage for the artifacts it selects.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`governor`] - Minimum spacing between catalog requests
//! - [`catalog`] - Catalog API client and wire types
//! - [`filter`] - Per-kind eligibility filters producing result records
//! - [`store`] - Atomic file persistence for progress, output and link lists
//! - [`harvest`] - Page-by-page resumable harvest orchestration
//! - [`download`] - Streaming artifact downloads over the link list
//! - [`config`] - Immutable run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod filter;
pub mod governor;
pub mod harvest;
pub mod store;
mod user_agent;

// Re-export commonly used types
pub use catalog::{CatalogClient, CatalogError, CatalogItem, ContentKind, VersionDetail, VersionLookup};
pub use config::{ConfigError, HarvestConfig, KindSettings};
pub use download::{
    ArtifactFetcher, DEFAULT_CONCURRENCY, DownloadEngine, DownloadError, DownloadStats,
    EngineError, HttpClient,
};
pub use filter::{ItemFilter, RejectReason, ResultRecord, Verdict};
pub use governor::RateGovernor;
pub use harvest::{HarvestError, HarvestOrchestrator, HarvestReport, HarvestState};
pub use store::{
    DownloadLink, LinkListStore, LinkStatus, PersistError, ProgressSet, ProgressStore, ResultSink,
};
