//! Artifact download stage.
//!
//! Independent of harvesting: it consumes the persisted link list and
//! fetches each pending URL to a local file under a bounded concurrency
//! limit, recording per-link completion so re-runs skip finished work.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - In-progress data lives in `<name>.part` until the transfer completes
//! - Filenames from the URL's final path segment, percent-decoded and sanitized
//! - Structured error types with full context

mod client;
mod engine;
mod error;
mod filename;

pub use client::{ArtifactFetcher, HttpClient};
pub use engine::{DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, EngineError};
pub use error::DownloadError;
