//! Global request-rate governor for catalog API traffic.
//!
//! This module provides the [`RateGovernor`] struct which enforces a minimum
//! spacing between consecutive outbound requests, derived from a
//! requests-per-minute budget. There is no burst allowance: every caller waits
//! until at least `60 / requests_per_minute` seconds have passed since the
//! previous caller was released.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use harvester_core::RateGovernor;
//!
//! # async fn example() {
//! let governor = Arc::new(RateGovernor::from_requests_per_minute(290));
//!
//! // First request proceeds immediately
//! governor.wait().await;
//!
//! // Second request waits ~207ms
//! governor.wait().await;
//! # }
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Shared request-rate governor.
///
/// Designed to be wrapped in `Arc` and shared across every component (and
/// every content kind) that talks to the same API, so that all of them draw
/// from one physical rate budget.
///
/// # Thread Safety
///
/// The release timestamp is guarded by a `tokio::sync::Mutex` which is held
/// across the sleep, so concurrent callers are released strictly one
/// interval apart.
#[derive(Debug)]
pub struct RateGovernor {
    /// Minimum spacing between two released callers.
    interval: Duration,

    /// Whether governing is disabled (`requests_per_minute = 0`).
    disabled: bool,

    /// Time the previous caller was released. `None` until the first call.
    last_release: Mutex<Option<Instant>>,
}

impl RateGovernor {
    /// Creates a governor for the given requests-per-minute budget.
    ///
    /// A budget of `0` yields a disabled governor.
    #[must_use]
    #[instrument]
    pub fn from_requests_per_minute(requests_per_minute: u32) -> Self {
        if requests_per_minute == 0 {
            return Self::disabled();
        }
        let interval = Duration::from_secs(60) / requests_per_minute;
        debug!(interval_ms = interval.as_millis(), "creating rate governor");
        Self::with_interval(interval)
    }

    /// Creates a governor with an explicit minimum interval.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            disabled: false,
            last_release: Mutex::new(None),
        }
    }

    /// Creates a governor that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            disabled: true,
            last_release: Mutex::new(None),
        }
    }

    /// Returns whether governing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum spacing between requests.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspends the caller until the next request slot is available.
    ///
    /// Must be called immediately before issuing an outbound request. The
    /// first call returns immediately.
    pub async fn wait(&self) {
        if self.disabled {
            return;
        }

        let mut last_release = self.last_release.lock().await;

        if let Some(previous) = *last_release {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let delay = self.interval.saturating_sub(elapsed);
                trace!(delay_ms = delay.as_millis(), "governor delaying request");
                tokio::time::sleep(delay).await;
            }
        }

        *last_release = Some(Instant::now());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_governor_interval_from_budget() {
        let governor = RateGovernor::from_requests_per_minute(60);
        assert_eq!(governor.interval(), Duration::from_secs(1));
        assert!(!governor.is_disabled());

        let governor = RateGovernor::from_requests_per_minute(290);
        assert_eq!(governor.interval(), Duration::from_secs(60) / 290);
    }

    #[test]
    fn test_governor_zero_budget_is_disabled() {
        let governor = RateGovernor::from_requests_per_minute(0);
        assert!(governor.is_disabled());
        assert_eq!(governor.interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_governor_first_call_immediate() {
        tokio::time::pause();

        let governor = RateGovernor::with_interval(Duration::from_secs(1));
        let start = Instant::now();
        governor.wait().await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_governor_spaces_consecutive_calls() {
        tokio::time::pause();

        let governor = RateGovernor::with_interval(Duration::from_secs(1));
        let start = Instant::now();

        governor.wait().await;
        governor.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));

        governor.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_governor_no_delay_after_idle_period() {
        tokio::time::pause();

        let governor = RateGovernor::with_interval(Duration::from_secs(1));
        governor.wait().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        governor.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_governor_disabled_never_delays() {
        tokio::time::pause();

        let governor = RateGovernor::disabled();
        let start = Instant::now();
        for _ in 0..5 {
            governor.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_governor_shared_across_tasks() {
        tokio::time::pause();

        let governor = Arc::new(RateGovernor::with_interval(Duration::from_millis(500)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let governor = Arc::clone(&governor);
            handles.push(tokio::spawn(async move {
                governor.wait().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Four callers: first immediate, then three intervals
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
