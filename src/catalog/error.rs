//! Error types for catalog API calls.

use thiserror::Error;

/// Maximum number of response-body bytes kept in an [`CatalogError::Api`].
const MAX_BODY_CHARS: usize = 512;

/// Errors raised by [`CatalogClient`](super::CatalogClient).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The API answered with a non-2xx status. Never retried automatically.
    #[error("API error: HTTP {status} from {url}: {body}")]
    Api {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The (truncated) response body.
        body: String,
    },

    /// Network-level failure (DNS, connection reset, TLS, ...).
    #[error("network error calling {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded the configured timeout.
    #[error("timeout calling {url}")]
    Timeout {
        /// The request URL.
        url: String,
    },

    /// The configured base URL cannot be used to build request URLs.
    #[error("invalid catalog URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The response body was not the expected JSON shape.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        /// The request URL.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl CatalogError {
    /// Creates an API status error, truncating very long bodies.
    pub fn api(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.chars().count() > MAX_BODY_CHARS {
            body = body.chars().take(MAX_BODY_CHARS).collect::<String>() + "...";
        }
        Self::Api {
            url: url.into(),
            status,
            body,
        }
    }

    /// Classifies a transport error raised while sending or reading a request.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else if source.is_decode() {
            Self::Decode { url, source }
        } else {
            Self::Network { url, source }
        }
    }

    /// Returns whether the failure is a transient I/O condition that should
    /// skip a single item rather than abort the run.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// HTTP status for [`CatalogError::Api`], `None` otherwise.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_has_status_and_body() {
        let error = CatalogError::api("https://api.example.com/v2/search", 429, "slow down");
        let msg = error.to_string();
        assert!(msg.contains("429"), "Expected status in: {msg}");
        assert!(msg.contains("slow down"), "Expected body in: {msg}");
        assert!(msg.contains("/v2/search"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_api_error_truncates_long_body() {
        let error = CatalogError::api("https://x", 500, "e".repeat(2000));
        let CatalogError::Api { body, .. } = error else {
            panic!("expected Api variant");
        };
        assert_eq!(body.chars().count(), MAX_BODY_CHARS + 3);
    }

    #[test]
    fn test_transient_classification() {
        assert!(CatalogError::Timeout { url: "https://x".into() }.is_transient());
        assert!(!CatalogError::api("https://x", 503, "").is_transient());
    }
}
