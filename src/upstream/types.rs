//! Upstream error definitions.

use thiserror::Error;

/// Errors raised while talking to an upstream service.
///
/// A non-2xx upstream status is not an error here; handlers inspect the
/// status and decide how to relay it.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured upstream address could not be turned into a URL.
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The call exceeded the configured deadline.
    #[error("upstream timed out after {0} seconds")]
    Timeout(u64),

    /// Connection, TLS, protocol or body-read failure.
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The shared HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl UpstreamError {
    /// Classify a reqwest failure, separating deadline expiry.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout_secs)
        } else {
            UpstreamError::Transport(err)
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::InvalidUrl { .. } => "invalid_url",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Client(_) => "client",
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
