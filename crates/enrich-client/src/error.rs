//! Error types for the remote job client.

use crate::record::{Failure, FailureKind};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the enrichment service.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid API key or authentication failure (HTTP 401)
    #[error("authentication failed: {message}")]
    Unauthorized {
        /// Response body or reason
        message: String,
    },

    /// Account has no credits left (HTTP 402)
    #[error("insufficient credits: {message}")]
    QuotaExceeded {
        /// Response body or reason
        message: String,
    },

    /// Rate limit exceeded (HTTP 429)
    #[error("rate limited: {message}")]
    RateLimited {
        /// Response body or reason
        message: String,
        /// Wait hint parsed from the response, if any
        retry_after: Option<Duration>,
    },

    /// The service no longer knows the job (HTTP 404 on poll)
    #[error("job {job_id} not found or expired")]
    JobExpired {
        /// Job identifier
        job_id: String,
    },

    /// The job did not reach a terminal status within the poll budget
    #[error("job {job_id} polling timed out after {elapsed:?}")]
    JobTimeout {
        /// Job identifier
        job_id: String,
        /// Time spent polling before giving up
        elapsed: Duration,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response parsing error
    #[error("failed to parse response: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// The operation was interrupted by a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether this error must abort the whole run (authentication or quota).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::QuotaExceeded { .. })
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only rate limiting and transport failures qualify; any other HTTP
    /// status is final for the request that produced it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }

    /// Server-supplied wait hint, if this error carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Classify this error as record-level data.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        let kind = match self {
            Self::Unauthorized { .. } => FailureKind::Auth,
            Self::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::JobExpired { .. } => FailureKind::JobExpired,
            Self::JobTimeout { .. } => FailureKind::JobTimeout,
            Self::Network(_) => FailureKind::Network,
            Self::Http { .. } | Self::Parse { .. } | Self::Internal(_) => FailureKind::Http,
            Self::Cancelled => FailureKind::Cancelled,
        };
        Failure::new(kind, self.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
