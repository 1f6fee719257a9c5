//! Error types for node access, provider fetches and orchestration.

use thiserror::Error;

use crate::datapoint::DataPoint;

/// Failure of a *required* read against a provider document.
///
/// Optional reads never produce this; they degrade to `None` and log instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("missing field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' with value '{value}' isn't a {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        value: String,
    },
}

impl NodeError {
    /// The dotted path the failing read was asked for.
    pub fn path(&self) -> &str {
        match self {
            NodeError::MissingField { path } | NodeError::TypeMismatch { path, .. } => path,
        }
    }
}

/// Failure reported by a [`PageFetcher`](crate::fetch::PageFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("could not decode response body: {0}")]
    Decode(String),

    #[error("invalid page uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
}

impl FetchError {
    /// Upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            FetchError::Timeout | FetchError::Decode(_) | FetchError::InvalidUri { .. } => None,
        }
    }

    /// Rate limiting, server errors and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Timeout => true,
            FetchError::Decode(_) | FetchError::InvalidUri { .. } => false,
        }
    }
}

/// Request-level failures surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum ShimmerError {
    #[error("query range has neither a lower nor an upper bound")]
    UnboundedRange,

    #[error("fetching page {page_index} failed: {source}")]
    Upstream {
        page_index: u32,
        status: Option<u16>,
        /// Points mapped from the pages that succeeded before the failure.
        partial: Vec<DataPoint>,
        #[source]
        source: FetchError,
    },

    #[error("cancelled before page {page_index}")]
    Cancelled {
        page_index: u32,
        partial: Vec<DataPoint>,
    },

    #[error("no endpoint registered for provider '{provider}' and data type '{data_type}'")]
    UnknownEndpoint { provider: String, data_type: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ShimmerError {
    /// Data points collected before an aborted orchestration, if any.
    pub fn partial(&self) -> &[DataPoint] {
        match self {
            ShimmerError::Upstream { partial, .. } | ShimmerError::Cancelled { partial, .. } => {
                partial
            }
            _ => &[],
        }
    }
}

pub type ShimmerResult<T> = Result<T, ShimmerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_report_retryability() {
        let throttled = FetchError::Status {
            status: 429,
            body: String::new(),
        };
        let missing = FetchError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
        assert_eq!(missing.status(), Some(404));
        assert!(FetchError::Timeout.is_retryable());
    }

    #[test]
    fn upstream_error_message_names_page() {
        let err = ShimmerError::Upstream {
            page_index: 2,
            status: Some(503),
            partial: Vec::new(),
            source: FetchError::Status {
                status: 503,
                body: "busy".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "fetching page 2 failed: upstream returned status 503: busy"
        );
        assert!(err.partial().is_empty());
    }
}
