//! Fetch-level error types.

use leanindex_core::IndexerError;
use thiserror::Error;

/// Errors that can occur while fetching a header from an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure, ...
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-2xx status.
    #[error("API returned status {status} for block_id {block_id}")]
    Status { status: u16, block_id: String },

    /// The response body was not a header document.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns `true` for transient failures (network, timeout, non-2xx).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Status { .. } | Self::Timeout { .. }
        )
    }
}

impl From<FetchError> for IndexerError {
    fn from(e: FetchError) -> Self {
        IndexerError::Fetch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classes() {
        assert!(FetchError::Http("reset".into()).is_retryable());
        assert!(FetchError::Timeout { ms: 10 }.is_retryable());
        assert!(FetchError::Status { status: 503, block_id: "head".into() }.is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
        assert!(!FetchError::InvalidUrl("x".into()).is_retryable());
    }

    #[test]
    fn converts_to_indexer_fetch() {
        let err: IndexerError = FetchError::Status { status: 404, block_id: "7".into() }.into();
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "fetch error: API returned status 404 for block_id 7"
        );
    }
}
