//! Error types for the indexer pipeline.

use thiserror::Error;

/// Errors raised by the fixed-layout header codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Structural problems that make a header unfit for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid slot: cannot be zero")]
    InvalidSlot,

    #[error("invalid {field} length: expected 32 bytes, got {actual}")]
    InvalidRootLength { field: &'static str, actual: usize },
}

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Network, timeout or non-2xx failure talking to an endpoint.
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("no healthy clients available")]
    NoHealthyClient,

    #[error("block validation failed for slot {slot}: {source}")]
    Validation {
        slot: u64,
        #[source]
        source: ValidationError,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no block header found for slot {slot}")]
    HeaderNotFound { slot: u64 },

    #[error("failed to store block for slot {slot}: {source}")]
    Persist {
        slot: u64,
        #[source]
        source: Box<IndexerError>,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid range: start slot {start} is greater than end slot {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("poller is already running")]
    AlreadyRunning,

    #[error("no endpoints configured (need at least 1 endpoint)")]
    NoEndpoints,

    #[error("config error: {0}")]
    Config(String),
}

impl IndexerError {
    /// Returns `true` for transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns `true` if the error came from the persistence layer.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::HeaderNotFound { .. } | Self::Persist { .. }
        )
    }
}
