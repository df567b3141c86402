//! Fluent builder API for indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use leanindex_indexer::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .endpoint("primary", "http://127.0.0.1:5052")
//!     .endpoint("backup", "http://10.0.0.2:5052")
//!     .poll_interval_ms(4_000)
//!     .backfill_batch_size(50)
//!     .build_config();
//!
//! assert_eq!(config.endpoints.len(), 2);
//! ```

use leanindex_core::{EndpointConfig, IndexerConfig};

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Append an endpoint. The first one added is the primary.
    pub fn endpoint(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.config.endpoints.push(EndpointConfig::new(name, url));
        self
    }

    /// Set the head polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the number of head fetch attempts per tick.
    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.config.max_retries = attempts;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    /// Set the number of slots fetched per backfill batch.
    pub fn backfill_batch_size(mut self, size: u64) -> Self {
        self.config.backfill_batch_size = size;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn health_timeout_ms(mut self, ms: u64) -> Self {
        self.config.health_timeout_ms = ms;
        self
    }

    pub fn health_check_interval_ms(mut self, ms: u64) -> Self {
        self.config.health_check_interval_ms = ms;
        self
    }

    /// Bound the head cache's recent-block set.
    pub fn recent_blocks_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_blocks_capacity = capacity;
        self
    }

    pub fn track_checkpoints(mut self, enabled: bool) -> Self {
        self.config.track_checkpoints = enabled;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
