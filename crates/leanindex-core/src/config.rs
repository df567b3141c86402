//! Indexer configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One remote header endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL, e.g. `"http://127.0.0.1:5052"`.
    pub url: String,
    /// Display name. Filled in from the URL host when left empty.
    #[serde(default)]
    pub name: String,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Runtime knobs for an indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Endpoints in pool order; the first one is the primary.
    pub endpoints: Vec<EndpointConfig>,
    /// Head polling cadence (milliseconds). Matches the network slot time.
    pub poll_interval_ms: u64,
    /// Attempts per head fetch within one tick.
    pub max_retries: u32,
    /// Fixed delay between head fetch attempts (milliseconds).
    pub retry_delay_ms: u64,
    /// Slots fetched per backfill batch.
    pub backfill_batch_size: u64,
    /// Timeout for ordinary header fetches (milliseconds).
    pub request_timeout_ms: u64,
    /// Timeout for a single health check request (milliseconds).
    pub health_timeout_ms: u64,
    /// Health check cadence (milliseconds).
    pub health_check_interval_ms: u64,
    /// Bound on the head cache's recent-block set.
    pub recent_blocks_capacity: usize,
    /// Refresh justified/finalized checkpoints whenever the head advances.
    pub track_checkpoints: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![],
            poll_interval_ms: 4_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            backfill_batch_size: 20,
            request_timeout_ms: 30_000,
            health_timeout_ms: 10_000,
            health_check_interval_ms: 30_000,
            recent_blocks_capacity: crate::cache::MAX_RECENT_BLOCKS,
            track_checkpoints: true,
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_network_timing() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(4));
        assert_eq!(cfg.retry_delay(), Duration::from_secs(2));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.health_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.health_check_interval(), Duration::from_secs(30));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.backfill_batch_size, 20);
        assert_eq!(cfg.recent_blocks_capacity, 32);
        assert!(cfg.track_checkpoints);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: IndexerConfig = serde_json::from_str(
            r#"{"endpoints":[{"url":"http://a:5052"}],"poll_interval_ms":1000}"#,
        )
        .unwrap();
        assert_eq!(cfg.endpoints, vec![EndpointConfig::new("", "http://a:5052")]);
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.max_retries, 3);
    }
}
