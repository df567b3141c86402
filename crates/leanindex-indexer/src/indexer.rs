//! Indexer composition root.
//!
//! Wires pool, processor, poller and head cache together and exposes the
//! lifecycle plus read accessors for a service layer.

use std::collections::HashMap;
use std::sync::Arc;

use leanindex_core::{
    CacheStats, Checkpoint, HeadCache, Header, HeaderStore, IndexerConfig, IndexerError,
};
use leanindex_rpc::{ClientPool, ClientStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::poller::BlockPoller;
use crate::processor::BlockProcessor;

/// Snapshot of the whole indexer for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerStatus {
    pub running: bool,
    pub last_processed_slot: u64,
    pub client_count: usize,
    pub healthy_client_count: usize,
    pub cache: CacheStats,
    pub clients: Vec<ClientStatus>,
}

pub struct Indexer {
    config: IndexerConfig,
    pool: Arc<ClientPool>,
    processor: Arc<BlockProcessor>,
    poller: Arc<BlockPoller>,
    cache: Arc<HeadCache>,
}

impl Indexer {
    /// Build an indexer with HTTP clients for every configured endpoint.
    pub fn new(config: IndexerConfig, store: Arc<dyn HeaderStore>) -> Result<Self, IndexerError> {
        let pool = Arc::new(ClientPool::from_config(&config)?);
        Self::with_pool(config, pool, store)
    }

    /// Build an indexer around an existing pool. `config.endpoints` is
    /// ignored in favour of the pool's clients.
    pub fn with_pool(
        config: IndexerConfig,
        pool: Arc<ClientPool>,
        store: Arc<dyn HeaderStore>,
    ) -> Result<Self, IndexerError> {
        if pool.client_count() == 0 {
            return Err(IndexerError::NoEndpoints);
        }

        let cache = Arc::new(HeadCache::with_capacity(config.recent_blocks_capacity));
        let processor = Arc::new(
            BlockProcessor::new(store)
                .with_cache(Arc::clone(&cache))
                .with_batch_size(config.backfill_batch_size),
        );
        let poller = Arc::new(
            BlockPoller::new(Arc::clone(&pool), Arc::clone(&processor), &config)
                .with_cache(Arc::clone(&cache)),
        );

        Ok(Self {
            config,
            pool,
            processor,
            poller,
            cache,
        })
    }

    /// Start health checks and polling, then block until `shutdown` fires
    /// and stop both.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), IndexerError> {
        info!(
            clients = self.pool.client_count(),
            poll_interval_ms = self.config.poll_interval_ms,
            "Starting indexer"
        );

        // A rejected start must leave a running instance's health loop alone.
        self.poller.start(&shutdown).await?;
        self.pool.run_health_checks(&shutdown);

        shutdown.cancelled().await;
        info!("Shutdown signal received");
        self.stop();
        Ok(())
    }

    /// Stop the poller, then health checking. Idempotent.
    pub fn stop(&self) {
        self.poller.stop();
        self.pool.stop_health_checks();
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ClientPool> {
        &self.pool
    }

    pub fn processor(&self) -> &Arc<BlockProcessor> {
        &self.processor
    }

    pub fn poller(&self) -> &Arc<BlockPoller> {
        &self.poller
    }

    pub fn cache(&self) -> &Arc<HeadCache> {
        &self.cache
    }

    pub fn current_head(&self) -> Option<Header> {
        self.cache.current_head()
    }

    pub fn justified(&self) -> Option<Checkpoint> {
        self.cache.justified()
    }

    pub fn finalized(&self) -> Option<Checkpoint> {
        self.cache.finalized()
    }

    pub fn recent_blocks(&self) -> HashMap<String, Header> {
        self.cache.recent_blocks()
    }

    pub fn last_processed_slot(&self) -> u64 {
        self.poller.last_processed_slot()
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_running()
    }

    pub fn status(&self) -> IndexerStatus {
        IndexerStatus {
            running: self.poller.is_running(),
            last_processed_slot: self.poller.last_processed_slot(),
            client_count: self.pool.client_count(),
            healthy_client_count: self.pool.healthy_client_count(),
            cache: self.cache.cache_stats(),
            clients: self.pool.statuses(),
        }
    }
}
