//! Block processor: validation and persistence between network and storage.
//!
//! Single headers (the live head) are stored in their own transaction.
//! Backfilled ranges are fetched batch by batch and stored together in one
//! final transaction, so persistence, not fetching, decides whether a
//! catchup succeeded.

use std::sync::Arc;

use leanindex_core::codec::ROOT_SIZE;
use leanindex_core::{
    HeadCache, Header, HeaderStore, IndexerConfig, IndexerError, Transaction, ValidationError,
};
use leanindex_rpc::{ClientPool, RemoteClient};
use tracing::{debug, info, warn};

pub struct BlockProcessor {
    store: Arc<dyn HeaderStore>,
    cache: Option<Arc<HeadCache>>,
    batch_size: u64,
}

impl BlockProcessor {
    pub fn new(store: Arc<dyn HeaderStore>) -> Self {
        Self {
            store,
            cache: None,
            batch_size: IndexerConfig::default().backfill_batch_size,
        }
    }

    /// Keep `cache` in step with what gets persisted.
    pub fn with_cache(mut self, cache: Arc<HeadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Slots fetched per backfill batch (minimum 1).
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn HeaderStore> {
        &self.store
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Structural checks: nonzero slot and 32-byte roots.
    pub fn validate(header: &Header) -> Result<(), ValidationError> {
        if header.slot == 0 {
            return Err(ValidationError::InvalidSlot);
        }
        for (field, root) in [
            ("parent_root", &header.parent_root),
            ("state_root", &header.state_root),
            ("body_root", &header.body_root),
        ] {
            if root.len() != ROOT_SIZE {
                return Err(ValidationError::InvalidRootLength {
                    field,
                    actual: root.len(),
                });
            }
        }
        Ok(())
    }

    /// Validate and store one header, then make it the cached head.
    pub async fn process_block(&self, header: &Header) -> Result<(), IndexerError> {
        let slot = header.slot;
        info!(slot, proposer_index = header.proposer_index, "Processing new block");

        Self::validate(header).map_err(|source| IndexerError::Validation { slot, source })?;

        let mut txn = Transaction::new();
        txn.insert_header(header.clone());
        self.store
            .run_transaction(txn)
            .await
            .map_err(|e| IndexerError::Persist {
                slot,
                source: Box::new(e),
            })?;

        if let Some(cache) = &self.cache {
            cache.update_head(header.clone());
        }

        info!(slot, "Successfully processed block");
        Ok(())
    }

    /// Backfill `start..=end` from the pool. Returns the number of headers
    /// persisted.
    ///
    /// A batch that fails on its client and on one fallback client is
    /// skipped. Headers failing validation are dropped one by one.
    pub async fn process_block_range(
        &self,
        pool: &ClientPool,
        start: u64,
        end: u64,
    ) -> Result<usize, IndexerError> {
        if start > end {
            return Err(IndexerError::InvalidRange { start, end });
        }

        info!(start_slot = start, end_slot = end, "Processing block range");

        let mut valid = Vec::new();
        let mut skipped_batches = 0usize;
        let mut batch_start = start;
        loop {
            let batch_end = batch_start.saturating_add(self.batch_size - 1).min(end);

            let client = pool.get_healthy_client().ok_or(IndexerError::NoHealthyClient)?;
            match self.fetch_batch(pool, &client, batch_start, batch_end).await {
                Some(headers) => {
                    for header in headers {
                        match Self::validate(&header) {
                            Ok(()) => valid.push(header),
                            Err(e) => warn!(slot = header.slot, error = %e, "Dropping invalid block"),
                        }
                    }
                }
                None => skipped_batches += 1,
            }

            if batch_end >= end {
                break;
            }
            batch_start = batch_end + 1;
        }

        if valid.is_empty() {
            warn!(
                start_slot = start,
                end_slot = end,
                skipped_batches,
                "No valid blocks fetched for range"
            );
            return Ok(0);
        }

        let count = valid.len();
        let mut txn = Transaction::new();
        txn.insert_header_batch(valid.clone());
        self.store
            .run_transaction(txn)
            .await
            .map_err(|e| IndexerError::Persist {
                slot: start,
                source: Box::new(e),
            })?;

        if let Some(cache) = &self.cache {
            for header in valid {
                cache.add_recent_block(header);
            }
        }

        info!(
            start_slot = start,
            end_slot = end,
            stored = count,
            skipped_batches,
            "Block range processed"
        );
        Ok(count)
    }

    /// Fetch one batch, failing over to a different healthy client once.
    async fn fetch_batch(
        &self,
        pool: &ClientPool,
        client: &Arc<RemoteClient>,
        start: u64,
        end: u64,
    ) -> Option<Vec<Header>> {
        let err = match client.get_range(start, end).await {
            Ok(headers) => return Some(headers),
            Err(e) => e,
        };
        warn!(
            endpoint = %client.name(),
            batch_start = start,
            batch_end = end,
            error = %err,
            "Batch fetch failed, trying fallback client"
        );

        let Some(fallback) = pool.healthy_client_excluding(client) else {
            warn!(batch_start = start, batch_end = end, "No fallback client, skipping batch");
            return None;
        };

        match fallback.get_range(start, end).await {
            Ok(headers) => {
                debug!(endpoint = %fallback.name(), batch_start = start, "Fallback fetch succeeded");
                Some(headers)
            }
            Err(e) => {
                warn!(
                    endpoint = %fallback.name(),
                    batch_start = start,
                    batch_end = end,
                    error = %e,
                    "Fallback fetch failed, skipping batch"
                );
                None
            }
        }
    }

    /// Slot of the newest stored header, or 0 when the store is empty or
    /// cannot be read.
    pub async fn get_latest_processed_slot(&self) -> u64 {
        match self.store.get_latest(1).await {
            Ok(headers) => match headers.first() {
                Some(h) => h.slot,
                None => {
                    info!("No previously processed blocks found");
                    0
                }
            },
            Err(e) => {
                warn!(error = %e, "Could not get latest processed slot");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(slot: u64) -> Header {
        Header {
            slot,
            proposer_index: 1,
            parent_root: vec![0xaa; 32],
            state_root: vec![0xbb; 32],
            body_root: vec![0xcc; 32],
        }
    }

    #[test]
    fn accepts_well_formed() {
        assert!(BlockProcessor::validate(&header(1)).is_ok());
    }

    #[test]
    fn rejects_slot_zero() {
        assert_eq!(
            BlockProcessor::validate(&header(0)),
            Err(ValidationError::InvalidSlot)
        );
    }

    #[test]
    fn rejects_each_root_independently() {
        for (field, len) in [
            ("parent_root", 31),
            ("state_root", 33),
            ("body_root", 0),
        ] {
            let mut h = header(3);
            match field {
                "parent_root" => h.parent_root = vec![0; len],
                "state_root" => h.state_root = vec![0; len],
                _ => h.body_root = vec![0; len],
            }
            assert_eq!(
                BlockProcessor::validate(&h),
                Err(ValidationError::InvalidRootLength { field, actual: len })
            );
        }
    }

    #[test]
    fn batch_size_floor() {
        let store = Arc::new(leanindex_storage::InMemoryStorage::new());
        assert_eq!(BlockProcessor::new(store.clone()).batch_size(), 20);
        assert_eq!(BlockProcessor::new(store).with_batch_size(0).batch_size(), 1);
    }
}
