//! Head cache: what the indexer currently believes about the chain.
//!
//! Holds the current head, the latest justified and finalized checkpoints,
//! and a bounded set of recently seen headers keyed by canonical root. The
//! recent set is what a fork-choice consumer would walk; this crate never
//! runs fork choice itself.
//!
//! When the recent set grows past capacity the entry with the lowest slot
//! is evicted (min-by-slot, not LRU).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::types::{Checkpoint, Header};

/// Default bound on the recent-block set.
pub const MAX_RECENT_BLOCKS: usize = 32;

/// Snapshot of cache occupancy for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub recent_blocks_count: usize,
    pub max_recent_blocks: usize,
    pub has_current_head: bool,
    pub has_justified: bool,
    pub has_finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_head_slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justified_slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_slot: Option<u64>,
}

#[derive(Default)]
struct CacheInner {
    current_head: Option<Header>,
    latest_justified: Option<Checkpoint>,
    latest_finalized: Option<Checkpoint>,
    /// root hex (no prefix) → header
    recent_blocks: HashMap<String, Header>,
}

/// Concurrency-safe view of the chain head.
pub struct HeadCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl HeadCache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RECENT_BLOCKS)
    }

    /// Create a cache whose recent set holds at most `capacity` headers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Replace the current head and record it in the recent set.
    ///
    /// A header whose root cannot be computed is logged and ignored; the
    /// previous head stays in place.
    pub fn update_head(&self, header: Header) {
        let root = match header.canonical_root() {
            Ok(root) => hex::encode(root),
            Err(e) => {
                error!(slot = header.slot, error = %e, "Failed to calculate block root");
                return;
            }
        };

        let slot = header.slot;
        let mut inner = self.write();
        inner.current_head = Some(header.clone());
        inner.recent_blocks.insert(root.clone(), header);
        self.prune(&mut inner);

        debug!(slot, block_root = %&root[..8], "Updated head cache with new block");
    }

    /// Record a header in the recent set without moving the head.
    pub fn add_recent_block(&self, header: Header) {
        let root = match header.canonical_root() {
            Ok(root) => hex::encode(root),
            Err(e) => {
                error!(slot = header.slot, error = %e, "Failed to calculate block root for recent blocks");
                return;
            }
        };

        let mut inner = self.write();
        inner.recent_blocks.insert(root, header);
        self.prune(&mut inner);
    }

    pub fn update_justified(&self, checkpoint: Checkpoint) {
        self.write().latest_justified = Some(checkpoint);
        info!(
            slot = checkpoint.slot,
            root = %short_hex(&checkpoint.root),
            "Updated justified checkpoint"
        );
    }

    pub fn update_finalized(&self, checkpoint: Checkpoint) {
        self.write().latest_finalized = Some(checkpoint);
        info!(
            slot = checkpoint.slot,
            root = %short_hex(&checkpoint.root),
            "Updated finalized checkpoint"
        );
    }

    pub fn current_head(&self) -> Option<Header> {
        self.read().current_head.clone()
    }

    pub fn justified(&self) -> Option<Checkpoint> {
        self.read().latest_justified
    }

    pub fn finalized(&self) -> Option<Checkpoint> {
        self.read().latest_finalized
    }

    /// Copy of the recent-block set.
    pub fn recent_blocks(&self) -> HashMap<String, Header> {
        self.read().recent_blocks.clone()
    }

    /// Maximum size of the recent set.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cache_stats(&self) -> CacheStats {
        let inner = self.read();
        CacheStats {
            recent_blocks_count: inner.recent_blocks.len(),
            max_recent_blocks: self.capacity,
            has_current_head: inner.current_head.is_some(),
            has_justified: inner.latest_justified.is_some(),
            has_finalized: inner.latest_finalized.is_some(),
            current_head_slot: inner.current_head.as_ref().map(|h| h.slot),
            justified_slot: inner.latest_justified.map(|c| c.slot),
            finalized_slot: inner.latest_finalized.map(|c| c.slot),
        }
    }

    /// Evict lowest-slot entries until the set fits. Caller holds the write lock.
    fn prune(&self, inner: &mut CacheInner) {
        while inner.recent_blocks.len() > self.capacity {
            let oldest = inner
                .recent_blocks
                .iter()
                .min_by(|(ra, a), (rb, b)| a.slot.cmp(&b.slot).then_with(|| ra.cmp(rb)))
                .map(|(root, header)| (root.clone(), header.slot));

            let Some((root, slot)) = oldest else { break };
            inner.recent_blocks.remove(&root);

            debug!(
                pruned_slot = slot,
                remaining_blocks = inner.recent_blocks.len(),
                max_recent_blocks = self.capacity,
                "Pruned old block from head cache"
            );
        }
    }

    // A panic while holding the lock cannot leave the inner state half
    // written (every writer assigns whole values), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeadCache {
    fn default() -> Self {
        Self::new()
    }
}

fn short_hex(root: &[u8]) -> String {
    let full = hex::encode(root);
    format!("{}...", &full[..8.min(full.len())])
}
