//! In-memory storage backend.
//!
//! Keeps headers in a slot-ordered map. A transaction is applied to a copy
//! of the map which replaces the live one only if every operation succeeds.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use leanindex_core::store::{check_range, check_slot};
use leanindex_core::{Header, HeaderStore, IndexerError, Transaction, WriteOp};
use tracing::debug;

/// In-memory header storage.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    headers: RwLock<BTreeMap<u64, Header>>,
    writer: tokio::sync::Mutex<()>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored headers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u64, Header>> {
        self.headers.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(map: &mut BTreeMap<u64, Header>, op: WriteOp) -> Result<(), IndexerError> {
    match op {
        WriteOp::Insert(h) => {
            check_slot(h.slot)?;
            map.insert(h.slot, h);
        }
        WriteOp::InsertBatch(headers) => {
            for h in headers {
                check_slot(h.slot)?;
                map.insert(h.slot, h);
            }
        }
        WriteOp::Update(h) => match map.get_mut(&h.slot) {
            Some(existing) => *existing = h,
            None => return Err(IndexerError::HeaderNotFound { slot: h.slot }),
        },
        WriteOp::Delete(slot) => {
            if map.remove(&slot).is_none() {
                return Err(IndexerError::HeaderNotFound { slot });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl HeaderStore for InMemoryStorage {
    async fn run_transaction(&self, txn: Transaction) -> Result<(), IndexerError> {
        if txn.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().await;

        let mut staged = self.read().clone();
        let ops = txn.len();
        for op in txn.into_ops() {
            apply(&mut staged, op)?;
        }
        *self.headers.write().unwrap_or_else(PoisonError::into_inner) = staged;

        debug!(ops, "memory transaction committed");
        Ok(())
    }

    async fn get_by_slot(&self, slot: u64) -> Result<Option<Header>, IndexerError> {
        Ok(self.read().get(&slot).cloned())
    }

    async fn get_by_root(&self, root: &[u8]) -> Result<Option<Header>, IndexerError> {
        Ok(self
            .read()
            .values()
            .rev()
            .find(|h| h.parent_root == root || h.state_root == root || h.body_root == root)
            .cloned())
    }

    async fn get_by_proposer(
        &self,
        proposer_index: u64,
        limit: usize,
    ) -> Result<Vec<Header>, IndexerError> {
        Ok(self
            .read()
            .values()
            .rev()
            .filter(|h| h.proposer_index == proposer_index)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_latest(&self, limit: usize) -> Result<Vec<Header>, IndexerError> {
        Ok(self.read().values().rev().take(limit).cloned().collect())
    }

    async fn get_in_range(&self, start: u64, end: u64) -> Result<Vec<Header>, IndexerError> {
        check_range(start, end)?;
        Ok(self.read().range(start..=end).map(|(_, h)| h.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[tokio::test]
    async fn insert_and_read() {
        conformance::insert_and_read(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn queries() {
        conformance::queries(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn update_and_delete() {
        conformance::update_and_delete(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn failed_transaction_writes_nothing() {
        conformance::failed_transaction_writes_nothing(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn empty_transaction_is_ok() {
        conformance::empty_transaction_is_ok(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn extreme_bounds() {
        conformance::extreme_bounds(&InMemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialized() {
        let store = std::sync::Arc::new(InMemoryStorage::new());
        let tasks: Vec<_> = (1..=20u64)
            .map(|slot| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut txn = Transaction::new();
                    txn.insert_header(conformance::header(slot, 0));
                    store.run_transaction(txn).await.unwrap();
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(store.len(), 20);
    }
}
