//! leanindex-storage: `HeaderStore` backends for LeanIndex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `sqlite`: SQLite via `sqlx` (embedded, single-file persistence, WAL)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

/// Behaviour every backend must share, run against each one.
#[cfg(test)]
pub(crate) mod conformance {
    use leanindex_core::store::MAX_STORED_SLOT;
    use leanindex_core::{Header, HeaderStore, IndexerError, Transaction};

    pub fn header(slot: u64, proposer: u64) -> Header {
        Header {
            slot,
            proposer_index: proposer,
            parent_root: vec![slot as u8; 32],
            state_root: vec![0xee; 32],
            body_root: vec![0xbb; 32],
        }
    }

    async fn insert_all(store: &dyn HeaderStore, headers: Vec<Header>) {
        let mut txn = Transaction::new();
        txn.insert_header_batch(headers);
        store.run_transaction(txn).await.unwrap();
    }

    pub async fn insert_and_read(store: &dyn HeaderStore) {
        let mut txn = Transaction::new();
        txn.insert_header(header(5, 1));
        store.run_transaction(txn).await.unwrap();

        assert_eq!(store.get_by_slot(5).await.unwrap(), Some(header(5, 1)));
        assert_eq!(store.get_by_slot(6).await.unwrap(), None);

        // Insert-or-replace keyed by slot.
        let mut replaced = header(5, 9);
        replaced.state_root = vec![0x01; 32];
        let mut txn = Transaction::new();
        txn.insert_header(replaced.clone());
        store.run_transaction(txn).await.unwrap();
        assert_eq!(store.get_by_slot(5).await.unwrap(), Some(replaced));
    }

    pub async fn queries(store: &dyn HeaderStore) {
        insert_all(
            store,
            vec![header(1, 7), header(2, 8), header(3, 7), header(4, 8), header(5, 7)],
        )
        .await;

        let latest: Vec<u64> = store.get_latest(2).await.unwrap().iter().map(|h| h.slot).collect();
        assert_eq!(latest, vec![5, 4]);

        let by_proposer: Vec<u64> = store
            .get_by_proposer(7, 10)
            .await
            .unwrap()
            .iter()
            .map(|h| h.slot)
            .collect();
        assert_eq!(by_proposer, vec![5, 3, 1]);
        assert_eq!(store.get_by_proposer(7, 1).await.unwrap().len(), 1);

        let range: Vec<u64> = store
            .get_in_range(2, 4)
            .await
            .unwrap()
            .iter()
            .map(|h| h.slot)
            .collect();
        assert_eq!(range, vec![2, 3, 4]);
        assert!(store.get_in_range(9, 20).await.unwrap().is_empty());
        assert!(matches!(
            store.get_in_range(4, 2).await,
            Err(IndexerError::InvalidRange { start: 4, end: 2 })
        ));

        // state_root is shared by every header: the highest slot wins.
        let by_state = store.get_by_root(&[0xee; 32]).await.unwrap().unwrap();
        assert_eq!(by_state.slot, 5);
        // parent_root is unique per slot here.
        let by_parent = store.get_by_root(&[3u8; 32]).await.unwrap().unwrap();
        assert_eq!(by_parent.slot, 3);
        assert!(store.get_by_root(&[0x42; 32]).await.unwrap().is_none());
    }

    pub async fn update_and_delete(store: &dyn HeaderStore) {
        insert_all(store, vec![header(10, 1)]).await;

        let mut txn = Transaction::new();
        txn.update_header(header(10, 2));
        store.run_transaction(txn).await.unwrap();
        assert_eq!(store.get_by_slot(10).await.unwrap().unwrap().proposer_index, 2);

        let mut txn = Transaction::new();
        txn.update_header(header(11, 2));
        assert!(matches!(
            store.run_transaction(txn).await,
            Err(IndexerError::HeaderNotFound { slot: 11 })
        ));

        let mut txn = Transaction::new();
        txn.delete_header(10);
        store.run_transaction(txn).await.unwrap();
        assert!(store.get_by_slot(10).await.unwrap().is_none());

        let mut txn = Transaction::new();
        txn.delete_header(10);
        assert!(matches!(
            store.run_transaction(txn).await,
            Err(IndexerError::HeaderNotFound { slot: 10 })
        ));
    }

    pub async fn failed_transaction_writes_nothing(store: &dyn HeaderStore) {
        let mut txn = Transaction::new();
        txn.insert_header(header(20, 0))
            .insert_header_batch(vec![header(21, 0), header(22, 0)])
            .delete_header(999);
        assert!(store.run_transaction(txn).await.is_err());

        for slot in 20..=22 {
            assert!(store.get_by_slot(slot).await.unwrap().is_none(), "slot {slot} leaked");
        }
        assert!(store.get_latest(10).await.unwrap().is_empty());
    }

    pub async fn empty_transaction_is_ok(store: &dyn HeaderStore) {
        let mut txn = Transaction::new();
        txn.insert_header_batch(vec![]);
        store.run_transaction(txn).await.unwrap();
        assert!(store.get_latest(1).await.unwrap().is_empty());
    }

    pub async fn extreme_bounds(store: &dyn HeaderStore) {
        insert_all(store, vec![header(1, 0), header(2, 0), header(3, 0)]).await;

        let all: Vec<u64> = store
            .get_in_range(0, u64::MAX)
            .await
            .unwrap()
            .iter()
            .map(|h| h.slot)
            .collect();
        assert_eq!(all, vec![1, 2, 3]);
        assert!(store.get_in_range(u64::MAX - 1, u64::MAX).await.unwrap().is_empty());
        assert_eq!(store.get_latest(usize::MAX).await.unwrap().len(), 3);
        assert_eq!(store.get_by_proposer(0, usize::MAX).await.unwrap().len(), 3);
        assert!(store.get_by_slot(u64::MAX).await.unwrap().is_none());

        // The highest storable slot sorts above everything else.
        insert_all(store, vec![header(MAX_STORED_SLOT, 0)]).await;
        assert_eq!(store.get_latest(1).await.unwrap()[0].slot, MAX_STORED_SLOT);
        assert_eq!(store.get_in_range(3, u64::MAX).await.unwrap().len(), 2);

        let mut txn = Transaction::new();
        txn.insert_header(header(4, 0))
            .insert_header(header(MAX_STORED_SLOT + 1, 0));
        assert!(matches!(
            store.run_transaction(txn).await,
            Err(IndexerError::Storage(_))
        ));
        assert!(store.get_by_slot(4).await.unwrap().is_none());

        let mut txn = Transaction::new();
        txn.delete_header(u64::MAX);
        assert!(matches!(
            store.run_transaction(txn).await,
            Err(IndexerError::HeaderNotFound { slot: u64::MAX })
        ));
    }
}
