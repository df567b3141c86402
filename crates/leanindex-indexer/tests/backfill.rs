//! Range backfill through the block processor.

mod common;

use std::sync::Arc;

use common::{header, pool_of, RejectingStore, ScriptedSource};
use leanindex_core::{HeadCache, HeaderStore, IndexerError};
use leanindex_indexer::BlockProcessor;
use leanindex_storage::InMemoryStorage;

fn processor(store: &Arc<InMemoryStorage>, batch_size: u64) -> BlockProcessor {
    BlockProcessor::new(store.clone()).with_batch_size(batch_size)
}

async fn stored_slots(store: &InMemoryStorage) -> Vec<u64> {
    store
        .get_in_range(0, u64::MAX)
        .await
        .unwrap()
        .iter()
        .map(|h| h.slot)
        .collect()
}

#[tokio::test]
async fn inverted_range_fails_before_any_fetch() {
    let source = ScriptedSource::new("http://a", &[]).into_arc();
    let pool = pool_of(&[source.clone()]);
    let store = Arc::new(InMemoryStorage::new());

    let err = processor(&store, 20)
        .process_block_range(&pool, 10, 9)
        .await
        .unwrap_err();

    assert!(matches!(err, IndexerError::InvalidRange { start: 10, end: 9 }));
    assert!(source.fetched_slots().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn fetches_in_batches_and_stores_everything() {
    let source = ScriptedSource::new("http://a", &[]).into_arc();
    let pool = pool_of(&[source.clone()]);
    let store = Arc::new(InMemoryStorage::new());
    let cache = Arc::new(HeadCache::new());
    let processor = processor(&store, 4).with_cache(cache.clone());

    let stored = processor.process_block_range(&pool, 3, 12).await.unwrap();

    assert_eq!(stored, 10);
    assert_eq!(source.fetched_slots(), (3..=12).collect::<Vec<_>>());
    assert_eq!(stored_slots(&store).await, (3..=12).collect::<Vec<_>>());
    assert_eq!(store.get_by_slot(7).await.unwrap(), Some(header(7)));

    // Backfilled headers land in the recent set without moving the head.
    assert_eq!(cache.recent_blocks().len(), 10);
    assert!(cache.current_head().is_none());
}

#[tokio::test]
async fn failed_batch_falls_back_to_another_client() {
    let primary = ScriptedSource::new("http://a", &[]).fail_slot(12).into_arc();
    let backup = ScriptedSource::new("http://b", &[]).into_arc();
    let pool = pool_of(&[primary.clone(), backup.clone()]);
    let store = Arc::new(InMemoryStorage::new());

    let stored = processor(&store, 5)
        .process_block_range(&pool, 10, 19)
        .await
        .unwrap();

    assert_eq!(stored, 10);
    // Primary aborted at 12, the backup served the whole first batch.
    assert_eq!(backup.fetched_slots(), (10..=14).collect::<Vec<_>>());
    assert_eq!(
        primary.fetched_slots(),
        vec![10, 11, 12, 15, 16, 17, 18, 19]
    );
    assert_eq!(stored_slots(&store).await, (10..=19).collect::<Vec<_>>());
}

#[tokio::test]
async fn batch_failing_everywhere_is_skipped() {
    let primary = ScriptedSource::new("http://a", &[]).fail_slot(12).into_arc();
    let backup = ScriptedSource::new("http://b", &[]).fail_slot(12).into_arc();
    let pool = pool_of(&[primary, backup]);
    let store = Arc::new(InMemoryStorage::new());

    let stored = processor(&store, 5)
        .process_block_range(&pool, 10, 19)
        .await
        .unwrap();

    assert_eq!(stored, 5);
    assert_eq!(stored_slots(&store).await, (15..=19).collect::<Vec<_>>());
}

#[tokio::test]
async fn single_client_has_no_fallback() {
    let source = ScriptedSource::new("http://a", &[]).fail_slot(2).into_arc();
    let pool = pool_of(&[source.clone()]);
    let store = Arc::new(InMemoryStorage::new());

    let stored = processor(&store, 3)
        .process_block_range(&pool, 1, 6)
        .await
        .unwrap();

    assert_eq!(stored, 3);
    assert_eq!(source.fetched_slots(), vec![1, 2, 4, 5, 6]);
}

#[tokio::test]
async fn malformed_headers_are_dropped_individually() {
    let source = ScriptedSource::new("http://a", &[]).malformed_slot(16).into_arc();
    let pool = pool_of(&[source]);
    let store = Arc::new(InMemoryStorage::new());

    let stored = processor(&store, 20)
        .process_block_range(&pool, 14, 18)
        .await
        .unwrap();

    assert_eq!(stored, 4);
    assert_eq!(stored_slots(&store).await, vec![14, 15, 17, 18]);
}

#[tokio::test]
async fn no_healthy_client_is_a_hard_failure() {
    let source = ScriptedSource::new("http://a", &[]).into_arc();
    source.failing.store(true, std::sync::atomic::Ordering::SeqCst);
    let pool = pool_of(&[source]);
    assert_eq!(pool.check_all().await, 0);

    let store = Arc::new(InMemoryStorage::new());
    let err = processor(&store, 20)
        .process_block_range(&pool, 1, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::NoHealthyClient));
}

#[tokio::test]
async fn persistence_failure_fails_the_whole_range() {
    let pool = pool_of(&[ScriptedSource::new("http://a", &[]).into_arc()]);
    let processor = BlockProcessor::new(Arc::new(RejectingStore));

    let err = processor.process_block_range(&pool, 10, 12).await.unwrap_err();
    assert!(err.is_persistence());
    assert!(matches!(err, IndexerError::Persist { slot: 10, .. }));
}

#[tokio::test]
async fn process_block_sets_head_and_rejects_invalid() {
    let store = Arc::new(InMemoryStorage::new());
    let cache = Arc::new(HeadCache::new());
    let processor = BlockProcessor::new(store.clone()).with_cache(cache.clone());

    processor.process_block(&header(42)).await.unwrap();
    assert_eq!(cache.current_head(), Some(header(42)));
    assert_eq!(processor.get_latest_processed_slot().await, 42);

    let mut bad = header(43);
    bad.body_root = vec![0; 31];
    let err = processor.process_block(&bad).await.unwrap_err();
    assert!(matches!(err, IndexerError::Validation { slot: 43, .. }));
    assert_eq!(store.len(), 1);
    assert_eq!(cache.current_head().unwrap().slot, 42);
}
