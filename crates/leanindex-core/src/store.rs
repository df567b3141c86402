//! Header persistence boundary.
//!
//! Writes are grouped into a [`Transaction`]: an ordered list of operations
//! that a [`HeaderStore`] applies all-or-nothing, serialized against every
//! other writer. Reads never wait on the writer.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::Header;

/// One write recorded in a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or replace the header stored at `header.slot`.
    Insert(Header),
    /// Insert or replace several headers.
    InsertBatch(Vec<Header>),
    /// Overwrite an existing header. Fails if no row exists for the slot.
    Update(Header),
    /// Remove the header at a slot. Fails if no row exists.
    Delete(u64),
}

/// A batch of writes applied atomically by [`HeaderStore::run_transaction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_header(&mut self, header: Header) -> &mut Self {
        self.ops.push(WriteOp::Insert(header));
        self
    }

    /// Record a batch insert. An empty batch records nothing.
    pub fn insert_header_batch(&mut self, headers: Vec<Header>) -> &mut Self {
        if !headers.is_empty() {
            self.ops.push(WriteOp::InsertBatch(headers));
        }
        self
    }

    pub fn update_header(&mut self, header: Header) -> &mut Self {
        self.ops.push(WriteOp::Update(header));
        self
    }

    pub fn delete_header(&mut self, slot: u64) -> &mut Self {
        self.ops.push(WriteOp::Delete(slot));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Durable header storage.
///
/// Implementations: `InMemoryStorage` and `SqliteStorage` in
/// `leanindex-storage`.
#[async_trait]
pub trait HeaderStore: Send + Sync {
    /// Apply every operation in `txn` atomically. On error nothing is written.
    async fn run_transaction(&self, txn: Transaction) -> Result<(), IndexerError>;

    async fn get_by_slot(&self, slot: u64) -> Result<Option<Header>, IndexerError>;

    /// Highest-slot header whose parent, state or body root equals `root`.
    async fn get_by_root(&self, root: &[u8]) -> Result<Option<Header>, IndexerError>;

    /// Headers proposed by `proposer_index`, newest first.
    async fn get_by_proposer(
        &self,
        proposer_index: u64,
        limit: usize,
    ) -> Result<Vec<Header>, IndexerError>;

    /// The `limit` highest-slot headers, newest first.
    async fn get_latest(&self, limit: usize) -> Result<Vec<Header>, IndexerError>;

    /// Headers with `start <= slot <= end`, ascending.
    ///
    /// Fails with [`IndexerError::InvalidRange`] if `start > end`.
    async fn get_in_range(&self, start: u64, end: u64) -> Result<Vec<Header>, IndexerError>;
}

/// Highest slot a store accepts. Backends keep slots in signed 64-bit
/// columns.
pub const MAX_STORED_SLOT: u64 = i64::MAX as u64;

/// Reject a slot above [`MAX_STORED_SLOT`].
pub fn check_slot(slot: u64) -> Result<(), IndexerError> {
    if slot > MAX_STORED_SLOT {
        return Err(IndexerError::Storage(format!(
            "slot {slot} exceeds the maximum storable slot {MAX_STORED_SLOT}"
        )));
    }
    Ok(())
}

/// Reject an inverted slot range.
pub fn check_range(start: u64, end: u64) -> Result<(), IndexerError> {
    if start > end {
        return Err(IndexerError::InvalidRange { start, end });
    }
    Ok(())
}
