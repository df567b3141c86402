//! Shared fixtures: a scripted header source and a store that refuses writes.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use leanindex_core::{BlockId, Header, HeaderStore, IndexerError, Transaction};
use leanindex_rpc::{ClientPool, FetchError, HeaderSource, RemoteClient};
use tokio::sync::Semaphore;

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub fn header(slot: u64) -> Header {
    Header {
        slot,
        proposer_index: slot % 4,
        parent_root: vec![slot as u8; 32],
        state_root: vec![0x5e; 32],
        body_root: vec![0xb0; 32],
    }
}

/// One client per source, named `node0`, `node1`, ... in pool order.
pub fn pool_of(sources: &[Arc<ScriptedSource>]) -> Arc<ClientPool> {
    let clients = sources
        .iter()
        .enumerate()
        .map(|(i, s)| Arc::new(RemoteClient::new(format!("node{i}"), s.clone())))
        .collect();
    Arc::new(ClientPool::new(clients))
}

// ─── ScriptedSource ───────────────────────────────────────────────────────────

/// Header source driven by a script of head slots.
///
/// Each `head` fetch pops the next slot from the script; once the script is
/// exhausted the last slot repeats. Slot fetches return `header(slot)`
/// unless the slot is marked failing or malformed. `justified` and
/// `finalized` trail the last head by one and two slots.
pub struct ScriptedSource {
    url: String,
    heads: Mutex<VecDeque<u64>>,
    last_head: Mutex<u64>,
    pub failing: AtomicBool,
    head_failures: AtomicU32,
    fail_slots: Mutex<HashSet<u64>>,
    bad_slots: Mutex<HashSet<u64>>,
    fetched: Mutex<Vec<u64>>,
    gate: Option<Semaphore>,
}

impl ScriptedSource {
    pub fn new(url: &str, heads: &[u64]) -> Self {
        Self {
            url: url.to_string(),
            heads: Mutex::new(heads.iter().copied().collect()),
            last_head: Mutex::new(0),
            failing: AtomicBool::new(false),
            head_failures: AtomicU32::new(0),
            fail_slots: Mutex::new(HashSet::new()),
            bad_slots: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Slot fetches block until [`release`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// The next `n` head fetches fail.
    pub fn fail_heads(self, n: u32) -> Self {
        self.head_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_slot(self, slot: u64) -> Self {
        self.fail_slots.lock().unwrap().insert(slot);
        self
    }

    /// `slot` is served with a truncated state root.
    pub fn malformed_slot(self, slot: u64) -> Self {
        self.bad_slots.lock().unwrap().insert(slot);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Slots requested by slot number, in request order.
    pub fn fetched_slots(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }

    fn next_head(&self) -> u64 {
        let mut last = self.last_head.lock().unwrap();
        if let Some(slot) = self.heads.lock().unwrap().pop_front() {
            *last = slot;
        }
        *last
    }
}

#[async_trait]
impl HeaderSource for ScriptedSource {
    async fn fetch_header(&self, id: &BlockId) -> Result<Header, FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Http("connection refused".into()));
        }
        match id {
            BlockId::Head => {
                let remaining = self.head_failures.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.head_failures.store(remaining - 1, Ordering::SeqCst);
                    return Err(FetchError::Timeout { ms: 30_000 });
                }
                Ok(header(self.next_head()))
            }
            BlockId::Slot(slot) => {
                let slot = *slot;
                if let Some(gate) = &self.gate {
                    let _permit = gate.acquire().await;
                }
                self.fetched.lock().unwrap().push(slot);
                if self.fail_slots.lock().unwrap().contains(&slot) {
                    return Err(FetchError::Status {
                        status: 404,
                        block_id: id.to_string(),
                    });
                }
                let mut h = header(slot);
                if self.bad_slots.lock().unwrap().contains(&slot) {
                    h.state_root.truncate(16);
                }
                Ok(h)
            }
            BlockId::Justified => Ok(header(self.last_head.lock().unwrap().saturating_sub(1))),
            BlockId::Finalized => Ok(header(self.last_head.lock().unwrap().saturating_sub(2))),
            BlockId::Genesis | BlockId::Root(_) => Err(FetchError::Status {
                status: 404,
                block_id: id.to_string(),
            }),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

// ─── RejectingStore ───────────────────────────────────────────────────────────

/// Reads succeed and return nothing; every transaction fails.
pub struct RejectingStore;

#[async_trait]
impl HeaderStore for RejectingStore {
    async fn run_transaction(&self, _txn: Transaction) -> Result<(), IndexerError> {
        Err(IndexerError::Storage("disk full".into()))
    }

    async fn get_by_slot(&self, _slot: u64) -> Result<Option<Header>, IndexerError> {
        Ok(None)
    }

    async fn get_by_root(&self, _root: &[u8]) -> Result<Option<Header>, IndexerError> {
        Ok(None)
    }

    async fn get_by_proposer(&self, _proposer_index: u64, _limit: usize) -> Result<Vec<Header>, IndexerError> {
        Ok(vec![])
    }

    async fn get_latest(&self, _limit: usize) -> Result<Vec<Header>, IndexerError> {
        Ok(vec![])
    }

    async fn get_in_range(&self, _start: u64, _end: u64) -> Result<Vec<Header>, IndexerError> {
        Ok(vec![])
    }
}
