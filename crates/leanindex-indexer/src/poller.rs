//! Slot-synchronized head poller with gap detection and catchup.
//!
//! Every poll interval the poller fetches the remote head (with retry and
//! client failover), compares it to the last processed slot and hands new
//! heads to the [`BlockProcessor`]. A jump of more than one slot launches a
//! background catchup for the missing range. At most one catchup runs at a
//! time: a gap detected while one is in flight is not backfilled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use leanindex_core::{Checkpoint, HeadCache, Header, IndexerConfig, IndexerError, PeriodicTask};
use leanindex_rpc::{ClientPool, RemoteClient, RetryConfig, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::BlockProcessor;

/// What a single poll tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The remote head was not ahead of the last processed slot.
    NoChange { head_slot: u64 },
    /// A new head was seen. `catchup` is the range handed to a newly
    /// started catchup task, if one was started.
    Advanced {
        slot: u64,
        previous: u64,
        catchup: Option<(u64, u64)>,
    },
}

struct PollerState {
    running: bool,
    last_processed_slot: u64,
    catchup_in_progress: bool,
    task: Option<PeriodicTask>,
    token: CancellationToken,
}

pub struct BlockPoller {
    pool: Arc<ClientPool>,
    processor: Arc<BlockProcessor>,
    cache: Option<Arc<HeadCache>>,
    poll_interval: Duration,
    retry: RetryPolicy,
    track_checkpoints: bool,
    state: Mutex<PollerState>,
    catchups_started: AtomicU64,
}

impl BlockPoller {
    pub fn new(pool: Arc<ClientPool>, processor: Arc<BlockProcessor>, config: &IndexerConfig) -> Self {
        Self {
            pool,
            processor,
            cache: None,
            poll_interval: config.poll_interval(),
            retry: RetryPolicy::new(RetryConfig {
                max_attempts: config.max_retries,
                delay: config.retry_delay(),
            }),
            track_checkpoints: config.track_checkpoints,
            state: Mutex::new(PollerState {
                running: false,
                last_processed_slot: 0,
                catchup_in_progress: false,
                task: None,
                token: CancellationToken::new(),
            }),
            catchups_started: AtomicU64::new(0),
        }
    }

    /// Cache that receives justified/finalized checkpoints.
    pub fn with_cache(mut self, cache: Arc<HeadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Load the last processed slot and start ticking every poll interval.
    ///
    /// Fails with [`IndexerError::AlreadyRunning`] if already started; the
    /// running instance is unaffected.
    pub async fn start(self: &Arc<Self>, parent: &CancellationToken) -> Result<(), IndexerError> {
        {
            let mut state = self.lock();
            if state.running {
                return Err(IndexerError::AlreadyRunning);
            }
            state.running = true;
        }

        let last = self.sync_last_processed_slot().await;

        let mut state = self.lock();
        if !state.running {
            // stop() raced with startup
            return Ok(());
        }
        let token = parent.child_token();
        let poller = Arc::downgrade(self);
        let task = PeriodicTask::spawn("block-poller", self.poll_interval, &token, move || {
            let poller = poller.clone();
            async move {
                let Some(poller) = poller.upgrade() else { return };
                if let Err(e) = poller.poll_for_new_blocks().await {
                    warn!(error = %e, "Failed to poll for new blocks");
                }
            }
        });
        state.task = Some(task);
        state.token = token;
        drop(state);

        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            last_slot = last,
            "Block poller started"
        );
        Ok(())
    }

    /// Stop polling and cancel any running catchup. Stopping a stopped
    /// poller is a no-op.
    pub fn stop(&self) {
        let task = {
            let mut state = self.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.token.cancel();
            state.task.take()
        };
        drop(task);
        info!("Block poller stopped");
    }

    /// Reload the last processed slot from storage.
    pub async fn sync_last_processed_slot(&self) -> u64 {
        let last = self.processor.get_latest_processed_slot().await;
        self.lock().last_processed_slot = last;
        if last > 0 {
            info!(last_slot = last, "Initialized with last processed slot from storage");
        }
        last
    }

    // ── Tick ────────────────────────────────────────────────────────────────

    /// One poll cycle. Errors end this tick only.
    pub async fn poll_for_new_blocks(self: &Arc<Self>) -> Result<PollOutcome, IndexerError> {
        let client = self
            .pool
            .get_healthy_client()
            .ok_or(IndexerError::NoHealthyClient)?;

        let (head, client) = self.fetch_head_with_retry(client).await?;

        let previous = self.last_processed_slot();
        if head.slot <= previous {
            debug!(current_slot = head.slot, "No new blocks");
            return Ok(PollOutcome::NoChange { head_slot: head.slot });
        }

        let slot_gap = head.slot - previous;
        info!(new_slot = head.slot, previous_slot = previous, slot_gap, "New block detected");

        let catchup = if slot_gap > 1 {
            self.try_start_catchup(previous + 1, head.slot - 1)
        } else {
            None
        };

        if let Err(e) = self.processor.process_block(&head).await {
            // Advance anyway so one bad slot cannot stall the poller.
            error!(slot = head.slot, error = %e, "Failed to process new block");
        }
        self.lock().last_processed_slot = head.slot;

        if self.track_checkpoints {
            self.refresh_checkpoints(&client).await;
        }

        Ok(PollOutcome::Advanced {
            slot: head.slot,
            previous,
            catchup,
        })
    }

    /// Fetch the head, retrying with a fixed delay. Each retry prefers a
    /// different healthy client. Returns the header and the client that
    /// served it.
    async fn fetch_head_with_retry(
        &self,
        mut client: Arc<RemoteClient>,
    ) -> Result<(Header, Arc<RemoteClient>), IndexerError> {
        let mut attempt = 1;
        loop {
            let err = match client.get_head().await {
                Ok(head) => {
                    if attempt > 1 {
                        info!(attempt, endpoint = %client.name(), "Fetched head block after retry");
                    }
                    return Ok((head, client));
                }
                Err(e) => e,
            };
            warn!(attempt, endpoint = %client.name(), error = %err, "Failed to fetch head block");

            let Some(delay) = self.retry.next_delay(attempt) else {
                return Err(IndexerError::Fetch(format!(
                    "failed to fetch head block after {attempt} attempts: {err}"
                )));
            };
            tokio::time::sleep(delay).await;
            if let Some(next) = self
                .pool
                .healthy_client_excluding(&client)
                .or_else(|| self.pool.get_healthy_client())
            {
                client = next;
            }
            attempt += 1;
        }
    }

    // ── Catchup ─────────────────────────────────────────────────────────────

    /// Start a background backfill of `start..=end` unless one is running.
    fn try_start_catchup(self: &Arc<Self>, start: u64, end: u64) -> Option<(u64, u64)> {
        warn!(
            gap_start = start,
            gap_end = end,
            gap_size = end - start + 1,
            "Gap detected in block processing"
        );

        let token = {
            let mut state = self.lock();
            if state.catchup_in_progress {
                debug!("Catchup already in progress, skipping new catchup");
                return None;
            }
            state.catchup_in_progress = true;
            state.token.clone()
        };
        self.catchups_started.fetch_add(1, Ordering::SeqCst);

        let guard = CatchupGuard {
            poller: Arc::clone(self),
        };
        tokio::spawn(async move {
            let poller = &guard.poller;
            info!(start_slot = start, end_slot = end, gap_size = end - start + 1, "Starting catchup processing");
            let started = Instant::now();

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(start_slot = start, end_slot = end, "Catchup cancelled");
                }
                res = poller.processor.process_block_range(&poller.pool, start, end) => match res {
                    Ok(stored) => info!(
                        start_slot = start,
                        end_slot = end,
                        stored,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Catchup processing completed"
                    ),
                    Err(e) => error!(
                        start_slot = start,
                        end_slot = end,
                        error = %e,
                        "Failed to complete catchup processing"
                    ),
                },
            }
            drop(guard);
        });

        Some((start, end))
    }

    async fn refresh_checkpoints(&self, client: &RemoteClient) {
        let Some(cache) = &self.cache else { return };

        match client.get_justified().await {
            Ok(h) => match Checkpoint::from_header(&h) {
                Ok(cp) => cache.update_justified(cp),
                Err(e) => warn!(slot = h.slot, error = %e, "Invalid justified header"),
            },
            Err(e) => warn!(endpoint = %client.name(), error = %e, "Failed to fetch justified checkpoint"),
        }
        match client.get_finalized().await {
            Ok(h) => match Checkpoint::from_header(&h) {
                Ok(cp) => cache.update_finalized(cp),
                Err(e) => warn!(slot = h.slot, error = %e, "Invalid finalized header"),
            },
            Err(e) => warn!(endpoint = %client.name(), error = %e, "Failed to fetch finalized checkpoint"),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn last_processed_slot(&self) -> u64 {
        self.lock().last_processed_slot
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_catchup_in_progress(&self) -> bool {
        self.lock().catchup_in_progress
    }

    /// Catchup tasks launched since construction.
    pub fn catchups_started(&self) -> u64 {
        self.catchups_started.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the catchup flag when the catchup task ends, however it ends.
struct CatchupGuard {
    poller: Arc<BlockPoller>,
}

impl Drop for CatchupGuard {
    fn drop(&mut self) {
        self.poller.lock().catchup_in_progress = false;
    }
}
