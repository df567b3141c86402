//! leanindex-indexer: the ingestion pipeline.
//!
//! ```text
//!            ┌────────────── Indexer ───────────────┐
//!  tick ───▶ BlockPoller ──▶ BlockProcessor ──▶ HeaderStore
//!               │   │               │
//!               │   └─ catchup ─────┘ (one at a time)
//!               ▼
//!           ClientPool ──▶ RemoteClient × N
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use leanindex_indexer::{Indexer, IndexerBuilder};
//! use leanindex_storage::InMemoryStorage;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IndexerBuilder::new()
//!     .endpoint("local", "http://127.0.0.1:5052")
//!     .poll_interval_ms(4_000)
//!     .build_config();
//!
//! let indexer = Indexer::new(config, Arc::new(InMemoryStorage::new()))?;
//! let shutdown = CancellationToken::new();
//! indexer.start(shutdown.clone()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod indexer;
pub mod poller;
pub mod processor;

pub use builder::IndexerBuilder;
pub use indexer::{Indexer, IndexerStatus};
pub use poller::{BlockPoller, PollOutcome};
pub use processor::BlockProcessor;
