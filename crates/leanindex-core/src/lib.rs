//! leanindex-core: foundation for the Lean devnet header indexer.
//!
//! # Architecture
//!
//! ```text
//! Indexer → BlockPoller ─┬── ClientPool        (leanindex-rpc)
//!                        ├── BlockProcessor ── HeaderStore (memory / SQLite)
//!                        └── HeadCache         (head, checkpoints, recent blocks)
//! ```
//!
//! This crate holds the pieces every other crate agrees on: the [`Header`]
//! record and its fixed-layout [`codec`], the error taxonomy, the
//! [`HeaderStore`] persistence boundary, the [`HeadCache`], and the
//! cancellable [`PeriodicTask`] used by every background loop.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod serde_helpers;
pub mod store;
pub mod task;
pub mod types;

pub use cache::{CacheStats, HeadCache, MAX_RECENT_BLOCKS};
pub use codec::{decode, encode, merkle_root, HEADER_SIZE, ROOT_SIZE};
pub use config::{EndpointConfig, IndexerConfig};
pub use error::{CodecError, IndexerError, ValidationError};
pub use store::{HeaderStore, Transaction, WriteOp};
pub use task::PeriodicTask;
pub use types::{BlockId, Checkpoint, Header, Root};
