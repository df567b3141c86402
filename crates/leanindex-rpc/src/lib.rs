//! leanindex-rpc: access to remote Lean header endpoints.
//!
//! - [`HeaderSource`]: the async trait every endpoint transport implements
//! - [`HttpHeaderSource`]: `reqwest` implementation of the header API
//! - [`RemoteClient`]: one endpoint plus its health state
//! - [`ClientPool`]: primary-preferred, health-aware client selection
//! - [`retry`]: fixed-delay retry policy used by the poller

pub mod client;
pub mod error;
pub mod http;
pub mod pool;
pub mod retry;
pub mod source;

pub use client::{ClientStatus, RemoteClient};
pub use error::FetchError;
pub use http::HttpHeaderSource;
pub use pool::ClientPool;
pub use retry::{RetryConfig, RetryPolicy};
pub use source::HeaderSource;
