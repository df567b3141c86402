//! The `HeaderSource` trait: header lookup by block identifier.

use async_trait::async_trait;
use leanindex_core::{BlockId, Header};

use crate::error::FetchError;

/// A remote that can resolve a [`BlockId`] to a [`Header`].
///
/// Implementations: [`HttpHeaderSource`](crate::HttpHeaderSource) and the
/// scripted mocks used in tests.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Fetch the header identified by `id`.
    async fn fetch_header(&self, id: &BlockId) -> Result<Header, FetchError>;

    /// Base URL of the endpoint, for logging and status reporting.
    fn url(&self) -> &str;
}
