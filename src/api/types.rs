//! Source trait and its request/response types

use crate::error::Result;
use crate::types::{PaginationCursor, ResourceId, ResourceRecord};
use async_trait::async_trait;

/// One search call's parameters
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Filter expression passed through verbatim; `None` means no filter
    pub filter: Option<&'a str>,
    /// Requested page size
    pub limit: u32,
    /// Cursor issued by the previous page; `None` on the first call
    pub after: Option<&'a PaginationCursor>,
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Identifiers in server order
    pub ids: Vec<ResourceId>,
    /// Continuation cursor; `None` marks end-of-results
    pub next: Option<PaginationCursor>,
    /// Total match count reported by the server (progress only)
    pub total: Option<u64>,
}

/// The two endpoints an export run walks
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch one page of identifiers
    async fn search(&self, request: SearchRequest<'_>) -> Result<SearchPage>;

    /// Fetch full records for a batch of identifiers.
    ///
    /// Identifiers the server cannot resolve are simply absent from the result.
    async fn fetch(&self, ids: &[ResourceId]) -> Result<Vec<ResourceRecord>>;

    /// Request attempts issued so far, retries included
    fn calls_made(&self) -> u64;
}
