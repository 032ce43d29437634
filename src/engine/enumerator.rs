//! Identifier enumeration over the cursor-paginated search endpoint

use super::progress::{PageProgress, ProgressObserver};
use super::types::RunState;
use crate::api::{AssetSource, SearchRequest};
use crate::error::{Error, Result};
use crate::types::{PaginationCursor, ResourceId, MAX_PAGE_SIZE};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default safety cap on search pages for one enumeration
pub const DEFAULT_MAX_PAGES: u64 = 100_000;

/// Walks the search cursor until the server stops issuing one
#[derive(Debug, Clone)]
pub struct IdentifierEnumerator {
    filter: Option<String>,
    page_size: u32,
    max_pages: u64,
}

impl IdentifierEnumerator {
    /// Enumerator for `filter` (empty means unfiltered); page size is
    /// clamped into `1..=MAX_PAGE_SIZE`
    pub fn new(filter: Option<String>, page_size: u32) -> Self {
        Self {
            filter: filter.filter(|f| !f.is_empty()),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Set the safety cap on pages
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Filter sent with every search call
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Page size sent with every search call
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Append every matching identifier to `state`, in server order.
    ///
    /// Stops on an empty page or a missing cursor. A server that keeps
    /// issuing cursors past the page cap is a `ProtocolViolation`.
    /// Cancellation is honoured between calls.
    pub async fn enumerate(
        &self,
        source: &dyn AssetSource,
        state: &mut RunState,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(
            "Querying resource ids with filter: {}",
            self.filter.as_deref().unwrap_or("None")
        );

        let mut seen: HashSet<ResourceId> = state.ids.iter().cloned().collect();
        let mut cursor: Option<PaginationCursor> = None;
        let mut pages: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if pages >= self.max_pages {
                return Err(Error::protocol(format!(
                    "search endpoint still issuing cursors after {pages} pages"
                )));
            }

            let page = source
                .search(SearchRequest {
                    filter: self.filter.as_deref(),
                    limit: self.page_size,
                    after: cursor.as_ref(),
                })
                .await?;
            pages += 1;
            state.stats.search_pages = pages;
            if page.total.is_some() {
                state.stats.reported_total = page.total;
            }

            let received = page.ids.len();
            for id in page.ids {
                if seen.insert(id.clone()) {
                    state.ids.push(id);
                } else {
                    state.stats.duplicates_skipped += 1;
                }
            }
            state.stats.ids_retrieved = state.ids.len();

            observer.on_page(&PageProgress {
                page: pages,
                received,
                total_ids: state.ids.len(),
                reported_total: page.total,
            });

            match page.next {
                Some(next) if received > 0 => cursor = Some(next),
                Some(_) => {
                    warn!("Search issued a cursor with an empty page; treating as end of results");
                    break;
                }
                None => break,
            }
        }

        if state.stats.duplicates_skipped > 0 {
            warn!(
                "Dropped {} repeated ids from search pages",
                state.stats.duplicates_skipped
            );
        }
        debug!("Enumeration finished after {pages} pages");
        info!("Retrieved {} total resource ids", state.ids.len());
        Ok(())
    }
}
