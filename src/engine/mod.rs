//! Export engine module
//!
//! Two-stage traversal of the remote inventory.
//!
//! # Overview
//!
//! The engine module provides:
//! - `IdentifierEnumerator` - walks the search cursor to collect every matching id
//! - `DetailFetcher` - walks those ids in fixed-size batches through the detail endpoint
//! - `ExportRun` - sequences both phases and owns the `RunState`
//! - Progress observers for per-page and per-batch notifications

mod enumerator;
mod fetcher;
mod progress;
mod types;

pub use enumerator::{IdentifierEnumerator, DEFAULT_MAX_PAGES};
pub use fetcher::{dedup_preserving_order, partition_ids, DetailFetcher};
pub use progress::{BatchProgress, NoProgress, PageProgress, ProgressObserver, TracingProgress};
pub use types::{RunFailure, RunPhase, RunState, RunStats};

use crate::api::AssetSource;
use crate::config::{ExportConfig, PartialResults};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One export run: enumeration, then detail retrieval
pub struct ExportRun<'a> {
    /// Remote inventory
    source: &'a dyn AssetSource,
    /// Search phase
    enumerator: IdentifierEnumerator,
    /// Detail phase
    fetcher: DetailFetcher,
    /// What happens to fetched records when a later batch fails
    partial_results: PartialResults,
    /// Progress sink for both phases
    observer: Box<dyn ProgressObserver + 'a>,
}

impl<'a> ExportRun<'a> {
    /// Create a run against `source` using the tuning in `config`
    pub fn new(source: &'a dyn AssetSource, config: &ExportConfig) -> Self {
        Self {
            source,
            enumerator: IdentifierEnumerator::new(config.filter.clone(), config.page_size)
                .with_max_pages(config.max_pages),
            fetcher: DetailFetcher::new(config.batch_size),
            partial_results: config.partial_results,
            observer: Box::new(TracingProgress::new()),
        }
    }

    /// Replace the progress observer
    #[must_use]
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Search phase settings
    pub fn enumerator(&self) -> &IdentifierEnumerator {
        &self.enumerator
    }

    /// Detail phase settings
    pub fn fetcher(&self) -> &DetailFetcher {
        &self.fetcher
    }

    /// Run both phases to completion or failure.
    ///
    /// Never returns an error: the returned state is either `Complete` or
    /// `Failed` with a `RunFailure` describing the phase, cause and counts.
    pub async fn execute(&self, cancel: &CancellationToken) -> RunState {
        let mut state = RunState::new();

        match self.drive(&mut state, cancel).await {
            Ok(()) => {
                let stats = state.stats();
                info!(
                    "Export complete: {} ids, {} records, {} calls in {:?}",
                    stats.ids_retrieved,
                    stats.records_retrieved,
                    stats.total_calls(),
                    stats.elapsed
                );
            }
            Err(err) => {
                match state.phase() {
                    RunPhase::Enumerating => state.ids.clear(),
                    RunPhase::Fetching if self.partial_results == PartialResults::Discard => {
                        state.records.clear();
                    }
                    _ => {}
                }

                if matches!(err, Error::Cancelled) {
                    warn!("Run cancelled during {} phase", state.phase());
                } else {
                    error!("Run failed during {} phase: {err}", state.phase());
                }
                state.fail(&err);
            }
        }

        state
    }

    async fn drive(&self, state: &mut RunState, cancel: &CancellationToken) -> Result<()> {
        state.transition(RunPhase::Enumerating)?;
        let before = self.source.calls_made();
        let result = self
            .enumerator
            .enumerate(self.source, state, &*self.observer, cancel)
            .await;
        state.stats.query_calls = self.source.calls_made().saturating_sub(before);
        result?;

        state.transition(RunPhase::Fetching)?;
        let ids = std::mem::take(&mut state.ids);
        let before = self.source.calls_made();
        let result = self
            .fetcher
            .fetch_all(self.source, &ids, state, &*self.observer, cancel)
            .await;
        state.stats.entity_calls = self.source.calls_made().saturating_sub(before);
        state.ids = ids;
        result?;

        state.transition(RunPhase::Complete)
    }
}

#[cfg(test)]
mod tests;
