//! Batched detail retrieval

use super::progress::{BatchProgress, ProgressObserver};
use super::types::RunState;
use crate::api::AssetSource;
use crate::error::{Error, Result};
use crate::types::{ResourceId, MAX_BATCH_SIZE};
use std::borrow::Cow;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Split `ids` into consecutive chunks of at most `batch_size`, in order.
///
/// A zero batch size is treated as one.
pub fn partition_ids(ids: &[ResourceId], batch_size: usize) -> Vec<&[ResourceId]> {
    ids.chunks(batch_size.max(1)).collect()
}

/// Drop repeated identifiers, keeping first occurrences in order.
///
/// Borrows the input when it is already unique.
pub fn dedup_preserving_order(ids: &[ResourceId]) -> Cow<'_, [ResourceId]> {
    let mut seen = HashSet::with_capacity(ids.len());
    if ids.iter().all(|id| seen.insert(id)) {
        return Cow::Borrowed(ids);
    }

    seen.clear();
    Cow::Owned(ids.iter().filter(|id| seen.insert(*id)).cloned().collect())
}

/// Retrieves full records for enumerated identifiers, one batch per call
#[derive(Debug, Clone, Copy)]
pub struct DetailFetcher {
    batch_size: usize,
}

impl DetailFetcher {
    /// Fetcher with `batch_size` clamped into `1..=MAX_BATCH_SIZE`
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Identifiers sent per call
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch records for `ids` into `state`.
    ///
    /// Identifiers missing from a response are skipped silently. A response
    /// with more records than identifiers requested is a
    /// `ProtocolViolation`. Records from completed batches stay in `state`
    /// when a later batch fails; whether to keep them is the caller's call.
    pub async fn fetch_all(
        &self,
        source: &dyn AssetSource,
        ids: &[ResourceId],
        state: &mut RunState,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let unique = dedup_preserving_order(ids);
        let dropped = ids.len() - unique.len();
        if dropped > 0 {
            warn!("Dropped {dropped} repeated ids before fetching");
            state.stats.duplicates_skipped += dropped;
        }

        let batches = partition_ids(&unique, self.batch_size);
        let total_batches = batches.len() as u64;
        info!(
            "Retrieving resource details for {} ids (batch size {}, {} batches)",
            unique.len(),
            self.batch_size,
            total_batches
        );

        for (index, batch) in batches.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let number = index as u64 + 1;
            let records = source.fetch(batch).await?;
            if records.len() > batch.len() {
                return Err(Error::protocol(format!(
                    "detail batch {number} returned {} records for {} ids",
                    records.len(),
                    batch.len()
                )));
            }

            let received = records.len();
            if received < batch.len() {
                debug!(
                    "Batch {number}: {} of {} ids not returned",
                    batch.len() - received,
                    batch.len()
                );
                state.stats.records_missing += batch.len() - received;
            }

            state.records.extend(records);
            state.stats.records_retrieved = state.records.len();
            state.stats.batches = number;

            observer.on_batch(&BatchProgress {
                batch: number,
                total_batches,
                requested: batch.len(),
                received,
                total_records: state.records.len(),
            });
        }

        info!("Retrieved {} total resources", state.records.len());
        Ok(())
    }
}
