//! Progress notifications
//!
//! Both phases report through a `ProgressObserver`; the default observer
//! turns them into `tracing` events.

use tracing::info;

/// One consumed search page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// 1-based page number
    pub page: u64,
    /// Identifiers on this page
    pub received: usize,
    /// Unique identifiers gathered so far
    pub total_ids: usize,
    /// Total match count reported by the server
    pub reported_total: Option<u64>,
}

/// One completed detail batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based batch number
    pub batch: u64,
    /// Number of batches in this phase
    pub total_batches: u64,
    /// Identifiers sent in this batch
    pub requested: usize,
    /// Records returned for this batch
    pub received: usize,
    /// Records gathered so far
    pub total_records: usize,
}

/// Receives per-page and per-batch progress
pub trait ProgressObserver: Send + Sync {
    /// Called after every search page
    fn on_page(&self, _progress: &PageProgress) {}

    /// Called after every detail batch
    fn on_batch(&self, _progress: &BatchProgress) {}
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for &T {
    fn on_page(&self, progress: &PageProgress) {
        (**self).on_page(progress);
    }

    fn on_batch(&self, progress: &BatchProgress) {
        (**self).on_batch(progress);
    }
}

/// Logs progress through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct TracingProgress {
    /// Log every Nth batch (the last batch is always logged)
    pub batch_log_interval: u64,
}

impl TracingProgress {
    /// Observer logging every 100th batch
    pub fn new() -> Self {
        Self {
            batch_log_interval: 100,
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TracingProgress {
    fn on_page(&self, progress: &PageProgress) {
        match progress.reported_total {
            Some(total) => info!(
                "Page {}: got {} ids (total: {}/{})",
                progress.page, progress.received, progress.total_ids, total
            ),
            None => info!(
                "Page {}: got {} ids (total: {})",
                progress.page, progress.received, progress.total_ids
            ),
        }
    }

    fn on_batch(&self, progress: &BatchProgress) {
        let interval = self.batch_log_interval.max(1);
        if progress.batch % interval == 0 || progress.batch == progress.total_batches {
            info!(
                "Batch {}/{}: retrieved {} records",
                progress.batch, progress.total_batches, progress.total_records
            );
        }
    }
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
