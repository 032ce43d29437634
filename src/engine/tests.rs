//! Tests for engine module

use super::*;
use crate::api::{SearchPage, SearchRequest};
use crate::config::ExportConfig;
use crate::error::ErrorKind;
use crate::types::{PaginationCursor, ResourceId, ResourceRecord, OFFSET_CEILING};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ============================================================================
// In-memory inventory
// ============================================================================

/// Cursor-paged inventory held in memory. Cursors are offsets behind an
/// opaque-looking prefix; the engine never sees inside them.
#[derive(Default)]
struct FakeInventory {
    ids: Vec<ResourceId>,
    /// Keep issuing cursors after the last page
    trailing_cursor: bool,
    /// Never stop issuing cursors or ids
    endless: bool,
    /// Return one extra record per detail call
    extra_records: bool,
    /// Fail the Nth search call (1-based)
    fail_search_on: Option<u64>,
    /// Fail the Nth detail call (1-based)
    fail_fetch_on: Option<u64>,
    search_calls: AtomicU64,
    fetch_calls: AtomicU64,
    batch_sizes: Mutex<Vec<usize>>,
    search_limits: Mutex<Vec<u32>>,
}

impl FakeInventory {
    fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(|s| ResourceId::new(s)).collect(),
            ..Self::default()
        }
    }

    fn sized(n: usize) -> Self {
        Self::with_ids((0..n).map(|i| format!("res-{i:06}")))
    }

    fn search_calls(&self) -> u64 {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

fn offset_of(cursor: Option<&PaginationCursor>) -> usize {
    cursor
        .and_then(|c| c.as_param().strip_prefix("after:"))
        .map(|n| n.parse().unwrap())
        .unwrap_or(0)
}

#[async_trait]
impl AssetSource for FakeInventory {
    async fn search(&self, request: SearchRequest<'_>) -> Result<SearchPage> {
        let call = self.search_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.search_limits.lock().unwrap().push(request.limit);
        if self.fail_search_on == Some(call) {
            return Err(Error::RequestFailure {
                status: Some(503),
                body: "service unavailable".to_string(),
                attempts: 5,
            });
        }

        if self.endless {
            return Ok(SearchPage {
                ids: vec![ResourceId::new(format!("loop-{call}"))],
                next: PaginationCursor::issued(format!("after:{call}")),
                total: None,
            });
        }

        let start = offset_of(request.after).min(self.ids.len());
        let end = (start + request.limit as usize).min(self.ids.len());
        let next = if end < self.ids.len() || self.trailing_cursor {
            PaginationCursor::issued(format!("after:{end}"))
        } else {
            None
        };

        Ok(SearchPage {
            ids: self.ids[start..end].to_vec(),
            next,
            total: Some(self.ids.len() as u64),
        })
    }

    async fn fetch(&self, ids: &[ResourceId]) -> Result<Vec<ResourceRecord>> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().unwrap().push(ids.len());
        if self.fail_fetch_on == Some(call) {
            return Err(Error::RequestFailure {
                status: Some(500),
                body: "internal error".to_string(),
                attempts: 5,
            });
        }

        let mut records: Vec<ResourceRecord> = ids
            .iter()
            .filter(|id| !id.as_str().starts_with("gone"))
            .map(|id| ResourceRecord::new(json!({"id": id.as_str(), "type": "vm"})))
            .collect();
        if self.extra_records {
            records.push(ResourceRecord::new(json!({"id": "unrequested"})));
        }
        Ok(records)
    }

    fn calls_made(&self) -> u64 {
        self.search_calls() + self.fetch_calls()
    }
}

fn config(page_size: u32, batch_size: usize) -> ExportConfig {
    ExportConfig {
        page_size,
        batch_size,
        ..ExportConfig::default()
    }
}

fn record_ids(state: &RunState) -> Vec<String> {
    state
        .records()
        .iter()
        .filter_map(|r| r.id().map(str::to_string))
        .collect()
}

/// Cancels the token once a given batch completes
struct CancelAfterBatch {
    token: CancellationToken,
    batch: u64,
}

impl ProgressObserver for CancelAfterBatch {
    fn on_batch(&self, progress: &BatchProgress) {
        if progress.batch == self.batch {
            self.token.cancel();
        }
    }
}

#[derive(Default)]
struct Recorder {
    pages: Mutex<Vec<PageProgress>>,
    batches: Mutex<Vec<BatchProgress>>,
}

impl ProgressObserver for Recorder {
    fn on_page(&self, progress: &PageProgress) {
        self.pages.lock().unwrap().push(*progress);
    }

    fn on_batch(&self, progress: &BatchProgress) {
        self.batches.lock().unwrap().push(*progress);
    }
}

// ============================================================================
// Enumeration
// ============================================================================

#[tokio::test]
async fn test_enumeration_goes_past_offset_ceiling() {
    let inventory = FakeInventory::sized(50_000);
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert!(state.is_complete());
    assert_eq!(state.ids().len(), 50_000);
    assert!(state.ids().len() as u64 > OFFSET_CEILING);
    assert_eq!(state.stats().search_pages, 50);
    assert_eq!(state.stats().query_calls, 50);
    assert_eq!(state.stats().reported_total, Some(50_000));
}

#[tokio::test]
async fn test_enumeration_preserves_server_order() {
    let inventory = FakeInventory::with_ids(["z", "a", "m", "b", "y"]);
    let run = ExportRun::new(&inventory, &config(2, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    let ids: Vec<_> = state.ids().iter().map(ResourceId::as_str).collect();
    assert_eq!(ids, vec!["z", "a", "m", "b", "y"]);
    assert_eq!(record_ids(&state), vec!["z", "a", "m", "b", "y"]);
}

#[tokio::test]
async fn test_enumeration_drops_repeated_ids() {
    let inventory = FakeInventory::with_ids(["a", "b", "c", "b", "d", "a"]);
    let run = ExportRun::new(&inventory, &config(2, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    let ids: Vec<_> = state.ids().iter().map(ResourceId::as_str).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(state.stats().duplicates_skipped, 2);
    assert_eq!(state.stats().ids_retrieved, 4);
    assert_eq!(state.records().len(), 4);
}

#[tokio::test]
async fn test_empty_page_with_cursor_ends_enumeration() {
    let inventory = FakeInventory {
        trailing_cursor: true,
        ..FakeInventory::with_ids(["a", "b", "c", "d"])
    };
    let run = ExportRun::new(&inventory, &config(2, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert!(state.is_complete());
    assert_eq!(state.ids().len(), 4);
    assert_eq!(inventory.search_calls(), 3);
}

#[tokio::test]
async fn test_empty_inventory_makes_no_detail_calls() {
    let inventory = FakeInventory::default();
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert!(state.is_complete());
    assert!(state.records().is_empty());
    assert_eq!(inventory.search_calls(), 1);
    assert_eq!(inventory.fetch_calls(), 0);
}

#[tokio::test]
async fn test_endless_cursor_hits_page_cap() {
    let inventory = FakeInventory {
        endless: true,
        ..FakeInventory::default()
    };
    let cfg = ExportConfig {
        max_pages: 50,
        ..config(10, 100)
    };
    let run = ExportRun::new(&inventory, &cfg).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert_eq!(state.phase(), RunPhase::Failed);
    let failure = state.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::ProtocolViolation);
    assert_eq!(failure.phase, RunPhase::Enumerating);
    assert_eq!(inventory.search_calls(), 50);
    assert_eq!(inventory.fetch_calls(), 0);
}

#[tokio::test]
async fn test_page_size_sent_on_every_search_call() {
    let inventory = FakeInventory::sized(25);
    let run = ExportRun::new(&inventory, &config(10, 100)).with_observer(NoProgress);

    run.execute(&CancellationToken::new()).await;

    assert_eq!(*inventory.search_limits.lock().unwrap(), vec![10, 10, 10]);
}

#[tokio::test]
async fn test_search_failure_discards_ids() {
    let inventory = FakeInventory {
        fail_search_on: Some(2),
        ..FakeInventory::sized(30)
    };
    let run = ExportRun::new(&inventory, &config(10, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert_eq!(state.phase(), RunPhase::Failed);
    assert!(state.ids().is_empty());
    assert!(state.records().is_empty());

    let failure = state.failure().unwrap();
    assert_eq!(failure.phase, RunPhase::Enumerating);
    assert_eq!(failure.kind, ErrorKind::RequestFailure);
    assert_eq!(failure.status, Some(503));
    assert_eq!(failure.ids_gathered, 10);
    assert_eq!(state.stats().query_calls, 2);
    assert_eq!(inventory.fetch_calls(), 0);
}

// ============================================================================
// Partitioning
// ============================================================================

fn ids(n: usize) -> Vec<ResourceId> {
    (0..n).map(|i| ResourceId::new(format!("id-{i}"))).collect()
}

#[test]
fn test_partition_empty() {
    assert!(partition_ids(&[], 100).is_empty());
}

#[test]
fn test_partition_smaller_than_one_batch() {
    let all = ids(7);
    let batches = partition_ids(&all, 100);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 7);
}

#[test]
fn test_partition_exact_multiple() {
    let all = ids(300);
    let batches = partition_ids(&all, 100);
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| b.len() == 100));
}

#[test]
fn test_partition_ceiling_and_order() {
    let all = ids(1850);
    let batches = partition_ids(&all, 100);
    assert_eq!(batches.len(), 19);
    assert_eq!(batches[18].len(), 50);

    let rejoined: Vec<_> = batches.concat();
    assert_eq!(rejoined, all);
}

#[test]
fn test_partition_zero_batch_size_is_one() {
    let all = ids(3);
    assert_eq!(partition_ids(&all, 0).len(), 3);
}

#[test]
fn test_dedup_preserving_order() {
    let unique = ids(3);
    assert!(matches!(
        dedup_preserving_order(&unique),
        std::borrow::Cow::Borrowed(_)
    ));

    let repeated: Vec<ResourceId> = ["b", "a", "b", "c", "a"]
        .into_iter()
        .map(ResourceId::from)
        .collect();
    let deduped: Vec<_> = dedup_preserving_order(&repeated)
        .iter()
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(deduped, vec!["b", "a", "c"]);
}

// ============================================================================
// Detail Fetching
// ============================================================================

#[tokio::test]
async fn test_fetcher_records_missing_ids() {
    let mut all = ids(97);
    all.extend(["gone-1", "gone-2", "gone-3"].into_iter().map(ResourceId::from));
    let inventory = FakeInventory {
        ids: all,
        ..FakeInventory::default()
    };
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert!(state.is_complete());
    assert_eq!(inventory.fetch_calls(), 1);
    assert_eq!(state.records().len(), 97);
    assert_eq!(state.stats().records_missing, 3);
    assert!(record_ids(&state).iter().all(|id| !id.starts_with("gone")));
}

#[tokio::test]
async fn test_fetcher_rejects_extra_records() {
    let inventory = FakeInventory {
        extra_records: true,
        ..FakeInventory::sized(10)
    };
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    let failure = state.failure().unwrap();
    assert_eq!(failure.phase, RunPhase::Fetching);
    assert_eq!(failure.kind, ErrorKind::ProtocolViolation);
    assert!(state.records().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_discards_partial_records_by_default() {
    let inventory = FakeInventory {
        fail_fetch_on: Some(3),
        ..FakeInventory::sized(250)
    };
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert_eq!(state.phase(), RunPhase::Failed);
    assert!(state.records().is_empty());
    assert_eq!(state.ids().len(), 250);

    let failure = state.failure().unwrap();
    assert_eq!(failure.phase, RunPhase::Fetching);
    assert_eq!(failure.status, Some(500));
    assert_eq!(failure.records_gathered, 200);
    assert_eq!(state.stats().entity_calls, 3);
}

#[tokio::test]
async fn test_fetch_failure_keeps_partial_records_when_asked() {
    let inventory = FakeInventory {
        fail_fetch_on: Some(3),
        ..FakeInventory::sized(250)
    };
    let cfg = ExportConfig {
        partial_results: PartialResults::Keep,
        ..config(1000, 100)
    };
    let run = ExportRun::new(&inventory, &cfg).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert_eq!(state.phase(), RunPhase::Failed);
    assert_eq!(state.records().len(), 200);
    assert_eq!(record_ids(&state)[199], "res-000199");
}

#[tokio::test]
async fn test_batch_progress_reported() {
    let inventory = FakeInventory::sized(250);
    let recorder = Recorder::default();
    let run = ExportRun::new(&inventory, &config(100, 100)).with_observer(&recorder);

    run.execute(&CancellationToken::new()).await;

    let pages = recorder.pages.lock().unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].total_ids, 250);
    assert_eq!(pages[2].reported_total, Some(250));

    let batches = recorder.batches.lock().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].total_batches, 3);
    assert_eq!(batches[2].requested, 50);
    assert_eq!(batches[2].total_records, 250);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_issues_no_calls() {
    let inventory = FakeInventory::sized(10);
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let state = run.execute(&cancel).await;

    assert!(state.is_cancelled());
    assert_eq!(state.failure().unwrap().phase, RunPhase::Enumerating);
    assert_eq!(inventory.calls_made(), 0);
}

#[tokio::test]
async fn test_cancel_between_batches() {
    let inventory = FakeInventory::sized(500);
    let cancel = CancellationToken::new();
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(CancelAfterBatch {
        token: cancel.clone(),
        batch: 2,
    });

    let state = run.execute(&cancel).await;

    assert!(state.is_cancelled());
    assert_eq!(state.failure().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(state.failure().unwrap().records_gathered, 200);
    assert_eq!(inventory.fetch_calls(), 2);
    assert!(state.records().is_empty());
}

// ============================================================================
// Run State
// ============================================================================

#[test]
fn test_run_state_transitions() {
    let mut state = RunState::new();
    assert_eq!(state.phase(), RunPhase::Idle);
    assert!(state.transition(RunPhase::Fetching).is_err());

    state.transition(RunPhase::Enumerating).unwrap();
    assert!(state.stats().started_at.is_some());
    assert!(state.transition(RunPhase::Enumerating).is_err());
    assert!(state.transition(RunPhase::Complete).is_err());

    state.transition(RunPhase::Fetching).unwrap();
    state.transition(RunPhase::Complete).unwrap();
    assert!(state.is_complete());
    assert!(state.stats().finished_at.is_some());

    assert!(state.transition(RunPhase::Failed).is_err());
    assert!(state.transition(RunPhase::Enumerating).is_err());
}

#[test]
fn test_terminal_phases() {
    assert!(RunPhase::Complete.is_terminal());
    assert!(RunPhase::Failed.is_terminal());
    assert!(!RunPhase::Fetching.is_terminal());
    assert_eq!(RunPhase::Enumerating.to_string(), "enumerating");
}

#[test]
fn test_run_clamps_sizes() {
    let inventory = FakeInventory::default();
    let run = ExportRun::new(&inventory, &config(5000, 500));
    assert_eq!(run.enumerator().page_size(), 1000);
    assert_eq!(run.fetcher().batch_size(), 100);

    let run = ExportRun::new(
        &inventory,
        &ExportConfig {
            filter: Some(String::new()),
            ..ExportConfig::default()
        },
    );
    assert!(run.enumerator().filter().is_none());
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_typical_run_call_counts() {
    let inventory = FakeInventory::sized(1850);
    let run = ExportRun::new(&inventory, &config(1000, 100)).with_observer(NoProgress);

    let state = run.execute(&CancellationToken::new()).await;

    assert!(state.is_complete());
    let stats = state.stats();
    assert_eq!(stats.ids_retrieved, 1850);
    assert_eq!(stats.records_retrieved, 1850);
    assert_eq!(stats.query_calls, 2);
    assert_eq!(stats.entity_calls, 19);
    assert_eq!(stats.total_calls(), 21);
    assert_eq!(stats.batches, 19);

    let sizes = inventory.batch_sizes.lock().unwrap();
    assert!(sizes[..18].iter().all(|&n| n == 100));
    assert_eq!(sizes[18], 50);
}
