//! Engine types
//!
//! Run state, phase machine and statistics for an export run.

use crate::error::{Error, ErrorKind, Result};
use crate::types::{ResourceId, ResourceRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Phase of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Created, nothing issued yet
    Idle,
    /// Walking the search cursor
    Enumerating,
    /// Retrieving detail batches
    Fetching,
    /// Both phases finished
    Complete,
    /// Stopped by an error or cancellation
    Failed,
}

impl RunPhase {
    /// Whether the run can no longer change phase
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    fn can_transition_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Enumerating)
                | (Self::Enumerating, Self::Fetching)
                | (Self::Fetching, Self::Complete)
                | (Self::Enumerating | Self::Fetching, Self::Failed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Enumerating => "enumerating",
            Self::Fetching => "fetching",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Statistics from an export run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Unique identifiers enumerated
    pub ids_retrieved: usize,
    /// Records retrieved by the detail phase
    pub records_retrieved: usize,
    /// Repeated identifiers dropped before fetching
    pub duplicates_skipped: usize,
    /// Identifiers requested but absent from detail responses
    pub records_missing: usize,
    /// Search attempts, retries included
    pub query_calls: u64,
    /// Detail attempts, retries included
    pub entity_calls: u64,
    /// Search pages consumed
    pub search_pages: u64,
    /// Detail batches completed
    pub batches: u64,
    /// Total match count last reported by the server
    pub reported_total: Option<u64>,
    /// Wall-clock start
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock end
    pub finished_at: Option<DateTime<Utc>>,
    /// Elapsed run time
    pub elapsed: Duration,
}

impl RunStats {
    /// Total request attempts across both phases
    pub fn total_calls(&self) -> u64 {
        self.query_calls + self.entity_calls
    }
}

/// Structured description of why a run stopped
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    /// Phase that was active when the run stopped
    pub phase: RunPhase,
    /// Error classification
    pub kind: ErrorKind,
    /// HTTP status of the underlying failure, if any
    pub status: Option<u16>,
    /// Human-readable cause
    pub message: String,
    /// Identifiers gathered before the failure
    pub ids_gathered: usize,
    /// Records gathered before the failure
    pub records_gathered: usize,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} phase stopped ({}): {} [{} ids, {} records gathered]",
            self.phase, self.kind, self.message, self.ids_gathered, self.records_gathered
        )
    }
}

/// Everything one export run owns: identifiers, records, counters, phase
#[derive(Debug)]
pub struct RunState {
    pub(super) phase: RunPhase,
    pub(super) ids: Vec<ResourceId>,
    pub(super) records: Vec<ResourceRecord>,
    pub(super) stats: RunStats,
    failure: Option<RunFailure>,
    clock: Option<Instant>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Fresh state in the `Idle` phase
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            ids: Vec::new(),
            records: Vec::new(),
            stats: RunStats::default(),
            failure: None,
            clock: None,
        }
    }

    /// Current phase
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Enumerated identifiers, in server order
    pub fn ids(&self) -> &[ResourceId] {
        &self.ids
    }

    /// Retrieved records
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    /// Take ownership of the retrieved records
    pub fn into_records(self) -> Vec<ResourceRecord> {
        self.records
    }

    /// Run statistics
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Failure details when the run ended in `Failed`
    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Whether both phases finished
    pub fn is_complete(&self) -> bool {
        self.phase == RunPhase::Complete
    }

    /// Whether the run was stopped by cancellation
    pub fn is_cancelled(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == ErrorKind::Cancelled)
    }

    /// Move to `next`, rejecting re-entry and skipped phases
    pub fn transition(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::state(format!(
                "invalid run transition {} -> {}",
                self.phase, next
            )));
        }

        if self.phase == RunPhase::Idle {
            self.stats.started_at = Some(Utc::now());
            self.clock = Some(Instant::now());
        }
        self.phase = next;
        if next.is_terminal() {
            self.stats.finished_at = Some(Utc::now());
            if let Some(clock) = self.clock {
                self.stats.elapsed = clock.elapsed();
            }
        }
        Ok(())
    }

    /// Record `err` against the active phase and move to `Failed`
    pub(super) fn fail(&mut self, err: &Error) {
        let failure = RunFailure {
            phase: self.phase,
            kind: err.kind(),
            status: err.status(),
            message: err.to_string(),
            ids_gathered: self.stats.ids_retrieved,
            records_gathered: self.stats.records_retrieved,
        };
        self.failure = Some(failure);
        if self.transition(RunPhase::Failed).is_err() {
            // Failing from Idle: still terminal, just without a clock
            self.phase = RunPhase::Failed;
            self.stats.finished_at = Some(Utc::now());
        }
    }
}
