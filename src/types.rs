//! Common types used throughout the exporter
//!
//! Value types flowing between the search and detail stages, plus
//! shared limits of the remote inventory API.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

// ============================================================================
// Endpoint Limits
// ============================================================================

/// Largest page size accepted by the search endpoint
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Largest number of identifiers accepted by one detail call
pub const MAX_BATCH_SIZE: usize = 100;

/// Offset ceiling of classic offset paging on the search endpoint.
/// Cursor paging is used precisely so this never bounds a run.
pub const OFFSET_CEILING: u64 = 10_000;

// ============================================================================
// Resource Identifier
// ============================================================================

/// Opaque identifier of one inventory record on the remote system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// Pagination Cursor
// ============================================================================

/// Server-issued continuation token for the identifier search.
///
/// Only valid for the filter and page size that produced it. It is never
/// parsed or built locally: the only operations are "was one issued" and
/// "send it back verbatim".
#[derive(Clone, PartialEq, Eq)]
pub struct PaginationCursor(String);

impl PaginationCursor {
    /// Accept a token as issued by the server; empty tokens mean end-of-results
    pub fn issued(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Value to pass back on the next search call
    pub fn as_param(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PaginationCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cursors can be several KB of base64; show only a prefix.
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "PaginationCursor({prefix}..)")
    }
}

// ============================================================================
// Resource Record
// ============================================================================

/// Full detail payload for one identifier; shape owned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord(JsonValue);

impl ResourceRecord {
    /// Wrap a raw JSON record
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Identifying field of the record, when present
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(JsonValue::as_str)
    }

    /// Borrow the raw JSON payload
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    /// Take the raw JSON payload
    pub fn into_json(self) -> JsonValue {
        self.0
    }
}

impl From<JsonValue> for ResourceRecord {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
