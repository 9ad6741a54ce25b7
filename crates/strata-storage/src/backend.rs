//! Strata Backend - Storage Backend Contract
//!
//! Defines the pluggable storage backend trait consumed by the rollup
//! engine. The core never implements durability itself; atomic increment,
//! conditional insert, reduction and expiry are all delegated here.
//!
//! Key Features:
//! - Async storage operations for non-blocking I/O
//! - Atomic create-or-add and create-or-max counter writes
//! - Server-side range reduction materialized into a target collection
//! - Conditional insert with an explicit duplicate signal
//! - Expiry policies on a document time field
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use strata_common::{BucketKey, CounterRow, Document, ReduceOp, Result};

// =============================================================================
// Storage Backend Trait
// =============================================================================

/// Pluggable storage backend interface.
///
/// Implementations must make every write safe under concurrent duplicate
/// invocation: increments compose, conditional inserts report duplicates
/// instead of overwriting.
#[async_trait]
pub trait StatStore: Send + Sync {
    /// Atomically create the counter at `key` or add `amount` to it.
    async fn upsert_increment(&self, collection: &str, key: &BucketKey, amount: f64) -> Result<()>;

    /// Atomically create the counter at `key` or raise it to `value`.
    async fn upsert_max(&self, collection: &str, key: &BucketKey, value: f64) -> Result<()>;

    /// Insert a counter only if nothing is stored at `key`.
    async fn insert_counter_if_absent(
        &self,
        collection: &str,
        key: &BucketKey,
        value: f64,
    ) -> Result<InsertOutcome>;

    /// Counter rows with `start <= key.time <= end`, ascending by key.
    async fn find_in_range(
        &self,
        collection: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CounterRow>>;

    /// Whether any counter row (any dimension) exists at bucket `time`.
    async fn exists_at_key(&self, collection: &str, time: NaiveDateTime) -> Result<bool>;

    /// Reduce `[start, end)` of the source collection, grouped by dimension,
    /// and merge the results into the target collection at `target_time`.
    /// Returns the number of rows written; zero for an empty window.
    async fn reduce(&self, request: &ReduceRequest) -> Result<usize>;

    /// Insert a document only if its key is free.
    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Document) -> Result<InsertOutcome>;

    /// Fetch a document by key.
    async fn find_document(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Append `item` to the array `field` of a document. Returns false if
    /// the document does not exist.
    async fn push_to_list(&self, collection: &str, key: &str, field: &str, item: Document) -> Result<bool>;

    /// Remove a document and return it, if present.
    async fn delete_and_return(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Number of keyed documents in a collection.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Append an unkeyed record (sink collections).
    async fn append_record(&self, collection: &str, doc: Document) -> Result<()>;

    /// Expire documents whose `time_field` is older than `ttl`.
    async fn create_expiry_policy(&self, collection: &str, time_field: &str, ttl: Duration) -> Result<()>;

    /// Drop every row, document and record of a collection.
    async fn drop_or_clear(&self, collection: &str) -> Result<()>;

    /// Get storage statistics.
    fn stats(&self) -> StoreStats;
}

// =============================================================================
// Request / Outcome Types
// =============================================================================

/// Parameters of a server-side reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceRequest {
    pub source: String,
    pub target: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub target_time: NaiveDateTime,
    pub op: ReduceOp,
}

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

// =============================================================================
// Storage Statistics
// =============================================================================

/// Statistics about storage usage and operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub collections: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub delete_ops: u64,
    pub reductions: u64,
    pub documents_expired: u64,
}
