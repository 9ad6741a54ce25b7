//! Strata Memory Backend
//!
//! In-memory storage backend for testing and development. Every operation
//! runs under a single collection-map lock, which gives the same atomicity
//! the contract asks of a real backend (increment, conditional insert,
//! reduce-and-merge).
//!
//! Expiry policies are enforced by `purge_expired`, the equivalent of a
//! backend's periodic TTL sweep. Nothing is expired implicitly on access.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::backend::{InsertOutcome, ReduceRequest, StatStore, StoreStats};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use strata_common::{BucketKey, CounterRow, Document, Result, StrataError};

// =============================================================================
// Memory Collection
// =============================================================================

#[derive(Debug, Clone)]
struct ExpiryPolicy {
    time_field: String,
    ttl: Duration,
}

/// One named collection. A collection may hold counter rows, keyed
/// documents and unkeyed records at the same time.
#[derive(Debug, Default)]
struct MemoryCollection {
    counters: BTreeMap<BucketKey, f64>,
    documents: BTreeMap<String, Document>,
    records: Vec<Document>,
    expiry: Option<ExpiryPolicy>,
}

impl MemoryCollection {
    fn rows_in_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<CounterRow> {
        self.counters
            .range(BucketKey::at(start)..)
            .take_while(|(key, _)| key.time <= end)
            .map(|(key, value)| CounterRow::new(key.clone(), *value))
            .collect()
    }

    fn has_bucket(&self, time: NaiveDateTime) -> bool {
        self.counters
            .range(BucketKey::at(time)..)
            .next()
            .is_some_and(|(key, _)| key.time == time)
    }

    fn purge_expired(&mut self, now: NaiveDateTime) -> usize {
        let Some(policy) = self.expiry.clone() else {
            return 0;
        };

        let before = self.documents.len();
        self.documents.retain(|_, doc| {
            let created = doc
                .get(&policy.time_field)
                .cloned()
                .and_then(|v| serde_json::from_value::<NaiveDateTime>(v).ok());
            // A deadline past the calendar's range never expires.
            match created {
                Some(created) => created
                    .checked_add_signed(policy.ttl)
                    .map_or(true, |deadline| deadline > now),
                None => true,
            }
        });
        before - self.documents.len()
    }
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-memory storage backend for testing and development.
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    stats: RwLock<StoreStats>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            stats: RwLock::new(StoreStats::default()),
        }
    }

    /// Remove documents past their collection's expiry policy.
    pub fn purge_expired(&self, now: NaiveDateTime) -> usize {
        let mut collections = self.collections.write();
        let removed: usize = collections
            .values_mut()
            .map(|c| c.purge_expired(now))
            .sum();

        if removed > 0 {
            tracing::debug!("Expired {} documents", removed);
            self.stats.write().documents_expired += removed as u64;
        }
        removed
    }

    /// All counter rows of a collection, ascending by key.
    pub fn counter_rows(&self, collection: &str) -> Vec<CounterRow> {
        self.collections
            .read()
            .get(collection)
            .map(|c| {
                c.counters
                    .iter()
                    .map(|(key, value)| CounterRow::new(key.clone(), *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Counter value at an exact key.
    pub fn counter_value(&self, collection: &str, key: &BucketKey) -> Option<f64> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.counters.get(key).copied())
    }

    /// Unkeyed records appended to a collection, in insertion order.
    pub fn records(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }

    /// Names of all collections created so far.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn record_read(&self) {
        self.stats.write().read_ops += 1;
    }

    fn record_write(&self) {
        self.stats.write().write_ops += 1;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatStore for MemoryBackend {
    async fn upsert_increment(&self, collection: &str, key: &BucketKey, amount: f64) -> Result<()> {
        {
            let mut collections = self.collections.write();
            let coll = collections.entry(collection.to_string()).or_default();
            *coll.counters.entry(key.clone()).or_insert(0.0) += amount;
        }
        self.record_write();
        Ok(())
    }

    async fn upsert_max(&self, collection: &str, key: &BucketKey, value: f64) -> Result<()> {
        {
            let mut collections = self.collections.write();
            let coll = collections.entry(collection.to_string()).or_default();
            coll.counters
                .entry(key.clone())
                .and_modify(|current| *current = current.max(value))
                .or_insert(value);
        }
        self.record_write();
        Ok(())
    }

    async fn insert_counter_if_absent(
        &self,
        collection: &str,
        key: &BucketKey,
        value: f64,
    ) -> Result<InsertOutcome> {
        let outcome = {
            let mut collections = self.collections.write();
            let coll = collections.entry(collection.to_string()).or_default();
            if coll.counters.contains_key(key) {
                InsertOutcome::Duplicate
            } else {
                coll.counters.insert(key.clone(), value);
                InsertOutcome::Inserted
            }
        };
        self.record_write();
        Ok(outcome)
    }

    async fn find_in_range(
        &self,
        collection: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CounterRow>> {
        let rows = self
            .collections
            .read()
            .get(collection)
            .map(|c| c.rows_in_range(start, end))
            .unwrap_or_default();
        self.record_read();
        Ok(rows)
    }

    async fn exists_at_key(&self, collection: &str, time: NaiveDateTime) -> Result<bool> {
        let exists = self
            .collections
            .read()
            .get(collection)
            .is_some_and(|c| c.has_bucket(time));
        self.record_read();
        Ok(exists)
    }

    async fn reduce(&self, request: &ReduceRequest) -> Result<usize> {
        let mut collections = self.collections.write();

        let mut groups: BTreeMap<Option<String>, Vec<f64>> = BTreeMap::new();
        if let Some(source) = collections.get(&request.source) {
            for (key, value) in source
                .counters
                .range(BucketKey::at(request.start)..)
                .take_while(|(key, _)| key.time < request.end)
            {
                groups.entry(key.dimension.clone()).or_default().push(*value);
            }
        }

        let target = collections.entry(request.target.clone()).or_default();
        let mut written = 0;
        for (dimension, values) in groups {
            if let Some(value) = request.op.apply(&values) {
                let key = BucketKey {
                    time: request.target_time,
                    dimension,
                };
                target.counters.insert(key, value);
                written += 1;
            }
        }
        drop(collections);

        let mut stats = self.stats.write();
        stats.reductions += 1;
        stats.write_ops += written as u64;
        Ok(written)
    }

    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Document) -> Result<InsertOutcome> {
        let outcome = {
            let mut collections = self.collections.write();
            let coll = collections.entry(collection.to_string()).or_default();
            if coll.documents.contains_key(key) {
                InsertOutcome::Duplicate
            } else {
                coll.documents.insert(key.to_string(), doc);
                InsertOutcome::Inserted
            }
        };
        self.record_write();
        Ok(outcome)
    }

    async fn find_document(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let doc = self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.documents.get(key).cloned());
        self.record_read();
        Ok(doc)
    }

    async fn push_to_list(&self, collection: &str, key: &str, field: &str, item: Document) -> Result<bool> {
        let mut collections = self.collections.write();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|c| c.documents.get_mut(key))
        else {
            return Ok(false);
        };

        let Some(object) = doc.as_object_mut() else {
            return Err(StrataError::Storage(format!(
                "document {} in {} is not an object",
                key, collection
            )));
        };

        let list = object
            .entry(field.to_string())
            .or_insert_with(|| Document::Array(Vec::new()));
        match list.as_array_mut() {
            Some(items) => items.push(item),
            None => {
                return Err(StrataError::Storage(format!(
                    "field {} of {} in {} is not an array",
                    field, key, collection
                )))
            }
        }
        drop(collections);

        self.record_write();
        Ok(true)
    }

    async fn delete_and_return(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|c| c.documents.remove(key));
        if removed.is_some() {
            self.stats.write().delete_ops += 1;
        }
        Ok(removed)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count = self
            .collections
            .read()
            .get(collection)
            .map(|c| c.documents.len() as u64)
            .unwrap_or(0);
        self.record_read();
        Ok(count)
    }

    async fn append_record(&self, collection: &str, doc: Document) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .records
            .push(doc);
        self.record_write();
        Ok(())
    }

    async fn create_expiry_policy(&self, collection: &str, time_field: &str, ttl: Duration) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .expiry = Some(ExpiryPolicy {
            time_field: time_field.to_string(),
            ttl,
        });
        tracing::debug!("Expiry policy on {}.{}: {}s", collection, time_field, ttl.num_seconds());
        Ok(())
    }

    async fn drop_or_clear(&self, collection: &str) -> Result<()> {
        if self.collections.write().remove(collection).is_some() {
            self.stats.write().delete_ops += 1;
        }
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        let mut stats = self.stats.read().clone();
        stats.collections = self.collections.read().len() as u64;
        stats
    }
}

// =============================================================================
// Tests
// =============================================================================
