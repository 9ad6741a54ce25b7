//! Strata Data View
//!
//! Reconstructs a dense, gap-filled series from the sparse rows stored for
//! one level of a stat. The calendar walk starts one step before the
//! floored start and runs through the end (inclusive); stored rows are
//! merged in a single pass without backtracking.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::stat::StatDef;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use strata_common::{CounterRow, Interval, Result};
use strata_storage::StatContext;

// =============================================================================
// View Types
// =============================================================================

/// Value of one bucket in a dense view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BucketValue {
    Scalar(f64),
    Keyed(BTreeMap<String, f64>),
}

impl BucketValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Keyed(_) => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            Self::Keyed(map) => Some(map),
            Self::Scalar(_) => None,
        }
    }

    /// True for a zero scalar or an empty mapping.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(v) => *v == 0.0,
            Self::Keyed(map) => map.is_empty(),
        }
    }
}

/// One calendar step of a dense view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewBucket {
    pub key: NaiveDateTime,
    pub value: BucketValue,
}

/// Dense series for one stat level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataView {
    pub stat: String,
    pub interval: Interval,
    pub buckets: Vec<ViewBucket>,
}

impl DataView {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewBucket> {
        self.buckets.iter()
    }

    /// Bucket keys, in order.
    pub fn keys(&self) -> Vec<NaiveDateTime> {
        self.buckets.iter().map(|b| b.key).collect()
    }

    /// Bucket values, in key order.
    pub fn values(&self) -> Vec<BucketValue> {
        self.buckets.iter().map(|b| b.value.clone()).collect()
    }

    /// The bucket at `key`, if it is part of the view.
    pub fn get(&self, key: NaiveDateTime) -> Option<&BucketValue> {
        self.buckets.iter().find(|b| b.key == key).map(|b| &b.value)
    }
}

// =============================================================================
// Data View Reader
// =============================================================================

/// Read path producing dense views.
#[derive(Debug, Clone)]
pub struct DataViewReader {
    ctx: StatContext,
}

impl DataViewReader {
    pub fn new(ctx: StatContext) -> Self {
        Self { ctx }
    }

    /// Dense view of `stat` at `interval` over `[prev(floor(start)), end]`.
    pub async fn query(
        &self,
        stat: &StatDef,
        interval: Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<DataView> {
        let store = self.ctx.store()?;
        stat.ensure_tracks(interval)?;

        let first = interval.prev(interval.floor(start))?;
        let rows = store
            .find_in_range(&stat.collection(interval), first, end)
            .await?;

        let buckets = merge_dense(interval, first, end, rows, stat.kind().is_keyed())?;
        tracing::debug!("Built {} buckets for {} at {}", buckets.len(), stat.name(), interval);

        Ok(DataView {
            stat: stat.name().to_string(),
            interval,
            buckets,
        })
    }
}

/// Walk the calendar from `first` through `end`, consuming stored rows
/// whose key equals the current step. Rows off the calendar grid are
/// skipped. Keyed rows sharing a step are gathered into one mapping; the
/// dimension-less zero-fill row contributes nothing to a mapping.
fn merge_dense(
    interval: Interval,
    first: NaiveDateTime,
    end: NaiveDateTime,
    rows: Vec<CounterRow>,
    keyed: bool,
) -> Result<Vec<ViewBucket>> {
    let mut rows = rows.into_iter().peekable();
    let mut buckets = Vec::new();
    let mut step = first;

    loop {
        while rows.next_if(|row| row.key.time < step).is_some() {}

        let value = if keyed {
            let mut map = BTreeMap::new();
            while let Some(row) = rows.next_if(|row| row.key.time == step) {
                if let Some(dimension) = row.key.dimension {
                    *map.entry(dimension).or_insert(0.0) += row.value;
                }
            }
            BucketValue::Keyed(map)
        } else {
            let mut total = 0.0;
            while let Some(row) = rows.next_if(|row| row.key.time == step) {
                total += row.value;
            }
            BucketValue::Scalar(total)
        };

        buckets.push(ViewBucket { key: step, value });

        step = interval.next(step)?;
        if step > end {
            break;
        }
    }

    Ok(buckets)
}

// =============================================================================
// Tests
// =============================================================================
