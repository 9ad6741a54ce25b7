//! Strata Types - Core Data Types
//!
//! Fundamental data types shared by the storage contract and the rollup
//! engine: interval levels, interval ranges, counter kinds, bucket keys and
//! stored counter rows.
//!
//! Key Features:
//! - Totally ordered interval enumeration (SECOND..MONTH)
//! - Validated contiguous interval ranges
//! - Tagged counter kinds sharing one bucket-key and reduction strategy
//! - Serialization support via serde
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{Result, StrataError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schemaless document stored in session, scratch and sink collections.
pub type Document = serde_json::Value;

// =============================================================================
// Interval
// =============================================================================

/// One granularity level of the rollup hierarchy.
///
/// Declaration order is the rollup order: `Second < Minute < ... < Month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interval {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl Interval {
    /// All levels, finest first.
    pub const ALL: [Interval; 5] = [
        Interval::Second,
        Interval::Minute,
        Interval::Hour,
        Interval::Day,
        Interval::Month,
    ];

    /// Upper-case name used in physical collection names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
        }
    }

    /// The next finer level, if any.
    pub fn finer(&self) -> Option<Interval> {
        match self {
            Self::Second => None,
            Self::Minute => Some(Self::Second),
            Self::Hour => Some(Self::Minute),
            Self::Day => Some(Self::Hour),
            Self::Month => Some(Self::Day),
        }
    }

    /// The next coarser level, if any.
    pub fn coarser(&self) -> Option<Interval> {
        match self {
            Self::Second => Some(Self::Minute),
            Self::Minute => Some(Self::Hour),
            Self::Hour => Some(Self::Day),
            Self::Day => Some(Self::Month),
            Self::Month => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interval {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECOND" => Ok(Self::Second),
            "MINUTE" => Ok(Self::Minute),
            "HOUR" => Ok(Self::Hour),
            "DAY" => Ok(Self::Day),
            "MONTH" => Ok(Self::Month),
            other => Err(StrataError::Configuration(format!(
                "unknown interval: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Interval Range
// =============================================================================

/// A non-empty contiguous range `[min, max]` of interval levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRange {
    min: Interval,
    max: Interval,
}

impl IntervalRange {
    /// Create a range, rejecting `min > max` (an empty range).
    pub fn new(min: Interval, max: Interval) -> Result<Self> {
        if min > max {
            return Err(StrataError::Configuration(format!(
                "there are no intervals between {} and {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// The finest tracked level; all writes land here.
    pub fn finest(&self) -> Interval {
        self.min
    }

    pub fn coarsest(&self) -> Interval {
        self.max
    }

    pub fn contains(&self, interval: Interval) -> bool {
        interval >= self.min && interval <= self.max
    }

    /// Tracked levels above the finest, finest first.
    pub fn coarser_levels(&self) -> Vec<Interval> {
        Interval::ALL
            .iter()
            .copied()
            .filter(|i| *i > self.min && *i <= self.max)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.max as usize - self.min as usize + 1
    }

    /// A validated range holds at least one level.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for IntervalRange {
    fn default() -> Self {
        Self {
            min: Interval::Minute,
            max: Interval::Month,
        }
    }
}

// =============================================================================
// Counter Kind
// =============================================================================

/// Counter flavors. All share the bucket key layout; they differ only in
/// which write operation feeds them and how buckets are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// Occurrence counter, +1 per event.
    #[default]
    Plain,
    /// Accumulates finite numeric amounts.
    Numeric,
    /// Accumulates amounts per dimension key.
    Keyed,
    /// Sampled level (e.g. concurrent sessions), reduced with max.
    Magnitude,
}

impl CounterKind {
    /// Reduction applied when promoting buckets of this kind.
    pub fn reduction(&self) -> ReduceOp {
        match self {
            Self::Magnitude => ReduceOp::Max,
            Self::Plain | Self::Numeric | Self::Keyed => ReduceOp::Sum,
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::Keyed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Numeric => "numeric",
            Self::Keyed => "keyed",
            Self::Magnitude => "magnitude",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Reduce Operation
// =============================================================================

/// Reduction used to fold finer buckets into a coarser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceOp {
    Sum,
    Max,
}

impl ReduceOp {
    /// Fold a set of values. `None` for an empty input.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        Some(match self {
            Self::Sum => values.iter().sum(),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

// =============================================================================
// Bucket Key
// =============================================================================

/// Identity of one accumulated value: the floored bucket start plus an
/// optional dimension key for keyed counters.
///
/// Ordering is by time first, so a range scan returns rows grouped by
/// bucket with the dimension-less row first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub time: NaiveDateTime,
    pub dimension: Option<String>,
}

impl BucketKey {
    pub fn at(time: NaiveDateTime) -> Self {
        Self {
            time,
            dimension: None,
        }
    }

    pub fn keyed(time: NaiveDateTime, dimension: impl Into<String>) -> Self {
        Self {
            time,
            dimension: Some(dimension.into()),
        }
    }
}

/// A stored counter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterRow {
    pub key: BucketKey,
    pub value: f64,
}

impl CounterRow {
    pub fn new(key: BucketKey, value: f64) -> Self {
        Self { key, value }
    }
}

// =============================================================================
// Tests
// =============================================================================
