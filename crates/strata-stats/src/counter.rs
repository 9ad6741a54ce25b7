//! Strata Counter Store
//!
//! Write path for plain, numeric, keyed and magnitude counters. Every write
//! lands in the finest configured interval of its stat; propagation to
//! coarser levels is left to the rollup engine, so a write is a single
//! storage round-trip.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::stat::StatDef;
use chrono::NaiveDateTime;
use strata_common::calendar;
use strata_common::{BucketKey, CounterKind, Result};
use strata_storage::StatContext;

// =============================================================================
// Counter Store
// =============================================================================

/// Write path for counter stats.
#[derive(Debug, Clone)]
pub struct CounterStore {
    ctx: StatContext,
}

impl CounterStore {
    pub fn new(ctx: StatContext) -> Self {
        Self { ctx }
    }

    /// Count one occurrence now.
    pub async fn record_event(&self, stat: &StatDef) -> Result<()> {
        self.record_event_at(stat, calendar::now()).await
    }

    /// Count one occurrence at `at`.
    pub async fn record_event_at(&self, stat: &StatDef, at: NaiveDateTime) -> Result<()> {
        let store = self.ctx.store()?;
        stat.ensure_kind(&[CounterKind::Plain, CounterKind::Numeric], "plain or numeric")?;

        let finest = stat.finest();
        let key = BucketKey::at(finest.floor(at));
        store.upsert_increment(&stat.collection(finest), &key, 1.0).await
    }

    /// Add `amount` now. Non-finite amounts are discarded.
    pub async fn record_numeric(&self, stat: &StatDef, amount: f64) -> Result<()> {
        self.record_numeric_at(stat, amount, calendar::now()).await
    }

    /// Add `amount` at `at`. Non-finite amounts are discarded.
    pub async fn record_numeric_at(&self, stat: &StatDef, amount: f64, at: NaiveDateTime) -> Result<()> {
        let store = self.ctx.store()?;
        stat.ensure_kind(&[CounterKind::Plain, CounterKind::Numeric], "plain or numeric")?;

        if !amount.is_finite() {
            tracing::debug!("Discarding non-finite amount {} for {}", amount, stat.name());
            return Ok(());
        }

        let finest = stat.finest();
        let key = BucketKey::at(finest.floor(at));
        store.upsert_increment(&stat.collection(finest), &key, amount).await
    }

    /// Add `amount` to the `dimension` breakdown now.
    pub async fn record_keyed(&self, stat: &StatDef, dimension: &str, amount: f64) -> Result<()> {
        self.record_keyed_at(stat, dimension, amount, calendar::now()).await
    }

    /// Add `amount` to the `dimension` breakdown at `at`.
    pub async fn record_keyed_at(
        &self,
        stat: &StatDef,
        dimension: &str,
        amount: f64,
        at: NaiveDateTime,
    ) -> Result<()> {
        let store = self.ctx.store()?;
        stat.ensure_kind(&[CounterKind::Keyed], "keyed")?;

        if !amount.is_finite() {
            tracing::debug!("Discarding non-finite amount {} for {}[{}]", amount, stat.name(), dimension);
            return Ok(());
        }

        let finest = stat.finest();
        let key = BucketKey::keyed(finest.floor(at), dimension);
        store.upsert_increment(&stat.collection(finest), &key, amount).await
    }

    /// Sample a level now.
    pub async fn record_magnitude(&self, stat: &StatDef, value: f64) -> Result<()> {
        self.record_magnitude_at(stat, value, calendar::now()).await
    }

    /// Sample a level at `at`. Samples in the same finest bucket keep the
    /// maximum, matching how magnitude buckets are rolled up.
    pub async fn record_magnitude_at(&self, stat: &StatDef, value: f64, at: NaiveDateTime) -> Result<()> {
        let store = self.ctx.store()?;
        stat.ensure_kind(&[CounterKind::Magnitude], "magnitude")?;

        if !value.is_finite() {
            return Ok(());
        }

        let finest = stat.finest();
        let key = BucketKey::at(finest.floor(at));
        store.upsert_max(&stat.collection(finest), &key, value).await
    }
}

// =============================================================================
// Tests
// =============================================================================
