//! Strata Rollup Engine
//!
//! Promotes each level's buckets into the next coarser level. For every
//! level above the finest, the previous completed window is reduced from
//! the finer level (sum, or max for magnitude stats) and written once.
//!
//! Promotion is idempotent: a window that already holds a value at its
//! start is skipped, and an empty window is written as an explicit zero.
//! Missed calls across a whole window are not backfilled.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::stat::StatDef;
use chrono::NaiveDateTime;
use strata_common::calendar;
use strata_common::{BucketKey, Interval, Result};
use strata_storage::{ReduceRequest, StatContext};

// =============================================================================
// Promotion Report
// =============================================================================

/// What happened to one level during a promotion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The window was already promoted.
    Skipped,
    /// Reduced rows were written (one per dimension).
    Promoted { rows: usize },
    /// The finer window was empty; a zero was written.
    ZeroFilled,
}

/// Per-level outcome of a promotion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPromotion {
    pub interval: Interval,
    pub window_start: NaiveDateTime,
    pub outcome: PromotionOutcome,
}

/// Result of promoting one stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    pub stat: String,
    pub levels: Vec<LevelPromotion>,
}

impl PromotionReport {
    fn new(stat: &str) -> Self {
        Self {
            stat: stat.to_string(),
            levels: Vec::new(),
        }
    }

    /// Outcome for one level, if it was visited.
    pub fn outcome(&self, interval: Interval) -> Option<PromotionOutcome> {
        self.levels
            .iter()
            .find(|l| l.interval == interval)
            .map(|l| l.outcome)
    }

    /// Number of levels that wrote a value (promoted or zero-filled).
    pub fn written(&self) -> usize {
        self.levels
            .iter()
            .filter(|l| l.outcome != PromotionOutcome::Skipped)
            .count()
    }
}

// =============================================================================
// Rollup Engine
// =============================================================================

/// Interval promotion for counter stats.
#[derive(Debug, Clone)]
pub struct RollupEngine {
    ctx: StatContext,
}

impl RollupEngine {
    pub fn new(ctx: StatContext) -> Self {
        Self { ctx }
    }

    /// Promote every coarser level of `stat` relative to now.
    ///
    /// Call at least once per window of the second-finest level.
    pub async fn promote(&self, stat: &StatDef) -> Result<PromotionReport> {
        self.promote_at(stat, calendar::now()).await
    }

    /// Promote every coarser level of `stat` relative to `now`, finest
    /// first, so a coarse window closing on the same tick sees the last
    /// finer window already promoted.
    pub async fn promote_at(&self, stat: &StatDef, now: NaiveDateTime) -> Result<PromotionReport> {
        let store = self.ctx.store()?;
        let mut report = PromotionReport::new(stat.name());

        for level in stat.intervals().coarser_levels() {
            let Some(finer) = level.finer() else {
                continue;
            };

            let (window_start, window_end) = level.previous_window(now)?;
            let target = stat.collection(level);

            let outcome = if store.exists_at_key(&target, window_start).await? {
                PromotionOutcome::Skipped
            } else {
                let request = ReduceRequest {
                    source: stat.collection(finer),
                    target: target.clone(),
                    start: window_start,
                    end: window_end,
                    target_time: window_start,
                    op: stat.kind().reduction(),
                };

                let rows = store.reduce(&request).await?;
                if rows == 0 {
                    store
                        .insert_counter_if_absent(&target, &BucketKey::at(window_start), 0.0)
                        .await?;
                    PromotionOutcome::ZeroFilled
                } else {
                    PromotionOutcome::Promoted { rows }
                }
            };

            match outcome {
                PromotionOutcome::Promoted { rows } => {
                    tracing::info!("Promoted {} rows into {} at {}", rows, target, window_start);
                }
                PromotionOutcome::ZeroFilled => {
                    tracing::debug!("Zero-filled {} at {}", target, window_start);
                }
                PromotionOutcome::Skipped => {}
            }

            report.levels.push(LevelPromotion {
                interval: level,
                window_start,
                outcome,
            });
        }

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================
