//! Strata Session Tracker
//!
//! Session lifecycle on top of the counter and rollup paths. A session is
//! absent or active; `on_start` opens it, `on_end` closes it and emits its
//! duration, and custom events recorded in between are kept in order.
//!
//! Key Features:
//! - Start/end pairing with forced restart on duplicate start
//! - Duration and custom event sinks for completed sessions
//! - Concurrent session magnitude sampled on every tick (max rollup)
//! - Distinct ids started per window (unique tracking)
//! - Optional time-to-live for abandoned sessions
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::counter::CounterStore;
use crate::rollup::{PromotionReport, RollupEngine};
use crate::stat::StatDef;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strata_common::calendar;
use strata_common::naming::{session_collection, unique_collection};
use strata_common::{
    BucketKey, CounterKind, Document, Interval, IntervalRange, Result, SessionConfig, StrataError,
};
use strata_storage::{InsertOutcome, StatContext};

/// Field of the session document carrying its creation time; expiry
/// policies are installed on it.
const CREATED_FIELD: &str = "created";
const EVENTS_FIELD: &str = "events";

/// A duplicate start is resolved by ending the stale session and retrying
/// once.
const MAX_RESTARTS: usize = 1;

// =============================================================================
// Session Documents
// =============================================================================

/// Stored form of an active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionDocument {
    created: NaiveDateTime,
    #[serde(default)]
    events: Vec<SessionEvent>,
}

#[derive(Debug, Deserialize)]
struct SessionHeader {
    created: NaiveDateTime,
}

/// A custom sub-event recorded during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "event")]
    pub name: String,
    /// Seconds since the session started, minus the caller's offset.
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Document>,
}

#[derive(Debug, Serialize)]
struct DurationRecord {
    duration: f64,
    #[serde(rename = "endTime")]
    end_time: NaiveDateTime,
}

#[derive(Debug, Serialize)]
struct TrackingRecord<'a> {
    lifetime: f64,
    #[serde(rename = "endTime")]
    end_time: NaiveDateTime,
    events: &'a [SessionEvent],
}

// =============================================================================
// Outcomes
// =============================================================================

/// A session that was closed by `on_end` (or by a forced restart).
#[derive(Debug, Clone, PartialEq)]
pub struct EndedSession {
    pub id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_secs: f64,
    pub events: Vec<SessionEvent>,
}

/// Result of `on_start`.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started,
    /// A session with the same id was active; it was ended first.
    Restarted(EndedSession),
}

/// Unique-id count written when a tracked window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueCount {
    pub interval: Interval,
    pub window_start: NaiveDateTime,
    pub count: u64,
}

/// What one `tick` did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub promotions: Vec<PromotionReport>,
    pub magnitude: Option<u64>,
    pub unique_counts: Vec<UniqueCount>,
}

// =============================================================================
// Session Tracker
// =============================================================================

/// Session lifecycle tracker for one named session stat.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    ctx: StatContext,
    name: String,
    intervals: IntervalRange,
    start_event: Option<StatDef>,
    end_event: Option<StatDef>,
    magnitude_event: Option<StatDef>,
    unique_start_event: Option<StatDef>,
    duration_sink: Option<String>,
    event_tracking_sink: Option<String>,
    counters: CounterStore,
    rollup: RollupEngine,
}

impl SessionTracker {
    /// Build a tracker from configuration. Installs the session expiry
    /// policy when one is configured, which requires an attached backend.
    pub async fn open(ctx: StatContext, config: &SessionConfig) -> Result<Self> {
        let intervals = config.interval_range()?;
        let derived = |name: &Option<String>, kind: CounterKind| {
            name.as_ref()
                .map(|n| StatDef::new(n.clone(), kind, intervals))
        };

        let tracker = Self {
            name: config.name.clone(),
            intervals,
            start_event: derived(&config.start_event, CounterKind::Plain),
            end_event: derived(&config.end_event, CounterKind::Plain),
            magnitude_event: derived(&config.magnitude_event, CounterKind::Magnitude),
            unique_start_event: derived(&config.unique_start_event, CounterKind::Plain),
            duration_sink: config.duration_sink.clone(),
            event_tracking_sink: config.event_tracking_sink.clone(),
            counters: CounterStore::new(ctx.clone()),
            rollup: RollupEngine::new(ctx.clone()),
            ctx,
        };

        // Zero means no expiry.
        if let Some(seconds) = config.expire_after_seconds.filter(|s| *s > 0) {
            let ttl = i64::try_from(seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(|| {
                    StrataError::Configuration(format!("expiry of {}s is out of range", seconds))
                })?;
            let store = tracker.ctx.store()?;
            store
                .create_expiry_policy(&tracker.session_collection(), CREATED_FIELD, ttl)
                .await?;
        }

        Ok(tracker)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intervals(&self) -> IntervalRange {
        self.intervals
    }

    /// Every counter stat derived from this tracker.
    pub fn derived_stats(&self) -> impl Iterator<Item = &StatDef> {
        [
            &self.start_event,
            &self.end_event,
            &self.magnitude_event,
            &self.unique_start_event,
        ]
        .into_iter()
        .flatten()
    }

    fn session_collection(&self) -> String {
        session_collection(&self.name)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub async fn on_start(&self, id: &str) -> Result<StartOutcome> {
        self.on_start_at(id, calendar::now()).await
    }

    /// Open a session for `id`. An already-active session with the same id
    /// is ended first (with all `on_end` side effects) and the start is
    /// retried once.
    pub async fn on_start_at(&self, id: &str, now: NaiveDateTime) -> Result<StartOutcome> {
        let store = self.ctx.store()?;
        let collection = self.session_collection();
        let mut restarted = None;

        for attempt in 0..=MAX_RESTARTS {
            let doc = serde_json::to_value(SessionDocument {
                created: now,
                events: Vec::new(),
            })?;

            match store.insert_if_absent(&collection, id, doc).await? {
                InsertOutcome::Inserted => {
                    self.mark_started(id, now).await?;
                    return Ok(match restarted {
                        Some(ended) => StartOutcome::Restarted(ended),
                        None => StartOutcome::Started,
                    });
                }
                InsertOutcome::Duplicate if attempt < MAX_RESTARTS => {
                    tracing::info!("Session {} already active in {}, restarting", id, collection);
                    restarted = self.on_end_at(id, now).await?;
                }
                InsertOutcome::Duplicate => {}
            }
        }

        tracing::warn!("Session {} in {} still conflicting after restart", id, collection);
        Err(StrataError::SessionConflict(id.to_string()))
    }

    async fn mark_started(&self, id: &str, now: NaiveDateTime) -> Result<()> {
        if self.unique_start_event.is_some() {
            let store = self.ctx.store()?;
            for level in self.intervals.coarser_levels() {
                let seen = serde_json::json!({});
                store
                    .insert_if_absent(&unique_collection(&self.name, level), id, seen)
                    .await?;
            }
        }

        if let Some(stat) = &self.start_event {
            self.counters.record_event_at(stat, now).await?;
        }
        Ok(())
    }

    pub async fn on_end(&self, id: &str) -> Result<Option<EndedSession>> {
        self.on_end_at(id, calendar::now()).await
    }

    /// Close the session for `id`. Returns `None` when no session was
    /// active; ending twice or ending without a start is not an error.
    pub async fn on_end_at(&self, id: &str, now: NaiveDateTime) -> Result<Option<EndedSession>> {
        let store = self.ctx.store()?;
        let Some(doc) = store.delete_and_return(&self.session_collection(), id).await? else {
            tracing::debug!("No active session {} in {}", id, self.name);
            return Ok(None);
        };
        let session: SessionDocument = serde_json::from_value(doc)?;

        if let Some(stat) = &self.end_event {
            self.counters.record_event_at(stat, now).await?;
        }

        let duration_secs = seconds_between(session.created, now);

        if let Some(sink) = &self.duration_sink {
            let record = DurationRecord {
                duration: duration_secs,
                end_time: now,
            };
            store.append_record(sink, serde_json::to_value(record)?).await?;
        }

        if let Some(sink) = &self.event_tracking_sink {
            if !session.events.is_empty() {
                let record = TrackingRecord {
                    lifetime: duration_secs,
                    end_time: now,
                    events: &session.events,
                };
                store.append_record(sink, serde_json::to_value(record)?).await?;
            }
        }

        Ok(Some(EndedSession {
            id: id.to_string(),
            started_at: session.created,
            ended_at: now,
            duration_secs,
            events: session.events,
        }))
    }

    pub async fn on_custom_event(
        &self,
        id: &str,
        name: &str,
        extra_info: Option<Document>,
        time_offset: f64,
    ) -> Result<bool> {
        self.on_custom_event_at(id, name, extra_info, time_offset, calendar::now())
            .await
    }

    /// Append a custom event to the active session `id`, timed relative to
    /// its start minus `time_offset` seconds. Returns false when no session
    /// is active.
    pub async fn on_custom_event_at(
        &self,
        id: &str,
        name: &str,
        extra_info: Option<Document>,
        time_offset: f64,
        now: NaiveDateTime,
    ) -> Result<bool> {
        let store = self.ctx.store()?;
        let collection = self.session_collection();

        let Some(doc) = store.find_document(&collection, id).await? else {
            return Ok(false);
        };
        let header: SessionHeader = serde_json::from_value(doc)?;

        let event = SessionEvent {
            name: name.to_string(),
            time: seconds_between(header.created, now) - time_offset,
            data: extra_info,
        };
        store
            .push_to_list(&collection, id, EVENTS_FIELD, serde_json::to_value(event)?)
            .await
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Number of currently active sessions.
    pub async fn active_count(&self) -> Result<u64> {
        let store = self.ctx.store()?;
        store.count(&self.session_collection()).await
    }

    pub async fn is_active(&self, id: &str) -> Result<bool> {
        let store = self.ctx.store()?;
        Ok(store
            .find_document(&self.session_collection(), id)
            .await?
            .is_some())
    }

    /// Custom events recorded so far for an active session.
    pub async fn events(&self, id: &str) -> Result<Option<Vec<SessionEvent>>> {
        let store = self.ctx.store()?;
        match store.find_document(&self.session_collection(), id).await? {
            Some(doc) => {
                let session: SessionDocument = serde_json::from_value(doc)?;
                Ok(Some(session.events))
            }
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Periodic Work
    // -------------------------------------------------------------------------

    pub async fn tick(&self) -> Result<TickReport> {
        self.tick_at(calendar::now()).await
    }

    /// Periodic maintenance; drive at least as often as the finest interval.
    pub async fn tick_at(&self, now: NaiveDateTime) -> Result<TickReport> {
        let store = self.ctx.store()?;
        let mut report = TickReport::default();

        for stat in [&self.start_event, &self.end_event].into_iter().flatten() {
            report.promotions.push(self.rollup.promote_at(stat, now).await?);
        }

        if let Some(stat) = &self.magnitude_event {
            let active = store.count(&self.session_collection()).await?;
            self.counters
                .record_magnitude_at(stat, active as f64, now)
                .await?;
            report.magnitude = Some(active);
            report.promotions.push(self.rollup.promote_at(stat, now).await?);
        }

        if let Some(stat) = &self.unique_start_event {
            report.unique_counts = self.drain_unique(stat, now).await?;
        }

        Ok(report)
    }

    /// Count the id set of every tracked level whose window boundary falls
    /// in the current finest window, then clear it. The count lands at the
    /// start of the window that just closed; a window that already has a
    /// count is left alone, so repeated ticks inside the boundary window
    /// fire once.
    async fn drain_unique(&self, stat: &StatDef, now: NaiveDateTime) -> Result<Vec<UniqueCount>> {
        let store = self.ctx.store()?;
        let finest_now = self.intervals.finest().floor(now);
        let mut counts = Vec::new();

        for level in self.intervals.coarser_levels() {
            let boundary = level.floor(now);
            if boundary != finest_now {
                continue;
            }

            let window_start = level.prev(boundary)?;
            let target = stat.collection(level);
            if store.exists_at_key(&target, window_start).await? {
                continue;
            }

            let scratch = unique_collection(&self.name, level);
            let count = store.count(&scratch).await?;

            // The set is cleared only once its count is stored.
            let outcome = store
                .insert_counter_if_absent(&target, &BucketKey::at(window_start), count as f64)
                .await?;
            if outcome == InsertOutcome::Inserted {
                store.drop_or_clear(&scratch).await?;
                tracing::info!("Counted {} unique ids into {} at {}", count, target, window_start);
                counts.push(UniqueCount {
                    interval: level,
                    window_start,
                    count,
                });
            }
        }

        Ok(counts)
    }
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

// =============================================================================
// Tests
// =============================================================================
