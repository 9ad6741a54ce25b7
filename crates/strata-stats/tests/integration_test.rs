//! End-to-end integration tests for Strata Stats
//!
//! Drives the counter, rollup, view and session paths together against the
//! in-memory backend, the way a producer plus a periodic driver would.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use strata_common::{BucketKey, CounterKind, Interval, StrataConfig, StrataError};
use strata_stats::{
    BucketValue, CounterStore, DataViewReader, PromotionOutcome, RollupEngine, StartOutcome,
    StatDef, StatRegistry,
};
use strata_storage::{MemoryBackend, StatContext, StatStore};

/// Initialize test logging once; honours RUST_LOG.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .with_test_writer()
        .try_init();
}

fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, d)
        .and_then(|date| date.and_hms_opt(h, m, s))
        .expect("valid test timestamp")
}

struct Harness {
    backend: Arc<MemoryBackend>,
    counters: CounterStore,
    rollup: RollupEngine,
    views: DataViewReader,
}

fn harness() -> Harness {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    let ctx = StatContext::with_store(backend.clone());
    Harness {
        backend,
        counters: CounterStore::new(ctx.clone()),
        rollup: RollupEngine::new(ctx.clone()),
        views: DataViewReader::new(ctx),
    }
}

const CONFIG: &str = r#"
    [[stats]]
    name = "test"

    [[stats]]
    name = "num1"
    kind = "numeric"
    min_interval = "SECOND"
    max_interval = "HOUR"

    [[stats]]
    name = "num2"
    kind = "keyed"

    [[sessions]]
    name = "users"
    start_event = "login"
    end_event = "logout"
    magnitude_event = "CCU"
    unique_start_event = "DAU"
    duration_sink = "sessionLength"
    event_tracking_sink = "sessionEvents"
    min_interval = "MINUTE"
    max_interval = "DAY"
    expire_after_seconds = 3600
"#;

// =============================================================================
// Counters, Rollup and Views
// =============================================================================

#[tokio::test]
async fn test_record_promote_and_query_hierarchy() {
    let h = harness();
    let stat = StatDef::with_levels("num1", CounterKind::Numeric, Interval::Second, Interval::Hour)
        .expect("valid stat");

    for (m, s, amount) in [(10, 5, 10.0), (10, 5, 20.0), (10, 40, -100.0), (11, 0, 3.0)] {
        h.counters
            .record_numeric_at(&stat, amount, at(5, 9, m, s))
            .await
            .expect("record should succeed");
    }

    // One tick per minute, as a driver would.
    for m in 10..=60 {
        let now = at(5, 9, 0, 1) + Duration::minutes(m);
        h.rollup.promote_at(&stat, now).await.expect("promote should succeed");
    }

    let minutes = h
        .views
        .query(&stat, Interval::Minute, at(5, 9, 10, 0), at(5, 9, 12, 0))
        .await
        .expect("query should succeed");
    let values: Vec<_> = minutes.values().iter().filter_map(BucketValue::as_scalar).collect();
    assert_eq!(values, vec![0.0, -70.0, 3.0, 0.0]);

    assert_eq!(
        h.backend.counter_value("num1_HOUR", &BucketKey::at(at(5, 9, 0, 0))),
        Some(-67.0)
    );
}

#[tokio::test]
async fn test_rollup_idempotence() {
    let h = harness();
    let stat = StatDef::plain("test");
    h.counters.record_event_at(&stat, at(5, 21, 26, 0)).await.expect("record should succeed");

    let first = h.rollup.promote_at(&stat, at(5, 22, 0, 5)).await.expect("promote should succeed");
    let once = h.backend.counter_rows("test_HOUR");

    let second = h.rollup.promote_at(&stat, at(5, 22, 0, 6)).await.expect("promote should succeed");
    let twice = h.backend.counter_rows("test_HOUR");

    assert_eq!(first.outcome(Interval::Hour), Some(PromotionOutcome::Promoted { rows: 1 }));
    assert_eq!(second.outcome(Interval::Hour), Some(PromotionOutcome::Skipped));
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_concurrent_promotion_writes_once() {
    let h = harness();
    let stat = StatDef::plain("test");
    h.counters.record_event_at(&stat, at(5, 21, 10, 0)).await.expect("record should succeed");
    h.counters.record_event_at(&stat, at(5, 21, 20, 0)).await.expect("record should succeed");

    let rollup = Arc::new(h.rollup.clone());
    let stat = Arc::new(stat);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rollup = rollup.clone();
            let stat = stat.clone();
            tokio::spawn(async move { rollup.promote_at(&stat, at(5, 22, 0, 0)).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task should join").expect("promote should succeed");
    }

    assert_eq!(
        h.backend.counter_value("test_HOUR", &BucketKey::at(at(5, 21, 0, 0))),
        Some(2.0)
    );
}

#[tokio::test]
async fn test_zero_fill() {
    let h = harness();
    let stat = StatDef::plain("silent");

    h.rollup.promote_at(&stat, at(5, 0, 0, 30)).await.expect("promote should succeed");

    assert_eq!(
        h.backend.counter_value("silent_HOUR", &BucketKey::at(at(4, 23, 0, 0))),
        Some(0.0)
    );
    assert_eq!(
        h.backend.counter_value("silent_DAY", &BucketKey::at(at(4, 0, 0, 0))),
        Some(0.0)
    );
}

#[tokio::test]
async fn test_dense_keyed_scenario() {
    let h = harness();
    let stat = StatDef::keyed("num2");
    let now = at(5, 21, 28, 41);

    h.counters.record_keyed_at(&stat, "A", 1.0, now).await.expect("record should succeed");
    h.counters.record_keyed_at(&stat, "B", 2.0, now).await.expect("record should succeed");
    h.counters.record_keyed_at(&stat, "C", 10.0, now).await.expect("record should succeed");

    let view = h
        .views
        .query(&stat, Interval::Minute, now - Duration::minutes(4), now)
        .await
        .expect("query should succeed");

    assert_eq!(view.len(), 6);
    assert!(view.keys().windows(2).all(|w| w[1] - w[0] == Duration::minutes(1)));

    let filled: Vec<_> = view.iter().filter(|b| !b.value.is_empty()).collect();
    assert_eq!(filled.len(), 1);
    let map = filled[0].value.as_keyed().expect("keyed bucket");
    assert_eq!(map.len(), 3);
    assert_eq!(map["A"], 1.0);
    assert_eq!(map["B"], 2.0);
    assert_eq!(map["C"], 10.0);
}

#[tokio::test]
async fn test_non_finite_guard() {
    let h = harness();
    let stat = StatDef::numeric("m");
    let key = BucketKey::at(at(5, 12, 0, 0));

    h.counters.record_numeric_at(&stat, 5.0, at(5, 12, 0, 10)).await.expect("record should succeed");
    h.counters.record_numeric_at(&stat, f64::NAN, at(5, 12, 0, 20)).await.expect("guard is not an error");

    assert_eq!(h.backend.counter_value("m_MINUTE", &key), Some(5.0));
}

#[tokio::test]
async fn test_backend_attached_late() {
    init_tracing();
    let ctx = StatContext::new();
    let counters = CounterStore::new(ctx.clone());
    let stat = StatDef::plain("late");

    let err = counters.record_event(&stat).await.unwrap_err();
    assert!(matches!(err, StrataError::NotInitialized));

    let backend = Arc::new(MemoryBackend::new());
    ctx.attach(backend.clone());
    counters.record_event_at(&stat, at(5, 1, 0, 0)).await.expect("record should succeed");
    assert_eq!(backend.counter_rows("late_MINUTE").len(), 1);
}

// =============================================================================
// Sessions
// =============================================================================

async fn registry() -> (Arc<MemoryBackend>, StatRegistry) {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    let config = StrataConfig::from_toml_str(CONFIG).expect("config should parse");
    let registry = StatRegistry::from_config(StatContext::with_store(backend.clone()), &config)
        .await
        .expect("registry should build");
    (backend, registry)
}

#[tokio::test]
async fn test_session_force_restart() {
    let (backend, registry) = registry().await;
    let users = registry.session("users").expect("registered");

    users.on_start_at("X", at(5, 8, 0, 0)).await.expect("start should succeed");
    let second = users.on_start_at("X", at(5, 8, 5, 0)).await.expect("start should succeed");

    assert!(matches!(second, StartOutcome::Restarted(_)));
    assert_eq!(backend.records("sessionLength").len(), 1);
    assert_eq!(users.active_count().await.expect("count should succeed"), 1);
}

#[tokio::test]
async fn test_end_without_start() {
    let (backend, registry) = registry().await;
    let users = registry.session("users").expect("registered");

    assert!(users.on_end_at("Y", at(5, 8, 0, 0)).await.expect("end should succeed").is_none());
    assert!(backend.records("sessionLength").is_empty());
}

#[tokio::test]
async fn test_session_day_through_registry() {
    let (backend, registry) = registry().await;
    let users = registry.session("users").expect("registered");

    users.on_start_at("a", at(5, 23, 10, 0)).await.expect("start should succeed");
    users.on_start_at("b", at(5, 23, 20, 0)).await.expect("start should succeed");
    users
        .on_custom_event_at("a", "purchase", None, 0.0, at(5, 23, 30, 0))
        .await
        .expect("event should succeed");
    registry.tick_at(at(5, 23, 30, 0)).await.expect("tick should succeed");

    users.on_end_at("a", at(5, 23, 40, 0)).await.expect("end should succeed");
    users.on_start_at("a", at(5, 23, 50, 0)).await.expect("start should succeed");
    registry.tick_at(at(5, 23, 50, 0)).await.expect("tick should succeed");

    let tick = registry.tick_at(at(6, 0, 0, 10)).await.expect("tick should succeed");

    // Day boundary: two distinct ids started on the 5th.
    let unique = &tick.sessions["users"].unique_counts;
    assert_eq!(unique.len(), 2);
    assert!(unique.iter().all(|u| u.count == 2));
    assert_eq!(backend.counter_value("DAU_DAY", &BucketKey::at(at(5, 0, 0, 0))), Some(2.0));
    assert_eq!(backend.counter_value("DAU_HOUR", &BucketKey::at(at(5, 23, 0, 0))), Some(2.0));

    assert_eq!(backend.counter_value("CCU_MINUTE", &BucketKey::at(at(5, 23, 30, 0))), Some(2.0));
    assert_eq!(backend.counter_value("login_HOUR", &BucketKey::at(at(5, 23, 0, 0))), Some(3.0));
    assert_eq!(backend.counter_value("logout_HOUR", &BucketKey::at(at(5, 23, 0, 0))), Some(1.0));

    let durations = backend.records("sessionLength");
    assert_eq!(durations.len(), 1);
    assert_eq!(durations[0]["duration"], 1800.0);
    let tracked = backend.records("sessionEvents");
    assert_eq!(tracked[0]["events"][0]["event"], "purchase");
    assert_eq!(tracked[0]["events"][0]["time"], 1200.0);

    let login = registry.stat("login").expect("derived stat");
    let view = registry
        .views()
        .query(login, Interval::Hour, at(5, 23, 0, 0), at(6, 0, 0, 0))
        .await
        .expect("query should succeed");
    assert_eq!(view.get(at(5, 23, 0, 0)), Some(&BucketValue::Scalar(3.0)));
}

#[tokio::test]
async fn test_abandoned_session_expires() {
    let (backend, registry) = registry().await;
    let users = registry.session("users").expect("registered");

    users.on_start_at("idle", at(5, 8, 0, 0)).await.expect("start should succeed");
    users.on_start_at("busy", at(5, 9, 30, 0)).await.expect("start should succeed");

    assert_eq!(backend.purge_expired(at(5, 9, 30, 0)), 1);
    assert!(!users.is_active("idle").await.expect("lookup should succeed"));
    assert!(users.on_end_at("idle", at(5, 9, 31, 0)).await.expect("end should succeed").is_none());
    assert!(backend.records("sessionLength").is_empty());
    assert_eq!(backend.stats().documents_expired, 1);
}
