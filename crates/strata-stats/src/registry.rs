//! Strata Stat Registry
//!
//! Owns the stats and session trackers of one deployment, built from a
//! `StrataConfig`, and drives all of them from a single periodic tick.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::counter::CounterStore;
use crate::rollup::{PromotionReport, RollupEngine};
use crate::session::{SessionTracker, TickReport};
use crate::stat::StatDef;
use crate::view::DataViewReader;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};
use strata_common::calendar;
use strata_common::{Result, SessionConfig, StrataConfig, StrataError};
use strata_storage::StatContext;

/// What one registry tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryTick {
    pub promotions: Vec<PromotionReport>,
    pub sessions: BTreeMap<String, TickReport>,
}

// =============================================================================
// Stat Registry
// =============================================================================

/// Named stats and session trackers sharing one storage handle.
#[derive(Debug, Clone)]
pub struct StatRegistry {
    ctx: StatContext,
    stats: BTreeMap<String, StatDef>,
    sessions: BTreeMap<String, SessionTracker>,
    counters: CounterStore,
    rollup: RollupEngine,
    views: DataViewReader,
}

impl StatRegistry {
    pub fn new(ctx: StatContext) -> Self {
        Self {
            counters: CounterStore::new(ctx.clone()),
            rollup: RollupEngine::new(ctx.clone()),
            views: DataViewReader::new(ctx.clone()),
            stats: BTreeMap::new(),
            sessions: BTreeMap::new(),
            ctx,
        }
    }

    /// Build every stat and tracker of `config`.
    pub async fn from_config(ctx: StatContext, config: &StrataConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = Self::new(ctx);

        for stat in &config.stats {
            registry.register(StatDef::from_config(stat)?)?;
        }
        for session in &config.sessions {
            registry.register_session(session).await?;
        }

        tracing::info!(
            "Registry loaded {} stats and {} session trackers",
            registry.stats.len(),
            registry.sessions.len()
        );
        Ok(registry)
    }

    /// Add a counter stat. Names are shared with session trackers and the
    /// stats they derive.
    pub fn register(&mut self, stat: StatDef) -> Result<()> {
        self.ensure_unused(stat.name())?;
        self.stats.insert(stat.name().to_string(), stat);
        Ok(())
    }

    /// Open and add a session tracker. Names are checked before the
    /// tracker touches storage.
    pub async fn register_session(&mut self, config: &SessionConfig) -> Result<&SessionTracker> {
        self.ensure_unused(&config.name)?;

        let mut seen = HashSet::from([config.name.as_str()]);
        let derived = [
            &config.start_event,
            &config.end_event,
            &config.magnitude_event,
            &config.unique_start_event,
        ];
        for name in derived.into_iter().flatten() {
            self.ensure_unused(name)?;
            if !seen.insert(name.as_str()) {
                return Err(StrataError::Configuration(format!(
                    "name {} used twice by session {}",
                    name, config.name
                )));
            }
        }

        let tracker = SessionTracker::open(self.ctx.clone(), config).await?;
        Ok(&*self.sessions.entry(config.name.clone()).or_insert(tracker))
    }

    fn ensure_unused(&self, name: &str) -> Result<()> {
        if self.stat(name).is_some() || self.sessions.contains_key(name) {
            return Err(StrataError::Configuration(format!(
                "name already registered: {}",
                name
            )));
        }
        Ok(())
    }

    /// Look up a stat by name, including the counters derived from
    /// session trackers.
    pub fn stat(&self, name: &str) -> Option<&StatDef> {
        self.stats.get(name).or_else(|| {
            self.sessions
                .values()
                .flat_map(|tracker| tracker.derived_stats())
                .find(|stat| stat.name() == name)
        })
    }

    pub fn session(&self, name: &str) -> Option<&SessionTracker> {
        self.sessions.get(name)
    }

    pub fn stat_names(&self) -> Vec<String> {
        self.stats.keys().cloned().collect()
    }

    pub fn session_names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    pub fn rollup(&self) -> &RollupEngine {
        &self.rollup
    }

    pub fn views(&self) -> &DataViewReader {
        &self.views
    }

    pub async fn tick(&self) -> Result<RegistryTick> {
        self.tick_at(calendar::now()).await
    }

    /// Promote every registered stat, then tick every session tracker.
    pub async fn tick_at(&self, now: NaiveDateTime) -> Result<RegistryTick> {
        let mut report = RegistryTick::default();

        for stat in self.stats.values() {
            report.promotions.push(self.rollup.promote_at(stat, now).await?);
        }
        for (name, tracker) in &self.sessions {
            report.sessions.insert(name.clone(), tracker.tick_at(now).await?);
        }

        tracing::debug!(
            "Tick at {}: {} stats, {} trackers",
            now,
            report.promotions.len(),
            report.sessions.len()
        );
        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use strata_common::{BucketKey, CounterKind, Interval, StatConfig};
    use strata_storage::MemoryBackend;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 5)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid test timestamp")
    }

    fn config() -> StrataConfig {
        StrataConfig {
            stats: vec![
                StatConfig::new("test", CounterKind::Plain),
                StatConfig::new("num2", CounterKind::Keyed),
            ],
            sessions: vec![SessionConfig::new("users")
                .with_start_event("login")
                .with_magnitude_event("CCU")
                .with_intervals(Interval::Second, Interval::Hour)],
        }
    }

    #[tokio::test]
    async fn test_from_config_registers_everything() {
        let ctx = StatContext::with_store(Arc::new(MemoryBackend::new()));
        let registry = StatRegistry::from_config(ctx, &config())
            .await
            .expect("registry should build");

        assert_eq!(registry.stat_names(), vec!["num2", "test"]);
        assert_eq!(registry.session_names(), vec!["users"]);
        assert_eq!(registry.stat("num2").map(|s| s.kind()), Some(CounterKind::Keyed));
        assert_eq!(registry.stat("CCU").map(|s| s.kind()), Some(CounterKind::Magnitude));
        assert_eq!(registry.stat("login").map(|s| s.finest()), Some(Interval::Second));
        assert!(registry.stat("missing").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let ctx = StatContext::with_store(Arc::new(MemoryBackend::new()));
        let mut registry = StatRegistry::from_config(ctx, &config())
            .await
            .expect("registry should build");

        assert!(registry.register(StatDef::plain("test")).unwrap_err().is_configuration_error());
        assert!(registry.register(StatDef::plain("login")).is_err());

        let clash = SessionConfig::new("players").with_start_event("test");
        assert!(registry.register_session(&clash).await.is_err());
        assert!(registry.session("players").is_none());
    }

    #[tokio::test]
    async fn test_rejected_session_leaves_storage_untouched() {
        let backend = Arc::new(MemoryBackend::new());
        let ctx = StatContext::with_store(backend.clone());
        let mut registry = StatRegistry::from_config(ctx, &config())
            .await
            .expect("registry should build");

        let clash = SessionConfig::new("players").with_start_event("test").with_expiry(60);
        assert!(registry.register_session(&clash).await.is_err());
        assert!(!backend.collection_names().contains(&"players_SESSION".to_string()));

        let twice = SessionConfig::new("games")
            .with_start_event("play")
            .with_end_event("play");
        let err = registry.register_session(&twice).await.unwrap_err();
        assert!(err.is_configuration_error());
        assert!(registry.session("games").is_none());

        let own_name = SessionConfig::new("matches").with_magnitude_event("matches");
        assert!(registry.register_session(&own_name).await.is_err());
    }

    #[tokio::test]
    async fn test_tick_drives_stats_and_sessions() {
        let backend = Arc::new(MemoryBackend::new());
        let ctx = StatContext::with_store(backend.clone());
        let registry = StatRegistry::from_config(ctx, &config())
            .await
            .expect("registry should build");

        let test = registry.stat("test").expect("registered").clone();
        registry
            .counters()
            .record_event_at(&test, at(9, 59, 10))
            .await
            .expect("record should succeed");
        registry
            .session("users")
            .expect("registered")
            .on_start_at("u1", at(9, 59, 50))
            .await
            .expect("start should succeed");

        let report = registry.tick_at(at(10, 0, 0)).await.expect("tick should succeed");

        assert_eq!(report.promotions.len(), 2);
        assert_eq!(report.sessions["users"].magnitude, Some(1));
        assert_eq!(backend.counter_value("test_HOUR", &BucketKey::at(at(9, 0, 0))), Some(1.0));
        assert_eq!(backend.counter_value("login_MINUTE", &BucketKey::at(at(9, 59, 0))), Some(1.0));

        let again = registry
            .rollup()
            .promote_at(&test, at(10, 0, 1))
            .await
            .expect("promote should succeed");
        assert_eq!(again.written(), 0);
    }
}
