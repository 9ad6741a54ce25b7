//! Strata Config - Configuration Structures
//!
//! Declarative definitions of counter stats and session trackers. Supports
//! loading from TOML files and programmatic construction, with the defaults
//! of the rollup hierarchy (MINUTE through MONTH).
//!
//! Key Features:
//! - Counter stat definitions (name, kind, interval range)
//! - Session tracker definitions with optional sinks
//! - Time-to-live configuration for abandoned sessions
//! - Validation of every interval range at load time
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{Result, StrataError};
use crate::types::{CounterKind, Interval, IntervalRange};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

fn default_min_interval() -> Interval {
    Interval::Minute
}

fn default_max_interval() -> Interval {
    Interval::Month
}

// =============================================================================
// Stat Configuration
// =============================================================================

/// Configuration for one counter stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatConfig {
    pub name: String,
    #[serde(default)]
    pub kind: CounterKind,
    #[serde(default = "default_min_interval")]
    pub min_interval: Interval,
    #[serde(default = "default_max_interval")]
    pub max_interval: Interval,
}

impl StatConfig {
    pub fn new(name: impl Into<String>, kind: CounterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
        }
    }

    pub fn with_intervals(mut self, min: Interval, max: Interval) -> Self {
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    /// The validated interval range of this stat.
    pub fn interval_range(&self) -> Result<IntervalRange> {
        IntervalRange::new(self.min_interval, self.max_interval)
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Configuration for a session tracker. Every sink is optional; a tracker
/// with no sinks still maintains the active session collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub name: String,
    /// Plain counter incremented on every start.
    pub start_event: Option<String>,
    /// Plain counter incremented on every end.
    pub end_event: Option<String>,
    /// Magnitude counter sampling the active session count.
    pub magnitude_event: Option<String>,
    /// Counter of distinct ids started per window.
    pub unique_start_event: Option<String>,
    /// Collection receiving one duration record per completed session.
    pub duration_sink: Option<String>,
    /// Collection receiving the custom event list of completed sessions.
    pub event_tracking_sink: Option<String>,
    #[serde(default = "default_min_interval")]
    pub min_interval: Interval,
    #[serde(default = "default_max_interval")]
    pub max_interval: Interval,
    /// Sessions older than this are expired by the backend and never
    /// produce a duration record.
    pub expire_after_seconds: Option<u64>,
}

impl SessionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_event: None,
            end_event: None,
            magnitude_event: None,
            unique_start_event: None,
            duration_sink: None,
            event_tracking_sink: None,
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            expire_after_seconds: None,
        }
    }

    pub fn with_start_event(mut self, name: impl Into<String>) -> Self {
        self.start_event = Some(name.into());
        self
    }

    pub fn with_end_event(mut self, name: impl Into<String>) -> Self {
        self.end_event = Some(name.into());
        self
    }

    pub fn with_magnitude_event(mut self, name: impl Into<String>) -> Self {
        self.magnitude_event = Some(name.into());
        self
    }

    pub fn with_unique_start_event(mut self, name: impl Into<String>) -> Self {
        self.unique_start_event = Some(name.into());
        self
    }

    pub fn with_duration_sink(mut self, name: impl Into<String>) -> Self {
        self.duration_sink = Some(name.into());
        self
    }

    pub fn with_event_tracking_sink(mut self, name: impl Into<String>) -> Self {
        self.event_tracking_sink = Some(name.into());
        self
    }

    pub fn with_intervals(mut self, min: Interval, max: Interval) -> Self {
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    pub fn with_expiry(mut self, seconds: u64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    pub fn interval_range(&self) -> Result<IntervalRange> {
        IntervalRange::new(self.min_interval, self.max_interval)
    }
}

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Top-level configuration: every stat and tracker of one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub stats: Vec<StatConfig>,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StrataError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check interval ranges and name uniqueness.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for stat in &self.stats {
            stat.interval_range()?;
            if !names.insert(stat.name.as_str()) {
                return Err(StrataError::Configuration(format!(
                    "duplicate stat name: {}",
                    stat.name
                )));
            }
        }

        for session in &self.sessions {
            session.interval_range()?;
            if !names.insert(session.name.as_str()) {
                return Err(StrataError::Configuration(format!(
                    "duplicate session name: {}",
                    session.name
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
