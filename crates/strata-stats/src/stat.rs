//! Strata Stat Definition
//!
//! A stat is a name, a counter kind and a contiguous interval range. The
//! kind selects the write operation and reduction; the range selects the
//! physical collections the stat owns.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use strata_common::naming::counter_collection;
use strata_common::{CounterKind, Interval, IntervalRange, Result, StatConfig, StrataError};

/// Definition of one logical stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDef {
    name: String,
    kind: CounterKind,
    intervals: IntervalRange,
}

impl StatDef {
    pub fn new(name: impl Into<String>, kind: CounterKind, intervals: IntervalRange) -> Self {
        Self {
            name: name.into(),
            kind,
            intervals,
        }
    }

    /// Build a stat over `[min, max]`, rejecting an empty range.
    pub fn with_levels(
        name: impl Into<String>,
        kind: CounterKind,
        min: Interval,
        max: Interval,
    ) -> Result<Self> {
        Ok(Self::new(name, kind, IntervalRange::new(min, max)?))
    }

    /// Plain occurrence counter over MINUTE..MONTH.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, CounterKind::Plain, IntervalRange::default())
    }

    /// Numeric counter over MINUTE..MONTH.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, CounterKind::Numeric, IntervalRange::default())
    }

    /// Keyed counter over MINUTE..MONTH.
    pub fn keyed(name: impl Into<String>) -> Self {
        Self::new(name, CounterKind::Keyed, IntervalRange::default())
    }

    pub fn from_config(config: &StatConfig) -> Result<Self> {
        Ok(Self::new(
            config.name.clone(),
            config.kind,
            config.interval_range()?,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    pub fn intervals(&self) -> IntervalRange {
        self.intervals
    }

    /// The level every write lands in.
    pub fn finest(&self) -> Interval {
        self.intervals.finest()
    }

    /// Physical collection of one level.
    pub fn collection(&self, interval: Interval) -> String {
        counter_collection(&self.name, interval)
    }

    pub(crate) fn ensure_kind(&self, allowed: &[CounterKind], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(StrataError::KindMismatch {
                stat: self.name.clone(),
                expected,
                actual: self.kind,
            })
        }
    }

    pub(crate) fn ensure_tracks(&self, interval: Interval) -> Result<()> {
        if self.intervals.contains(interval) {
            Ok(())
        } else {
            Err(StrataError::IntervalNotTracked {
                stat: self.name.clone(),
                interval,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_collections() {
        let stat = StatDef::plain("logins");
        assert_eq!(stat.finest(), Interval::Minute);
        assert_eq!(stat.intervals().coarsest(), Interval::Month);
        assert_eq!(stat.collection(Interval::Hour), "logins_HOUR");
    }

    #[test]
    fn test_empty_range_is_configuration_error() {
        let err = StatDef::with_levels("bad", CounterKind::Plain, Interval::Month, Interval::Second)
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_kind_and_interval_checks() {
        let stat = StatDef::with_levels("pages", CounterKind::Keyed, Interval::Second, Interval::Hour)
            .expect("valid stat");
        assert!(stat.ensure_kind(&[CounterKind::Keyed], "keyed").is_ok());
        assert!(stat.ensure_kind(&[CounterKind::Plain], "plain").is_err());
        assert!(stat.ensure_tracks(Interval::Second).is_ok());
        assert!(matches!(
            stat.ensure_tracks(Interval::Day),
            Err(StrataError::IntervalNotTracked { .. })
        ));
    }
}
