//! Strata Calendar - Interval Calendar Arithmetic
//!
//! Pure time arithmetic over naive local timestamps: bucket-floor
//! computation, whole-unit interval shifting and previous-window lookup.
//!
//! "Now" is the process-local naive clock. No timezone offset is applied;
//! callers that need a different reference pass explicit instants to the
//! `_at` variants of each operation.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{Result, StrataError};
use crate::types::Interval;
use chrono::{Datelike, Duration, Local, Months, NaiveDateTime, Timelike};

/// The process-local naive "now".
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Interval {
    /// Truncate `instant` to the start of the bucket containing it.
    ///
    /// Truncation cascades from MONTH down to SECOND; only fields at or
    /// below the requested granularity are cleared.
    pub fn floor(&self, instant: NaiveDateTime) -> NaiveDateTime {
        let mut t = instant;
        if *self >= Interval::Month {
            t = t.with_day(1).unwrap_or(t);
        }
        if *self >= Interval::Day {
            t = t.with_hour(0).unwrap_or(t);
        }
        if *self >= Interval::Hour {
            t = t.with_minute(0).unwrap_or(t);
        }
        if *self >= Interval::Minute {
            t = t.with_second(0).unwrap_or(t);
        }
        t.with_nanosecond(0).unwrap_or(t)
    }

    /// Move `instant` by `amount` whole units of this interval.
    ///
    /// MONTH is calendar-aware and wraps year boundaries; finer levels use
    /// fixed-duration arithmetic.
    pub fn shift(&self, instant: NaiveDateTime, amount: i64) -> Result<NaiveDateTime> {
        let shifted = match self {
            Self::Month => {
                let months = u32::try_from(amount.unsigned_abs()).ok().map(Months::new);
                months.and_then(|m| {
                    if amount >= 0 {
                        instant.checked_add_months(m)
                    } else {
                        instant.checked_sub_months(m)
                    }
                })
            }
            Self::Day => Duration::try_days(amount).and_then(|d| instant.checked_add_signed(d)),
            Self::Hour => Duration::try_hours(amount).and_then(|d| instant.checked_add_signed(d)),
            Self::Minute => {
                Duration::try_minutes(amount).and_then(|d| instant.checked_add_signed(d))
            }
            Self::Second => {
                Duration::try_seconds(amount).and_then(|d| instant.checked_add_signed(d))
            }
        };

        shifted.ok_or_else(|| {
            StrataError::InvalidTimestamp(format!(
                "{} shifted by {} {} is out of range",
                instant, amount, self
            ))
        })
    }

    /// One unit earlier.
    pub fn prev(&self, instant: NaiveDateTime) -> Result<NaiveDateTime> {
        self.shift(instant, -1)
    }

    /// One unit later.
    pub fn next(&self, instant: NaiveDateTime) -> Result<NaiveDateTime> {
        self.shift(instant, 1)
    }

    /// The most recently completed window `[start, end)` at this level
    /// relative to `now`.
    pub fn previous_window(&self, now: NaiveDateTime) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let end = self.floor(now);
        let start = self.prev(end)?;
        Ok((start, end))
    }
}

// =============================================================================
// Tests
// =============================================================================
