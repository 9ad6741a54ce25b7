//! Strata Naming - Physical Collection Names
//!
//! Each logical stat resolves to one physical collection per interval
//! level. Operational tooling and dashboards key off these names, so they
//! are part of the external contract.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::Interval;

/// `{stat}_{INTERVAL}`: counter buckets of one level.
pub fn counter_collection(stat: &str, interval: Interval) -> String {
    format!("{}_{}", stat, interval.name())
}

/// `{stat}_SESSION`: active sessions of a tracker.
pub fn session_collection(stat: &str) -> String {
    format!("{}_SESSION", stat)
}

/// `{stat}_UNIQUE_{INTERVAL}`: ids seen in the current window of a level.
pub fn unique_collection(stat: &str, interval: Interval) -> String {
    format!("{}_UNIQUE_{}", stat, interval.name())
}
