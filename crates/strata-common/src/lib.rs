//! Strata Common - Shared Types and Utilities
//!
//! Foundational types, error handling and calendar arithmetic used across
//! the Strata rollup engine. Provides the abstractions that keep the
//! storage contract and the statistics layer consistent with each other.
//!
//! Key Features:
//! - Unified error type with configuration/retryable classification
//! - Interval levels, bucket keys and counter kinds
//! - Interval calendar (floor, shift, previous window)
//! - Collection naming contract and TOML configuration
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod calendar;
pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::{SessionConfig, StatConfig, StrataConfig};
pub use error::{Result, StrataError};
pub use types::*;
