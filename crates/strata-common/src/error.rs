//! Strata Error - Unified Error Types
//!
//! Error handling for all Strata operations. Separates configuration
//! failures (a stat or backend that is not wired up correctly) from storage
//! failures propagated from the backend, so callers can tell "not wired up"
//! apart from the domain no-ops that never surface as errors.
//!
//! Key Features:
//! - Configuration errors for empty interval ranges and missing backends
//! - Counter kind and interval validation errors
//! - Retryable error detection for caller-level retry logic
//! - Seamless integration with std::io::Error and serde_json::Error
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::{CounterKind, Interval};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage backend is not initialized")]
    NotInitialized,

    #[error("stat '{stat}' is a {actual} counter, operation requires {expected}")]
    KindMismatch {
        stat: String,
        expected: &'static str,
        actual: CounterKind,
    },

    #[error("stat '{stat}' does not track interval {interval}")]
    IntervalNotTracked { stat: String, interval: Interval },

    // Session errors
    #[error("session conflict persisted after restart: {0}")]
    SessionConflict(String),

    // Calendar errors
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;

// =============================================================================
// Error Classification
// =============================================================================

impl StrataError {
    /// Returns true if the error means the stat or backend is misconfigured.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            StrataError::Configuration(_)
                | StrataError::NotInitialized
                | StrataError::KindMismatch { .. }
                | StrataError::IntervalNotTracked { .. }
        )
    }

    /// Returns true if the operation can be safely retried by the caller.
    ///
    /// Writes compose and promotion is idempotent, so a retry after a
    /// storage failure never double counts a rollup.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StrataError::Storage(_) | StrataError::SessionConflict(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
