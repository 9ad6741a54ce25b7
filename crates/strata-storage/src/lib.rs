//! Strata Storage - Storage Backend Contract
//!
//! The storage layer consumed by the rollup engine. Strata never implements
//! durable storage itself: atomic increments, conditional inserts, range
//! reductions and expiry are delegated to a `StatStore` implementation.
//!
//! Key Features:
//! - Pluggable async storage backend trait
//! - Explicit, attachable storage handle (`StatContext`)
//! - In-memory backend for development and tests
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod backend;
pub mod context;
pub mod memory;

pub use backend::{InsertOutcome, ReduceRequest, StatStore, StoreStats};
pub use context::StatContext;
pub use memory::MemoryBackend;
