//! Strata Stats - Hierarchical Time-Bucketed Statistics
//!
//! Counters recorded into the finest configured interval, promoted level by
//! level into coarser buckets, and read back as dense gap-filled series.
//! Session tracking pairs start and end events on top of the same paths.
//!
//! Key Features:
//! - Plain, numeric, keyed and magnitude counters
//! - Idempotent rollup with zero-filled empty windows
//! - Dense data views over any tracked interval
//! - Session lifecycle with durations, concurrency and unique ids
//! - Configuration-driven registry with a single periodic tick
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod counter;
pub mod registry;
pub mod rollup;
pub mod session;
pub mod stat;
pub mod view;

pub use counter::CounterStore;
pub use registry::{RegistryTick, StatRegistry};
pub use rollup::{LevelPromotion, PromotionOutcome, PromotionReport, RollupEngine};
pub use session::{
    EndedSession, SessionEvent, SessionTracker, StartOutcome, TickReport, UniqueCount,
};
pub use stat::StatDef;
pub use view::{BucketValue, DataView, DataViewReader, ViewBucket};
