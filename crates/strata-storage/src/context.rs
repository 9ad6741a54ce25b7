//! Strata Context - Explicit Storage Handle
//!
//! The storage handle threaded through every component constructor. A
//! context may be created before its backend exists and attached later;
//! every public operation checks the handle first and fails with
//! `StrataError::NotInitialized` while it is detached.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::backend::StatStore;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use strata_common::{Result, StrataError};

/// Shared, cloneable handle to a storage backend. Clones observe the same
/// attach/detach state.
#[derive(Clone, Default)]
pub struct StatContext {
    store: Arc<RwLock<Option<Arc<dyn StatStore>>>>,
}

impl StatContext {
    /// Create a detached context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context already attached to a backend.
    pub fn with_store(store: Arc<dyn StatStore>) -> Self {
        Self {
            store: Arc::new(RwLock::new(Some(store))),
        }
    }

    /// Attach (or replace) the backend.
    pub fn attach(&self, store: Arc<dyn StatStore>) {
        *self.store.write() = Some(store);
    }

    /// Detach the backend; subsequent operations fail fast.
    pub fn detach(&self) {
        *self.store.write() = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.store.read().is_some()
    }

    /// The attached backend, or `NotInitialized`.
    pub fn store(&self) -> Result<Arc<dyn StatStore>> {
        self.store.read().clone().ok_or(StrataError::NotInitialized)
    }
}

impl fmt::Debug for StatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatContext")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[test]
    fn test_detached_context_fails_fast() {
        let ctx = StatContext::new();
        assert!(!ctx.is_initialized());
        assert!(matches!(ctx.store(), Err(StrataError::NotInitialized)));
    }

    #[test]
    fn test_attach_is_shared_by_clones() {
        let ctx = StatContext::new();
        let clone = ctx.clone();

        ctx.attach(Arc::new(MemoryBackend::new()));
        assert!(clone.store().is_ok());

        clone.detach();
        assert!(ctx.store().is_err());
    }
}
