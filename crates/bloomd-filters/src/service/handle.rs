//! Per-filter concurrency guard

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::metrics::FilterMetrics;
use crate::ports::FilterStore;

/// Owns one filter store behind a read/write lock
///
/// Liveness (`active`, reference count) is tracked by the registry slot
/// that holds the handle, not by the handle itself.
pub struct FilterHandle {
    name: String,
    store: RwLock<Box<dyn FilterStore>>,
    metrics: FilterMetrics,
}

impl FilterHandle {
    pub fn new(name: impl Into<String>, store: Box<dyn FilterStore>) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(store),
            metrics: FilterMetrics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }

    /// Shared access: concurrent checks, flushes and info reads
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn FilterStore>> {
        self.store.read()
    }

    /// Exclusive access: sets, unmaps and teardown
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn FilterStore>> {
        self.store.write()
    }

    /// Teardown for a dropped filter: close it, then remove its storage
    pub fn purge(&self) {
        let mut store = self.write();
        if let Err(e) = store.close() {
            warn!(filter = %self.name, error = %e, "Failed to close dropped filter");
        }
        match store.delete() {
            Ok(()) => debug!(filter = %self.name, "Deleted filter storage"),
            Err(e) => warn!(filter = %self.name, error = %e, "Failed to delete filter storage"),
        }
    }

    /// Teardown at shutdown: close it, keeping its storage
    pub fn close(&self) {
        if let Err(e) = self.write().close() {
            warn!(filter = %self.name, error = %e, "Failed to close filter");
        }
    }
}
