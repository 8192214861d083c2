//! Per-filter operation counters
//!
//! Counters are bumped without taking any manager lock and read through
//! `snapshot()` for `filter_info`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operation counters for one filter
#[derive(Debug, Default)]
pub struct FilterMetrics {
    /// Keys checked and found
    pub check_hits: AtomicU64,
    /// Keys checked and not found
    pub check_misses: AtomicU64,
    /// Keys set that were newly added
    pub set_hits: AtomicU64,
    /// Keys set that were already present
    pub set_misses: AtomicU64,
    /// Explicit or background flushes
    pub flushes: AtomicU64,
    /// Unmap requests
    pub unmaps: AtomicU64,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a check batch
    pub fn record_checks(&self, results: &[bool]) {
        let hits = results.iter().filter(|&&found| found).count() as u64;
        self.check_hits.fetch_add(hits, Ordering::Relaxed);
        self.check_misses
            .fetch_add(results.len() as u64 - hits, Ordering::Relaxed);
    }

    /// Record the outcome of a set batch
    pub fn record_sets(&self, results: &[bool]) {
        let added = results.iter().filter(|&&added| added).count() as u64;
        self.set_hits.fetch_add(added, Ordering::Relaxed);
        self.set_misses
            .fetch_add(results.len() as u64 - added, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmap(&self) {
        self.unmaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            check_hits: self.check_hits.load(Ordering::Relaxed),
            check_misses: self.check_misses.load(Ordering::Relaxed),
            set_hits: self.set_hits.load(Ordering::Relaxed),
            set_misses: self.set_misses.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            unmaps: self.unmaps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FilterMetrics`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub check_hits: u64,
    pub check_misses: u64,
    pub set_hits: u64,
    pub set_misses: u64,
    pub flushes: u64,
    pub unmaps: u64,
}

impl MetricsSnapshot {
    /// Total keys checked
    pub fn checks(&self) -> u64 {
        self.check_hits + self.check_misses
    }

    /// Total keys set
    pub fn sets(&self) -> u64 {
        self.set_hits + self.set_misses
    }
}
