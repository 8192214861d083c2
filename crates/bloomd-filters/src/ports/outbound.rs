//! Outbound Ports (Driven Ports)
//!
//! The storage collaborator a manager delegates to. The manager never looks
//! inside a filter; it only sequences these calls under its locks.

use serde::Serialize;

use crate::domain::FilterConfig;
use crate::error::StorageError;

/// Static description of a filter, as reported by its store
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreInfo {
    /// Configuration the filter was created (or reopened) with
    pub config: FilterConfig,
    /// Bitmap size in bits
    pub size_bits: usize,
    /// Hash functions per key
    pub hash_count: usize,
    /// Keys added so far, when known
    pub len: Option<usize>,
    /// Whether the bitmap is currently resident in memory
    pub mapped: bool,
}

/// One named filter backed by persistent storage
///
/// The manager calls `&self` methods under the handle's shared lock and
/// `&mut self` methods under its exclusive lock. Implementations must keep
/// `contains` and `flush` safe to run concurrently with each other.
pub trait FilterStore: Send + Sync {
    /// Add a key, returning whether it was newly added
    fn add(&mut self, key: &[u8]) -> Result<bool, StorageError>;

    /// Test whether a key might be present
    fn contains(&self, key: &[u8]) -> Result<bool, StorageError>;

    /// Persist in-memory state
    fn flush(&self) -> Result<(), StorageError>;

    /// Persist and release in-memory state; the filter stays usable and
    /// faults back in on the next `add` or `contains`
    fn close(&mut self) -> Result<(), StorageError>;

    /// Remove the filter's persistent storage
    fn delete(&mut self) -> Result<(), StorageError>;

    fn info(&self) -> StoreInfo;
}

/// Creates or reopens filter stores
pub trait FilterFactory: Send + Sync {
    /// Open the store for `name`
    ///
    /// With `reopen_existing`, state already persisted for `name` is reloaded
    /// (including its own configuration) instead of being replaced.
    fn create(
        &self,
        config: &FilterConfig,
        name: &str,
        reopen_existing: bool,
    ) -> Result<Box<dyn FilterStore>, StorageError>;
}
