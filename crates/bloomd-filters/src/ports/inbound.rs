//! Inbound Ports (Driving Ports)
//!
//! The operation surface the protocol layer drives.

use serde::Serialize;

use crate::domain::FilterConfig;
use crate::error::FilterError;
use crate::metrics::MetricsSnapshot;
use crate::ports::outbound::StoreInfo;

/// Description of one registered filter
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterInfo {
    pub name: String,
    #[serde(flatten)]
    pub store: StoreInfo,
    pub metrics: MetricsSnapshot,
}

/// Filter manager API (Driving Port)
///
/// Every call blocks its thread for its full duration. Per-filter calls on
/// an unregistered or dropped name return [`FilterError::NotFound`].
pub trait FilterManagerApi: Send + Sync {
    /// Create a filter, using the manager default when `config` is `None`
    ///
    /// Fails with `AlreadyExists` while a filter of that name is registered,
    /// including one that was dropped but still has outstanding holders.
    fn create_filter(&self, name: &str, config: Option<&FilterConfig>) -> Result<(), FilterError>;

    /// Permanently delete a filter and its persisted storage
    ///
    /// In-flight operations complete; storage is removed once the last of
    /// them returns.
    fn drop_filter(&self, name: &str) -> Result<(), FilterError>;

    /// Release a filter's in-memory state, leaving it registered
    fn unmap_filter(&self, name: &str) -> Result<(), FilterError>;

    /// Persist a filter's in-memory state
    fn flush_filter(&self, name: &str) -> Result<(), FilterError>;

    /// Test each key, one result per key in input order
    fn check_keys<K: AsRef<[u8]>>(&self, name: &str, keys: &[K]) -> Result<Vec<bool>, FilterError>;

    /// Add each key, reporting per key whether it was newly added
    fn set_keys<K: AsRef<[u8]>>(&self, name: &str, keys: &[K]) -> Result<Vec<bool>, FilterError>;

    /// Number of live filters
    fn num_filters(&self) -> usize;

    /// Sorted names of live filters, optionally restricted to a prefix
    fn list_filters(&self, prefix: Option<&str>) -> Vec<String>;

    fn filter_info(&self, name: &str) -> Result<FilterInfo, FilterError>;
}
