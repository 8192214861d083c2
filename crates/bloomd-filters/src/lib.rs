//! # bloomd Filters
//!
//! Filter manager for the bloomd daemon: a registry of named Bloom filters
//! shared by many client connections.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure filter logic, no I/O
//!   - `BloomFilter`: Bitmap with double hashing
//!   - `FilterConfig`: Per-filter sizing, persisted with the filter
//!   - `ManagerConfig`: Data directory, default filter config, flush period
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `FilterManagerApi`: Driving port used by the protocol layer
//!   - `FilterStore` / `FilterFactory`: Driven port, one store per filter
//!
//! - **Adapters Layer** (`adapters/`): Storage
//!   - `DiskFilterFactory`: One `bloomd.<name>` directory per filter
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `FilterManager`: Implements `FilterManagerApi`
//!   - `FlushWorker`: Background flushing of recently used filters
//!
//! ## Lifecycle
//!
//! - A dropped filter disappears from lookups at once, but its storage is
//!   only deleted when the last in-flight operation on it returns.
//! - A filter name can be created again only after that teardown.
//! - Shutting down the manager closes filters without deleting them; the
//!   next manager on the same data directory reopens them.
//!
//! ## Usage Example
//!
//! ```ignore
//! use bloomd_filters::{FilterManager, FilterManagerApi, ManagerConfig};
//!
//! let manager = FilterManager::new(ManagerConfig::with_data_dir("/var/lib/bloomd"));
//! manager.create_filter("users", None)?;
//!
//! assert_eq!(manager.set_keys("users", &["alice"])?, vec![true]);
//! assert_eq!(manager.check_keys("users", &["alice", "bob"])?, vec![true, false]);
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{DiskFilter, DiskFilterFactory};
pub use domain::{BloomFilter, FilterConfig, FilterConfigBuilder, ManagerConfig};
pub use error::{FilterError, StorageError};
pub use metrics::{FilterMetrics, MetricsSnapshot};
pub use ports::{FilterFactory, FilterInfo, FilterManagerApi, FilterStore, StoreInfo};
pub use service::{FilterManager, FlushWorker};
