//! Domain Layer - Pure filter logic
//!
//! - Filter bitmap and its hash functions
//! - Bitmap geometry
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No locking

pub mod bloom_filter;
pub mod config;
pub mod hash_functions;
pub mod parameters;

pub use bloom_filter::BloomFilter;
pub use config::{FilterConfig, FilterConfigBuilder, ManagerConfig};
pub use parameters::{calculate_params, FilterParams};
