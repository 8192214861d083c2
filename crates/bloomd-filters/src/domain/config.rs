//! Filter and manager configuration
//!
//! # Example
//!
//! ```ignore
//! use bloomd_filters::domain::FilterConfigBuilder;
//!
//! let config = FilterConfigBuilder::new()
//!     .initial_capacity(1_000_000)
//!     .false_positive_rate(0.001)
//!     .build()
//!     .expect("Valid config");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::parameters::{calculate_params, FilterParams};
use crate::error::FilterError;

/// Default number of keys a new filter is sized for
pub const DEFAULT_CAPACITY: usize = 100_000;
/// Default target false positive rate
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.0001;
/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "/tmp/bloomd";
/// Default period of the background flush worker
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Per-filter configuration
///
/// Persisted next to the bitmap so a reopened filter keeps the geometry it
/// was created with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of keys the bitmap is sized for
    pub initial_capacity: usize,
    /// Target false positive rate at `initial_capacity`
    pub false_positive_rate: f64,
    /// Keep the filter in memory only, never persisting it
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            in_memory: false,
        }
    }
}

impl FilterConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.initial_capacity == 0 {
            return Err(FilterError::InvalidParameters(
                "initial_capacity cannot be 0".to_string(),
            ));
        }

        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(FilterError::InvalidParameters(format!(
                "false_positive_rate must be in (0, 1), got {}",
                self.false_positive_rate
            )));
        }

        Ok(())
    }

    /// Bitmap geometry for this configuration
    pub fn params(&self) -> FilterParams {
        calculate_params(self.initial_capacity, self.false_positive_rate)
    }
}

/// Builder for FilterConfig with validation
#[derive(Default)]
pub struct FilterConfigBuilder {
    initial_capacity: Option<usize>,
    false_positive_rate: Option<f64>,
    in_memory: Option<bool>,
}

impl FilterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    pub fn false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = Some(rate);
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = Some(in_memory);
        self
    }

    /// Build the FilterConfig, validating all parameters
    pub fn build(self) -> Result<FilterConfig, FilterError> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> FilterConfig {
        let defaults = FilterConfig::default();

        FilterConfig {
            initial_capacity: self.initial_capacity.unwrap_or(defaults.initial_capacity),
            false_positive_rate: self
                .false_positive_rate
                .unwrap_or(defaults.false_positive_rate),
            in_memory: self.in_memory.unwrap_or(defaults.in_memory),
        }
    }
}

/// Filter manager configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Directory holding one `bloomd.<name>` directory per filter
    pub data_dir: PathBuf,
    /// Configuration used when a create request carries none
    pub default_filter: FilterConfig,
    /// Period of the background flush worker; zero disables it
    pub flush_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            default_filter: FilterConfig::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl ManagerConfig {
    /// Configuration rooted at `data_dir` with default filter settings
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}
