//! Process configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bloomd_filters::{FilterConfig, ManagerConfig};
use tracing::{info, warn};

/// Everything the daemon needs to start, besides logging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    pub manager: ManagerConfig,
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `BLOOMD_DATA_DIR`: Directory holding filter folders (default: /tmp/bloomd)
    /// - `BLOOMD_INITIAL_CAPACITY`: Default filter capacity (default: 100000)
    /// - `BLOOMD_DEFAULT_PROBABILITY`: Default false positive rate (default: 0.0001)
    /// - `BLOOMD_IN_MEMORY`: Keep new filters in memory only (default: false)
    /// - `BLOOMD_FLUSH_INTERVAL`: Background flush period in seconds, 0 disables (default: 60)
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let manager = &mut config.manager;

        if let Some(dir) = lookup("BLOOMD_DATA_DIR") {
            manager.data_dir = PathBuf::from(dir);
        }
        if let Some(capacity) = parse_var(&lookup, "BLOOMD_INITIAL_CAPACITY") {
            manager.default_filter.initial_capacity = capacity;
        }
        if let Some(rate) = parse_var(&lookup, "BLOOMD_DEFAULT_PROBABILITY") {
            manager.default_filter.false_positive_rate = rate;
        }
        if let Some(in_memory) = lookup("BLOOMD_IN_MEMORY") {
            match parse_flag(&in_memory) {
                Some(flag) => manager.default_filter.in_memory = flag,
                None => warn!(value = %in_memory, "BLOOMD_IN_MEMORY must be true or false"),
            }
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "BLOOMD_FLUSH_INTERVAL") {
            manager.flush_interval = Duration::from_secs(secs);
        }

        if let Err(e) = manager.default_filter.validate() {
            warn!(error = %e, "Ignoring invalid default filter settings");
            manager.default_filter = FilterConfig::default();
        }

        info!(data_dir = %manager.data_dir.display(), "Loaded configuration");
        config
    }

    /// `None` when background flushing is disabled
    pub fn flush_interval(&self) -> Option<Duration> {
        Some(self.manager.flush_interval).filter(|interval| !interval.is_zero())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unparsable value");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
