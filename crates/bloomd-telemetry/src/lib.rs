//! # bloomd Telemetry
//!
//! Structured logging setup for the bloomd daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bloomd_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!
//!     // Application code; `tracing` events are now collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BLOOMD_SERVICE_NAME` | `bloomd` | Service name in log output |
//! | `BLOOMD_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `BLOOMD_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod subscriber;

pub use config::{TelemetryConfig, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_NAME};
pub use subscriber::build_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("Invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Initialize logging for the process.
///
/// Returns a guard to be held for the lifetime of the application; dropping
/// it logs the shutdown.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    subscriber::install(config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
