//! # bloomd
//!
//! Entry point for the bloomd daemon.
//!
//! ## Startup Sequence
//!
//! 1. Logging from `BLOOMD_LOG_LEVEL` / `BLOOMD_JSON_LOGS`
//! 2. Configuration from `BLOOMD_*` variables
//! 3. Reopen filters found under the data directory
//! 4. Start the background flush worker
//!
//! Ctrl+C stops the flush worker and closes every filter.

use anyhow::{Context, Result};
use bloomd_runtime::{Daemon, RuntimeConfig};
use bloomd_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())
        .context("Failed to initialize logging")?;

    // Load configuration
    let config = RuntimeConfig::from_env();

    let daemon = tokio::task::spawn_blocking(move || Daemon::start(config))
        .await
        .context("Startup task failed")?
        .inspect_err(|e| error!(error = %e, "Failed to start daemon"))
        .context("Failed to start daemon")?;

    // Keep the daemon running
    info!("bloomd is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    // Graceful shutdown
    tokio::task::spawn_blocking(move || daemon.shutdown())
        .await
        .context("Shutdown task failed")?;

    Ok(())
}
