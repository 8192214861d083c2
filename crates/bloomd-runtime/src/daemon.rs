//! Daemon host: one filter manager plus its flush worker.

use std::io;
use std::sync::Arc;

use bloomd_filters::{FilterManager, FilterManagerApi, FlushWorker};
use thiserror::Error;
use tracing::info;

use crate::config::RuntimeConfig;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Failed to start flush worker: {0}")]
    FlushWorker(#[source] io::Error),
}

/// A running daemon
pub struct Daemon {
    manager: Arc<FilterManager>,
    flusher: Option<FlushWorker>,
}

impl Daemon {
    /// Open the data directory and start background flushing.
    ///
    /// Blocks while persisted filters are discovered and reopened.
    pub fn start(config: RuntimeConfig) -> Result<Self, DaemonError> {
        let interval = config.flush_interval();
        let manager = Arc::new(FilterManager::new(config.manager));

        let flusher = interval
            .map(|interval| FlushWorker::spawn(Arc::clone(&manager), interval))
            .transpose()
            .map_err(DaemonError::FlushWorker)?;

        info!(
            filters = manager.num_filters(),
            flushing = flusher.is_some(),
            "Daemon started"
        );
        Ok(Self { manager, flusher })
    }

    /// The manager the protocol layer drives
    pub fn manager(&self) -> Arc<FilterManager> {
        Arc::clone(&self.manager)
    }

    /// Stop flushing and close every filter.
    ///
    /// Filters are closed once the last outstanding manager reference is
    /// dropped.
    pub fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        if let Some(flusher) = self.flusher {
            flusher.stop();
        }
        let outstanding = Arc::strong_count(&self.manager) - 1;
        if outstanding > 0 {
            info!(outstanding, "Manager still referenced; filters close on last release");
        }
        drop(self.manager);

        info!("Shutdown complete");
    }
}
