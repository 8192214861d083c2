//! Background flush worker
//!
//! Periodically drains the hot set and flushes each filter in it. Flushing
//! here does not mark the filter hot again, so an idle filter is flushed
//! once and then left alone.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::manager::FilterManager;
use crate::ports::FilterFactory;

/// Stop flag shared between the worker and its owner
#[derive(Default)]
struct Shutdown {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Flush hot filters on a fixed interval until stopped
///
/// Dropping the worker stops it and waits for the current round to end.
pub struct FlushWorker {
    shutdown: Arc<Shutdown>,
    thread: Option<JoinHandle<()>>,
}

impl FlushWorker {
    pub fn spawn<F>(manager: Arc<FilterManager<F>>, interval: Duration) -> io::Result<Self>
    where
        F: FilterFactory + 'static,
    {
        let shutdown = Arc::new(Shutdown::default());
        let thread = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("bloomd-flush".to_string())
                .spawn(move || run(&manager, &shutdown, interval))?
        };

        info!(interval_ms = interval.as_millis() as u64, "Flush worker started");
        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    /// Signal the worker and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        *self.shutdown.stopped.lock() = true;
        self.shutdown.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Flush worker panicked");
            } else {
                info!("Flush worker stopped");
            }
        }
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn run<F: FilterFactory>(manager: &FilterManager<F>, shutdown: &Shutdown, interval: Duration) {
    loop {
        {
            let mut stopped = shutdown.stopped.lock();
            if !*stopped {
                shutdown.wake.wait_for(&mut stopped, interval);
            }
            if *stopped {
                return;
            }
        }
        flush_hot(manager);
    }
}

/// Flush every filter in the hot set, returning how many were flushed
///
/// Filters dropped since they were marked are skipped.
pub fn flush_hot<F: FilterFactory>(manager: &FilterManager<F>) -> usize {
    let mut flushed = 0;
    for name in manager.drain_hot_filters() {
        match manager.flush_unmarked(&name) {
            Ok(()) => flushed += 1,
            Err(e) if e.is_not_found() => debug!(filter = %name, "Skipping dropped filter"),
            Err(e) => warn!(filter = %name, error = %e, "Background flush failed"),
        }
    }
    if flushed > 0 {
        debug!(count = flushed, "Flushed hot filters");
    }
    flushed
}
