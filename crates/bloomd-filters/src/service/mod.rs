//! Service Layer
//!
//! The filter manager and the pieces it is built from: the registry of
//! named handles, the hot set, startup discovery and the flush worker.

mod bootstrap;
mod flusher;
mod handle;
mod hot_set;
mod manager;
mod registry;

pub use bootstrap::discover_filters;
pub use flusher::{flush_hot, FlushWorker};
pub use manager::{FilterManager, MAX_NAME_LEN};
