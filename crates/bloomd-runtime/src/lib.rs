//! # bloomd Runtime Library
//!
//! Process-level wiring for the `bloomd` binary, exposed for testing:
//!
//! - `config`: `RuntimeConfig` loaded from `BLOOMD_*` environment variables
//! - `daemon`: hosts the filter manager and its flush worker
//!
//! The network front-end attaches through
//! [`bloomd_filters::FilterManagerApi`] on [`Daemon::manager`].

pub mod config;
pub mod daemon;

pub use config::RuntimeConfig;
pub use daemon::{Daemon, DaemonError};
