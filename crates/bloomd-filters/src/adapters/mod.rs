//! Adapters Layer (Driven Adapters)
//!
//! - `DiskFilterFactory` / `DiskFilter` - filters persisted under the data
//!   directory, one `bloomd.<name>` directory each

pub mod disk_filter;

pub use disk_filter::{DiskFilter, DiskFilterFactory, FOLDER_PREFIX};
