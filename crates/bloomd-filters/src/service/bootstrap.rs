//! Discovery of filters persisted by a previous run

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::adapters::FOLDER_PREFIX;

/// Shortest directory name that can hold a filter: the prefix plus one byte
pub const MIN_FOLDER_NAME_LEN: usize = FOLDER_PREFIX.len() + 1;

/// Names of the filters persisted under `data_dir`, sorted
///
/// A directory that cannot be scanned yields no filters; startup carries on.
pub fn discover_filters(data_dir: &Path) -> Vec<String> {
    match scan(data_dir) {
        Ok(names) => {
            info!(count = names.len(), data_dir = %data_dir.display(), "Found existing filters");
            names
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(data_dir = %data_dir.display(), "Data directory does not exist yet");
            Vec::new()
        }
        Err(e) => {
            warn!(data_dir = %data_dir.display(), error = %e, "Failed to scan for existing filters");
            Vec::new()
        }
    }
}

fn scan(data_dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let folder = entry.file_name();
        let Some(folder) = folder.to_str() else {
            debug!(folder = ?entry.file_name(), "Skipping non UTF-8 directory");
            continue;
        };

        if folder.len() < MIN_FOLDER_NAME_LEN {
            continue;
        }
        if let Some(name) = folder.strip_prefix(FOLDER_PREFIX) {
            names.push(name.to_string());
        }
    }

    names.sort_unstable();
    Ok(names)
}
