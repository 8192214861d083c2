//! Error types for the filter manager

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by filter manager operations
///
/// `NotFound` and `AlreadyExists` are ordinary outcomes that the protocol
/// layer turns into client responses; they are not faults.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Filter not found: {0}")]
    NotFound(String),

    #[error("Filter already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to create filter {name}: {source}")]
    CreateFailed {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid filter name: {0:?}")]
    InvalidName(String),

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the storage collaborator backing a filter
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt filter data at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StorageError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl FilterError {
    /// Whether this is the "name is not registered" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
