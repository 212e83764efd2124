//! Core error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning, watching, locking or reindexing.
#[derive(Debug, Error)]
pub enum RepoError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Package-file pattern failed to compile
    #[error("Invalid package pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The scan root cannot be traversed
    #[error("Cannot traverse root {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Lock file could not be opened or locked
    #[error("Lock file {path}: {source}")]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Indexer subprocess could not be started
    #[error("Failed to launch {command}: {source}")]
    IndexerLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Indexer subprocess exited unsuccessfully (`None` when killed by a signal)
    #[error("{command} exited with status {code:?}")]
    IndexerExit { command: String, code: Option<i32> },
}

impl From<notify::Error> for RepoError {
    fn from(e: notify::Error) -> Self {
        RepoError::Watcher(e.to_string())
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Config(e.to_string())
    }
}
