//! Error types for mirror-core

use std::path::PathBuf;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No group with this id is registered
    #[error("Mirror group not found: {id}")]
    GroupNotFound { id: String },

    /// A group with this id is already registered
    #[error("Mirror group already exists: {id}")]
    GroupExists { id: String },

    /// The request cannot be satisfied as stated
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Registry or manifest file could not be read or written.
    ///
    /// This is the one failure that aborts a whole operation: a sync pass
    /// cannot proceed without knowing the prior state.
    #[error("Persistence failure at {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// Configuration file could not be parsed
    #[error("Invalid configuration at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Filesystem event source failure
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
