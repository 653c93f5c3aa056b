//! Error types for mirror-fs

use std::path::PathBuf;

/// Result type for mirror-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Not a regular file (directories and symlinks cannot be hardlinked): {path}")]
    NotARegularFile { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Not a symlink: {path}")]
    NotASymlink { path: PathBuf },

    #[error("Source and destination are on different volumes: {source_path} -> {dest}")]
    CrossVolume { source_path: PathBuf, dest: PathBuf },

    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

/// Coarse classification of an [`Error`], for callers that only care about
/// which kind of failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    PermissionDenied,
    Os,
}

impl Error {
    /// Wrap an I/O error, promoting `NotFound` and `AlreadyExists` to the
    /// dedicated variants.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotARegularFile { .. }
            | Self::NotADirectory { .. }
            | Self::NotASymlink { .. }
            | Self::CrossVolume { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::PermissionDenied
            }
            Self::Io { .. } | Self::LockFailed { .. } => ErrorKind::Os,
        }
    }
}
