use std::io;
use std::path::{Path, PathBuf};

use crate::transfer::verify::Verification;

/// Errors produced by the transfer engine and its building blocks.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Source file did not exist when its task was dispatched.
    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Post-copy verification of a move did not match the source.
    #[error("Integrity check failed for {}: {mismatch}", path.display())]
    Integrity { path: PathBuf, mismatch: Verification },

    /// Sidecar metadata could not be written.
    #[error("Failed to write metadata file {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error("Invalid path in plan: '{0}'")]
    InvalidPath(String),

    /// Source and destination resolve to the same file.
    #[error("Source and destination are the same file: {}", .0.display())]
    SameFile(PathBuf),

    /// An earlier task of the same run already writes to this destination.
    #[error("Destination already claimed by another file: {}", .0.display())]
    DuplicateDestination(PathBuf),

    #[error("Cancelled before transfer started: {}", .0.display())]
    Cancelled(PathBuf),

    /// The destination root cannot be created or written to.
    #[error("Destination root is not writable: {}: {source}", path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl TransferError {
    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short label for logs and summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not found",
            Self::Io { .. } | Self::DestinationUnavailable { .. } => "io",
            Self::Integrity { .. } => "integrity",
            Self::Metadata { .. } => "metadata",
            Self::InvalidPath(_) | Self::SameFile(_) => "invalid path",
            Self::DuplicateDestination(_) => "duplicate",
            Self::Cancelled(_) => "cancelled",
            Self::WorkerPool(_) => "worker pool",
        }
    }
}
