//! Error types for byte store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for byte store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during byte store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the store.
    #[error("read beyond end of store: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current store size.
        size: u64,
    },

    /// The store's advisory lock could not be acquired.
    #[error("failed to lock {path}: {source}")]
    LockFailed {
        /// Path of the file that could not be locked.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}
