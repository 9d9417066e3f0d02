//! Error types for Strata core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Strata core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Byte store error.
    #[error("storage error: {0}")]
    Storage(#[from] strata_storage::StorageError),

    /// Segment bytes are malformed, truncated, or inconsistent.
    #[error("segment corrupt: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a page or footer.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the segment.
        expected: u32,
        /// Checksum computed over the bytes read.
        actual: u32,
    },

    /// A cursor accessor was called without a current entry.
    #[error("cursor has no current entry")]
    InvalidCursor,

    /// Segment build input violated the sorted, duplicate-free precondition.
    #[error("build input not sorted and duplicate-free: {detail}")]
    UnsortedInput {
        /// Description of the offending key pair.
        detail: String,
    },

    /// The requested page size is outside the supported range.
    #[error("invalid page size {size}: {reason}")]
    InvalidPageSize {
        /// The rejected page size.
        size: u32,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an unsorted-input error.
    pub fn unsorted(detail: impl Into<String>) -> Self {
        Self::UnsortedInput {
            detail: detail.into(),
        }
    }
}
