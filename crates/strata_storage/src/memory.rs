//! In-memory byte store for testing and ephemeral segments.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use parking_lot::RwLock;

/// An in-memory byte store.
///
/// Suitable for unit tests, integration tests, and segments that do not
/// need to outlive the process. Builds write into it like any other sink;
/// opening a segment over it afterwards reads the same bytes back.
///
/// # Thread Safety
///
/// Reads lock internally, so a `MemoryStore` behind an `Arc` can serve
/// many cursors at once.
///
/// # Example
///
/// ```rust
/// use strata_storage::{ByteStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// let offset = store.append(b"segment bytes").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(store.len().unwrap(), 13);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory store over pre-existing bytes.
    ///
    /// Useful for corruption tests that tamper with built segments.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all bytes in the store.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl ByteStore for MemoryStore {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // No pending writes in memory
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        // No durable medium to sync
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}
