//! File-backed byte store for durable segments.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-backed byte store.
///
/// Segment builds write through [`FileStore::create`], which truncates the
/// file and takes an exclusive advisory lock for the duration of the
/// build. Readers use [`FileStore::open`], which opens read-only under a
/// shared lock, so a segment can never be observed mid-build and any
/// number of readers coexist.
///
/// # Durability
///
/// - `flush()` pushes buffered data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Example
///
/// ```no_run
/// use strata_storage::{ByteStore, FileStore};
/// use std::path::Path;
///
/// let mut store = FileStore::create(Path::new("segment.strata")).unwrap();
/// store.append(b"durable bytes").unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileStore {
    /// Creates (or truncates) a file for a fresh segment build.
    ///
    /// Takes an exclusive advisory lock on the file; the lock is released
    /// when the store is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, or
    /// [`StorageError::LockFailed`] if another process holds a lock on it.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|source| StorageError::LockFailed {
                path: path.to_path_buf(),
                source: source.into(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(0),
        })
    }

    /// Opens an existing segment file read-only.
    ///
    /// Takes a shared advisory lock, so opening fails while a build still
    /// holds the file exclusively.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or
    /// [`StorageError::LockFailed`] while a build is in progress.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;

        file.try_lock_shared()
            .map_err(|source| StorageError::LockFailed {
                path: path.to_path_buf(),
                source: source.into(),
            })?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }
}
