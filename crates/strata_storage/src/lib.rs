//! # Strata Storage
//!
//! Byte store trait and implementations for Strata segments.
//!
//! This crate provides the lowest-level storage abstraction for Strata.
//! Byte stores are **opaque** - they hand back exactly the bytes that were
//! appended to them and know nothing about pages, entries, or trees. The
//! segment codec in `strata_core` owns all format interpretation.
//!
//! ## Design Principles
//!
//! - Stores are simple byte sinks/sources (append, read_at, flush)
//! - Appending requires `&mut self`; reading requires only `&self`, so any
//!   number of cursors may read one store concurrently
//! - Stores must be `Send + Sync` so readers can be shared across threads
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral segments
//! - [`FileStore`] - For durable segments using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use strata_storage::{ByteStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! let offset = store.append(b"hello world").unwrap();
//! let data = store.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::ByteStore;
