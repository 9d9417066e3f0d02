//! # Strata Core
//!
//! The read path of a log-structured-merge storage engine:
//!
//! - [`MemorySegment`] - mutable sorted source recording inserts and
//!   tombstones, feeding segment builds through its cursor
//! - [`SegmentWriter`] / [`SegmentReader`] - bulk-build and open
//!   immutable B-tree segments on any [`ByteStore`]
//! - [`MultiCursor`] - one merged, deduplicated view over any number of
//!   segments under a fixed precedence order
//! - [`LivingCursor`] - the same view with tombstones filtered out
//!
//! Everything reads through one [`Cursor`] trait, so the wrappers never
//! care whether a segment lives in memory or on disk.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_core::{Cursor, MemorySegment, SeekOp, SegmentReader, SegmentWriter};
//! use strata_storage::MemoryStore;
//!
//! let mut live = MemorySegment::new();
//! live.insert(&b"c"[..], &b"3"[..]);
//! live.insert(&b"e"[..], &b"5"[..]);
//!
//! let mut store = MemoryStore::new();
//! let summary = SegmentWriter::new(&mut store)
//!     .build(&mut live.open_cursor())
//!     .unwrap();
//!
//! let reader = SegmentReader::open(Arc::new(store), summary.bytes_written).unwrap();
//! let mut csr = reader.open_cursor();
//! csr.seek(b"d", SeekOp::Ge).unwrap();
//! assert_eq!(csr.key().unwrap(), &b"e"[..]);
//! ```
//!
//! [`ByteStore`]: strata_storage::ByteStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod error;
mod living;
mod memory;
mod multi;
mod segment;
mod types;

pub use cursor::{Cursor, SeekOp};
pub use error::{CoreError, CoreResult};
pub use living::LivingCursor;
pub use memory::{MemoryCursor, MemorySegment};
pub use multi::MultiCursor;
pub use segment::{
    open_segment_cursor, BuildSummary, SegmentCursor, SegmentReader, SegmentWriter,
    DEFAULT_PAGE_SIZE, FOOTER_LEN, MAX_PAGE_SIZE, MIN_PAGE_SIZE, NIL_PAGE,
};
pub use types::{Entry, Key, Value};
