//! Fixtures for building and opening segments in tests.

use std::path::Path;
use std::sync::Arc;
use strata_core::{
    open_segment_cursor, Cursor, Entry, MemorySegment, SegmentCursor, SegmentWriter,
    DEFAULT_PAGE_SIZE,
};
use strata_storage::{FileStore, MemoryStore};

/// Builds a memory segment from entries; `None` payloads become deletes.
pub fn memory_segment(entries: &[Entry]) -> MemorySegment {
    let mut seg = MemorySegment::new();
    for entry in entries {
        match &entry.value {
            Some(v) => seg.insert(entry.key.clone(), v.clone()),
            None => seg.delete(entry.key.clone()),
        }
    }
    seg
}

/// Builds a memory segment from string pairs.
pub fn memory_segment_from_pairs(pairs: &[(&str, &str)]) -> MemorySegment {
    let mut seg = MemorySegment::new();
    for (k, v) in pairs {
        seg.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
    }
    seg
}

/// Builds `source` into an in-memory byte store.
///
/// Returns the store and the exact built length for opening.
pub fn build_memory_store(source: &MemorySegment, page_size: u32) -> (Arc<MemoryStore>, u64) {
    let mut store = MemoryStore::new();
    let summary = SegmentWriter::with_page_size(&mut store, page_size)
        .unwrap()
        .build(&mut source.open_cursor())
        .unwrap();
    (Arc::new(store), summary.bytes_written)
}

/// Builds `source` into a file-backed byte store.
pub fn build_file_store(
    source: &MemorySegment,
    path: &Path,
    page_size: u32,
) -> (Arc<FileStore>, u64) {
    let mut store = FileStore::create(path).unwrap();
    let summary = SegmentWriter::with_page_size(&mut store, page_size)
        .unwrap()
        .build(&mut source.open_cursor())
        .unwrap();
    (Arc::new(store), summary.bytes_written)
}

/// Opens a segment cursor over a previously built memory store.
pub fn open_memory_segment(store: Arc<MemoryStore>, len: u64) -> SegmentCursor<MemoryStore> {
    open_segment_cursor(store, len).unwrap()
}

/// Runs a scenario against every cursor kind over the same contents:
/// the live memory cursor, segments built with the default and a small
/// page size over memory stores, and a segment on a file store.
///
/// Mirrors the way engine queries see segments: the merge layer never
/// knows which kind it is holding.
pub fn with_each_cursor_kind(source: &MemorySegment, scenario: impl Fn(&mut dyn Cursor)) {
    scenario(&mut source.open_cursor());

    let (store, len) = build_memory_store(source, DEFAULT_PAGE_SIZE);
    scenario(&mut open_segment_cursor(store, len).unwrap());

    let (store, len) = build_memory_store(source, 256);
    scenario(&mut open_segment_cursor(store, len).unwrap());

    let dir = tempfile::tempdir().unwrap();
    let (store, len) = build_file_store(source, &dir.path().join("seg.strata"), DEFAULT_PAGE_SIZE);
    scenario(&mut open_segment_cursor(store, len).unwrap());
}

/// Counts entries walking forward from `first`.
pub fn count_forward(csr: &mut dyn Cursor) -> usize {
    let mut count = 0;
    csr.first().unwrap();
    while csr.is_valid() {
        count += 1;
        csr.next().unwrap();
    }
    count
}

/// Counts entries walking backward from `last`.
pub fn count_backward(csr: &mut dyn Cursor) -> usize {
    let mut count = 0;
    csr.last().unwrap();
    while csr.is_valid() {
        count += 1;
        csr.prev().unwrap();
    }
    count
}

/// Collects all keys walking forward.
pub fn keys_forward(csr: &mut dyn Cursor) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    csr.first().unwrap();
    while csr.is_valid() {
        keys.push(csr.key().unwrap().to_vec());
        csr.next().unwrap();
    }
    keys
}

/// Collects `(key, payload)` pairs walking forward.
pub fn entries_forward(csr: &mut dyn Cursor) -> Vec<Entry> {
    let mut entries = Vec::new();
    csr.first().unwrap();
    while csr.is_valid() {
        entries.push(Entry {
            key: csr.key().unwrap(),
            value: csr.value().unwrap(),
        });
        csr.next().unwrap();
    }
    entries
}

/// Collects `(key, payload)` pairs walking backward.
pub fn entries_backward(csr: &mut dyn Cursor) -> Vec<Entry> {
    let mut entries = Vec::new();
    csr.last().unwrap();
    while csr.is_valid() {
        entries.push(Entry {
            key: csr.key().unwrap(),
            value: csr.value().unwrap(),
        });
        csr.prev().unwrap();
    }
    entries
}
