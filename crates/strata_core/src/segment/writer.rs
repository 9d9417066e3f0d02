//! Single-pass bulk loader for B-tree segments.
//!
//! The writer consumes one forward traversal of a sorted, duplicate-free
//! cursor and appends pages to its sink in a single streaming pass,
//! never seeking backward:
//!
//! 1. Leaf cells accumulate into a *leaf group* (the leaf page plus any
//!    overflow chains its cells spilled). Groups are written in order,
//!    delayed by one group so each leaf can point at its successor.
//! 2. As each leaf is written, its last key becomes a separator for the
//!    level above. Separator levels are written bottom-up until a single
//!    page remains: the root.
//! 3. A fixed-size footer closes the segment.
//!
//! Buffering is bounded by the in-flight leaf groups and one separator
//! list per level, never the whole dataset.

use crate::cursor::Cursor;
use crate::error::{CoreError, CoreResult};
use crate::segment::overflow;
use crate::segment::page::{
    assemble_page, encode_internal_cell, encode_leaf_cell, internal_cell_len, leaf_cell_len,
    max_inline, Footer, PageKind, RawSlot, RawValue, DEFAULT_PAGE_SIZE, FOOTER_LEN, MAX_PAGE_SIZE,
    MIN_PAGE_SIZE, NIL_PAGE, PAGE_HEADER_LEN,
};
use bytes::Bytes;
use strata_storage::ByteStore;
use tracing::debug;

/// What a finished build wrote, for the caller to persist alongside the
/// segment so it can be opened later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Total bytes written to the sink, footer included.
    pub bytes_written: u64,
    /// Number of fixed-size pages written.
    pub page_count: u32,
    /// Number of entries the segment holds.
    pub entry_count: u64,
}

/// Appends sealed pages to a byte store, numbering them in write order.
struct PageSink<'a, S: ByteStore + ?Sized> {
    store: &'a mut S,
    page_size: u32,
    pages: u32,
}

impl<S: ByteStore + ?Sized> PageSink<'_, S> {
    fn write_page(&mut self, page: &[u8]) -> CoreResult<u32> {
        debug_assert_eq!(page.len(), self.page_size as usize);
        self.store.append(page)?;
        let id = self.pages;
        self.pages += 1;
        Ok(id)
    }

    /// Page number the next `write_page` call will assign.
    fn next_page(&self) -> u32 {
        self.pages
    }
}

/// A leaf page under construction together with the overflow chains its
/// cells reference. The group's pages occupy ids `base ..= base + chains`,
/// with the leaf itself last.
struct LeafGroup {
    base: u32,
    prev_leaf: u32,
    chain_pages: Vec<Vec<u8>>,
    cells: Vec<Vec<u8>>,
    cells_len: usize,
    last_key: Bytes,
}

impl LeafGroup {
    fn new(base: u32, prev_leaf: u32) -> Self {
        Self {
            base,
            prev_leaf,
            chain_pages: Vec::new(),
            cells: Vec::new(),
            cells_len: 0,
            last_key: Bytes::new(),
        }
    }

    fn page_total(&self) -> u32 {
        self.chain_pages.len() as u32 + 1
    }

    fn leaf_id(&self) -> u32 {
        self.base + self.chain_pages.len() as u32
    }

    fn fits(&self, cell_len: usize, page_size: u32) -> bool {
        PAGE_HEADER_LEN + 2 * (self.cells.len() + 1) + self.cells_len + cell_len
            <= page_size as usize
    }
}

/// Bulk-builds an immutable B-tree segment on a byte store.
///
/// The sink must be fresh (caller-truncated); the writer appends
/// sequentially and never reads back its own output. Building requires
/// exclusive access to the sink for the build's duration.
///
/// # Example
///
/// ```rust
/// use strata_core::{MemorySegment, SegmentWriter};
/// use strata_storage::MemoryStore;
///
/// let mut source = MemorySegment::new();
/// source.insert(&b"a"[..], &b"1"[..]);
///
/// let mut store = MemoryStore::new();
/// let summary = SegmentWriter::new(&mut store)
///     .build(&mut source.open_cursor())
///     .unwrap();
/// assert_eq!(summary.entry_count, 1);
/// ```
pub struct SegmentWriter<'a, S: ByteStore + ?Sized> {
    store: &'a mut S,
    page_size: u32,
}

impl<'a, S: ByteStore + ?Sized> SegmentWriter<'a, S> {
    /// Creates a writer with the default page size.
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates a writer with an explicit page size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPageSize`] when the size is out of
    /// range or not a power of two.
    pub fn with_page_size(store: &'a mut S, page_size: u32) -> CoreResult<Self> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(CoreError::InvalidPageSize {
                size: page_size,
                reason: "outside supported range",
            });
        }
        if !page_size.is_power_of_two() {
            return Err(CoreError::InvalidPageSize {
                size: page_size,
                reason: "not a power of two",
            });
        }
        Ok(Self { store, page_size })
    }

    /// Builds the segment from one forward traversal of `source`.
    ///
    /// The source must be sorted and duplicate-free; the cursor is
    /// positioned at its first entry by the writer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsortedInput`] when the source violates its
    /// ordering precondition, or a storage error from the sink.
    pub fn build(self, source: &mut dyn Cursor) -> CoreResult<BuildSummary> {
        let page_size = self.page_size;
        let cap = max_inline(page_size);
        let mut sink = PageSink {
            store: self.store,
            page_size,
            pages: 0,
        };

        source.first()?;
        if !source.is_valid() {
            return finish(&mut sink, NIL_PAGE, 0);
        }

        let mut pending: Option<LeafGroup> = None;
        let mut current = LeafGroup::new(0, NIL_PAGE);
        let mut separators: Vec<(Bytes, u32)> = Vec::new();
        let mut last_key: Option<Bytes> = None;
        let mut entry_count: u64 = 0;

        while source.is_valid() {
            let key = source.key()?;
            if let Some(prev) = &last_key {
                if key <= *prev {
                    return Err(CoreError::unsorted(format!(
                        "key {:?} follows {:?}",
                        key, prev
                    )));
                }
            }
            let value = source.value()?;

            let key_spilled = key.len() > cap;
            let (tombstone, value_spilled, value_len) = match &value {
                None => (true, false, 0),
                Some(v) => (false, v.len() > cap, v.len()),
            };
            let cell_len =
                leaf_cell_len(key_spilled, key.len(), tombstone, value_spilled, value_len);

            if !current.fits(cell_len, page_size) {
                // The current leaf is complete: flush its predecessor
                // (which can now point at it) and start a fresh group.
                let base = current.base + current.page_total();
                let leaf = current.leaf_id();
                if let Some(p) = pending.take() {
                    flush_leaf_group(&mut sink, p, leaf, &mut separators)?;
                }
                let complete = std::mem::replace(&mut current, LeafGroup::new(base, leaf));
                pending = Some(complete);
            }

            let key_slot = if key_spilled {
                let first_page = current.base + current.chain_pages.len() as u32;
                current
                    .chain_pages
                    .extend(overflow::build_chain(&key, page_size, first_page));
                RawSlot::Spilled {
                    first_page,
                    len: key.len() as u32,
                }
            } else {
                RawSlot::Inline(key.clone())
            };

            let value_slot = match &value {
                None => RawValue::Tombstone,
                Some(v) if value_spilled => {
                    let first_page = current.base + current.chain_pages.len() as u32;
                    current
                        .chain_pages
                        .extend(overflow::build_chain(v, page_size, first_page));
                    RawValue::Spilled {
                        first_page,
                        len: v.len() as u32,
                    }
                }
                Some(v) => RawValue::Inline(v.clone()),
            };

            let cell = encode_leaf_cell(&key_slot, &value_slot);
            debug_assert_eq!(cell.len(), cell_len);
            current.cells_len += cell.len();
            current.cells.push(cell);
            current.last_key = key.clone();
            last_key = Some(key);
            entry_count += 1;

            source.next()?;
        }

        // Tail: the final leaf has no successor.
        if let Some(p) = pending.take() {
            let leaf = current.leaf_id();
            flush_leaf_group(&mut sink, p, leaf, &mut separators)?;
        }
        flush_leaf_group(&mut sink, current, NIL_PAGE, &mut separators)?;

        // Separator levels, bottom-up, until one page holds the lot.
        let mut level = separators;
        let mut depth = 0u32;
        while level.len() > 1 {
            level = write_internal_level(&mut sink, level, page_size)?;
            depth += 1;
            debug!(depth, pages = level.len(), "separator level written");
        }
        let root = level.pop().map(|(_, id)| id).unwrap_or(NIL_PAGE);

        finish(&mut sink, root, entry_count)
    }
}

/// Writes a completed leaf group (chains, then the leaf page) and records
/// its separator.
fn flush_leaf_group<S: ByteStore + ?Sized>(
    sink: &mut PageSink<'_, S>,
    group: LeafGroup,
    next_leaf: u32,
    separators: &mut Vec<(Bytes, u32)>,
) -> CoreResult<()> {
    debug_assert_eq!(sink.next_page(), group.base);

    for page in &group.chain_pages {
        sink.write_page(page)?;
    }

    let page = assemble_page(
        PageKind::Leaf,
        group.prev_leaf,
        next_leaf,
        &group.cells,
        sink.page_size,
    );
    let id = sink.write_page(&page)?;
    debug_assert_eq!(id, group.leaf_id());

    separators.push((group.last_key, id));
    Ok(())
}

/// Packs one level of separators into internal pages, returning the
/// separators of the level above.
fn write_internal_level<S: ByteStore + ?Sized>(
    sink: &mut PageSink<'_, S>,
    children: Vec<(Bytes, u32)>,
    page_size: u32,
) -> CoreResult<Vec<(Bytes, u32)>> {
    let cap = max_inline(page_size);
    let mut parents = Vec::new();
    let mut cells: Vec<Vec<u8>> = Vec::new();
    let mut cells_len = 0usize;
    let mut last_key: Option<Bytes> = None;

    for (key, child) in children {
        let key_spilled = key.len() > cap;
        let cell_len = internal_cell_len(key_spilled, key.len());

        let page_full = !cells.is_empty()
            && PAGE_HEADER_LEN + 2 * (cells.len() + 1) + cells_len + cell_len
                > page_size as usize;
        if page_full {
            let page = assemble_page(PageKind::Internal, NIL_PAGE, NIL_PAGE, &cells, page_size);
            let id = sink.write_page(&page)?;
            if let Some(k) = last_key.take() {
                parents.push((k, id));
            }
            cells.clear();
            cells_len = 0;
        }

        let key_slot = if key_spilled {
            let first_page = sink.next_page();
            for page in overflow::build_chain(&key, page_size, first_page) {
                sink.write_page(&page)?;
            }
            RawSlot::Spilled {
                first_page,
                len: key.len() as u32,
            }
        } else {
            RawSlot::Inline(key.clone())
        };

        let cell = encode_internal_cell(child, &key_slot);
        cells_len += cell.len();
        cells.push(cell);
        last_key = Some(key);
    }

    if !cells.is_empty() {
        let page = assemble_page(PageKind::Internal, NIL_PAGE, NIL_PAGE, &cells, page_size);
        let id = sink.write_page(&page)?;
        if let Some(k) = last_key.take() {
            parents.push((k, id));
        }
    }

    Ok(parents)
}

/// Appends the footer and flushes the sink.
fn finish<S: ByteStore + ?Sized>(
    sink: &mut PageSink<'_, S>,
    root: u32,
    entry_count: u64,
) -> CoreResult<BuildSummary> {
    let footer = Footer {
        page_size: sink.page_size,
        root,
        page_count: sink.pages,
        entry_count,
    };
    sink.store.append(&footer.encode())?;
    sink.store.flush()?;
    sink.store.sync()?;

    let summary = BuildSummary {
        bytes_written: u64::from(sink.pages) * u64::from(sink.page_size) + FOOTER_LEN as u64,
        page_count: sink.pages,
        entry_count,
    };
    debug!(
        pages = summary.page_count,
        entries = summary.entry_count,
        bytes = summary.bytes_written,
        "segment build complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySegment;
    use strata_storage::MemoryStore;

    #[test]
    fn empty_source_writes_footer_only() {
        let source = MemorySegment::new();
        let mut store = MemoryStore::new();

        let summary = SegmentWriter::new(&mut store)
            .build(&mut source.open_cursor())
            .unwrap();

        assert_eq!(summary.page_count, 0);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.bytes_written, FOOTER_LEN as u64);
        assert_eq!(store.data().len(), FOOTER_LEN);
    }

    #[test]
    fn single_leaf_segment() {
        let mut source = MemorySegment::new();
        source.insert(&b"a"[..], &b"1"[..]);
        source.insert(&b"b"[..], &b"2"[..]);

        let mut store = MemoryStore::new();
        let summary = SegmentWriter::new(&mut store)
            .build(&mut source.open_cursor())
            .unwrap();

        assert_eq!(summary.page_count, 1);
        assert_eq!(summary.entry_count, 2);
        assert_eq!(
            summary.bytes_written,
            u64::from(DEFAULT_PAGE_SIZE) + FOOTER_LEN as u64
        );
    }

    #[test]
    fn small_pages_grow_the_tree() {
        let mut source = MemorySegment::new();
        for i in 0..200u32 {
            source.insert(format!("key{i:05}").into_bytes(), format!("v{i}").into_bytes());
        }

        let mut store = MemoryStore::new();
        let summary = SegmentWriter::with_page_size(&mut store, 128)
            .unwrap()
            .build(&mut source.open_cursor())
            .unwrap();

        assert_eq!(summary.entry_count, 200);
        // Many leaves plus at least one separator level
        assert!(summary.page_count > 30);
    }

    #[test]
    fn oversize_payloads_spill() {
        let mut source = MemorySegment::new();
        source.insert(&b"big"[..], vec![0xAB; 10_000]);

        let mut store = MemoryStore::new();
        let summary = SegmentWriter::with_page_size(&mut store, 256)
            .unwrap()
            .build(&mut source.open_cursor())
            .unwrap();

        assert_eq!(summary.entry_count, 1);
        assert!(summary.page_count as usize > 10_000 / 256);
    }

    #[test]
    fn rejects_bad_page_sizes() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            SegmentWriter::with_page_size(&mut store, 64),
            Err(CoreError::InvalidPageSize { .. })
        ));
        let mut store = MemoryStore::new();
        assert!(matches!(
            SegmentWriter::with_page_size(&mut store, 3000),
            Err(CoreError::InvalidPageSize { .. })
        ));
    }

    #[test]
    fn footer_is_last_32_bytes() {
        let mut source = MemorySegment::new();
        source.insert(&b"k"[..], &b"v"[..]);

        let mut store = MemoryStore::new();
        SegmentWriter::new(&mut store)
            .build(&mut source.open_cursor())
            .unwrap();

        let data = store.data();
        let footer = Footer::decode(&data[data.len() - FOOTER_LEN..]).unwrap();
        assert_eq!(footer.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(footer.page_count, 1);
        assert_eq!(footer.entry_count, 1);
        assert_eq!(footer.root, 0);
    }
}
