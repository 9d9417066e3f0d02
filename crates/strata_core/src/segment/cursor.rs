//! Read-side access to built B-tree segments.
//!
//! A [`SegmentReader`] validates the footer once; each [`SegmentCursor`]
//! it opens keeps only the leaf page it is currently on. Sequential scans
//! follow the leaves' sibling links, so after the initial descent a scan
//! costs one page load per leaf boundary, never a re-descent from the
//! root.

use crate::cursor::{Cursor, SeekOp};
use crate::error::{CoreError, CoreResult};
use crate::segment::overflow;
use crate::segment::page::{
    parse_internal_cells, parse_leaf_cells, parse_page_header, Footer, PageKind, RawSlot,
    RawValue, FOOTER_LEN, NIL_PAGE,
};
use bytes::Bytes;
use std::sync::Arc;
use strata_storage::ByteStore;
use tracing::{debug, warn};

/// An opened, validated B-tree segment.
///
/// Holds the shared byte store and the decoded footer; cheap to clone
/// cursors from. Opening a zero-length store yields a valid empty segment
/// whose cursors are invalid on `first`/`last`/`seek` - not an error.
pub struct SegmentReader<S: ByteStore + ?Sized> {
    store: Arc<S>,
    footer: Option<Footer>,
}

impl<S: ByteStore + ?Sized> SegmentReader<S> {
    /// Opens a segment over `len` bytes of `store`.
    ///
    /// `len` must be the exact length returned by the build; a mismatch
    /// with the bytes actually available is a decode error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupt`] or [`CoreError::ChecksumMismatch`]
    /// when the footer is missing, damaged, or inconsistent with `len`.
    pub fn open(store: Arc<S>, len: u64) -> CoreResult<Self> {
        if len == 0 {
            return Ok(Self {
                store,
                footer: None,
            });
        }

        let available = store.len()?;
        if len > available {
            warn!(claimed = len, available, "segment length exceeds store");
            return Err(CoreError::corrupt(format!(
                "segment claims {len} bytes but store holds {available}"
            )));
        }
        if len < FOOTER_LEN as u64 {
            return Err(CoreError::corrupt(format!(
                "segment of {len} bytes cannot hold a footer"
            )));
        }

        let footer_bytes = store.read_at(len - FOOTER_LEN as u64, FOOTER_LEN)?;
        let footer = Footer::decode(&footer_bytes)?;

        let body = len - FOOTER_LEN as u64;
        let expected_body = u64::from(footer.page_count) * u64::from(footer.page_size);
        if body != expected_body {
            return Err(CoreError::corrupt(format!(
                "footer claims {} pages of {} bytes but segment body is {body} bytes",
                footer.page_count, footer.page_size
            )));
        }
        if footer.root == NIL_PAGE {
            if footer.page_count != 0 || footer.entry_count != 0 {
                return Err(CoreError::corrupt("rootless segment with pages"));
            }
        } else if footer.root >= footer.page_count {
            return Err(CoreError::corrupt(format!(
                "root page {} out of range ({} pages)",
                footer.root, footer.page_count
            )));
        }

        debug!(
            pages = footer.page_count,
            entries = footer.entry_count,
            page_size = footer.page_size,
            "segment opened"
        );

        Ok(Self {
            store,
            footer: Some(footer),
        })
    }

    /// Number of entries in the segment.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.footer.map_or(0, |f| f.entry_count)
    }

    /// Number of pages in the segment.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.footer.map_or(0, |f| f.page_count)
    }

    /// Opens a cursor over the segment.
    ///
    /// Any number of cursors may be open at once; each is independent and
    /// must be driven by a single thread at a time.
    #[must_use]
    pub fn open_cursor(&self) -> SegmentCursor<S> {
        SegmentCursor {
            store: Arc::clone(&self.store),
            footer: self.footer,
            leaf: None,
            pos: 0,
        }
    }
}

/// Convenience: open a segment and a single cursor over it.
///
/// # Errors
///
/// Propagates [`SegmentReader::open`] failures.
pub fn open_segment_cursor<S: ByteStore + ?Sized>(
    store: Arc<S>,
    len: u64,
) -> CoreResult<SegmentCursor<S>> {
    Ok(SegmentReader::open(store, len)?.open_cursor())
}

/// A leaf page loaded into memory, spilled keys already resolved.
struct LoadedLeaf {
    prev: u32,
    next: u32,
    keys: Vec<Bytes>,
    values: Vec<RawValue>,
}

/// A cursor over one on-disk B-tree segment.
///
/// Created invalid; position with `first`/`last`/`seek`. Holds the
/// current leaf plus the path constants needed to follow sibling links;
/// nothing else is cached.
pub struct SegmentCursor<S: ByteStore + ?Sized> {
    store: Arc<S>,
    footer: Option<Footer>,
    leaf: Option<LoadedLeaf>,
    pos: usize,
}

impl<S: ByteStore + ?Sized> SegmentCursor<S> {
    fn page_size(&self) -> u32 {
        self.footer.map_or(0, |f| f.page_size)
    }

    fn root(&self) -> Option<u32> {
        self.footer
            .and_then(|f| (f.root != NIL_PAGE).then_some(f.root))
    }

    fn read_page(&self, id: u32) -> CoreResult<Bytes> {
        let Some(footer) = self.footer else {
            return Err(CoreError::corrupt("page read on empty segment"));
        };
        if id >= footer.page_count {
            return Err(CoreError::corrupt(format!(
                "page {id} out of range ({} pages)",
                footer.page_count
            )));
        }
        let offset = u64::from(id) * u64::from(footer.page_size);
        let data = self
            .store
            .read_at(offset, footer.page_size as usize)?;
        Ok(Bytes::from(data))
    }

    fn resolve_slot(&self, slot: RawSlot) -> CoreResult<Bytes> {
        match slot {
            RawSlot::Inline(bytes) => Ok(bytes),
            RawSlot::Spilled { first_page, len } => overflow::read_chain(
                |id| self.read_page(id),
                first_page,
                u64::from(len),
                self.page_size(),
            ),
        }
    }

    fn load_leaf(&self, id: u32) -> CoreResult<LoadedLeaf> {
        let page = self.read_page(id)?;
        let header = parse_page_header(&page, self.page_size())?;
        if header.kind != PageKind::Leaf {
            return Err(CoreError::corrupt(format!(
                "page {id} is {:?}, expected a leaf",
                header.kind
            )));
        }
        if header.count == 0 {
            return Err(CoreError::corrupt(format!("leaf page {id} is empty")));
        }

        let cells = parse_leaf_cells(&page, &header)?;
        let mut keys = Vec::with_capacity(cells.len());
        let mut values = Vec::with_capacity(cells.len());
        for cell in cells {
            keys.push(self.resolve_slot(cell.key)?);
            values.push(cell.value);
        }

        Ok(LoadedLeaf {
            prev: header.prev,
            next: header.next,
            keys,
            values,
        })
    }

    /// Descends from the root to the leaf bracketing `target`, or to the
    /// extreme leaf when `target` is `None`.
    fn descend(&self, target: Option<&[u8]>, rightmost: bool) -> CoreResult<LoadedLeaf> {
        let Some(mut page_id) = self.root() else {
            return Err(CoreError::corrupt("descend on empty segment"));
        };

        loop {
            let page = self.read_page(page_id)?;
            let header = parse_page_header(&page, self.page_size())?;
            match header.kind {
                PageKind::Leaf => return self.load_leaf(page_id),
                PageKind::Internal => {
                    let cells = parse_internal_cells(&page, &header)?;
                    if cells.is_empty() {
                        return Err(CoreError::corrupt(format!(
                            "internal page {page_id} has no children"
                        )));
                    }
                    let idx = match target {
                        None if rightmost => cells.len() - 1,
                        None => 0,
                        Some(key) => {
                            // Binary search for the first child whose
                            // separator (its subtree's greatest key) is
                            // >= the target; past the last separator,
                            // the rightmost child.
                            let mut lo = 0usize;
                            let mut hi = cells.len();
                            while lo < hi {
                                let mid = lo + (hi - lo) / 2;
                                let sep = match &cells[mid].key {
                                    RawSlot::Inline(k) => k.clone(),
                                    spilled => self.resolve_slot(spilled.clone())?,
                                };
                                if sep.as_ref() >= key {
                                    hi = mid;
                                } else {
                                    lo = mid + 1;
                                }
                            }
                            lo.min(cells.len() - 1)
                        }
                    };
                    page_id = cells[idx].child;
                }
                PageKind::Overflow => {
                    return Err(CoreError::corrupt(format!(
                        "overflow page {page_id} on descent path"
                    )));
                }
            }
        }
    }

    fn install(&mut self, leaf: LoadedLeaf, pos: usize) {
        self.pos = pos;
        self.leaf = Some(leaf);
    }

    fn invalidate(&mut self) {
        self.leaf = None;
        self.pos = 0;
    }

    fn current(&self) -> CoreResult<(&Bytes, &RawValue)> {
        let leaf = self.leaf.as_ref().ok_or(CoreError::InvalidCursor)?;
        Ok((&leaf.keys[self.pos], &leaf.values[self.pos]))
    }
}

impl<S: ByteStore + ?Sized> Cursor for SegmentCursor<S> {
    fn first(&mut self) -> CoreResult<()> {
        if self.root().is_none() {
            self.invalidate();
            return Ok(());
        }
        match self.descend(None, false) {
            Ok(leaf) => {
                self.install(leaf, 0);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    fn last(&mut self) -> CoreResult<()> {
        if self.root().is_none() {
            self.invalidate();
            return Ok(());
        }
        match self.descend(None, true) {
            Ok(leaf) => {
                let pos = leaf.keys.len() - 1;
                self.install(leaf, pos);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    fn next(&mut self) -> CoreResult<()> {
        let Some(leaf) = self.leaf.as_ref() else {
            return Ok(());
        };

        if self.pos + 1 < leaf.keys.len() {
            self.pos += 1;
            return Ok(());
        }

        let next = leaf.next;
        if next == NIL_PAGE {
            self.invalidate();
            return Ok(());
        }
        match self.load_leaf(next) {
            Ok(leaf) => {
                self.install(leaf, 0);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    fn prev(&mut self) -> CoreResult<()> {
        let Some(leaf) = self.leaf.as_ref() else {
            return Ok(());
        };

        if self.pos > 0 {
            self.pos -= 1;
            return Ok(());
        }

        let prev = leaf.prev;
        if prev == NIL_PAGE {
            self.invalidate();
            return Ok(());
        }
        match self.load_leaf(prev) {
            Ok(leaf) => {
                let pos = leaf.keys.len() - 1;
                self.install(leaf, pos);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()> {
        if self.root().is_none() {
            self.invalidate();
            return Ok(());
        }

        let leaf = match self.descend(Some(key), false) {
            Ok(leaf) => leaf,
            Err(e) => {
                self.invalidate();
                return Err(e);
            }
        };

        match leaf.keys.binary_search_by(|k| k.as_ref().cmp(key)) {
            Ok(pos) => self.install(leaf, pos),
            Err(insert) => match op {
                SeekOp::Eq => self.invalidate(),
                SeekOp::Ge => {
                    if insert < leaf.keys.len() {
                        self.install(leaf, insert);
                    } else if leaf.next != NIL_PAGE {
                        // The target sorts past this leaf; its successor
                        // starts the qualifying range.
                        let next = leaf.next;
                        match self.load_leaf(next) {
                            Ok(leaf) => self.install(leaf, 0),
                            Err(e) => {
                                self.invalidate();
                                return Err(e);
                            }
                        }
                    } else {
                        self.invalidate();
                    }
                }
                SeekOp::Le => {
                    if insert > 0 {
                        self.install(leaf, insert - 1);
                    } else if leaf.prev != NIL_PAGE {
                        let prev = leaf.prev;
                        match self.load_leaf(prev) {
                            Ok(leaf) => {
                                let pos = leaf.keys.len() - 1;
                                self.install(leaf, pos);
                            }
                            Err(e) => {
                                self.invalidate();
                                return Err(e);
                            }
                        }
                    } else {
                        self.invalidate();
                    }
                }
            },
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.leaf.is_some()
    }

    fn key(&self) -> CoreResult<Bytes> {
        let (key, _) = self.current()?;
        Ok(key.clone())
    }

    fn value(&self) -> CoreResult<Option<Bytes>> {
        let (_, value) = self.current()?;
        match value {
            RawValue::Tombstone => Ok(None),
            RawValue::Inline(v) => Ok(Some(v.clone())),
            RawValue::Spilled { first_page, len } => {
                let (first_page, len) = (*first_page, *len);
                Ok(Some(overflow::read_chain(
                    |id| self.read_page(id),
                    first_page,
                    u64::from(len),
                    self.page_size(),
                )?))
            }
        }
    }

    fn value_len(&self) -> CoreResult<Option<u64>> {
        let (_, value) = self.current()?;
        Ok(match value {
            RawValue::Tombstone => None,
            RawValue::Inline(v) => Some(v.len() as u64),
            RawValue::Spilled { len, .. } => Some(u64::from(*len)),
        })
    }
}
