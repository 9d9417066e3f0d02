//! Page and footer formats for on-disk B-tree segments.
//!
//! All multi-byte integers are little-endian. Every page starts with a
//! 16-byte header whose first field is a CRC32 over the rest of the page:
//!
//! ```text
//! | crc32 (4) | kind (1) | flags (1) | count (2) | prev (4) | next (4) |
//! ```
//!
//! Leaf and internal pages follow the header with a `u16` cell-offset
//! table (`count` entries, offsets from the start of the page) and then
//! the cells themselves. Overflow pages reuse `count` as the chunk byte
//! length and `next` as the next chunk's page number. The segment ends
//! with a 32-byte footer:
//!
//! ```text
//! | magic (4) | version (2) | reserved (2) | page_size (4) | root (4) |
//! | page_count (4) | entry_count (8) | crc32 (4) |
//! ```

use crate::error::{CoreError, CoreResult};
use bytes::Bytes;

/// Magic bytes identifying a Strata segment footer.
pub const SEGMENT_MAGIC: [u8; 4] = *b"SSEG";

/// Current segment format version.
pub const SEGMENT_VERSION: u16 = 1;

/// Default page size for segment builds.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Smallest supported page size.
pub const MIN_PAGE_SIZE: u32 = 128;

/// Largest supported page size (cell offsets are `u16`).
pub const MAX_PAGE_SIZE: u32 = 65536;

/// Byte length of a page header.
pub const PAGE_HEADER_LEN: usize = 16;

/// Byte length of the segment footer.
pub const FOOTER_LEN: usize = 32;

/// Sentinel page number meaning "no page".
pub const NIL_PAGE: u32 = u32::MAX;

/// Kind of an on-disk page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum PageKind {
    /// Sorted entries with inline or spilled payloads.
    Leaf = 1,
    /// Separator keys and child page numbers.
    Internal = 2,
    /// One chunk of a spilled key or value.
    Overflow = 3,
}

impl PageKind {
    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Leaf),
            2 => Some(Self::Internal),
            3 => Some(Self::Overflow),
            _ => None,
        }
    }

    pub(crate) const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Per-cell flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct CellFlags(u8);

impl CellFlags {
    pub(crate) const NONE: Self = Self(0);
    const TOMBSTONE: u8 = 0x01;
    const KEY_SPILLED: u8 = 0x02;
    const VALUE_SPILLED: u8 = 0x04;

    pub(crate) const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    pub(crate) const fn as_byte(self) -> u8 {
        self.0
    }

    pub(crate) const fn is_tombstone(self) -> bool {
        self.0 & Self::TOMBSTONE != 0
    }

    pub(crate) const fn key_spilled(self) -> bool {
        self.0 & Self::KEY_SPILLED != 0
    }

    pub(crate) const fn value_spilled(self) -> bool {
        self.0 & Self::VALUE_SPILLED != 0
    }

    pub(crate) const fn with_tombstone(self) -> Self {
        Self(self.0 | Self::TOMBSTONE)
    }

    pub(crate) const fn with_key_spilled(self) -> Self {
        Self(self.0 | Self::KEY_SPILLED)
    }

    pub(crate) const fn with_value_spilled(self) -> Self {
        Self(self.0 | Self::VALUE_SPILLED)
    }
}

/// Largest key or value stored inline in a page; larger payloads spill
/// into overflow chains. A quarter page keeps a handful of cells per leaf
/// even in the worst case.
pub(crate) fn max_inline(page_size: u32) -> usize {
    (page_size / 4) as usize
}

/// Parsed page header, CRC already verified.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageHeader {
    pub kind: PageKind,
    pub count: u16,
    pub prev: u32,
    pub next: u32,
}

/// Builds a page header with a zeroed CRC slot; [`seal_page`] fills it in.
pub(crate) fn page_header_bytes(kind: PageKind, count: u16, prev: u32, next: u32) -> [u8; PAGE_HEADER_LEN] {
    let mut h = [0u8; PAGE_HEADER_LEN];
    h[4] = kind.as_byte();
    // h[5] reserved flags byte
    h[6..8].copy_from_slice(&count.to_le_bytes());
    h[8..12].copy_from_slice(&prev.to_le_bytes());
    h[12..16].copy_from_slice(&next.to_le_bytes());
    h
}

/// Pads a page image to the full page size and writes its CRC32.
pub(crate) fn seal_page(mut page: Vec<u8>, page_size: u32) -> Vec<u8> {
    debug_assert!(page.len() >= PAGE_HEADER_LEN);
    debug_assert!(page.len() <= page_size as usize);
    page.resize(page_size as usize, 0);
    let crc = crc32fast::hash(&page[4..]);
    page[0..4].copy_from_slice(&crc.to_le_bytes());
    page
}

/// Parses and verifies a page header.
pub(crate) fn parse_page_header(page: &[u8], page_size: u32) -> CoreResult<PageHeader> {
    if page.len() != page_size as usize {
        return Err(CoreError::corrupt(format!(
            "short page: {} bytes, page size {}",
            page.len(),
            page_size
        )));
    }

    let expected = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
    let actual = crc32fast::hash(&page[4..]);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch { expected, actual });
    }

    let kind = PageKind::from_byte(page[4])
        .ok_or_else(|| CoreError::corrupt(format!("unknown page kind {}", page[4])))?;
    let count = u16::from_le_bytes([page[6], page[7]]);
    let prev = u32::from_le_bytes([page[8], page[9], page[10], page[11]]);
    let next = u32::from_le_bytes([page[12], page[13], page[14], page[15]]);

    Ok(PageHeader {
        kind,
        count,
        prev,
        next,
    })
}

/// A key or separator as stored in a cell: inline bytes or an overflow
/// chain reference.
#[derive(Debug, Clone)]
pub(crate) enum RawSlot {
    Inline(Bytes),
    Spilled { first_page: u32, len: u32 },
}

/// A leaf cell's payload slot.
#[derive(Debug, Clone)]
pub(crate) enum RawValue {
    Tombstone,
    Inline(Bytes),
    Spilled { first_page: u32, len: u32 },
}

/// A parsed leaf cell; the key may still need overflow resolution.
#[derive(Debug, Clone)]
pub(crate) struct RawLeafCell {
    pub key: RawSlot,
    pub value: RawValue,
}

/// A parsed internal cell.
#[derive(Debug, Clone)]
pub(crate) struct RawInternalCell {
    pub child: u32,
    pub key: RawSlot,
}

/// Encoded size of a leaf cell given its layout decisions.
pub(crate) fn leaf_cell_len(
    key_spilled: bool,
    key_len: usize,
    tombstone: bool,
    value_spilled: bool,
    value_len: usize,
) -> usize {
    let key_part = if key_spilled { 8 } else { 2 + key_len };
    let value_part = if tombstone {
        0
    } else if value_spilled {
        8
    } else {
        2 + value_len
    };
    1 + key_part + value_part
}

/// Encoded size of an internal cell.
pub(crate) fn internal_cell_len(key_spilled: bool, key_len: usize) -> usize {
    4 + 1 + if key_spilled { 8 } else { 2 + key_len }
}

fn encode_slot(buf: &mut Vec<u8>, slot: &RawSlot) {
    match slot {
        RawSlot::Inline(key) => {
            buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
            buf.extend_from_slice(key);
        }
        RawSlot::Spilled { first_page, len } => {
            buf.extend_from_slice(&first_page.to_le_bytes());
            buf.extend_from_slice(&len.to_le_bytes());
        }
    }
}

/// Encodes a leaf cell.
pub(crate) fn encode_leaf_cell(key: &RawSlot, value: &RawValue) -> Vec<u8> {
    let mut flags = CellFlags::NONE;
    if matches!(key, RawSlot::Spilled { .. }) {
        flags = flags.with_key_spilled();
    }
    match value {
        RawValue::Tombstone => flags = flags.with_tombstone(),
        RawValue::Spilled { .. } => flags = flags.with_value_spilled(),
        RawValue::Inline(_) => {}
    }

    let mut buf = Vec::new();
    buf.push(flags.as_byte());
    encode_slot(&mut buf, key);
    match value {
        RawValue::Tombstone => {}
        RawValue::Inline(v) => {
            buf.extend_from_slice(&(v.len() as u16).to_le_bytes());
            buf.extend_from_slice(v);
        }
        RawValue::Spilled { first_page, len } => {
            buf.extend_from_slice(&first_page.to_le_bytes());
            buf.extend_from_slice(&len.to_le_bytes());
        }
    }
    buf
}

/// Encodes an internal cell.
pub(crate) fn encode_internal_cell(child: u32, key: &RawSlot) -> Vec<u8> {
    let mut flags = CellFlags::NONE;
    if matches!(key, RawSlot::Spilled { .. }) {
        flags = flags.with_key_spilled();
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&child.to_le_bytes());
    buf.push(flags.as_byte());
    encode_slot(&mut buf, key);
    buf
}

/// Assembles a sealed leaf or internal page from encoded cells.
pub(crate) fn assemble_page(
    kind: PageKind,
    prev: u32,
    next: u32,
    cells: &[Vec<u8>],
    page_size: u32,
) -> Vec<u8> {
    let mut page = Vec::with_capacity(page_size as usize);
    page.extend_from_slice(&page_header_bytes(kind, cells.len() as u16, prev, next));

    let mut offset = PAGE_HEADER_LEN + 2 * cells.len();
    for cell in cells {
        page.extend_from_slice(&(offset as u16).to_le_bytes());
        offset += cell.len();
    }
    for cell in cells {
        page.extend_from_slice(cell);
    }

    seal_page(page, page_size)
}

struct CellReader<'a> {
    page: &'a Bytes,
    pos: usize,
}

impl<'a> CellReader<'a> {
    fn take(&mut self, n: usize) -> CoreResult<Bytes> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.page.len())
            .ok_or_else(|| CoreError::corrupt("cell extends past end of page"))?;
        let out = self.page.slice(self.pos..end);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CoreResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn slot(&mut self, spilled: bool) -> CoreResult<RawSlot> {
        if spilled {
            let first_page = self.u32()?;
            let len = self.u32()?;
            Ok(RawSlot::Spilled { first_page, len })
        } else {
            let len = self.u16()? as usize;
            Ok(RawSlot::Inline(self.take(len)?))
        }
    }
}

fn cell_offsets(page: &Bytes, header: &PageHeader) -> CoreResult<Vec<usize>> {
    let count = header.count as usize;
    let table_end = PAGE_HEADER_LEN + 2 * count;
    if table_end > page.len() {
        return Err(CoreError::corrupt("cell offset table extends past page"));
    }

    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let at = PAGE_HEADER_LEN + 2 * i;
        let off = u16::from_le_bytes([page[at], page[at + 1]]) as usize;
        if off < table_end || off >= page.len() {
            return Err(CoreError::corrupt(format!("cell offset {off} out of range")));
        }
        offsets.push(off);
    }
    Ok(offsets)
}

/// Parses the cells of a leaf page.
pub(crate) fn parse_leaf_cells(page: &Bytes, header: &PageHeader) -> CoreResult<Vec<RawLeafCell>> {
    let mut cells = Vec::with_capacity(header.count as usize);
    for off in cell_offsets(page, header)? {
        let mut r = CellReader { page, pos: off };
        let flags = CellFlags::from_byte(r.u8()?);
        let key = r.slot(flags.key_spilled())?;
        let value = if flags.is_tombstone() {
            RawValue::Tombstone
        } else if flags.value_spilled() {
            let first_page = r.u32()?;
            let len = r.u32()?;
            RawValue::Spilled { first_page, len }
        } else {
            let len = r.u16()? as usize;
            RawValue::Inline(r.take(len)?)
        };
        cells.push(RawLeafCell { key, value });
    }
    Ok(cells)
}

/// Parses the cells of an internal page.
pub(crate) fn parse_internal_cells(
    page: &Bytes,
    header: &PageHeader,
) -> CoreResult<Vec<RawInternalCell>> {
    let mut cells = Vec::with_capacity(header.count as usize);
    for off in cell_offsets(page, header)? {
        let mut r = CellReader { page, pos: off };
        let child = r.u32()?;
        let flags = CellFlags::from_byte(r.u8()?);
        let key = r.slot(flags.key_spilled())?;
        cells.push(RawInternalCell { child, key });
    }
    Ok(cells)
}

/// Segment footer: everything needed to locate and trust the tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Footer {
    pub page_size: u32,
    pub root: u32,
    pub page_count: u32,
    pub entry_count: u64,
}

impl Footer {
    /// Encodes the footer, CRC included.
    pub(crate) fn encode(&self) -> [u8; FOOTER_LEN] {
        let mut buf = [0u8; FOOTER_LEN];
        buf[0..4].copy_from_slice(&SEGMENT_MAGIC);
        buf[4..6].copy_from_slice(&SEGMENT_VERSION.to_le_bytes());
        // buf[6..8] reserved
        buf[8..12].copy_from_slice(&self.page_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.root.to_le_bytes());
        buf[16..20].copy_from_slice(&self.page_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.entry_count.to_le_bytes());
        let crc = crc32fast::hash(&buf[0..28]);
        buf[28..32].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and verifies a footer.
    pub(crate) fn decode(buf: &[u8]) -> CoreResult<Self> {
        if buf.len() != FOOTER_LEN {
            return Err(CoreError::corrupt(format!(
                "footer must be {FOOTER_LEN} bytes, got {}",
                buf.len()
            )));
        }
        if buf[0..4] != SEGMENT_MAGIC {
            return Err(CoreError::corrupt("bad segment magic"));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > SEGMENT_VERSION {
            return Err(CoreError::corrupt(format!(
                "unsupported segment version {version}"
            )));
        }

        let expected = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        let actual = crc32fast::hash(&buf[0..28]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            page_size: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            root: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            page_count: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            entry_count: u64::from_le_bytes([
                buf[20], buf[21], buf[22], buf[23], buf[24], buf[25], buf[26], buf[27],
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_kind_roundtrip() {
        for kind in [PageKind::Leaf, PageKind::Internal, PageKind::Overflow] {
            assert_eq!(PageKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(PageKind::from_byte(0), None);
        assert_eq!(PageKind::from_byte(99), None);
    }

    #[test]
    fn cell_flags() {
        let flags = CellFlags::NONE;
        assert!(!flags.is_tombstone());
        assert!(!flags.key_spilled());
        assert!(!flags.value_spilled());

        let flags = flags.with_tombstone().with_value_spilled();
        assert!(flags.is_tombstone());
        assert!(flags.value_spilled());
        assert!(!flags.key_spilled());
    }

    #[test]
    fn footer_roundtrip() {
        let footer = Footer {
            page_size: 4096,
            root: 7,
            page_count: 9,
            entry_count: 1234,
        };
        let decoded = Footer::decode(&footer.encode()).unwrap();
        assert_eq!(decoded.page_size, 4096);
        assert_eq!(decoded.root, 7);
        assert_eq!(decoded.page_count, 9);
        assert_eq!(decoded.entry_count, 1234);
    }

    #[test]
    fn footer_detects_corruption() {
        let footer = Footer {
            page_size: 4096,
            root: 0,
            page_count: 1,
            entry_count: 1,
        };
        let mut buf = footer.encode();
        buf[12] ^= 0xFF;
        assert!(matches!(
            Footer::decode(&buf),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn footer_rejects_bad_magic() {
        let footer = Footer {
            page_size: 4096,
            root: 0,
            page_count: 1,
            entry_count: 1,
        };
        let mut buf = footer.encode();
        buf[0] = b'X';
        assert!(matches!(Footer::decode(&buf), Err(CoreError::Corrupt { .. })));
    }

    #[test]
    fn leaf_page_roundtrip() {
        let cells = vec![
            encode_leaf_cell(
                &RawSlot::Inline(Bytes::from_static(b"alpha")),
                &RawValue::Inline(Bytes::from_static(b"1")),
            ),
            encode_leaf_cell(&RawSlot::Inline(Bytes::from_static(b"beta")), &RawValue::Tombstone),
            encode_leaf_cell(
                &RawSlot::Spilled {
                    first_page: 3,
                    len: 9000,
                },
                &RawValue::Spilled {
                    first_page: 5,
                    len: 70000,
                },
            ),
        ];
        let page = Bytes::from(assemble_page(PageKind::Leaf, NIL_PAGE, 2, &cells, 512));

        let header = parse_page_header(&page, 512).unwrap();
        assert_eq!(header.kind, PageKind::Leaf);
        assert_eq!(header.count, 3);
        assert_eq!(header.prev, NIL_PAGE);
        assert_eq!(header.next, 2);

        let parsed = parse_leaf_cells(&page, &header).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(matches!(&parsed[0].key, RawSlot::Inline(k) if k.as_ref() == b"alpha"));
        assert!(matches!(&parsed[0].value, RawValue::Inline(v) if v.as_ref() == b"1"));
        assert!(matches!(parsed[1].value, RawValue::Tombstone));
        assert!(matches!(
            parsed[2].key,
            RawSlot::Spilled {
                first_page: 3,
                len: 9000
            }
        ));
        assert!(matches!(
            parsed[2].value,
            RawValue::Spilled {
                first_page: 5,
                len: 70000
            }
        ));
    }

    #[test]
    fn internal_page_roundtrip() {
        let cells = vec![
            encode_internal_cell(4, &RawSlot::Inline(Bytes::from_static(b"m"))),
            encode_internal_cell(9, &RawSlot::Inline(Bytes::from_static(b"z"))),
        ];
        let page = Bytes::from(assemble_page(PageKind::Internal, NIL_PAGE, NIL_PAGE, &cells, 256));

        let header = parse_page_header(&page, 256).unwrap();
        assert_eq!(header.kind, PageKind::Internal);

        let parsed = parse_internal_cells(&page, &header).unwrap();
        assert_eq!(parsed[0].child, 4);
        assert!(matches!(&parsed[0].key, RawSlot::Inline(k) if k.as_ref() == b"m"));
        assert_eq!(parsed[1].child, 9);
    }

    #[test]
    fn page_detects_flipped_byte() {
        let cells = vec![encode_leaf_cell(
            &RawSlot::Inline(Bytes::from_static(b"k")),
            &RawValue::Inline(Bytes::from_static(b"v")),
        )];
        let mut page = assemble_page(PageKind::Leaf, NIL_PAGE, NIL_PAGE, &cells, 256);
        page[20] ^= 0xFF;
        assert!(matches!(
            parse_page_header(&page, 256),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }
}
