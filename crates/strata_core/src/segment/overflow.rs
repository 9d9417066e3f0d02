//! Overflow chains for oversize keys and values.
//!
//! A key or value larger than the inline cap is split into chunks, one
//! per overflow page, linked through the page header's `next` field. The
//! referencing cell stores only `(first_page, total_len)`, so key scans
//! never touch the chain; `value()` resolves it lazily.

use crate::error::{CoreError, CoreResult};
use crate::segment::page::{
    page_header_bytes, parse_page_header, seal_page, PageKind, NIL_PAGE, PAGE_HEADER_LEN,
};
use bytes::Bytes;
use tracing::warn;

/// Payload bytes that fit in one overflow page.
pub(crate) fn chunk_capacity(page_size: u32) -> usize {
    page_size as usize - PAGE_HEADER_LEN
}

/// Number of overflow pages a payload of `len` bytes occupies.
pub(crate) fn chain_pages(len: usize, page_size: u32) -> usize {
    len.div_ceil(chunk_capacity(page_size))
}

/// Builds the sealed pages of an overflow chain.
///
/// The chunks are laid out contiguously starting at `first_page`, each
/// pointing at the next, with the final chunk's `next` set to nil.
pub(crate) fn build_chain(data: &[u8], page_size: u32, first_page: u32) -> Vec<Vec<u8>> {
    let cap = chunk_capacity(page_size);
    let total = chain_pages(data.len(), page_size);

    let mut pages = Vec::with_capacity(total);
    for (i, chunk) in data.chunks(cap).enumerate() {
        let next = if i + 1 < total {
            first_page + i as u32 + 1
        } else {
            NIL_PAGE
        };
        let mut page = Vec::with_capacity(page_size as usize);
        page.extend_from_slice(&page_header_bytes(
            PageKind::Overflow,
            chunk.len() as u16,
            NIL_PAGE,
            next,
        ));
        page.extend_from_slice(chunk);
        pages.push(seal_page(page, page_size));
    }
    pages
}

/// Reassembles a payload from its overflow chain.
///
/// `read_page` loads a raw page by number; the chain is bounded by the
/// expected page count so a corrupt `next` pointer cannot loop forever.
pub(crate) fn read_chain<F>(
    mut read_page: F,
    first_page: u32,
    total_len: u64,
    page_size: u32,
) -> CoreResult<Bytes>
where
    F: FnMut(u32) -> CoreResult<Bytes>,
{
    let total = total_len as usize;
    let max_pages = chain_pages(total, page_size);

    let mut payload = Vec::with_capacity(total);
    let mut next = first_page;
    let mut pages_read = 0usize;

    while payload.len() < total {
        if next == NIL_PAGE {
            warn!(
                expected_bytes = total,
                got_bytes = payload.len(),
                "overflow chain ended prematurely"
            );
            return Err(CoreError::corrupt(format!(
                "overflow chain ended prematurely: got {} of {} bytes",
                payload.len(),
                total
            )));
        }
        if pages_read >= max_pages {
            warn!(page = next, max_pages, "overflow chain exceeds expected length");
            return Err(CoreError::corrupt(format!(
                "overflow chain exceeds {max_pages} pages (possible cycle)"
            )));
        }

        let page = read_page(next)?;
        let header = parse_page_header(&page, page_size)?;
        if header.kind != PageKind::Overflow {
            return Err(CoreError::corrupt(format!(
                "page {next} in overflow chain has kind {:?}",
                header.kind
            )));
        }

        let chunk_len = header.count as usize;
        if PAGE_HEADER_LEN + chunk_len > page.len() {
            return Err(CoreError::corrupt(format!(
                "overflow page {next} claims {chunk_len} bytes"
            )));
        }

        let remaining = total - payload.len();
        let take = chunk_len.min(remaining);
        payload.extend_from_slice(&page[PAGE_HEADER_LEN..PAGE_HEADER_LEN + take]);

        next = header.next;
        pages_read += 1;
    }

    Ok(Bytes::from(payload))
}
