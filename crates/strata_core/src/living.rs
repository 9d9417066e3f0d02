//! Tombstone-filtering cursor decorator.
//!
//! A [`LivingCursor`] wraps any cursor - typically a
//! [`MultiCursor`](crate::MultiCursor) spanning every segment of a tree -
//! and exposes only live entries. Tombstones still occupy their keys in
//! the wrapped cursor; here they are skipped over, never returned.

use crate::cursor::{Cursor, SeekOp};
use crate::error::{CoreError, CoreResult};
use bytes::Bytes;

/// Filters tombstones out of a wrapped cursor.
///
/// The wrapper owns the inner cursor for its own lifetime. Positions on a
/// tombstone (reachable only through `seek` with [`SeekOp::Eq`]) report
/// as invalid without disturbing the inner cursor's state.
pub struct LivingCursor<C> {
    inner: C,
}

impl<C: Cursor> LivingCursor<C> {
    /// Wraps a cursor, presenting only its live entries.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Unwraps the inner cursor.
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn on_live_entry(&self) -> bool {
        self.inner.is_valid() && matches!(self.inner.value_len(), Ok(Some(_)))
    }

    /// Advances the inner cursor until it rests on a live entry or runs out.
    fn skip_forward(&mut self) -> CoreResult<()> {
        while self.inner.is_valid() && self.inner.value_len()?.is_none() {
            self.inner.next()?;
        }
        Ok(())
    }

    fn skip_backward(&mut self) -> CoreResult<()> {
        while self.inner.is_valid() && self.inner.value_len()?.is_none() {
            self.inner.prev()?;
        }
        Ok(())
    }
}

impl<C: Cursor> Cursor for LivingCursor<C> {
    fn first(&mut self) -> CoreResult<()> {
        self.inner.first()?;
        self.skip_forward()
    }

    fn last(&mut self) -> CoreResult<()> {
        self.inner.last()?;
        self.skip_backward()
    }

    fn next(&mut self) -> CoreResult<()> {
        if !self.on_live_entry() {
            return Ok(());
        }
        self.inner.next()?;
        self.skip_forward()
    }

    fn prev(&mut self) -> CoreResult<()> {
        if !self.on_live_entry() {
            return Ok(());
        }
        self.inner.prev()?;
        self.skip_backward()
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()> {
        self.inner.seek(key, op)?;
        match op {
            // An exact match on a tombstone simply reports invalid.
            SeekOp::Eq => Ok(()),
            SeekOp::Ge => self.skip_forward(),
            SeekOp::Le => self.skip_backward(),
        }
    }

    fn is_valid(&self) -> bool {
        self.on_live_entry()
    }

    fn key(&self) -> CoreResult<Bytes> {
        if !self.on_live_entry() {
            return Err(CoreError::InvalidCursor);
        }
        self.inner.key()
    }

    fn value(&self) -> CoreResult<Option<Bytes>> {
        if !self.on_live_entry() {
            return Err(CoreError::InvalidCursor);
        }
        self.inner.value()
    }

    fn value_len(&self) -> CoreResult<Option<u64>> {
        if !self.on_live_entry() {
            return Err(CoreError::InvalidCursor);
        }
        self.inner.value_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySegment;
    use crate::multi::MultiCursor;

    fn tree() -> (MemorySegment, MemorySegment) {
        let mut older = MemorySegment::new();
        older.insert(&b"a"[..], &b"1"[..]);
        older.insert(&b"b"[..], &b"2"[..]);
        older.insert(&b"c"[..], &b"3"[..]);
        older.insert(&b"d"[..], &b"4"[..]);

        let mut newer = MemorySegment::new();
        newer.delete(&b"b"[..]);

        (older, newer)
    }

    fn living<'a>(older: &'a MemorySegment, newer: &'a MemorySegment) -> LivingCursor<MultiCursor<'a>> {
        LivingCursor::new(MultiCursor::new(vec![
            Box::new(newer.open_cursor()),
            Box::new(older.open_cursor()),
        ]))
    }

    #[test]
    fn tombstones_are_skipped_in_both_directions() {
        let (older, newer) = tree();
        let mut lc = living(&older, &newer);

        lc.first().unwrap();
        let mut keys = Vec::new();
        while lc.is_valid() {
            keys.push(lc.key().unwrap());
            lc.next().unwrap();
        }
        assert_eq!(keys, vec!["a", "c", "d"]);

        lc.last().unwrap();
        let mut rev = Vec::new();
        while lc.is_valid() {
            rev.push(lc.key().unwrap());
            lc.prev().unwrap();
        }
        assert_eq!(rev, vec!["d", "c", "a"]);
    }

    #[test]
    fn eq_seek_on_tombstone_is_invalid() {
        let (older, newer) = tree();
        let mut lc = living(&older, &newer);

        lc.seek(b"b", SeekOp::Eq).unwrap();
        assert!(!lc.is_valid());
        assert!(matches!(lc.key(), Err(CoreError::InvalidCursor)));
        assert!(matches!(lc.value(), Err(CoreError::InvalidCursor)));
    }

    #[test]
    fn le_and_ge_probe_past_tombstones() {
        let (older, newer) = tree();
        let mut lc = living(&older, &newer);

        lc.seek(b"b", SeekOp::Le).unwrap();
        assert!(lc.is_valid());
        assert_eq!(lc.key().unwrap(), "a");
        lc.next().unwrap();
        assert_eq!(lc.key().unwrap(), "c");

        lc.seek(b"b", SeekOp::Ge).unwrap();
        assert!(lc.is_valid());
        assert_eq!(lc.key().unwrap(), "c");
        lc.prev().unwrap();
        assert_eq!(lc.key().unwrap(), "a");
    }

    #[test]
    fn all_tombstones_yield_nothing() {
        let mut seg = MemorySegment::new();
        seg.delete(&b""[..]);
        seg.delete(&b"2"[..]);
        seg.delete(&b"3"[..]);

        let mut lc = LivingCursor::new(seg.open_cursor());
        lc.first().unwrap();
        assert!(!lc.is_valid());
        lc.last().unwrap();
        assert!(!lc.is_valid());
    }

    #[test]
    fn first_skips_leading_tombstones() {
        let mut seg = MemorySegment::new();
        seg.delete(&b"a"[..]);
        seg.insert(&b"b"[..], &b"2"[..]);
        seg.delete(&b"c"[..]);
        seg.insert(&b"d"[..], &b"4"[..]);

        let mut lc = LivingCursor::new(seg.open_cursor());
        lc.first().unwrap();
        assert_eq!(lc.key().unwrap(), "b");
        lc.last().unwrap();
        assert_eq!(lc.key().unwrap(), "d");
    }

    #[test]
    fn empty_value_is_live() {
        let mut seg = MemorySegment::new();
        seg.insert(&b"_"[..], &b""[..]);

        let mut lc = LivingCursor::new(seg.open_cursor());
        lc.seek(b"_", SeekOp::Eq).unwrap();
        assert!(lc.is_valid());
        assert_eq!(lc.value_len().unwrap(), Some(0));
    }
}
