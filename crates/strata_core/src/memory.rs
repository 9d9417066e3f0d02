//! In-memory sorted source feeding segment builds.
//!
//! The memory segment is the write side's collaborator: it records inserts
//! and deletions by key and hands out a sorted cursor over its current
//! contents. Segment builds consume such a cursor; queries can merge one
//! into a [`MultiCursor`](crate::MultiCursor) ahead of on-disk segments.

use crate::cursor::{Cursor, SeekOp};
use crate::error::{CoreError, CoreResult};
use crate::types::{Key, Value};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A mutable, sorted, in-memory segment.
///
/// Deleting a key records a tombstone whether or not the key was ever
/// inserted; the tombstone must survive into built segments so it can
/// shadow older values during merges. Inserting over an existing key
/// replaces its payload.
///
/// Cursors borrow the segment, so the borrow checker rules out mutating
/// the segment while one of its cursors is live.
#[derive(Debug, Default)]
pub struct MemorySegment {
    entries: BTreeMap<Key, Option<Value>>,
}

impl MemorySegment {
    /// Creates a new empty segment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value for a key.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        self.entries.insert(key.into(), Some(value.into()));
    }

    /// Records a tombstone for a key.
    ///
    /// The key does not need to exist; the tombstone is recorded either way.
    pub fn delete(&mut self, key: impl Into<Key>) {
        self.entries.insert(key.into(), None);
    }

    /// Returns the number of recorded entries, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Opens a cursor over the current contents in ascending key order.
    #[must_use]
    pub fn open_cursor(&self) -> MemoryCursor<'_> {
        MemoryCursor {
            entries: &self.entries,
            current: None,
        }
    }
}

/// A cursor over a [`MemorySegment`].
///
/// Created invalid; position with `first`/`last`/`seek`.
#[derive(Debug)]
pub struct MemoryCursor<'a> {
    entries: &'a BTreeMap<Key, Option<Value>>,
    current: Option<(Key, Option<Value>)>,
}

impl MemoryCursor<'_> {
    fn set(&mut self, found: Option<(&Key, &Option<Value>)>) {
        self.current = found.map(|(k, v)| (k.clone(), v.clone()));
    }

    fn current(&self) -> CoreResult<&(Key, Option<Value>)> {
        self.current.as_ref().ok_or(CoreError::InvalidCursor)
    }
}

impl Cursor for MemoryCursor<'_> {
    fn first(&mut self) -> CoreResult<()> {
        let found = self.entries.iter().next();
        self.set(found);
        Ok(())
    }

    fn last(&mut self) -> CoreResult<()> {
        let found = self.entries.iter().next_back();
        self.set(found);
        Ok(())
    }

    fn next(&mut self) -> CoreResult<()> {
        if let Some((key, _)) = &self.current {
            let found = self
                .entries
                .range::<[u8], _>((Bound::Excluded(key.as_ref()), Bound::Unbounded))
                .next();
            self.set(found);
        }
        Ok(())
    }

    fn prev(&mut self) -> CoreResult<()> {
        if let Some((key, _)) = &self.current {
            let found = self
                .entries
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key.as_ref())))
                .next_back();
            self.set(found);
        }
        Ok(())
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()> {
        let found = match op {
            SeekOp::Eq => self.entries.get_key_value(key),
            SeekOp::Le => self
                .entries
                .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
                .next_back(),
            SeekOp::Ge => self
                .entries
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next(),
        };
        self.set(found);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> CoreResult<Bytes> {
        Ok(self.current()?.0.clone())
    }

    fn value(&self) -> CoreResult<Option<Bytes>> {
        Ok(self.current()?.1.clone())
    }

    fn value_len(&self) -> CoreResult<Option<u64>> {
        Ok(self.current()?.1.as_ref().map(|v| v.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(pairs: &[(&str, &str)]) -> MemorySegment {
        let mut seg = MemorySegment::new();
        for (k, v) in pairs {
            seg.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
        }
        seg
    }

    #[test]
    fn fresh_cursor_is_invalid() {
        let seg = segment(&[("a", "1")]);
        let csr = seg.open_cursor();
        assert!(!csr.is_valid());
        assert!(matches!(csr.key(), Err(CoreError::InvalidCursor)));
    }

    #[test]
    fn forward_and_backward_traversal() {
        let seg = segment(&[("c", "3"), ("a", "1"), ("b", "2")]);

        let mut csr = seg.open_cursor();
        csr.first().unwrap();
        let mut keys = Vec::new();
        while csr.is_valid() {
            keys.push(csr.key().unwrap());
            csr.next().unwrap();
        }
        assert_eq!(keys, vec!["a", "b", "c"]);

        csr.last().unwrap();
        let mut rev = Vec::new();
        while csr.is_valid() {
            rev.push(csr.key().unwrap());
            csr.prev().unwrap();
        }
        assert_eq!(rev, vec!["c", "b", "a"]);
    }

    #[test]
    fn next_while_invalid_is_noop() {
        let seg = segment(&[("a", "1")]);
        let mut csr = seg.open_cursor();

        csr.first().unwrap();
        csr.next().unwrap();
        assert!(!csr.is_valid());
        csr.next().unwrap();
        assert!(!csr.is_valid());
    }

    #[test]
    fn seek_all_ops() {
        let seg = segment(&[("c", "3"), ("e", "5"), ("g", "7")]);
        let mut csr = seg.open_cursor();

        csr.seek(b"e", SeekOp::Eq).unwrap();
        assert!(csr.is_valid());
        assert_eq!(csr.value().unwrap().unwrap(), "5");

        csr.seek(b"d", SeekOp::Eq).unwrap();
        assert!(!csr.is_valid());

        csr.seek(b"d", SeekOp::Le).unwrap();
        assert_eq!(csr.key().unwrap(), "c");

        csr.seek(b"d", SeekOp::Ge).unwrap();
        assert_eq!(csr.key().unwrap(), "e");

        csr.seek(b"a", SeekOp::Le).unwrap();
        assert!(!csr.is_valid());

        csr.seek(b"h", SeekOp::Ge).unwrap();
        assert!(!csr.is_valid());
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut seg = segment(&[("b", "2")]);
        seg.insert(&b"b"[..], &b"5"[..]);

        let mut csr = seg.open_cursor();
        csr.seek(b"b", SeekOp::Eq).unwrap();
        assert_eq!(csr.value().unwrap().unwrap(), "5");
        assert_eq!(seg.len(), 1);
    }

    #[test]
    fn delete_absent_key_records_tombstone() {
        let mut seg = MemorySegment::new();
        seg.delete(&b""[..]);
        seg.delete(&b"2"[..]);
        seg.delete(&b"3"[..]);

        assert_eq!(seg.len(), 3);

        let mut csr = seg.open_cursor();
        csr.first().unwrap();
        let mut count = 0;
        while csr.is_valid() {
            assert_eq!(csr.value().unwrap(), None);
            assert_eq!(csr.value_len().unwrap(), None);
            count += 1;
            csr.next().unwrap();
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_value_is_not_a_tombstone() {
        let mut seg = MemorySegment::new();
        seg.insert(&b"_"[..], &b""[..]);

        let mut csr = seg.open_cursor();
        csr.seek(b"_", SeekOp::Eq).unwrap();
        assert!(csr.is_valid());
        assert_eq!(csr.value_len().unwrap(), Some(0));
        assert_eq!(csr.value().unwrap(), Some(Bytes::new()));
    }
}
