//! Cursor contract shared by every segment view.
//!
//! All reading in Strata happens through cursors: the in-memory sorted
//! source, on-disk B-tree segments, the merged [`MultiCursor`] and the
//! tombstone-filtering [`LivingCursor`] all implement the same trait, so
//! the wrappers never depend on a concrete segment kind.
//!
//! [`MultiCursor`]: crate::MultiCursor
//! [`LivingCursor`]: crate::LivingCursor

use crate::error::CoreResult;
use bytes::Bytes;

/// How [`Cursor::seek`] resolves a target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOp {
    /// Exact match only; invalidates when the key is absent, even when
    /// `Le`/`Ge` matches exist.
    Eq,
    /// Greatest key less than or equal to the target.
    Le,
    /// Least key greater than or equal to the target.
    Ge,
}

/// A positionable, bidirectional view over a sorted entry sequence.
///
/// A cursor is either **valid** (positioned on an entry) or **invalid**
/// (no current entry). Moving past either end invalidates; calling
/// `next`/`prev` while invalid is a no-op that stays invalid, and only
/// `first`/`last`/`seek` can revalidate. The accessors `key`, `value` and
/// `value_len` fail with [`CoreError::InvalidCursor`] when no current
/// entry exists rather than returning sentinel data.
///
/// Cursors never mutate the data they traverse; all writing happens at
/// segment build time.
///
/// [`CoreError::InvalidCursor`]: crate::CoreError::InvalidCursor
pub trait Cursor {
    /// Positions at the minimum key, or invalidates if there are no entries.
    fn first(&mut self) -> CoreResult<()>;

    /// Positions at the maximum key, or invalidates if there are no entries.
    fn last(&mut self) -> CoreResult<()>;

    /// Moves one entry forward in sort order.
    fn next(&mut self) -> CoreResult<()>;

    /// Moves one entry backward in sort order.
    fn prev(&mut self) -> CoreResult<()>;

    /// Positions relative to `key` according to `op`, or invalidates.
    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()>;

    /// Reports whether a current entry exists.
    fn is_valid(&self) -> bool;

    /// Returns the current key.
    fn key(&self) -> CoreResult<Bytes>;

    /// Returns the current payload, or `None` for a tombstone.
    ///
    /// Payloads stored in overflow chains are materialized lazily, only
    /// when this is called.
    fn value(&self) -> CoreResult<Option<Bytes>>;

    /// Returns the current payload's byte length, or `None` for a
    /// tombstone, without materializing the payload.
    fn value_len(&self) -> CoreResult<Option<u64>>;
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn first(&mut self) -> CoreResult<()> {
        (**self).first()
    }

    fn last(&mut self) -> CoreResult<()> {
        (**self).last()
    }

    fn next(&mut self) -> CoreResult<()> {
        (**self).next()
    }

    fn prev(&mut self) -> CoreResult<()> {
        (**self).prev()
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()> {
        (**self).seek(key, op)
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn key(&self) -> CoreResult<Bytes> {
        (**self).key()
    }

    fn value(&self) -> CoreResult<Option<Bytes>> {
        (**self).value()
    }

    fn value_len(&self) -> CoreResult<Option<u64>> {
        (**self).value_len()
    }
}
