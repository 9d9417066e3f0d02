//! Merged view over prioritized child cursors.
//!
//! A [`MultiCursor`] combines any number of independently sorted cursors
//! into one sorted, deduplicated view without materializing the merge.
//! Child 0 has the highest precedence: on a shared key its payload wins,
//! including a tombstone shadowing an older value. Shadowed children are
//! advanced together with the winner, so no key is ever emitted twice.

use crate::cursor::{Cursor, SeekOp};
use crate::error::{CoreError, CoreResult};
use bytes::Bytes;

/// Which way the cursor last moved.
///
/// After a forward motion every valid child sits at its first key >= the
/// current one, so `next` can advance children blindly. Any other state
/// first re-aligns the children, which is what makes traversal after a
/// seek indistinguishable from pure traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
    Wandering,
}

/// A merging cursor over prioritized children.
///
/// The precedence order is fixed at construction and never ambient: the
/// earlier a child appears in the vector, the stronger its claim on a
/// shared key. The contract holds for zero children (always invalid) and
/// arbitrarily overlapping key ranges.
///
/// The MultiCursor owns its children for its own lifetime; dropping it
/// releases whatever resources they hold.
pub struct MultiCursor<'a> {
    children: Vec<Box<dyn Cursor + 'a>>,
    current: Option<usize>,
    dir: Direction,
}

impl<'a> MultiCursor<'a> {
    /// Creates a merged cursor; `children[0]` has the highest precedence.
    #[must_use]
    pub fn new(children: Vec<Box<dyn Cursor + 'a>>) -> Self {
        Self {
            children,
            current: None,
            dir: Direction::Wandering,
        }
    }

    /// Number of child cursors.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Lowest-index child holding the minimum key among valid children.
    fn winner_min(&self) -> CoreResult<Option<usize>> {
        let mut best: Option<(usize, Bytes)> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                continue;
            }
            let key = child.key()?;
            match &best {
                Some((_, bk)) if key >= *bk => {}
                _ => best = Some((i, key)),
            }
        }
        Ok(best.map(|(i, _)| i))
    }

    /// Lowest-index child holding the maximum key among valid children.
    fn winner_max(&self) -> CoreResult<Option<usize>> {
        let mut best: Option<(usize, Bytes)> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                continue;
            }
            let key = child.key()?;
            match &best {
                Some((_, bk)) if key <= *bk => {}
                _ => best = Some((i, key)),
            }
        }
        Ok(best.map(|(i, _)| i))
    }

    fn current_child(&self) -> CoreResult<&dyn Cursor> {
        let idx = self.current.ok_or(CoreError::InvalidCursor)?;
        Ok(&*self.children[idx])
    }
}

impl Cursor for MultiCursor<'_> {
    fn first(&mut self) -> CoreResult<()> {
        self.current = None;
        for child in &mut self.children {
            child.first()?;
        }
        self.dir = Direction::Forward;
        self.current = self.winner_min()?;
        Ok(())
    }

    fn last(&mut self) -> CoreResult<()> {
        self.current = None;
        for child in &mut self.children {
            child.last()?;
        }
        self.dir = Direction::Backward;
        self.current = self.winner_max()?;
        Ok(())
    }

    fn next(&mut self) -> CoreResult<()> {
        let Some(cur) = self.current.take() else {
            return Ok(());
        };
        let key = self.children[cur].key()?;

        if self.dir != Direction::Forward {
            // Re-align: put every child that is not already on the
            // current key at its first key >= it, exactly where forward
            // traversal would have left it.
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == cur {
                    continue;
                }
                let at_key = child.is_valid() && child.key()? == key;
                if !at_key {
                    child.seek(&key, SeekOp::Ge)?;
                }
            }
        }

        for child in &mut self.children {
            if child.is_valid() && child.key()? == key {
                child.next()?;
            }
        }

        self.dir = Direction::Forward;
        self.current = self.winner_min()?;
        Ok(())
    }

    fn prev(&mut self) -> CoreResult<()> {
        let Some(cur) = self.current.take() else {
            return Ok(());
        };
        let key = self.children[cur].key()?;

        if self.dir != Direction::Backward {
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == cur {
                    continue;
                }
                let at_key = child.is_valid() && child.key()? == key;
                if !at_key {
                    child.seek(&key, SeekOp::Le)?;
                }
            }
        }

        for child in &mut self.children {
            if child.is_valid() && child.key()? == key {
                child.prev()?;
            }
        }

        self.dir = Direction::Backward;
        self.current = self.winner_max()?;
        Ok(())
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> CoreResult<()> {
        self.current = None;
        for child in &mut self.children {
            child.seek(key, op)?;
        }

        // Resolved holistically: Le wants the greatest qualifying key
        // across all children, Ge the least; on exact ties precedence
        // picks the earliest child.
        self.current = match op {
            SeekOp::Eq => self.children.iter().position(|c| c.is_valid()),
            SeekOp::Le => self.winner_max()?,
            SeekOp::Ge => self.winner_min()?,
        };
        self.dir = match op {
            SeekOp::Ge => Direction::Forward,
            SeekOp::Le => Direction::Backward,
            SeekOp::Eq => Direction::Wandering,
        };
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> CoreResult<Bytes> {
        self.current_child()?.key()
    }

    fn value(&self) -> CoreResult<Option<Bytes>> {
        self.current_child()?.value()
    }

    fn value_len(&self) -> CoreResult<Option<u64>> {
        self.current_child()?.value_len()
    }
}
