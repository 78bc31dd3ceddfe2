//! Random-access cursors over index-addressed sequences.
//!
//! A source exposes `f(i)` for `i` in `[0, len)`. [`Cursor`] is a position in
//! such a source: all arithmetic happens on the index, and element access
//! asks the source for the element at that index. [`Iter`] walks a whole
//! source as a regular Rust iterator.

use super::{Outcome, Status};
use crate::error::AudioError;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::ptr;

/// A logical sequence addressed by integer index.
pub trait IndexedSource {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element handed out for detached cursors and out-of-range indices.
    fn null_item() -> Self::Item;

    /// Element at `index`, or the null element with a failure status.
    fn item_outcome(&self, index: usize) -> Outcome<Self::Item>;
}

/// Sources whose cursors may be ordered with `<`, `>`, `<=` and `>=`.
pub trait OrderedSource: IndexedSource {}

/// A position in an [`IndexedSource`].
///
/// Holds an index and a non-owning reference to the source. Two cursors are
/// equal iff both the index and the source match, so cursors from different
/// sources never compare equal.
pub struct Cursor<'a, S> {
    index: usize,
    source: Option<&'a S>,
}

impl<'a, S> Cursor<'a, S> {
    pub fn new(source: &'a S, index: usize) -> Self {
        Self {
            index,
            source: Some(source),
        }
    }

    /// A cursor with no source. Every access yields the null element.
    pub fn detached(index: usize) -> Self {
        Self {
            index,
            source: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> Option<&'a S> {
        self.source
    }

    /// Pre-increment.
    pub fn inc(&mut self) -> &mut Self {
        *self += 1;
        self
    }

    /// Pre-decrement.
    pub fn dec(&mut self) -> &mut Self {
        *self -= 1;
        self
    }

    fn same_source(&self, other: &Self) -> bool {
        match (self.source, other.source) {
            (Some(a), Some(b)) => ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn source_addr(&self) -> *const S {
        self.source.map_or(ptr::null(), |s| s as *const S)
    }
}

impl<'a, S: IndexedSource> Cursor<'a, S> {
    fn offset_index(&self, n: isize) -> usize {
        self.index.wrapping_add_signed(n)
    }

    /// Element at this position (`*it`). Never fails: detached or out-of-range
    /// cursors yield the null element.
    pub fn get(&self) -> S::Item {
        self.get_at(0)
    }

    /// Element `n` positions away (`it[n]`), or the null element.
    pub fn get_at(&self, n: isize) -> S::Item {
        self.at_outcome(n).into_unchecked()
    }

    /// Element `n` positions away with its status. Detached cursors report
    /// `E_INVALIDARG`.
    pub fn at_outcome(&self, n: isize) -> Outcome<S::Item> {
        match self.source {
            Some(source) => source.item_outcome(self.offset_index(n)),
            None => Outcome::new(Status::INVALID_ARG, S::null_item()),
        }
    }

    /// Element `n` positions away, failing on detached cursors, out-of-range
    /// indices and native errors.
    pub fn at(&self, n: isize) -> Result<S::Item, AudioError> {
        if self.source.is_none() {
            return Err(AudioError::EmptyInterface);
        }
        self.at_outcome(n).into_result()
    }
}

impl<S> Clone for Cursor<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Cursor<'_, S> {}

impl<S> Default for Cursor<'_, S> {
    fn default() -> Self {
        Self::detached(0)
    }
}

impl<S> fmt::Debug for Cursor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.index)
            .field("source", &self.source_addr())
            .finish()
    }
}

impl<S> PartialEq for Cursor<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.same_source(other)
    }
}

impl<S> Eq for Cursor<'_, S> {}

impl<S: OrderedSource> PartialOrd for Cursor<'_, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: OrderedSource> Ord for Cursor<'_, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.same_source(other) {
            self.index.cmp(&other.index)
        } else {
            self.source_addr().cmp(&other.source_addr())
        }
    }
}

impl<S> AddAssign<isize> for Cursor<'_, S> {
    fn add_assign(&mut self, n: isize) {
        self.index = self.index.wrapping_add_signed(n);
    }
}

impl<S> SubAssign<isize> for Cursor<'_, S> {
    fn sub_assign(&mut self, n: isize) {
        self.index = self.index.wrapping_add_signed(n.wrapping_neg());
    }
}

impl<S> Add<isize> for Cursor<'_, S> {
    type Output = Self;

    fn add(mut self, n: isize) -> Self {
        self += n;
        self
    }
}

impl<'a, S> Add<Cursor<'a, S>> for isize {
    type Output = Cursor<'a, S>;

    fn add(self, cursor: Cursor<'a, S>) -> Cursor<'a, S> {
        cursor + self
    }
}

impl<S> Sub<isize> for Cursor<'_, S> {
    type Output = Self;

    fn sub(mut self, n: isize) -> Self {
        self -= n;
        self
    }
}

impl<S> Sub for Cursor<'_, S> {
    type Output = isize;

    /// Distance between two positions, computed from the indices alone.
    fn sub(self, other: Self) -> isize {
        (self.index as isize).wrapping_sub(other.index as isize)
    }
}

/// Iterator over every element of a source, yielding each element together
/// with the status of fetching it.
pub struct Iter<'a, S> {
    source: &'a S,
    front: usize,
    back: usize,
}

impl<'a, S: IndexedSource> Iter<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            front: 0,
            back: source.len(),
        }
    }

    /// Iterate the half-open range between two cursors of the same source.
    /// Returns `None` for cursors over different or no sources.
    pub fn between(begin: Cursor<'a, S>, end: Cursor<'a, S>) -> Option<Self> {
        let source = begin.source?;
        if !begin.same_source(&end) {
            return None;
        }
        Some(Self {
            source,
            front: begin.index,
            back: end.index.max(begin.index),
        })
    }
}

impl<S: IndexedSource> Iterator for Iter<'_, S> {
    type Item = Outcome<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.source.item_outcome(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<S: IndexedSource> DoubleEndedIterator for Iter<'_, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.source.item_outcome(self.back))
    }
}

impl<S: IndexedSource> ExactSizeIterator for Iter<'_, S> {}

impl<S: IndexedSource> FusedIterator for Iter<'_, S> {}
