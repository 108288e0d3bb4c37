use std::cmp::Ordering;
use std::fmt::Debug;

use num_traits::{PrimInt, Unsigned};
use serde::Serialize;

use crate::errors::{NCListError, Result};

/// Sequential identifier of a chunk emitted by [`crate::LazyNCList`].
pub type ChunkId = usize;

/// What a record carries besides its span.
///
/// Serialized untagged: a feature is written as its bare `T`, a placeholder as
/// `{"chunk": id}`. A `T` that itself serializes to that exact shape cannot be told apart
/// from a placeholder, so readers of such chunks need to know the payload type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload<T> {
    /// Application attributes of a real feature. Opaque to the builders.
    Feature(T),
    /// Stand-in for a whole chunk at the next tier up.
    Lazy { chunk: ChunkId },
}

/// A closed interval `[start, end]` together with its payload.
///
/// This is the unit both [`crate::NCList`] and [`crate::LazyNCList`] consume. Input must be
/// ordered by [`nclist_cmp`]: ascending `start`, and descending `end` among equal starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<I, T> {
    pub start: I,
    pub end: I,
    pub payload: Payload<T>,
}

impl<I, T> Record<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
{
    /// Create a record for a real feature.
    pub fn new(start: I, end: I, val: T) -> Self {
        Record {
            start,
            end,
            payload: Payload::Feature(val),
        }
    }

    /// Create a placeholder spanning `[start, end]` that refers to `chunk`.
    pub fn lazy(start: I, end: I, chunk: ChunkId) -> Self {
        Record {
            start,
            end,
            payload: Payload::Lazy { chunk },
        }
    }

    /// The referenced chunk, if this record is a placeholder.
    pub fn chunk(&self) -> Option<ChunkId> {
        match self.payload {
            Payload::Lazy { chunk } => Some(chunk),
            Payload::Feature(_) => None,
        }
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.chunk().is_some()
    }
}

/// One node of a materialised containment hierarchy.
///
/// Every entry of `sublist` lies within `[start, end]` and the sublist itself is in
/// [`nclist_cmp`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedInterval<I, T> {
    pub start: I,
    pub end: I,
    pub payload: Payload<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sublist: Vec<NestedInterval<I, T>>,
}

impl<I, T> NestedInterval<I, T> {
    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.sublist.iter());
        }
        total
    }
}

/// A finished, immutable sub-index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk<I, T> {
    pub id: ChunkId,
    pub min_start: I,
    pub max_end: I,
    pub nested_list: Vec<NestedInterval<I, T>>,
}

///
/// The NCList sort order: ascending start, wider intervals first on ties.
///
/// Producers can sort their input with this before feeding a builder, e.g.
/// `records.sort_by(nclist_cmp)`.
pub fn nclist_cmp<I, T>(a: &Record<I, T>, b: &Record<I, T>) -> Ordering
where
    I: PrimInt + Unsigned + Send + Sync,
{
    a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end))
}

/// Returns `true` if `records` is in [`nclist_cmp`] order.
pub fn is_nclist_sorted<I, T>(records: &[Record<I, T>]) -> bool
where
    I: PrimInt + Unsigned + Send + Sync,
{
    records
        .windows(2)
        .all(|pair| nclist_cmp(&pair[0], &pair[1]) != Ordering::Greater)
}

/// Fail if `[start, end]` may not directly follow `[prev_start, prev_end]`.
pub(crate) fn check_sorted<I>(prev_start: I, prev_end: I, start: I, end: I) -> Result<()>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    if prev_start > start || (prev_start == start && prev_end < end) {
        return Err(NCListError::InputNotSorted(format!(
            "[{prev_start:?}, {prev_end:?}] is followed by [{start:?}, {end:?}]"
        )));
    }
    Ok(())
}
