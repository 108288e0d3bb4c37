use std::fmt::Debug;

use log::{debug, info, trace};
use num_traits::{PrimInt, Unsigned, identities::zero};

use crate::config::LazyConfig;
use crate::errors::{NCListError, Result};
use crate::models::{Chunk, ChunkId, Record, check_sorted};
use crate::nclist::NCList;
use crate::traits::ChunkSink;

/// One tier of the streaming buffer: a partial chunk being filled, plus finished chunks that
/// later chunks may still nest into.
#[derive(Debug)]
struct LazyLevel<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    /// Span of the last record of the previous chunk finished at this tier.
    preceding_feat: Option<(I, I)>,
    /// Span of the last record that entered this tier.
    last_feat: Option<(I, I)>,
    current: Vec<Record<I, T>>,
    chunk_size: usize,
    /// Finished chunks that have not been output yet, most recent last.
    ncls: Vec<NCList<I, T>>,
}

impl<I, T> LazyLevel<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    fn new() -> Self {
        LazyLevel {
            preceding_feat: None,
            last_feat: None,
            current: Vec::new(),
            chunk_size: 0,
            ncls: Vec::new(),
        }
    }

    fn starting_with(feat: Record<I, T>, feat_size: usize) -> Self {
        LazyLevel {
            last_feat: Some((feat.start, feat.end)),
            current: vec![feat],
            chunk_size: feat_size,
            ..Self::new()
        }
    }

    /// Fail unless `feat` may follow everything that entered this tier so far.
    fn check_order(&mut self, feat: &Record<I, T>) -> Result<()> {
        if let Some((start, end)) = self.last_feat {
            check_sorted(start, end, feat.start, feat.end)?;
        }
        self.last_feat = Some((feat.start, feat.end));
        Ok(())
    }

    /// Whether the partial chunk must be closed before `feat` joins this tier.
    ///
    /// `chunk_size` must already include `feat`. Without a threshold only the boundary rule
    /// applies.
    fn is_chunk_full(&self, feat: &Record<I, T>, size_threshold: Option<usize>) -> bool {
        let Some(first) = self.current.first() else {
            return false;
        };

        // a chunk that opened on the start of the previous chunk's last record may not
        // grow past that record's end, or the placeholders above would be out of order
        let extends_preceding = match self.preceding_feat {
            Some((start, end)) => start == first.start && end < feat.end,
            None => false,
        };

        extends_preceding || size_threshold.is_some_and(|limit| self.chunk_size > limit)
    }

    /// Turn the partial chunk into an NCList and start a new partial chunk with `feat`.
    fn complete_chunk(
        &mut self,
        id: ChunkId,
        feat: Record<I, T>,
        feat_size: usize,
    ) -> Result<NCList<I, T>> {
        let finished = std::mem::replace(&mut self.current, vec![feat]);
        self.preceding_feat = finished.last().map(|last| (last.start, last.end));
        self.chunk_size = feat_size;

        let mut ncl = NCList::with_id(id);
        ncl.add_features(finished)?;
        Ok(ncl)
    }

    /// Turn whatever is buffered into an NCList, leaving the tier empty.
    fn drain_partial(&mut self, id: ChunkId) -> Result<NCList<I, T>> {
        self.chunk_size = 0;
        let mut ncl = NCList::with_id(id);
        ncl.add_features(self.current.drain(..))?;
        Ok(ncl)
    }

    ///
    /// Find a home for a just-finished chunk among the pending chunks of this tier.
    ///
    /// Pending chunks that end no later than `new_ncl` can no longer receive anything and are
    /// written out. If one that ends later remains, `lazy` is nested into it and consumed.
    ///
    /// # Returns
    /// - `None` if `lazy` was placed, otherwise `lazy` itself, to be placed one tier up
    fn find_containing_ncl<S>(
        &mut self,
        sink: &mut S,
        new_ncl: NCList<I, T>,
        lazy: Record<I, T>,
    ) -> Result<Option<Record<I, T>>>
    where
        S: ChunkSink<I, T>,
    {
        while let Some(top) = self.ncls.len().checked_sub(1) {
            if new_ncl.max_end() < self.ncls[top].max_end() {
                trace!(
                    "Nesting chunk {:?} inside pending chunk {:?}",
                    new_ncl.id(),
                    self.ncls[top].id()
                );
                self.ncls[top].add_feature(lazy)?;
                self.ncls.push(new_ncl);
                return Ok(None);
            }

            if let Some(existing) = self.ncls.pop() {
                write_chunk(sink, existing)?;
            }
        }

        self.ncls.push(new_ncl);
        Ok(Some(lazy))
    }

    /// Write out every pending chunk, oldest first.
    fn flush(&mut self, sink: &mut impl ChunkSink<I, T>) -> Result<()> {
        for ncl in self.ncls.drain(..) {
            write_chunk(sink, ncl)?;
        }
        Ok(())
    }
}

fn write_chunk<I, T, S>(sink: &mut S, ncl: NCList<I, T>) -> Result<()>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
    S: ChunkSink<I, T>,
{
    let chunk = ncl.into_chunk();
    let id = chunk.id;
    debug!(
        "Writing chunk {} [{:?}, {:?}]",
        id, chunk.min_start, chunk.max_end
    );
    sink.write_chunk(chunk)
        .map_err(|source| NCListError::ChunkOutput { chunk: id, source })
}

/// The record that stands in for `ncl` at the next tier.
fn placeholder<I, T>(ncl: &NCList<I, T>, id: ChunkId) -> Record<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    Record::lazy(
        ncl.min_start().unwrap_or_else(zero::<I>),
        ncl.max_end().unwrap_or_else(zero::<I>),
        id,
    )
}

/// A Nested Containment List built from a sorted stream in bounded memory.
///
/// Records are buffered into tiers. When a tier's partial chunk grows past
/// [`LazyConfig::size_threshold`] (as judged by the caller's `measure`), it is closed into an
/// [`NCList`] and a lazy placeholder spanning the chunk is placed either inside an earlier
/// chunk of the same tier that still contains it, or one tier up. Chunks are handed to the
/// [`ChunkSink`] once nothing more can be nested into them; the last tier becomes the root
/// returned by [`LazyNCList::finish`].
///
/// # Examples
///
/// ```
/// use gtars_nclist::{Chunk, LazyConfig, LazyNCList, Record};
///
/// let mut chunks: Vec<Chunk<u32, &'static str>> = Vec::new();
/// let sink = |chunk: Chunk<u32, &'static str>| -> anyhow::Result<()> {
///     chunks.push(chunk);
///     Ok(())
/// };
///
/// let mut lazy = LazyNCList::new(LazyConfig::new(2), |_: &Record<u32, &str>| 1, sink);
/// for (start, end) in [(1, 10), (20, 30), (40, 50), (60, 70)] {
///     lazy.add_sorted(Record::new(start, end, "peak")).unwrap();
/// }
/// let root = lazy.finish().unwrap();
///
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(root.nested_list.len(), 2);
/// ```
pub struct LazyNCList<I, T, M, S>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
    M: Fn(&Record<I, T>) -> usize,
    S: ChunkSink<I, T>,
{
    config: LazyConfig,
    measure: M,
    sink: S,
    levels: Vec<LazyLevel<I, T>>,
    chunk_num: ChunkId,
}

impl<I, T, M, S> LazyNCList<I, T, M, S>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
    M: Fn(&Record<I, T>) -> usize,
    S: ChunkSink<I, T>,
{
    ///
    /// Create a new streaming builder.
    ///
    /// # Arguments
    /// - config: chunking configuration
    /// - measure: size estimate of one record; placeholders are measured too
    /// - sink: receives every finished chunk except the root
    pub fn new(config: LazyConfig, measure: M, sink: S) -> Self {
        LazyNCList {
            config,
            measure,
            sink,
            levels: vec![LazyLevel::new()],
            chunk_num: 0,
        }
    }

    /// Add one record. Records must arrive in [`crate::nclist_cmp`] order.
    pub fn add_sorted(&mut self, feat: Record<I, T>) -> Result<()> {
        self.push_at(0, feat, Some(self.config.size_threshold))
    }

    ///
    /// Place `feat` at tier `from`, closing chunks and promoting their placeholders upwards.
    ///
    /// Every tier checks the order of what enters it. With `size_threshold` unset only the
    /// same-start boundary rule closes chunks, which is how `finish` hands up its leftovers.
    fn push_at(
        &mut self,
        from: usize,
        feat: Record<I, T>,
        size_threshold: Option<usize>,
    ) -> Result<()> {
        let mut feat = feat;
        for level in self.levels.iter_mut().skip(from) {
            level.check_order(&feat)?;
            let feat_size = (self.measure)(&feat);
            level.chunk_size = level.chunk_size.saturating_add(feat_size);

            if !level.is_chunk_full(&feat, size_threshold) {
                level.current.push(feat);
                return Ok(());
            }

            let id = self.chunk_num;
            self.chunk_num += 1;

            let new_ncl = level.complete_chunk(id, feat, feat_size)?;
            let lazy = placeholder(&new_ncl, id);

            match level.find_containing_ncl(&mut self.sink, new_ncl, lazy)? {
                None => return Ok(()),
                Some(unplaced) => feat = unplaced,
            }
        }

        // the placeholder outgrew every tier
        let feat_size = (self.measure)(&feat);
        self.levels.push(LazyLevel::starting_with(feat, feat_size));
        debug!("Allocated tier {}", self.levels.len() - 1);

        Ok(())
    }

    /// Add every record of an already sorted iterator.
    pub fn add_all_sorted<It>(&mut self, features: It) -> Result<()>
    where
        It: IntoIterator<Item = Record<I, T>>,
    {
        for feat in features {
            self.add_sorted(feat)?;
        }
        Ok(())
    }

    /// Number of tiers currently allocated.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of chunks closed so far, written out or still pending.
    pub fn chunks_created(&self) -> usize {
        self.chunk_num
    }

    ///
    /// Drain every tier and return the root chunk.
    ///
    /// Every non-root chunk reaches the sink before this returns. The root is never passed to
    /// the sink. With no input the root is empty.
    pub fn finish(mut self) -> Result<Chunk<I, T>> {
        let mut tier = 0;
        while tier + 1 < self.levels.len() {
            let level = &mut self.levels[tier];
            let mut unplaced = None;

            if !level.current.is_empty() {
                let id = self.chunk_num;
                self.chunk_num += 1;

                let new_ncl = level.drain_partial(id)?;
                let lazy = placeholder(&new_ncl, id);
                unplaced = level.find_containing_ncl(&mut self.sink, new_ncl, lazy)?;
            }
            level.flush(&mut self.sink)?;

            // the leftover placeholder may still split a same-start run one tier up
            if let Some(lazy) = unplaced {
                self.push_at(tier + 1, lazy, None)?;
            }
            tier += 1;
        }

        let LazyNCList {
            mut levels,
            chunk_num,
            ..
        } = self;

        // the top tier never closed a chunk, so nothing of it is pending
        let mut root = levels.pop().unwrap_or_else(LazyLevel::new);
        let root_id = chunk_num;
        let root_ncl = root.drain_partial(root_id)?;

        info!(
            "Finished NCList: {} chunks, root chunk {} holds {} records",
            root_id + 1,
            root_id,
            root_ncl.len()
        );

        Ok(root_ncl.into_chunk())
    }
}
