use crate::models::Chunk;

/// Receives every finished, non-root chunk produced by [`crate::LazyNCList`].
///
/// Chunks arrive exactly once each, and only after nothing else can be nested into them.
/// An error returned here aborts the build and reaches the caller as
/// [`crate::NCListError::ChunkOutput`].
pub trait ChunkSink<I, T> {
    fn write_chunk(&mut self, chunk: Chunk<I, T>) -> anyhow::Result<()>;
}

impl<I, T, F> ChunkSink<I, T> for F
where
    F: FnMut(Chunk<I, T>) -> anyhow::Result<()>,
{
    fn write_chunk(&mut self, chunk: Chunk<I, T>) -> anyhow::Result<()> {
        self(chunk)
    }
}
