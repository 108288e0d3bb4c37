use thiserror::Error;

use crate::models::ChunkId;

#[derive(Error, Debug)]
pub enum NCListError {
    /// Two consecutive records break the start-ascending, end-descending order.
    #[error("Input is not sorted: {0}")]
    InputNotSorted(String),

    #[error("Failed to output chunk {chunk}")]
    ChunkOutput {
        chunk: ChunkId,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, NCListError>;
