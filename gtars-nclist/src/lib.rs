//! Nested Containment List (NCList) construction for genomic intervals.
//!
//! This crate builds the static NCList index of Alekseyenko and Lee (2007): a forest in which
//! every interval owns the intervals it fully contains. It is part of the
//! [gtars](https://github.com/databio/gtars) project.
//!
//! Two builders are provided:
//!
//! - [`NCList`] nests an in-memory, pre-sorted sequence of records in a single linear pass.
//! - [`LazyNCList`] consumes a sorted stream one record at a time, closes size-bounded
//!   chunks as it goes and hands them to a [`ChunkSink`], stitching them together through lazy
//!   placeholder records. Memory stays proportional to the number of tiers times the chunk
//!   size rather than to the input.
//!
//! Both expect input ordered by [`nclist_cmp`] (ascending start, wider intervals first on
//! ties) and fail with [`NCListError::InputNotSorted`] otherwise. Neither sorts.
//!
//! ## Quick Start
//!
//! ```rust
//! use gtars_nclist::{NCList, Payload, Record};
//!
//! let ncl = NCList::build(vec![
//!     Record::new(1u32, 100, "gene"),
//!     Record::new(10, 50, "exon1"),
//!     Record::new(20, 30, "motif"),
//!     Record::new(60, 90, "exon2"),
//! ])
//! .unwrap();
//!
//! let nested = ncl.into_nested_list();
//! assert_eq!(nested.len(), 1);
//! assert_eq!(nested[0].sublist.len(), 2);
//! assert_eq!(nested[0].sublist[0].sublist[0].payload, Payload::Feature("motif"));
//! ```
//!
//! ## Streaming
//!
//! ```rust
//! use gtars_nclist::{Chunk, LazyConfig, LazyNCList, Record, nclist_cmp};
//!
//! let mut records: Vec<Record<u32, String>> = (0..1000u32)
//!     .map(|i| Record::new(i * 10, i * 10 + 25, format!("peak{i}")))
//!     .collect();
//! records.sort_by(nclist_cmp);
//!
//! let mut written = 0;
//! let sink = |_chunk: Chunk<u32, String>| -> anyhow::Result<()> {
//!     written += 1;
//!     Ok(())
//! };
//!
//! let mut lazy = LazyNCList::new(LazyConfig::new(64), |_: &Record<u32, String>| 1, sink);
//! lazy.add_all_sorted(records).unwrap();
//! let root = lazy.finish().unwrap();
//!
//! assert!(written > 0);
//! assert_eq!(root.min_start, 0);
//! assert_eq!(root.max_end, 10_015);
//! ```

/// Builder configuration.
pub mod config;

/// Error types.
pub mod errors;

/// Streaming, chunked construction.
///
/// See [`LazyNCList`] for details.
pub mod lazy;

/// Records, payloads and materialised hierarchies.
pub mod models;

/// Single-pass in-memory construction.
///
/// See [`NCList`] for details.
pub mod nclist;

/// The chunk output seam.
///
/// See [`ChunkSink`].
pub mod traits;

// re-exports
pub use self::config::LazyConfig;
pub use self::errors::NCListError;
pub use self::lazy::LazyNCList;
pub use self::models::{
    Chunk, ChunkId, NestedInterval, Payload, Record, is_nclist_sorted, nclist_cmp,
};
pub use self::nclist::NCList;
pub use self::traits::ChunkSink;

/// Constants used throughout the crate.
pub mod consts {
    /// Default chunk size threshold, in size-estimator units.
    pub const DEFAULT_SIZE_THRESHOLD: usize = 200_000;
}
