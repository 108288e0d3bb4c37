//! Integration tests for streaming construction through the public API.
//!
//! Chunks written by [`LazyNCList`] are merged back into one forest (placeholders replaced by
//! the chunk they reference) and compared against a single in-memory [`NCList`] build.

use std::collections::HashMap;

use gtars_nclist::{
    Chunk, ChunkId, LazyConfig, LazyNCList, NCList, NCListError, NestedInterval, Payload, Record,
    nclist_cmp,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::{fixture, rstest};
use serde_json::json;

type Rec = Record<u32, u32>;
type Nested = NestedInterval<u32, u32>;

/// Output of one streaming build.
struct Streamed {
    root: Chunk<u32, u32>,
    chunks: HashMap<ChunkId, Chunk<u32, u32>>,
    order: Vec<ChunkId>,
}

fn stream(records: &[Rec], size_threshold: usize) -> Streamed {
    stream_with(records, size_threshold, |_: &Rec| 1)
}

fn stream_with(records: &[Rec], size_threshold: usize, measure: impl Fn(&Rec) -> usize) -> Streamed {
    let mut written: Vec<Chunk<u32, u32>> = Vec::new();
    let sink = |chunk: Chunk<u32, u32>| -> anyhow::Result<()> {
        written.push(chunk);
        Ok(())
    };

    let mut lazy = LazyNCList::new(LazyConfig::new(size_threshold), measure, sink);
    lazy.add_all_sorted(records.iter().cloned())
        .expect("sorted input must build");
    let root = lazy.finish().expect("finish must succeed");

    let order = written.iter().map(|c| c.id).collect();
    let chunks = written.into_iter().map(|c| (c.id, c)).collect();
    Streamed {
        root,
        chunks,
        order,
    }
}

/// Replace every placeholder by the forest of the chunk it refers to.
fn resolve(list: &[Nested], chunks: &HashMap<ChunkId, Chunk<u32, u32>>) -> Vec<Nested> {
    let mut out = Vec::new();
    for node in list {
        match node.payload {
            Payload::Feature(_) => out.push(NestedInterval {
                start: node.start,
                end: node.end,
                payload: node.payload.clone(),
                sublist: resolve(&node.sublist, chunks),
            }),
            Payload::Lazy { chunk } => {
                let referenced = chunks
                    .get(&chunk)
                    .unwrap_or_else(|| panic!("chunk {chunk} was never written"));
                out.extend(resolve(&referenced.nested_list, chunks));
                out.extend(resolve(&node.sublist, chunks));
            }
        }
    }
    out
}

fn single_pass(records: &[Rec]) -> Vec<Nested> {
    NCList::build(records.iter().cloned())
        .unwrap()
        .into_nested_list()
}

/// Walk a forest, checking containment and collecting feature ids and bounds.
fn walk(list: &[Nested], parent: Option<(u32, u32)>, ids: &mut Vec<u32>, bounds: &mut (u32, u32)) {
    for node in list {
        if let Some((start, end)) = parent {
            assert!(
                node.start >= start && node.end <= end,
                "[{}, {}] escapes its parent [{start}, {end}]",
                node.start,
                node.end
            );
        }
        if let Payload::Feature(id) = node.payload {
            ids.push(id);
        }
        bounds.0 = bounds.0.min(node.start);
        bounds.1 = bounds.1.max(node.end);
        walk(&node.sublist, Some((node.start, node.end)), ids, bounds);
    }
}

fn lazy_refs(list: &[Nested], refs: &mut Vec<ChunkId>) {
    for node in list {
        if let Payload::Lazy { chunk } = node.payload {
            refs.push(chunk);
        }
        lazy_refs(&node.sublist, refs);
    }
}

fn records_from(spans: &[(u32, u32)]) -> Vec<Rec> {
    spans
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| Record::new(start, end, i as u32))
        .collect()
}

#[fixture]
fn flat() -> Vec<Rec> {
    let spans: Vec<(u32, u32)> = (0..200).map(|i| (i * 100, i * 100 + 40)).collect();
    records_from(&spans)
}

#[fixture]
fn nested_chain() -> Vec<Rec> {
    let depth = 150u32;
    let spans: Vec<(u32, u32)> = (0..depth).map(|i| (i, 2 * depth - i)).collect();
    records_from(&spans)
}

#[fixture]
fn random_intervals() -> Vec<Rec> {
    let mut rng = StdRng::seed_from_u64(2007);
    let spans: Vec<(u32, u32)> = (0..2000)
        .map(|_| {
            let start = rng.random_range(0..5_000u32);
            let len = match rng.random_range(0..100u32) {
                0..70 => rng.random_range(0..50u32),
                70..95 => rng.random_range(50..500u32),
                _ => rng.random_range(500..5_000u32),
            };
            (start, start + len)
        })
        .collect();
    let mut records = records_from(&spans);
    records.sort_by(nclist_cmp);
    records
}

/// Many records per start, including exact duplicates.
#[fixture]
fn dense_duplicates() -> Vec<Rec> {
    let mut rng = StdRng::seed_from_u64(647);
    let spans: Vec<(u32, u32)> = (0..1500)
        .map(|_| {
            let start = rng.random_range(0..30u32);
            let len = match rng.random_range(0..10u32) {
                0..8 => rng.random_range(0..12u32),
                _ => rng.random_range(12..60u32),
            };
            (start, start + len)
        })
        .collect();
    let mut records = records_from(&spans);
    records.sort_by(nclist_cmp);
    records
}

/// Zero for every third feature, so size alone never closes some runs.
fn uneven(rec: &Rec) -> usize {
    match rec.payload {
        Payload::Feature(id) => (id % 3) as usize,
        Payload::Lazy { .. } => 1,
    }
}

/// Check chunk bookkeeping and containment of a streaming build over `records`.
fn assert_invariants(records: &[Rec], streamed: &Streamed) {
    let root = &streamed.root;

    // every closed chunk except the root was written exactly once
    let mut written: Vec<ChunkId> = streamed.order.clone();
    written.sort_unstable();
    assert_eq!(written, (0..root.id).collect::<Vec<_>>());

    // and is referenced by exactly one placeholder
    let mut refs = Vec::new();
    lazy_refs(&root.nested_list, &mut refs);
    for chunk in streamed.chunks.values() {
        lazy_refs(&chunk.nested_list, &mut refs);
    }
    refs.sort_unstable();
    assert_eq!(refs, written);

    // every feature comes back once, inside all of its ancestors
    let merged = resolve(&root.nested_list, &streamed.chunks);
    let mut ids = Vec::new();
    let mut bounds = (u32::MAX, 0);
    walk(&merged, None, &mut ids, &mut bounds);
    ids.sort_unstable();
    assert_eq!(ids, (0..records.len() as u32).collect::<Vec<_>>());

    let min_start = records.iter().map(|r| r.start).min().unwrap();
    let max_end = records.iter().map(|r| r.end).max().unwrap();
    assert_eq!(bounds, (min_start, max_end));
    assert_eq!((root.min_start, root.max_end), (min_start, max_end));
}

#[rstest]
fn test_flat_round_trip(flat: Vec<Rec>, #[values(1, 3, 7, 50)] threshold: usize) {
    let streamed = stream(&flat, threshold);
    assert!(!streamed.chunks.is_empty());

    let merged = resolve(&streamed.root.nested_list, &streamed.chunks);
    assert_eq!(merged, single_pass(&flat));
}

#[rstest]
fn test_nested_chain_round_trip(nested_chain: Vec<Rec>, #[values(1, 4, 16)] threshold: usize) {
    let streamed = stream(&nested_chain, threshold);

    let merged = resolve(&streamed.root.nested_list, &streamed.chunks);
    assert_eq!(merged, single_pass(&nested_chain));
    assert_eq!(merged.len(), 1);
}

#[rstest]
fn test_threshold_does_not_change_flat_index(flat: Vec<Rec>) {
    let small = stream(&flat, 2);
    let large = stream(&flat, 60);

    assert!(small.chunks.len() > large.chunks.len());
    assert_eq!(
        resolve(&small.root.nested_list, &small.chunks),
        resolve(&large.root.nested_list, &large.chunks)
    );
}

#[rstest]
fn test_random_invariants(
    random_intervals: Vec<Rec>,
    #[values(5, 17, 64, 300)] threshold: usize,
) {
    let streamed = stream(&random_intervals, threshold);
    assert_invariants(&random_intervals, &streamed);
}

#[rstest]
fn test_dense_duplicate_starts(
    dense_duplicates: Vec<Rec>,
    #[values(0, 1, 2, 3, 4, 5)] threshold: usize,
    #[values(false, true)] uneven_sizes: bool,
) {
    let streamed = if uneven_sizes {
        stream_with(&dense_duplicates, threshold, uneven)
    } else {
        stream(&dense_duplicates, threshold)
    };
    assert_invariants(&dense_duplicates, &streamed);
}

#[rstest]
#[case(vec![(3, 8), (3, 8), (4, 11)])]
#[case(vec![(0, 5), (0, 5), (0, 5), (1, 9), (1, 9), (2, 12)])]
#[case(vec![(7, 7), (7, 7), (7, 7), (7, 7), (8, 20)])]
fn test_short_same_start_runs(#[case] spans: Vec<(u32, u32)>, #[values(0, 1, 2)] threshold: usize) {
    let records = records_from(&spans);
    let streamed = stream(&records, threshold);
    assert_invariants(&records, &streamed);
}

#[rstest]
fn test_chunk_bounds_cover_their_features(
    random_intervals: Vec<Rec>,
    #[values(8, 100)] threshold: usize,
) {
    let streamed = stream(&random_intervals, threshold);

    for chunk in streamed.chunks.values() {
        assert!(!chunk.nested_list.is_empty());

        let merged = resolve(&chunk.nested_list, &streamed.chunks);
        let mut ids = Vec::new();
        let mut bounds = (u32::MAX, 0);
        walk(&merged, None, &mut ids, &mut bounds);

        assert!(!ids.is_empty());
        assert_eq!(bounds, (chunk.min_start, chunk.max_end), "chunk {}", chunk.id);
    }
}

#[rstest]
fn test_placeholders_match_chunk_bounds(random_intervals: Vec<Rec>) {
    let streamed = stream(&random_intervals, 10);

    fn check(list: &[Nested], chunks: &HashMap<ChunkId, Chunk<u32, u32>>) {
        for node in list {
            if let Payload::Lazy { chunk } = node.payload {
                let referenced = &chunks[&chunk];
                assert_eq!(
                    (node.start, node.end),
                    (referenced.min_start, referenced.max_end)
                );
            }
            check(&node.sublist, chunks);
        }
    }

    check(&streamed.root.nested_list, &streamed.chunks);
    for chunk in streamed.chunks.values() {
        check(&chunk.nested_list, &streamed.chunks);
    }
}

#[rstest]
fn test_whole_input_below_threshold(random_intervals: Vec<Rec>) {
    let streamed = stream(&random_intervals, random_intervals.len());

    assert!(streamed.chunks.is_empty());
    assert_eq!(streamed.root.id, 0);
    assert_eq!(streamed.root.nested_list, single_pass(&random_intervals));
}

#[rstest]
fn test_unsorted_stream_is_fatal(random_intervals: Vec<Rec>) {
    let sink = |_: Chunk<u32, u32>| -> anyhow::Result<()> { Ok(()) };
    let mut lazy = LazyNCList::new(LazyConfig::new(16), |_: &Rec| 1, sink);

    let mut reversed = random_intervals;
    reversed.reverse();
    let result = lazy.add_all_sorted(reversed);

    assert!(matches!(result, Err(NCListError::InputNotSorted(_))));
}

#[rstest]
fn test_chunk_serialization() {
    let mut written: Vec<Chunk<u32, &'static str>> = Vec::new();
    let sink = |chunk: Chunk<u32, &'static str>| -> anyhow::Result<()> {
        written.push(chunk);
        Ok(())
    };

    let mut lazy = LazyNCList::new(LazyConfig::new(2), |_: &Record<u32, &str>| 1, sink);
    lazy.add_all_sorted(vec![
        Record::new(5, 100, "a"),
        Record::new(5, 90, "b"),
        Record::new(5, 80, "c"),
        Record::new(6, 200, "d"),
    ])
    .unwrap();
    let root = lazy.finish().unwrap();

    let first = written.iter().find(|c| c.id == 0).unwrap();
    assert_eq!(
        serde_json::to_value(first).unwrap(),
        json!({
            "id": 0,
            "min_start": 5,
            "max_end": 100,
            "nested_list": [{
                "start": 5,
                "end": 100,
                "payload": "a",
                "sublist": [{
                    "start": 5,
                    "end": 90,
                    "payload": "b",
                    "sublist": [{"start": 5, "end": 80, "payload": {"chunk": 1}}]
                }]
            }]
        })
    );

    assert_eq!(
        serde_json::to_value(&root.nested_list).unwrap(),
        json!([
            {"start": 5, "end": 100, "payload": {"chunk": 0}},
            {"start": 6, "end": 200, "payload": {"chunk": 2}}
        ])
    );
}

#[rstest]
fn test_config_file_drives_chunking(flat: Vec<Rec>) {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "size_threshold = 10").unwrap();
    let config = LazyConfig::try_from(file.path()).unwrap();

    let mut count = 0;
    let sink = |_: Chunk<u32, u32>| -> anyhow::Result<()> {
        count += 1;
        Ok(())
    };
    let mut lazy = LazyNCList::new(config, |_: &Rec| 1, sink);
    lazy.add_all_sorted(flat).unwrap();
    let root = lazy.finish().unwrap();

    // 200 records in chunks of 10 at the lowest tier alone
    assert_eq!(count, root.id);
    assert!(count >= 20);
}
