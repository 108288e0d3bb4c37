use std::fmt::Debug;

use num_traits::{PrimInt, Unsigned, identities::zero};

use crate::errors::Result;
use crate::models::{Chunk, ChunkId, NestedInterval, Payload, Record, check_sorted};

/// A record stored in the [`NCList`] arena.
#[derive(Debug, Clone)]
pub struct Node<I, T> {
    pub start: I,
    pub end: I,
    pub payload: Payload<T>,
    /// Arena indices of the records nested directly inside this one.
    sublist: Vec<usize>,
}

impl<I, T> Node<I, T> {
    fn new(start: I, end: I, payload: Payload<T>) -> Self {
        Node {
            start,
            end,
            payload,
            sublist: Vec::new(),
        }
    }

    /// Arena indices of the direct children, in sort order.
    pub fn sublist(&self) -> &[usize] {
        &self.sublist
    }
}

/// Handle to one of the ordered lists inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListRef {
    Top,
    /// The sublist owned by the node at this index.
    Sublist(usize),
}

/// A Nested Containment List built in a single pass over sorted records.
///
/// After Alekseyenko, A., and Lee, C. (2007). Nested Containment List (NCList): a new
/// algorithm for accelerating interval query of genome alignment and interval databases.
/// <https://doi.org/10.1093/bioinformatics/btl647>
///
/// Records must arrive in [`crate::nclist_cmp`] order. Each record is either nested inside the
/// record added just before it, or appended to the deepest open list whose owner still ends
/// after it. Nodes live in an arena, so building never recurses and never reallocates a tree.
///
/// # Examples
///
/// ```
/// use gtars_nclist::{NCList, Record};
///
/// let ncl = NCList::build(vec![
///     Record::new(1u32, 100, "gene"),
///     Record::new(10, 50, "exon1"),
///     Record::new(60, 90, "exon2"),
/// ])
/// .unwrap();
///
/// assert_eq!(ncl.top_list().len(), 1);
/// assert_eq!(ncl.max_end(), Some(100));
/// ```
#[derive(Debug, Clone)]
pub struct NCList<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    id: Option<ChunkId>,
    nodes: Vec<Node<I, T>>,
    top_list: Vec<usize>,
    /// The list the next non-nesting record would be appended to.
    cur_list: ListRef,
    /// Ancestors of `cur_list`, outermost first.
    sublist_stack: Vec<ListRef>,
    last_added: Option<usize>,
    min_start: Option<I>,
    max_end: Option<I>,
}

impl<I, T> Default for NCList<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    fn default() -> Self {
        NCList {
            id: None,
            nodes: Vec::new(),
            top_list: Vec::new(),
            cur_list: ListRef::Top,
            sublist_stack: Vec::new(),
            last_added: None,
            min_start: None,
            max_end: None,
        }
    }
}

impl<I, T> NCList<I, T>
where
    I: PrimInt + Unsigned + Send + Sync + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list tagged with a chunk identifier.
    pub fn with_id(id: ChunkId) -> Self {
        NCList {
            id: Some(id),
            ..Self::default()
        }
    }

    ///
    /// Build a list from records that are already sorted.
    ///
    /// # Arguments
    /// - features: records in [`crate::nclist_cmp`] order
    ///
    /// # Returns
    /// - the finished NCList, or [`crate::NCListError::InputNotSorted`]
    pub fn build<It>(features: It) -> Result<Self>
    where
        It: IntoIterator<Item = Record<I, T>>,
    {
        let mut ncl = Self::new();
        ncl.add_features(features)?;
        Ok(ncl)
    }

    /// Add sorted records. Ordering is checked against everything added so far, including
    /// records from earlier calls.
    pub fn add_features<It>(&mut self, features: It) -> Result<()>
    where
        It: IntoIterator<Item = Record<I, T>>,
    {
        for feat in features {
            self.add_feature(feat)?;
        }
        Ok(())
    }

    pub fn add_feature(&mut self, feat: Record<I, T>) -> Result<()> {
        let Record {
            start,
            end,
            payload,
        } = feat;
        let idx = self.nodes.len();

        match self.last_added {
            None => {
                self.min_start = Some(start);
                self.max_end = Some(end);
                self.nodes.push(Node::new(start, end, payload));
            }
            Some(last) => {
                let last_end = self.nodes[last].end;
                check_sorted(self.nodes[last].start, last_end, start, end)?;

                self.max_end = self.max_end.max(Some(end));
                self.nodes.push(Node::new(start, end, payload));

                if end < last_end {
                    // contained in the previous record: open a sublist under it
                    self.sublist_stack.push(self.cur_list);
                    self.cur_list = ListRef::Sublist(last);
                } else {
                    // climb until the owner of the current list still ends after this record
                    while let Some(&parent) = self.sublist_stack.last() {
                        if let Some(owner) = self.list_last(parent) {
                            if self.nodes[owner].end > end {
                                break;
                            }
                        }
                        self.cur_list = parent;
                        self.sublist_stack.pop();
                    }
                }
            }
        }

        self.list_push(self.cur_list, idx);
        self.last_added = Some(idx);
        Ok(())
    }

    fn list_last(&self, list: ListRef) -> Option<usize> {
        match list {
            ListRef::Top => self.top_list.last().copied(),
            ListRef::Sublist(owner) => self.nodes[owner].sublist.last().copied(),
        }
    }

    fn list_push(&mut self, list: ListRef, idx: usize) {
        match list {
            ListRef::Top => self.top_list.push(idx),
            ListRef::Sublist(owner) => self.nodes[owner].sublist.push(idx),
        }
    }

    pub fn id(&self) -> Option<ChunkId> {
        self.id
    }

    /// Start of the first record added.
    pub fn min_start(&self) -> Option<I> {
        self.min_start
    }

    /// Largest end of any record added.
    pub fn max_end(&self) -> Option<I> {
        self.max_end
    }

    /// Number of records at every depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arena indices of the root-level records.
    pub fn top_list(&self) -> &[usize] {
        &self.top_list
    }

    pub fn node(&self, idx: usize) -> Option<&Node<I, T>> {
        self.nodes.get(idx)
    }

    /// Materialise the arena into an owned tree.
    pub fn into_nested_list(self) -> Vec<NestedInterval<I, T>> {
        let (mut slots, sublists): (Vec<_>, Vec<_>) = self
            .nodes
            .into_iter()
            .map(|node| {
                let nested = NestedInterval {
                    start: node.start,
                    end: node.end,
                    payload: node.payload,
                    sublist: Vec::new(),
                };
                (Some(nested), node.sublist)
            })
            .unzip();

        // children are always added after their parent, so walking backwards
        // finishes every subtree before its owner is visited
        for idx in (0..slots.len()).rev() {
            let children: Vec<_> = sublists[idx]
                .iter()
                .filter_map(|&child| slots[child].take())
                .collect();
            if let Some(node) = slots[idx].as_mut() {
                node.sublist = children;
            }
        }

        self.top_list
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect()
    }

    /// Materialise into a [`Chunk`]. An empty list yields zero bounds.
    pub fn into_chunk(self) -> Chunk<I, T> {
        let id = self.id.unwrap_or_default();
        let min_start = self.min_start.unwrap_or_else(zero::<I>);
        let max_end = self.max_end.unwrap_or_else(zero::<I>);
        Chunk {
            id,
            min_start,
            max_end,
            nested_list: self.into_nested_list(),
        }
    }
}
