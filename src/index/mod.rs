//! Sequence index
//!
//! Leaves are the unique words stored in an index, together with their
//! duplicate count and the adjacency filled in by the graph builder.
//! The index owns the leaf arena; everything else refers to leaves by
//! `LeafId`.

pub mod trie;

use crate::errors::Result;

pub use trie::Trie;

/// Position of a leaf in the index's leaf arena.
pub type LeafId = usize;

/// Position of a cluster in the list returned by `cluster::partition`.
pub type ClusterId = usize;

/// Distance metric used for neighbour queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Metric {
    /// Substitutions only
    Hamming,
    /// Substitutions, insertions and deletions
    Levenshtein,
}

/// One distinct word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaf {
    /// Number of reads that collapsed to this word
    pub count: usize,
    /// Leaves within the distance threshold, in registration order
    pub neighbours: Vec<LeafId>,
    /// Owning cluster, set once by the cluster engine
    pub cluster: Option<ClusterId>,
}

impl Leaf {
    #[inline]
    pub fn with_count(count: usize) -> Self {
        Self { count, ..Self::default() }
    }
}

/// A word found in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub path: Vec<u8>,
    pub leaf: LeafId,
}

/// Approximate-match index over words of a 4-symbol alphabet.
///
/// `neighbors_within` is allowed to be one-sided: a pair of neighbours
/// only needs to be reported from one of its two ends. The graph builder
/// registers both directions itself.
pub trait SequenceIndex {
    /// Insert `word`, or increment its count if already present.
    fn add(&mut self, word: &[u8]) -> Result<LeafId>;

    /// Exact lookup.
    fn find(&self, word: &[u8]) -> Option<LeafId>;

    /// Every stored word exactly once, in a stable order.
    fn walk(&self) -> Vec<Hit>;

    /// Stored words within `max_distance` of `path`, excluding `path` itself.
    fn neighbors_within(&self, path: &[u8], max_distance: usize, metric: Metric)
    -> Result<Vec<Hit>>;

    fn leaves(&self) -> &[Leaf];

    fn leaves_mut(&mut self) -> &mut [Leaf];
}
