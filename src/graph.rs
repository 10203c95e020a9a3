//! Neighbour graph construction
//!
//! Turns the contents of a `SequenceIndex` into an undirected adjacency
//! relation between leaves.

use rayon::prelude::*;

use crate::errors::Result;
use crate::index::{Hit, Metric, SequenceIndex};

/// Fill in `neighbours` for every leaf of `index`.
///
/// Every word is queried in walk order and each reported pair is
/// registered on both leaves, so one-sided index queries still give a
/// symmetric relation. Queries run on the rayon pool; registration is
/// sequential in walk order, so neighbour lists come out the same as in
/// a single-threaded run.
///
/// Returns the number of unique words.
pub fn build_graph<I>(index: &mut I, max_distance: usize, metric: Metric) -> Result<usize>
where
    I: SequenceIndex + Sync,
{
    let walk = index.walk();
    let results: Vec<Vec<Hit>> = {
        let index = &*index;
        walk.par_iter()
            .map(|hit| index.neighbors_within(&hit.path, max_distance, metric))
            .collect::<Result<_>>()?
    };

    let leaves = index.leaves_mut();
    for (hit, found) in walk.iter().zip(results) {
        for other in found {
            if other.leaf != hit.leaf {
                leaves[hit.leaf].neighbours.push(other.leaf);
                leaves[other.leaf].neighbours.push(hit.leaf);
            }
        }
    }

    Ok(walk.len())
}
