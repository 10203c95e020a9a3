//! humidrs - FastQ deduplication with UMI support and near-duplicate clustering
//!
//! Exact duplicates are collapsed in a trie index; words within a small
//! Hamming or Levenshtein distance are linked into a neighbour graph, which
//! is then partitioned into clusters, either by connected components
//! ("maximum") or by the count-aware "directional" method.
//!
//! # Example
//!
//! ```ignore
//! use humidrs::{Trie, build_graph, partition, Method, Metric, SequenceIndex};
//!
//! let mut trie = Trie::new();
//! trie.add(&[0, 1, 2, 3])?;
//! trie.add(&[0, 1, 2, 2])?;
//! build_graph(&mut trie, 1, Metric::Hamming)?;
//! let clusters = partition(&mut trie, Method::Directional)?;
//! ```

pub mod args;
pub mod cluster;
pub mod errors;
pub mod graph;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod stats;
pub mod utils;
pub mod word;

// Re-export commonly used items
pub use args::{Args, Config};
pub use cluster::{Cluster, Method, cluster_stats, dominates, partition};
pub use errors::{HumidError, Result};
pub use graph::build_graph;
pub use index::{Leaf, LeafId, Metric, SequenceIndex, Trie};
pub use pipeline::run;
pub use stats::{Statistics, Summary};
pub use word::{Word, WordLayout};
