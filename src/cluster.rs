//! Cluster assignment
//!
//! Partitions the leaves of a neighbour graph into clusters. Two methods
//! are available:
//!
//! - **maximum**: every connected component becomes one cluster.
//! - **directional**: a leaf only absorbs neighbours it dominates (at
//!   least twice its count), after first climbing from the seed leaf to a
//!   local count peak. Neighbours of similar abundance stay apart.
//!
//! All traversals use an explicit stack and visit leaves in the same
//! depth-first order a recursive implementation would.

use std::collections::BTreeMap;

use crate::errors::{HumidError, Result};
use crate::index::{ClusterId, Leaf, LeafId, SequenceIndex};

/// Clustering method
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    /// Count-aware clustering: leaves only absorb neighbours with at most half their count
    Directional,
    /// Connected components of the neighbour graph
    Maximum,
}

/// A group of leaves judged to come from the same template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Total read count over all members
    pub size: usize,
    /// Representative leaf
    pub max_leaf: Option<LeafId>,
    pub max_count: usize,
}

impl Cluster {
    pub fn new(id: ClusterId) -> Self {
        Self { id, size: 0, max_leaf: None, max_count: 0 }
    }

    #[inline]
    fn offer_max(&mut self, leaf: LeafId, count: usize) {
        if count > self.max_count {
            self.max_leaf = Some(leaf);
            self.max_count = count;
        }
    }
}

/// `a >= 2 * b`, without overflow.
#[inline]
pub fn dominates(a: usize, b: usize) -> bool {
    match b.checked_mul(2) {
        Some(double) => a >= double,
        None => false,
    }
}

fn claim(leaves: &mut [Leaf], id: LeafId, cluster: &mut Cluster, track_max: bool) -> Result<()> {
    let leaf = &mut leaves[id];
    if let Some(owner) = leaf.cluster {
        return Err(HumidError::InvariantViolation(format!(
            "leaf {} already belongs to cluster {}, cannot join cluster {}",
            id, owner, cluster.id
        )));
    }
    leaf.cluster = Some(cluster.id);
    cluster.size += leaf.count;
    if track_max {
        cluster.offer_max(id, leaf.count);
    }
    Ok(())
}

/// Depth-first growth from `root`: every unowned neighbour accepted by
/// `admit(parent, child)` is claimed and explored in turn.
fn grow<F>(
    leaves: &mut [Leaf],
    root: LeafId,
    cluster: &mut Cluster,
    admit: F,
    track_max: bool,
) -> Result<()>
where
    F: Fn(&Leaf, &Leaf) -> bool,
{
    claim(leaves, root, cluster, track_max)?;

    // (leaf, index of the next neighbour to look at)
    let mut stack: Vec<(LeafId, usize)> = vec![(root, 0)];
    while let Some(&(parent, next)) = stack.last() {
        let Some(&child) = leaves[parent].neighbours.get(next) else {
            stack.pop();
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }
        if leaves[child].cluster.is_none() && admit(&leaves[parent], &leaves[child]) {
            claim(leaves, child, cluster, track_max)?;
            stack.push((child, 0));
        }
    }
    Ok(())
}

/// Claim the whole connected component of `root`.
///
/// The representative is the first leaf reaching the highest count in
/// visitation order.
pub fn assign_maximum(leaves: &mut [Leaf], root: LeafId, cluster: &mut Cluster) -> Result<()> {
    grow(leaves, root, cluster, |_, _| true, true)
}

/// Walk uphill from `start` to a local count peak.
///
/// The neighbour list of the current leaf is scanned from the start; the
/// first unowned neighbour dominating the current leaf becomes the new
/// current leaf and the scan restarts. Counts at least double on every
/// step, so the walk ends.
pub fn climb(leaves: &[Leaf], start: LeafId) -> LeafId {
    let mut current = start;
    let mut i = 0;
    while let Some(&neighbour) = leaves[current].neighbours.get(i) {
        i += 1;
        let candidate = &leaves[neighbour];
        if candidate.cluster.is_none() && dominates(candidate.count, leaves[current].count) {
            current = neighbour;
            i = 0;
        }
    }
    current
}

/// Climb from `start` to its peak, make the peak the representative and
/// absorb everything reachable through dominated neighbours.
pub fn assign_directional(leaves: &mut [Leaf], start: LeafId, cluster: &mut Cluster) -> Result<()> {
    let peak = climb(leaves, start);
    cluster.max_leaf = Some(peak);
    cluster.max_count = leaves[peak].count;
    grow(leaves, peak, cluster, |parent, child| dominates(parent.count, child.count), false)
}

/// Partition every leaf of `index` into clusters.
///
/// Clusters are created while walking the index; ids follow creation
/// order.
pub fn partition<I: SequenceIndex>(index: &mut I, method: Method) -> Result<Vec<Cluster>> {
    let order: Vec<LeafId> = index.walk().into_iter().map(|hit| hit.leaf).collect();
    partition_leaves(index.leaves_mut(), &order, method)
}

/// Partition `leaves`, seeding new clusters in `order`.
pub fn partition_leaves(
    leaves: &mut [Leaf],
    order: &[LeafId],
    method: Method,
) -> Result<Vec<Cluster>> {
    if let Some(id) = leaves.iter().position(|leaf| leaf.count == 0) {
        return Err(HumidError::InvariantViolation(format!("leaf {id} has count 0")));
    }
    // clusters are assigned once per index
    if let Some(id) = leaves.iter().position(|leaf| leaf.cluster.is_some()) {
        return Err(HumidError::InvariantViolation(format!(
            "leaf {id} already belongs to a cluster"
        )));
    }

    let mut clusters = Vec::new();
    for &id in order {
        if leaves[id].cluster.is_some() {
            continue;
        }
        let mut cluster = Cluster::new(clusters.len());
        match method {
            Method::Maximum => assign_maximum(leaves, id, &mut cluster)?,
            Method::Directional => assign_directional(leaves, id, &mut cluster)?,
        }
        clusters.push(cluster);
    }

    if let Some(id) = leaves.iter().position(|leaf| leaf.cluster.is_none()) {
        return Err(HumidError::InvariantViolation(format!(
            "leaf {id} was not reached by the index walk"
        )));
    }
    Ok(clusters)
}

/// Histogram of cluster sizes: size -> number of clusters.
pub fn cluster_stats(clusters: &[Cluster]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for cluster in clusters {
        *counts.entry(cluster.size).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::index::{Metric, Trie};
    use std::collections::{BTreeSet, HashMap};

    fn leaves_with(counts: &[usize]) -> Vec<Leaf> {
        counts.iter().map(|&c| Leaf::with_count(c)).collect()
    }

    fn link(leaves: &mut [Leaf], a: LeafId, b: LeafId) {
        leaves[a].neighbours.push(b);
        leaves[b].neighbours.push(a);
    }

    fn members(leaves: &[Leaf], cluster: &Cluster) -> BTreeSet<LeafId> {
        (0..leaves.len()).filter(|&i| leaves[i].cluster == Some(cluster.id)).collect()
    }

    fn random_graph(n: usize, edges: usize) -> Vec<Leaf> {
        let mut leaves: Vec<Leaf> = (0..n)
            .map(|_| {
                // skewed counts so that dominance actually happens
                let count = if fastrand::u8(0..4) == 0 { fastrand::usize(20..200) } else { fastrand::usize(1..10) };
                Leaf::with_count(count)
            })
            .collect();
        for _ in 0..edges {
            let a = fastrand::usize(0..n);
            let b = fastrand::usize(0..n);
            if a != b {
                link(&mut leaves, a, b);
            }
        }
        leaves
    }

    fn find(parent: &mut [usize], x: usize) -> usize {
        let mut root = x;
        while parent[root] != root {
            root = parent[root];
        }
        let mut x = x;
        while parent[x] != root {
            let next = parent[x];
            parent[x] = root;
            x = next;
        }
        root
    }

    fn components(leaves: &[Leaf]) -> BTreeSet<BTreeSet<LeafId>> {
        let mut parent: Vec<usize> = (0..leaves.len()).collect();
        for (a, leaf) in leaves.iter().enumerate() {
            for &b in &leaf.neighbours {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra] = rb;
                }
            }
        }
        let mut groups: HashMap<usize, BTreeSet<LeafId>> = HashMap::new();
        for i in 0..leaves.len() {
            let root = find(&mut parent, i);
            groups.entry(root).or_default().insert(i);
        }
        groups.into_values().collect()
    }

    #[test]
    fn test_dominates() {
        assert!(dominates(1, 0));
        assert!(dominates(2, 1));
        assert!(!dominates(3, 2));
        assert!(dominates(8, 4));
        assert!(!dominates(5, 5));
        assert!(!dominates(usize::MAX, usize::MAX / 2 + 1));
    }

    #[test]
    fn test_dominance_is_never_mutual() {
        for a in 1..50 {
            for b in 1..50 {
                assert!(!(dominates(a, b) && dominates(b, a)));
            }
        }
    }

    #[test]
    fn test_climb_alone() {
        let leaves = leaves_with(&[1]);
        assert_eq!(climb(&leaves, 0), 0);
    }

    #[test]
    fn test_climb_skips_owned_neighbour() {
        let mut leaves = leaves_with(&[1, 2]);
        link(&mut leaves, 0, 1);
        leaves[1].cluster = Some(2);
        assert_eq!(climb(&leaves, 0), 0);
    }

    #[test]
    fn test_climb_chain() {
        let mut leaves = leaves_with(&[1, 2, 4, 7]);
        link(&mut leaves, 0, 1);
        assert_eq!(climb(&leaves, 0), 1);

        link(&mut leaves, 1, 2);
        assert_eq!(climb(&leaves, 0), 2);

        // 7 is less than twice 4
        link(&mut leaves, 2, 3);
        assert_eq!(climb(&leaves, 0), 2);
    }

    #[test]
    fn test_climb_restarts_scan() {
        // from 0 the climb reaches 1, whose first neighbour 2 dominates it
        let mut leaves = leaves_with(&[1, 3, 10]);
        leaves[0].neighbours = vec![1];
        leaves[1].neighbours = vec![2, 0];
        leaves[2].neighbours = vec![1];
        assert_eq!(climb(&leaves, 0), 2);
    }

    #[test]
    fn test_assign_directional_two_peaks() {
        let mut leaves = leaves_with(&[2, 4, 8, 10, 3]);
        link(&mut leaves, 0, 1);
        assert_eq!(leaves[0].neighbours, vec![1]);
        assert_eq!(leaves[1].neighbours, vec![0]);
        link(&mut leaves, 1, 2);
        link(&mut leaves, 2, 3);
        link(&mut leaves, 3, 4);

        let mut first = Cluster::new(1);
        assign_directional(&mut leaves, 0, &mut first).unwrap();
        assert_eq!(leaves[0].cluster, Some(1));
        assert_eq!(leaves[1].cluster, Some(1));
        assert_eq!(leaves[2].cluster, Some(1));
        assert_eq!(leaves[3].cluster, None);
        assert_eq!(leaves[4].cluster, None);

        let mut second = Cluster::new(2);
        assign_directional(&mut leaves, 3, &mut second).unwrap();
        assert_eq!(leaves[3].cluster, Some(2));
        assert_eq!(leaves[4].cluster, Some(2));

        assert_eq!(first.size, 14);
        assert_eq!(second.size, 13);
        assert_eq!(first.max_leaf, Some(2));
        assert_eq!(second.max_leaf, Some(3));
        assert_eq!(first.max_count, 8);
        assert_eq!(second.max_count, 10);
    }

    /// A(8), B(4), C(2), D(3) with edges A-B, B-C, C-D.
    fn abcd() -> Vec<Leaf> {
        let mut leaves = leaves_with(&[8, 4, 2, 3]);
        link(&mut leaves, 0, 1);
        link(&mut leaves, 1, 2);
        link(&mut leaves, 2, 3);
        leaves
    }

    #[test]
    fn test_worked_example_directional() {
        let mut leaves = abcd();
        let clusters = partition_leaves(&mut leaves, &[2, 0, 1, 3], Method::Directional).unwrap();
        assert_eq!(clusters.len(), 2);

        assert_eq!(clusters[0].id, 0);
        assert_eq!(members(&leaves, &clusters[0]), BTreeSet::from([0, 1, 2]));
        assert_eq!(clusters[0].size, 14);
        assert_eq!(clusters[0].max_leaf, Some(0));
        assert_eq!(clusters[0].max_count, 8);

        assert_eq!(clusters[1].id, 1);
        assert_eq!(members(&leaves, &clusters[1]), BTreeSet::from([3]));
        assert_eq!(clusters[1].size, 3);
        assert_eq!(clusters[1].max_leaf, Some(3));
    }

    #[test]
    fn test_worked_example_maximum() {
        let mut leaves = abcd();
        let clusters = partition_leaves(&mut leaves, &[2, 0, 1, 3], Method::Maximum).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 17);
        assert_eq!(clusters[0].max_leaf, Some(0));
        assert_eq!(clusters[0].max_count, 8);
    }

    #[test]
    fn test_similar_counts_stay_apart() {
        let mut leaves = leaves_with(&[5, 3]);
        link(&mut leaves, 0, 1);
        let clusters = partition_leaves(&mut leaves, &[0, 1], Method::Directional).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 5);
        assert_eq!(clusters[1].size, 3);
    }

    #[test]
    fn test_maximum_keeps_first_of_equal_counts() {
        let mut leaves = leaves_with(&[1, 5, 5]);
        link(&mut leaves, 0, 1);
        link(&mut leaves, 0, 2);
        let clusters = partition_leaves(&mut leaves, &[0, 1, 2], Method::Maximum).unwrap();
        assert_eq!(clusters[0].max_leaf, Some(1));
        assert_eq!(clusters[0].max_count, 5);
    }

    #[test]
    fn test_maximum_visits_depth_first() {
        // R(1): [X(1), Y(5)], X: [R, Z(5)]. Depth-first reaches Z before Y.
        let mut leaves = leaves_with(&[1, 1, 5, 5]);
        let (r, x, y, z) = (0, 1, 2, 3);
        link(&mut leaves, r, x);
        link(&mut leaves, r, y);
        link(&mut leaves, x, z);
        let clusters = partition_leaves(&mut leaves, &[r, x, y, z], Method::Maximum).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].max_leaf, Some(z));
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let mut leaves = leaves_with(&[3, 0]);
        let err = partition_leaves(&mut leaves, &[0, 1], Method::Maximum).unwrap_err();
        assert!(matches!(err, HumidError::InvariantViolation(_)));
    }

    #[test]
    fn test_leaf_missing_from_order_is_rejected() {
        let mut leaves = leaves_with(&[3, 1]);
        let err = partition_leaves(&mut leaves, &[0], Method::Directional).unwrap_err();
        assert!(matches!(err, HumidError::InvariantViolation(_)));
    }

    #[test]
    fn test_clustered_leaf_is_rejected() {
        let mut leaves = leaves_with(&[3, 1]);
        leaves[1].cluster = Some(0);
        let err = partition_leaves(&mut leaves, &[0, 1], Method::Maximum).unwrap_err();
        assert!(matches!(err, HumidError::InvariantViolation(_)));
        assert_eq!(leaves[0].cluster, None);
    }

    #[test]
    fn test_partition_twice_is_rejected() {
        let mut trie = Trie::new();
        for word in [[0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 1]] {
            trie.add(&word).unwrap();
        }
        build_graph(&mut trie, 1, Metric::Hamming).unwrap();

        let clusters = partition(&mut trie, Method::Directional).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 4);

        let err = partition(&mut trie, Method::Directional).unwrap_err();
        assert!(matches!(err, HumidError::InvariantViolation(_)));
        assert!(trie.leaves().iter().all(|leaf| leaf.cluster == Some(0)));
    }

    #[test]
    fn test_claim_refuses_reassignment() {
        let mut leaves = leaves_with(&[3]);
        leaves[0].cluster = Some(0);
        let mut cluster = Cluster::new(1);
        let err = assign_maximum(&mut leaves, 0, &mut cluster).unwrap_err();
        assert!(matches!(err, HumidError::InvariantViolation(_)));
        assert_eq!(cluster.size, 0);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let n = 200_000;
        let mut leaves = leaves_with(&vec![1; n]);
        for i in 1..n {
            link(&mut leaves, i - 1, i);
        }
        let order: Vec<LeafId> = (0..n).collect();
        let clusters = partition_leaves(&mut leaves, &order, Method::Maximum).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, n);
    }

    #[test]
    fn test_maximum_matches_connected_components() {
        for _ in 0..25 {
            let mut leaves = random_graph(80, 70);
            let expected = components(&leaves);
            let order: Vec<LeafId> = (0..leaves.len()).collect();
            let clusters = partition_leaves(&mut leaves, &order, Method::Maximum).unwrap();
            let found: BTreeSet<BTreeSet<LeafId>> =
                clusters.iter().map(|c| members(&leaves, c)).collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_partition_conserves_counts() {
        for method in [Method::Maximum, Method::Directional] {
            for _ in 0..25 {
                let mut leaves = random_graph(60, 90);
                let total: usize = leaves.iter().map(|l| l.count).sum();
                let order: Vec<LeafId> = (0..leaves.len()).rev().collect();
                let clusters = partition_leaves(&mut leaves, &order, method).unwrap();

                assert_eq!(clusters.iter().map(|c| c.size).sum::<usize>(), total);
                for (i, cluster) in clusters.iter().enumerate() {
                    assert_eq!(cluster.id, i);
                    let ids = members(&leaves, cluster);
                    assert!(!ids.is_empty());
                    assert_eq!(ids.iter().map(|&l| leaves[l].count).sum::<usize>(), cluster.size);
                }
                assert!(leaves.iter().all(|l| l.cluster.is_some_and(|c| c < clusters.len())));
            }
        }
    }

    #[test]
    fn test_directional_members_are_dominated() {
        for _ in 0..25 {
            let mut leaves = random_graph(60, 90);
            let order: Vec<LeafId> = (0..leaves.len()).collect();
            let clusters = partition_leaves(&mut leaves, &order, Method::Directional).unwrap();

            for cluster in &clusters {
                let peak = cluster.max_leaf.unwrap();
                let ids = members(&leaves, cluster);
                assert!(ids.contains(&peak));
                assert_eq!(cluster.max_count, leaves[peak].count);
                for &z in &ids {
                    assert!(leaves[z].count <= cluster.max_count);
                    if z == peak {
                        continue;
                    }
                    let has_parent = leaves[z].neighbours.iter().any(|&p| {
                        leaves[p].cluster == Some(cluster.id) && dominates(leaves[p].count, leaves[z].count)
                    });
                    assert!(has_parent, "leaf {z} has no dominating parent in its cluster");
                }
            }
        }
    }

    #[test]
    fn test_partition_is_repeatable() {
        for method in [Method::Maximum, Method::Directional] {
            let leaves = random_graph(70, 100);
            let order: Vec<LeafId> = (0..leaves.len()).collect();

            let mut first = leaves.clone();
            let mut second = leaves.clone();
            let a = partition_leaves(&mut first, &order, method).unwrap();
            let b = partition_leaves(&mut second, &order, method).unwrap();
            assert_eq!(a, b);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_cluster_stats() {
        let clusters: Vec<Cluster> = [3, 1, 3, 7]
            .iter()
            .enumerate()
            .map(|(id, &size)| Cluster { size, ..Cluster::new(id) })
            .collect();
        let stats = cluster_stats(&clusters);
        assert_eq!(stats.into_iter().collect::<Vec<_>>(), vec![(1, 1), (3, 2), (7, 1)]);
        assert!(cluster_stats(&[]).is_empty());
    }
}
