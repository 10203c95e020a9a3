//! 4-ary trie index
//!
//! Words are stored as paths of symbols in `0..4`. Nodes live in one
//! vector and reference their children by position; position 0 is the
//! root and never appears as a child, so it doubles as "no child".

use super::{Hit, Leaf, LeafId, Metric, SequenceIndex};
use crate::errors::{HumidError, Result};

/// Number of symbols in the alphabet
pub const ALPHABET_SIZE: usize = 4;

const NO_CHILD: usize = 0;

#[derive(Debug, Default, Clone)]
struct Node {
    children: [usize; ALPHABET_SIZE],
    leaf: Option<LeafId>,
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()], leaves: Vec::new() }
    }

    /// Number of unique words stored
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    #[inline]
    fn child(&self, node: usize, symbol: u8) -> Option<usize> {
        match self.nodes[node].children[symbol as usize] {
            NO_CHILD => None,
            c => Some(c),
        }
    }

    fn check_word(word: &[u8]) -> Result<()> {
        match word.iter().position(|&s| s as usize >= ALPHABET_SIZE) {
            Some(pos) => Err(HumidError::Index(format!(
                "symbol {} at position {} is outside the alphabet",
                word[pos], pos
            ))),
            None => Ok(()),
        }
    }

    /// One-sided Hamming search: only words of the query's length that
    /// sort after the query are reported.
    fn hamming(&self, path: &[u8], max_distance: usize) -> Vec<Hit> {
        let mut hits = Vec::new();
        // (node, depth, mismatches, diverged above the query, prefix)
        let mut stack = vec![(0usize, 0usize, 0usize, false, Vec::new())];

        while let Some((node, depth, mismatches, diverged, prefix)) = stack.pop() {
            if depth == path.len() {
                if let (true, Some(leaf)) = (diverged, self.nodes[node].leaf) {
                    hits.push(Hit { path: prefix, leaf });
                }
                continue;
            }
            let wanted = path[depth];
            for symbol in (0..ALPHABET_SIZE as u8).rev() {
                let Some(child) = self.child(node, symbol) else {
                    continue;
                };
                if !diverged && symbol < wanted {
                    continue;
                }
                let mismatches = mismatches + usize::from(symbol != wanted);
                if mismatches > max_distance {
                    continue;
                }
                let mut next = prefix.clone();
                next.push(symbol);
                stack.push((child, depth + 1, mismatches, diverged || symbol > wanted, next));
            }
        }
        hits
    }

    /// One-sided Levenshtein search over the trie, one DP row per node.
    fn levenshtein(&self, path: &[u8], max_distance: usize) -> Vec<Hit> {
        let mut hits = Vec::new();
        let n = path.len();
        let root_row: Vec<usize> = (0..=n).collect();
        let mut stack = vec![(0usize, Vec::new(), root_row)];

        while let Some((node, prefix, row)) = stack.pop() {
            if let Some(leaf) = self.nodes[node].leaf {
                if row[n] <= max_distance && prefix.as_slice() > path {
                    hits.push(Hit { path: prefix.clone(), leaf });
                }
            }
            if row.iter().min().is_some_and(|&m| m > max_distance) {
                continue;
            }
            for symbol in (0..ALPHABET_SIZE as u8).rev() {
                let Some(child) = self.child(node, symbol) else {
                    continue;
                };
                let mut next_row = Vec::with_capacity(n + 1);
                next_row.push(row[0] + 1);
                for j in 1..=n {
                    let substitution = row[j - 1] + usize::from(path[j - 1] != symbol);
                    let cost = substitution.min(row[j] + 1).min(next_row[j - 1] + 1);
                    next_row.push(cost);
                }
                let mut next = prefix.clone();
                next.push(symbol);
                stack.push((child, next, next_row));
            }
        }
        hits
    }
}

impl SequenceIndex for Trie {
    fn add(&mut self, word: &[u8]) -> Result<LeafId> {
        Self::check_word(word)?;
        let mut node = 0;
        for &symbol in word {
            node = match self.child(node, symbol) {
                Some(c) => c,
                None => {
                    let c = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children[symbol as usize] = c;
                    c
                }
            };
        }
        let id = match self.nodes[node].leaf {
            Some(id) => id,
            None => {
                let id = self.leaves.len();
                self.leaves.push(Leaf::default());
                self.nodes[node].leaf = Some(id);
                id
            }
        };
        self.leaves[id].count += 1;
        Ok(id)
    }

    fn find(&self, word: &[u8]) -> Option<LeafId> {
        let mut node = 0;
        for &symbol in word {
            if symbol as usize >= ALPHABET_SIZE {
                return None;
            }
            node = self.child(node, symbol)?;
        }
        self.nodes[node].leaf
    }

    /// Pre-order, lowest symbol first: words come out in lexicographic order.
    fn walk(&self) -> Vec<Hit> {
        let mut hits = Vec::with_capacity(self.leaves.len());
        let mut stack = vec![(0usize, Vec::new())];
        while let Some((node, prefix)) = stack.pop() {
            if let Some(leaf) = self.nodes[node].leaf {
                hits.push(Hit { path: prefix.clone(), leaf });
            }
            for symbol in (0..ALPHABET_SIZE as u8).rev() {
                if let Some(child) = self.child(node, symbol) {
                    let mut next = prefix.clone();
                    next.push(symbol);
                    stack.push((child, next));
                }
            }
        }
        hits
    }

    fn neighbors_within(
        &self,
        path: &[u8],
        max_distance: usize,
        metric: Metric,
    ) -> Result<Vec<Hit>> {
        Self::check_word(path)?;
        Ok(match metric {
            Metric::Hamming => self.hamming(path, max_distance),
            Metric::Levenshtein => self.levenshtein(path, max_distance),
        })
    }

    fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    fn leaves_mut(&mut self) -> &mut [Leaf] {
        &mut self.leaves
    }
}
