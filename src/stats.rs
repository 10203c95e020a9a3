//! Duplicate statistics
//!
//! Histograms over the finished leaf and cluster collections, and the flat
//! `.dat` files they are written to.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cluster::{Cluster, cluster_stats};
use crate::errors::{HumidError, Result};
use crate::index::Leaf;

/// key -> number of occurrences, in ascending key order
pub type Histogram = BTreeMap<usize, usize>;

/// Read and word counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Read sets seen in the input
    pub total: usize,
    /// Read sets that produced an unfiltered word
    pub usable: usize,
    /// Distinct words
    pub unique: usize,
    pub clusters: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// exact duplicate count -> number of words
    pub counts: Histogram,
    /// neighbour degree -> number of words
    pub neighbours: Histogram,
    /// cluster size -> number of clusters
    pub cluster_sizes: Histogram,
}

impl Statistics {
    /// One pass over `leaves`, plus the cluster size histogram.
    pub fn collect(leaves: &[Leaf], clusters: &[Cluster]) -> Self {
        let mut counts = Histogram::new();
        let mut neighbours = Histogram::new();
        for leaf in leaves {
            *counts.entry(leaf.count).or_insert(0) += 1;
            *neighbours.entry(leaf.neighbours.len()).or_insert(0) += 1;
        }
        Self { counts, neighbours, cluster_sizes: cluster_stats(clusters) }
    }

    /// Write `counts.dat`, `neigh.dat`, `clusters.dat` and `stats.dat` to `dir`.
    pub fn write(&self, summary: &Summary, dir: &Path) -> Result<()> {
        write_histogram(&self.counts, &dir.join("counts.dat"))?;
        write_histogram(&self.neighbours, &dir.join("neigh.dat"))?;
        write_histogram(&self.cluster_sizes, &dir.join("clusters.dat"))?;
        write_summary(summary, &dir.join("stats.dat"))
    }
}

fn write_lines<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|e| HumidError::io(path, e))?;
    let mut out = BufWriter::new(file);
    body(&mut out).and_then(|()| out.flush()).map_err(|e| HumidError::io(path, e))
}

/// One `key value` line per histogram entry.
pub fn write_histogram(histogram: &Histogram, path: &Path) -> Result<()> {
    write_lines(path, |out| {
        for (key, value) in histogram {
            writeln!(out, "{key} {value}")?;
        }
        Ok(())
    })
}

pub fn write_summary(summary: &Summary, path: &Path) -> Result<()> {
    write_lines(path, |out| {
        writeln!(out, "total: {}", summary.total)?;
        writeln!(out, "usable: {}", summary.usable)?;
        writeln!(out, "unique: {}", summary.unique)?;
        writeln!(out, "clusters: {}", summary.clusters)
    })
}
