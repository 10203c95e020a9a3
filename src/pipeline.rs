//! End-to-end deduplication run
//!
//! read -> index -> neighbour graph -> clusters -> filtered / annotated
//! FastQ and statistics files.

use std::path::PathBuf;

use log::info;

use crate::args::Config;
use crate::cluster::{Method, partition};
use crate::errors::{HumidError, Result};
use crate::graph::build_graph;
use crate::index::{Metric, SequenceIndex, Trie};
use crate::io::{ReadSets, peek_umi, read_set_word, write_annotated, write_filtered};
use crate::stats::{Statistics, Summary};
use crate::utils::Stage;
use crate::word::WordLayout;

/// Work out how many nucleotides to take from the UMI and from each file.
pub fn word_layout(files: &[PathBuf], word_length: usize) -> Result<WordLayout> {
    let first = files
        .first()
        .ok_or_else(|| HumidError::invalid_parameter("files", "at least one FastQ file is required"))?;
    let stage = Stage::start("Determining nucleotides to take");
    let layout = WordLayout::new(word_length, peek_umi(first)?, files.len());
    stage.finish();

    info!("  header: {}", layout.header);
    for (file, n) in files.iter().zip(&layout.per_file) {
        info!("  {}: {}", file.display(), n);
    }
    Ok(layout)
}

/// Add the word of every usable read set to `index`.
///
/// Returns the total and usable number of read sets.
pub fn read_data<I: SequenceIndex>(
    index: &mut I,
    files: &[PathBuf],
    layout: &WordLayout,
) -> Result<(usize, usize)> {
    let stage = Stage::start("Reading data");
    let mut total = 0;
    let mut usable = 0;
    for result in ReadSets::open(files)? {
        let records = result?;
        let word = read_set_word(&records, layout);
        if !word.filtered {
            index.add(&word.data)?;
            usable += 1;
        }
        total += 1;
    }
    stage.finish();
    Ok((total, usable))
}

pub fn run(config: &Config) -> Result<Summary> {
    let layout = word_layout(&config.files, config.word_length)?;

    let mut trie = Trie::new();
    let (total, usable) = read_data(&mut trie, &config.files, &layout)?;

    let stage = Stage::start(match config.metric {
        Metric::Hamming => "Calculating neighbours using Hamming distance",
        Metric::Levenshtein => "Calculating neighbours using Levenshtein distance",
    });
    let unique = build_graph(&mut trie, config.max_distance, config.metric)?;
    stage.finish();

    let stage = Stage::start(match config.method {
        Method::Maximum => "Calculating maximum clusters",
        Method::Directional => "Calculating directional clusters",
    });
    let clusters = partition(&mut trie, config.method)?;
    stage.finish();

    let summary = Summary { total, usable, unique, clusters: clusters.len() };
    info!(
        "  {} read sets, {} usable, {} unique, {} clusters",
        summary.total, summary.usable, summary.unique, summary.clusters
    );

    std::fs::create_dir_all(&config.outdir).map_err(|e| HumidError::io(&config.outdir, e))?;

    if config.filter {
        let stage = Stage::start("Writing filtered results");
        let written = write_filtered(&config.files, &config.outdir, &layout, &trie, &clusters)?;
        stage.finish();
        info!("  wrote {written} read sets");
    }
    if config.annotate {
        let stage = Stage::start("Writing annotated results");
        write_annotated(&config.files, &config.outdir, &layout, &trie)?;
        stage.finish();
    }
    if config.statistics {
        let stage = Stage::start("Calculating count and neighbour stats");
        let stats = Statistics::collect(trie.leaves(), &clusters);
        stats.write(&summary, &config.outdir)?;
        stage.finish();
    }

    Ok(summary)
}
