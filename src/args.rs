// Command-line argument parsing
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::cluster::Method;
use crate::errors::{HumidError, Result};
use crate::index::Metric;

#[derive(Parser, Debug, Clone)]
#[command(name = "humidrs", about = "Deduplicate FastQ files using UMIs and near-duplicate clustering")]
pub struct Args {
    /// FastQ files, one per read end, read in lockstep
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Word length: nucleotides taken from the UMI and the reads
    #[arg(short = 'n', long, default_value_t = 24)]
    pub word_length: usize,
    /// Maximum distance between neighbouring words
    #[arg(short = 'm', long, default_value_t = 1)]
    pub distance: usize,
    #[arg(long, value_enum, default_value_t = Metric::Hamming)]
    pub metric: Metric,
    /// Use edit distance (same as --metric levenshtein)
    #[arg(short = 'e', long, conflicts_with = "metric")]
    pub edit_distance: bool,
    #[arg(long, value_enum, default_value_t = Method::Directional)]
    pub method: Method,
    /// Use the maximum clustering method (same as --method maximum)
    #[arg(short = 'x', long, conflicts_with = "method")]
    pub maximum: bool,
    #[arg(short = 'd', long, default_value = ".")]
    pub outdir: PathBuf,
    /// Log file (default: stderr)
    #[arg(short = 'l', long)]
    pub log: Option<PathBuf>,
    /// Write statistics files
    #[arg(short = 's', long)]
    pub statistics: bool,
    /// Write deduplicated FastQ files
    #[arg(short = 'q', long, default_value_t = true, action = ArgAction::Set)]
    pub filter: bool,
    /// Write FastQ files annotated with cluster ids
    #[arg(short = 'a', long)]
    pub annotate: bool,
    #[arg(short = 't', long, default_value_t = num_cpus())]
    pub threads: usize,
    /// Force single-threaded neighbour search
    #[arg(long)]
    pub single_threaded: bool,
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub files: Vec<PathBuf>,
    pub word_length: usize,
    pub max_distance: usize,
    pub metric: Metric,
    pub method: Method,
    pub outdir: PathBuf,
    pub filter: bool,
    pub annotate: bool,
    pub statistics: bool,
}

impl Args {
    pub fn metric(&self) -> Metric {
        if self.edit_distance { Metric::Levenshtein } else { self.metric }
    }

    pub fn method(&self) -> Method {
        if self.maximum { Method::Maximum } else { self.method }
    }

    /// Reject parameter combinations that cannot produce a useful run.
    pub fn to_config(&self) -> Result<Config> {
        if self.files.is_empty() {
            return Err(HumidError::invalid_parameter("files", "at least one FastQ file is required"));
        }
        if self.word_length == 0 {
            return Err(HumidError::invalid_parameter("word-length", "must be > 0"));
        }
        if self.threads == 0 && !self.single_threaded {
            return Err(HumidError::invalid_parameter("threads", "must be > 0"));
        }
        if !(self.filter || self.annotate || self.statistics) {
            return Err(HumidError::invalid_parameter(
                "filter",
                "nothing to do: enable at least one of --filter, --annotate or --statistics",
            ));
        }
        Ok(Config {
            files: self.files.clone(),
            word_length: self.word_length,
            max_distance: self.distance,
            metric: self.metric(),
            method: self.method(),
            outdir: self.outdir.clone(),
            filter: self.filter,
            annotate: self.annotate,
            statistics: self.statistics,
        })
    }
}

pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Get effective thread count based on args and platform
#[inline]
pub fn effective_threads(args: &Args) -> usize {
    if args.single_threaded {
        1
    } else {
        args.threads
    }
}
