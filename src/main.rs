use std::fs::File;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};
use log::info;

use humidrs::args::{Args, effective_threads};
use humidrs::run;
use humidrs::utils::format_elapsed;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = &args.log {
        let file = File::create(path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        logger.target(Target::Pipe(Box::new(file)));
    }
    logger.init();

    let config = args.to_config()?;

    // Determine effective thread count
    let threads = effective_threads(&args);

    // Set rayon thread pool size (only affects the neighbour search)
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();

    info!(
        "humidrs: using {} threads{}",
        threads,
        if args.single_threaded { " (single-threaded mode)" } else { "" }
    );

    let total_start = Instant::now();
    let summary = run(&config).context("deduplication failed")?;

    info!("  total: {}", summary.total);
    info!("  usable: {}", summary.usable);
    info!("  unique: {}", summary.unique);
    info!("  clusters: {}", summary.clusters);

    info!("total time {}", format_elapsed(total_start.elapsed()));

    Ok(())
}
