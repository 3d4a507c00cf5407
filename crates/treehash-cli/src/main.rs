//! treehash CLI
//!
//! Computes the SHA-256 tree hash of a file: chunks are hashed in
//! parallel and folded pairwise into a single root digest.

mod config;
mod progress;

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use config::Config;
use progress::{HashProgress, format_bytes};
use treehash_core::{ShortReadPolicy, TreeHasher};

/// treehash - parallel tree hashing for large files
#[derive(Parser)]
#[command(name = "treehash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to hash
    #[arg(required = true)]
    file: PathBuf,

    /// Worker threads (0 = one per hardware thread)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Fail on chunk reads shorter than the file length implies
    #[arg(long)]
    strict: bool,

    /// Suppress the progress display
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    // Initialize logging
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Flags override file values
    let workers = cli.workers.unwrap_or(config.hash.workers);
    let chunk_size = cli.chunk_size.unwrap_or(config.hash.chunk_size);
    let policy = if cli.strict || config.hash.strict {
        ShortReadPolicy::Fail
    } else {
        ShortReadPolicy::Warn
    };

    if !cli.file.is_file() {
        anyhow::bail!("Not a file: {}", cli.file.display());
    }

    tracing::info!("computing tree hash for {}", cli.file.display());

    let mut hasher = TreeHasher::new(&cli.file)
        .workers(workers)
        .chunk_size(chunk_size)
        .short_read_policy(policy);

    let progress = if cli.quiet {
        None
    } else {
        let progress = HashProgress::new(&cli.file.display().to_string());
        hasher = hasher.on_progress(progress.observer());
        Some(progress)
    };

    let started = Instant::now();
    let summary = hasher.compute();
    if let Some(progress) = progress {
        progress.finish();
    }
    let summary = summary?;

    tracing::debug!(
        "hashed {} ({} chunks, {} levels) in {:.2?}",
        format_bytes(summary.file_size),
        summary.chunk_count,
        summary.levels,
        started.elapsed()
    );
    if summary.anomalous_reads > 0 {
        tracing::warn!(
            "{} chunk(s) read short of the recorded file length; the digest may not match the file as it was at open",
            summary.anomalous_reads
        );
    }

    println!("{}  {}", hex::encode(summary.root), cli.file.display());

    Ok(())
}
