use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ppin_reweight::{
    run_depths, Algorithm, EvidenceTable, Ppin, ReweightConfig, RunContext, ScoringEngine,
};

#[derive(Parser, Debug)]
#[command(
    name = "ppin-reweight",
    about = "PPIN reweighter using topology and experimental evidence"
)]
struct Cli {
    /// Edge list to reweight (`nodeA<TAB>nodeB<TAB>weight` per line)
    #[arg(short = 'I', long)]
    input_graph: PathBuf,

    /// BioGRID-style tab-separated evidence table
    #[arg(short = 'D', long)]
    database_path: PathBuf,

    /// First depth of the sweep (inclusive, >= 0)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    depth_from: i64,

    /// Last depth of the sweep (inclusive, >= 0)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    depth_to: i64,

    /// Output file template, or a directory to write `<input>v<depth>.<ext>` into
    #[arg(short = 'p', long)]
    path: PathBuf,

    /// Scoring algorithm: fs, depth-fs, chua, chua-transitive, dissimilarity
    #[arg(short = 'a', long, default_value = "chua")]
    algorithm: Algorithm,

    /// Append every computed edge to `<output>.cache`
    #[arg(short = 'c', long)]
    cache: bool,

    /// Skip edges already present in `<output>.cache`
    #[arg(long)]
    resume: bool,

    /// Bound each memo table to this many entries (LRU)
    #[arg(long)]
    memo_capacity: Option<usize>,

    /// Per-edge progress logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = ReweightConfig {
        depth_from: cli.depth_from,
        depth_to: cli.depth_to,
        algorithm: cli.algorithm,
        cache: cli.cache,
        resume: cli.resume,
        memo_capacity: cli.memo_capacity,
        ..Default::default()
    };
    config.validate().context("invalid arguments")?;

    let graph = Ppin::load(&cli.input_graph)
        .with_context(|| format!("failed to load graph {}", cli.input_graph.display()))?;
    info!(
        nodes = graph.names().len(),
        edges = graph.edge_count(),
        "graph loaded"
    );
    let db = EvidenceTable::load(&cli.database_path).with_context(|| {
        format!(
            "failed to load evidence table {}",
            cli.database_path.display()
        )
    })?;
    info!(records = db.len(), "evidence table loaded");

    let mut engine = ScoringEngine::new(Arc::new(graph), db, config.engine_config())?;
    let ctx = RunContext::new(cli.verbose);
    let reports = run_depths(&mut engine, &config, &cli.input_graph, &cli.path, &ctx)?;
    for r in &reports {
        println!(
            "{}: {} edges ({} computed, {} from cache)",
            r.output.display(),
            r.total,
            r.computed,
            r.resumed
        );
    }
    Ok(())
}
