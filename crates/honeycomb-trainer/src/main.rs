//! `trainer` - self-play training runner for the Honeycomb engine.

mod trainer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use honeycomb_core::TranspositionTable;
use trainer::{Trainer, TrainerConfig};

#[derive(Parser)]
#[command(name = "trainer")]
#[command(about = "Self-play training runner for the Honeycomb engine")]
struct Args {
    /// Number of self-play games to run
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    game_count: u64,

    /// Maximum search depth
    #[arg(value_parser = clap::value_parser!(i32).range(1..))]
    max_depth: i32,

    /// Time limit per move in milliseconds; 0 means unbounded
    time_limit_ms: u64,

    /// Per-game search depth, capped by the maximum depth
    #[arg(value_parser = clap::value_parser!(i32).range(1..))]
    depth_override: Option<i32>,

    /// Transposition table file (positional alternative to --table)
    #[arg(conflicts_with = "table")]
    table_path: Option<PathBuf>,

    /// Minimum think time per move in milliseconds
    #[arg(long = "minThinkMillis", value_name = "N", default_value_t = 0)]
    min_think_millis: u64,

    /// Transposition table file
    #[arg(long = "table", value_name = "path")]
    table: Option<PathBuf>,

    /// Log every completed deepening iteration
    #[arg(long = "tracePVS")]
    trace_pvs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.trace_pvs { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let table = Arc::new(match args.table.or(args.table_path) {
        Some(path) => TranspositionTable::with_path(path),
        None => TranspositionTable::new(),
    });
    table
        .load()
        .context("failed to load the transposition table")?;

    let config = TrainerConfig {
        max_depth: args.max_depth,
        time_limit: Duration::from_millis(args.time_limit_ms),
        min_think_time: Duration::from_millis(args.min_think_millis),
        depth_override: args.depth_override,
        trace_pvs: args.trace_pvs,
    };
    let mut trainer = Trainer::new(table, &config)?;
    trainer.play_games(args.game_count)?;

    log::info!(
        "training finished: {} games, average score delta {:.2}",
        trainer.games_played(),
        trainer.average_score_delta()
    );
    Ok(())
}
