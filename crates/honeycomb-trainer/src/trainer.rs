//! Self-play training loop.
//!
//! The engine plays both sides of complete games, growing the shared
//! transposition table; the table is saved after every finished game so
//! interrupted sessions keep their progress.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use honeycomb_core::{
    GameState, Player, SearchConstraints, SearchMode, Searcher, TranspositionTable,
};

/// Configuration of one training session.
#[derive(Clone, Debug)]
pub struct TrainerConfig {
    pub max_depth: i32,
    pub time_limit: Duration,
    pub min_think_time: Duration,
    /// Per-game depth, capped by `max_depth`.
    pub depth_override: Option<i32>,
    pub trace_pvs: bool,
}

/// Drives self-play games with a shared searcher and table.
pub struct Trainer {
    searcher: Searcher,
    table: Arc<TranspositionTable>,
    constraints: SearchConstraints,
    games_played: u64,
    cumulative_score_delta: i64,
    pending_save: Option<honeycomb_core::tt::PersistenceHandle>,
}

impl Trainer {
    pub fn new(table: Arc<TranspositionTable>, config: &TrainerConfig) -> Result<Trainer> {
        let effective_depth = config
            .depth_override
            .map_or(config.max_depth, |depth| depth.min(config.max_depth));
        let constraints = SearchConstraints::new(
            effective_depth,
            config.time_limit,
            SearchMode::Seq,
        )
        .context("invalid search constraints")?;

        let searcher = Searcher::builder()
            .table(table.clone())
            .default_constraints(constraints)
            .min_think_time(config.min_think_time)
            .trace_pvs(config.trace_pvs)
            .build()
            .context("failed to construct searcher")?;

        Ok(Trainer {
            searcher,
            table,
            constraints,
            games_played: 0,
            cumulative_score_delta: 0,
            pending_save: None,
        })
    }

    /// Plays `game_count` complete self-play games, then waits for the
    /// final background save so the table survives process exit.
    pub fn play_games(&mut self, game_count: u64) -> Result<()> {
        anyhow::ensure!(game_count >= 1, "game count must be at least 1");
        for _ in 0..game_count {
            self.play_single_game()?;
        }
        if let Some(save) = self.pending_save.take() {
            // Failures are already logged by the IO worker.
            let _ = save.wait();
        }
        Ok(())
    }

    pub fn games_played(&self) -> u64 {
        self.games_played
    }

    /// Running average of (first score - second score) over played games.
    pub fn average_score_delta(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.cumulative_score_delta as f64 / self.games_played as f64
        }
    }

    fn play_single_game(&mut self) -> Result<()> {
        let entries_before = self.table.size();
        let mut state = GameState::new();

        while !state.is_game_over() {
            let result = self
                .searcher
                .search(&state, &self.constraints)
                .context("search failed during self-play")?;
            state = state
                .apply_move(result.best_move)
                .context("engine returned an illegal move")?;
        }

        self.games_played += 1;
        self.cumulative_score_delta +=
            (state.score(Player::First) - state.score(Player::Second)) as i64;
        let added_entries = self.table.size().saturating_sub(entries_before);

        info!(
            "completed training game {} (depth={}, addedEntries={}, averageScore={:.2})",
            self.games_played,
            self.constraints.depth_limit(),
            added_entries,
            self.average_score_delta()
        );

        // Persist in the background; the IO worker logs failures.
        self.pending_save = Some(self.table.save_async());
        Ok(())
    }
}
