//! Search: sequential and parallel negamax behind one facade.

mod constraints;
mod control;
mod negamax;
mod parallel;
mod stack;
mod telemetry;

pub use constraints::{SearchConstraints, SearchMode};
pub use control::{CounterSnapshot, SearchControl, StopHandle};
pub use negamax::SequentialSearcher;
pub use parallel::ParallelSearcher;
pub use stack::{NodeSnapshot, SearchStack, MAX_PLY, SCORE_WEIGHT};
pub use telemetry::{IterationTelemetry, PvLine, SearchResult, SearchTelemetry};

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;

use crate::error::SearchError;
use crate::state::GameState;
use crate::tt::{PersistenceStatus, TranspositionTable};

/// Depth used by the convenience wrappers when the caller gives none.
pub const DEFAULT_DEPTH: i32 = 6;

/// A search backend: one full iterative-deepening run under a control.
pub trait SearchBackend {
    fn run(
        &mut self,
        state: &GameState,
        bounded_depth: i32,
        control: &SearchControl,
        trace: bool,
    ) -> SearchResult;
}

impl SearchBackend for SequentialSearcher {
    fn run(
        &mut self,
        state: &GameState,
        bounded_depth: i32,
        control: &SearchControl,
        trace: bool,
    ) -> SearchResult {
        SequentialSearcher::run(self, state, bounded_depth, control, trace)
    }
}

impl SearchBackend for ParallelSearcher {
    fn run(
        &mut self,
        state: &GameState,
        bounded_depth: i32,
        control: &SearchControl,
        trace: bool,
    ) -> SearchResult {
        ParallelSearcher::run(self, state, bounded_depth, control, trace)
    }
}

/// Configures a [`Searcher`].
pub struct SearcherBuilder {
    table: Option<Arc<TranspositionTable>>,
    threads: Option<usize>,
    parallel_enabled: bool,
    default_constraints: SearchConstraints,
    min_think_time: Duration,
    trace_pvs: bool,
}

impl Default for SearcherBuilder {
    fn default() -> Self {
        SearcherBuilder {
            table: None,
            threads: None,
            parallel_enabled: true,
            default_constraints: SearchConstraints::depth(DEFAULT_DEPTH)
                .expect("default depth is valid"),
            min_think_time: Duration::ZERO,
            trace_pvs: false,
        }
    }
}

impl SearcherBuilder {
    /// Shares an existing transposition table; a private table at the
    /// default path is created otherwise.
    pub fn table(mut self, table: Arc<TranspositionTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Worker threads for the parallel backend; zero or unset means one
    /// per CPU.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Disables the parallel backend entirely; PAR requests then fall
    /// back to SEQ with a telemetry warning.
    pub fn without_parallel(mut self) -> Self {
        self.parallel_enabled = false;
        self
    }

    /// Constraints used by the `find_best_move` convenience wrappers.
    pub fn default_constraints(mut self, constraints: SearchConstraints) -> Self {
        self.default_constraints = constraints;
        self
    }

    /// Lower bound on wall time per move, applied when a search finishes
    /// early without timing out.
    pub fn min_think_time(mut self, min_think_time: Duration) -> Self {
        self.min_think_time = min_think_time;
        self
    }

    /// Logs every completed deepening iteration at debug level.
    pub fn trace_pvs(mut self, enabled: bool) -> Self {
        self.trace_pvs = enabled;
        self
    }

    pub fn build(self) -> Result<Searcher, SearchError> {
        let time_limit = self.default_constraints.time_limit();
        if !time_limit.is_zero() && self.min_think_time > time_limit {
            return Err(SearchError::InvalidArgument(
                "minimum think time cannot exceed the time limit".into(),
            ));
        }
        let table = self
            .table
            .unwrap_or_else(|| Arc::new(TranspositionTable::new()));
        if table.status() == PersistenceStatus::NotLoaded {
            // Background load; the IO worker logs failures.
            let _ = table.load_async();
        }
        let parallel = if self.parallel_enabled {
            Some(ParallelSearcher::with_threads(
                table.clone(),
                self.threads.unwrap_or(0),
            )?)
        } else {
            None
        };
        Ok(Searcher {
            sequential: SequentialSearcher::new(table.clone()),
            parallel,
            table,
            stop: StopHandle::new(),
            default_constraints: self.default_constraints,
            min_think_time: self.min_think_time,
            trace_pvs: self.trace_pvs,
        })
    }
}

/// Entry point for move search: validates the request, bounds the depth,
/// arms the deadline, dispatches to a backend and enforces the minimum
/// think time.
pub struct Searcher {
    sequential: SequentialSearcher,
    parallel: Option<ParallelSearcher>,
    table: Arc<TranspositionTable>,
    stop: Arc<StopHandle>,
    default_constraints: SearchConstraints,
    min_think_time: Duration,
    trace_pvs: bool,
}

impl Searcher {
    /// Searcher over `table` with default settings.
    pub fn new(table: Arc<TranspositionTable>) -> Result<Searcher, SearchError> {
        Searcher::builder().table(table).build()
    }

    pub fn builder() -> SearcherBuilder {
        SearcherBuilder::default()
    }

    /// The shared transposition table.
    pub fn transposition_table(&self) -> &Arc<TranspositionTable> {
        &self.table
    }

    /// Requests cooperative cancellation of the running search; also
    /// interrupts a minimum-think-time sleep.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// The shared stop handle, for stopping a search from another
    /// thread while this searcher is borrowed by `search`.
    pub fn stop_handle(&self) -> Arc<StopHandle> {
        self.stop.clone()
    }

    /// Enables or disables per-iteration trace logging.
    pub fn set_trace_pvs(&mut self, enabled: bool) {
        self.trace_pvs = enabled;
    }

    /// Searches `state` under `constraints` and returns the best move
    /// with telemetry.
    ///
    /// Fails with `InvalidState` on a terminal position. A timeout is
    /// not an error: the result carries `timed_out = true` and the best
    /// move discovered so far, which is always legal.
    pub fn search(
        &mut self,
        state: &GameState,
        constraints: &SearchConstraints,
    ) -> Result<SearchResult, SearchError> {
        if state.is_game_over() {
            return Err(SearchError::InvalidState(
                "cannot search moves in a terminal position".into(),
            ));
        }

        let remaining = state.board().playable_remaining() as i32;
        let bounded_depth = constraints.depth_limit().min(remaining).max(1);

        let start = Instant::now();
        let time_limit = constraints.time_limit();
        let deadline = if time_limit.is_zero() {
            None
        } else {
            // A deadline beyond the clock's range is as good as none.
            start.checked_add(time_limit)
        };

        self.stop.reset();
        let control = SearchControl::new(self.stop.clone(), deadline);

        let trace = self.trace_pvs;
        let result = match constraints.mode() {
            SearchMode::Seq => self.sequential.run(state, bounded_depth, &control, trace),
            SearchMode::Par => match self.parallel.as_mut() {
                Some(parallel) => parallel.run(state, bounded_depth, &control, trace),
                None => {
                    warn!("parallel search unavailable, falling back to sequential");
                    let mut fallback =
                        self.sequential.run(state, bounded_depth, &control, trace);
                    fallback
                        .telemetry
                        .push_warning("parallel search unavailable; ran sequentially");
                    fallback
                }
            },
        };
        debug_assert!(state.board().is_empty(result.best_move));

        if !result.timed_out && remaining <= 1 {
            // Last playable move of the match: schedule a background save.
            let _ = self.table.save_async();
        }

        if !result.timed_out {
            let elapsed = start.elapsed();
            if elapsed < self.min_think_time {
                self.stop.sleep_interruptibly(self.min_think_time - elapsed);
            }
        }

        Ok(result)
    }

    /// Best move under the builder's default constraints.
    pub fn find_best_move(&mut self, state: &GameState) -> Result<u8, SearchError> {
        let constraints = self.default_constraints;
        Ok(self.search(state, &constraints)?.best_move)
    }

    /// Best move with the default depth overridden; the override is
    /// capped by the configured depth.
    pub fn find_best_move_with_depth(
        &mut self,
        state: &GameState,
        depth_limit: i32,
    ) -> Result<u8, SearchError> {
        if depth_limit < 1 {
            return Err(SearchError::InvalidArgument(format!(
                "depth limit must be at least 1, got {depth_limit}"
            )));
        }
        let bounded = depth_limit.min(self.default_constraints.depth_limit());
        let constraints = SearchConstraints::new(
            bounded,
            self.default_constraints.time_limit(),
            self.default_constraints.mode(),
        )?;
        Ok(self.search(state, &constraints)?.best_move)
    }
}
