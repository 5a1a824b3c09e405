//! Search instrumentation returned alongside the best move.

use std::time::Duration;

use smallvec::SmallVec;

/// Cell indices of a principal variation.
pub type PvLine = SmallVec<[u8; 16]>;

/// Counters recorded for one iterative-deepening step.
#[derive(Clone, Debug)]
pub struct IterationTelemetry {
    pub depth: i32,
    pub nodes: u64,
    pub cutoffs: u64,
    pub tt_hits: u64,
    pub tt_stores: u64,
    pub pv_researches: u64,
    pub max_active_tasks: u64,
    pub elapsed: Duration,
    /// Best-effort principal variation reconstructed from the
    /// transposition table's best-move chain; may be empty under PAR.
    pub principal_variation: PvLine,
}

/// Aggregated instrumentation for one search call.
#[derive(Clone, Debug, Default)]
pub struct SearchTelemetry {
    iterations: Vec<IterationTelemetry>,
    warnings: Vec<String>,
}

impl SearchTelemetry {
    pub fn push_iteration(&mut self, iteration: IterationTelemetry) {
        self.iterations.push(iteration);
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn iterations(&self) -> &[IterationTelemetry] {
        &self.iterations
    }

    /// Non-fatal notices, e.g. a PAR request served sequentially.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The deepest recorded iteration, if any.
    pub fn latest(&self) -> Option<&IterationTelemetry> {
        self.iterations.last()
    }

    pub fn total_nodes(&self) -> u64 {
        self.iterations.iter().map(|i| i.nodes).sum()
    }

    pub fn total_cutoffs(&self) -> u64 {
        self.iterations.iter().map(|i| i.cutoffs).sum()
    }

    pub fn total_tt_hits(&self) -> u64 {
        self.iterations.iter().map(|i| i.tt_hits).sum()
    }

    pub fn total_tt_stores(&self) -> u64 {
        self.iterations.iter().map(|i| i.tt_stores).sum()
    }

    pub fn total_pv_researches(&self) -> u64 {
        self.iterations.iter().map(|i| i.pv_researches).sum()
    }

    pub fn max_active_tasks(&self) -> u64 {
        self.iterations
            .iter()
            .map(|i| i.max_active_tasks)
            .max()
            .unwrap_or(0)
    }
}

/// Outcome of a search: the chosen move plus instrumentation.
///
/// `timed_out` is not an error; the move is always legal in the searched
/// position. `depth_evaluated` is the deepest fully completed iteration
/// (zero when the very first iteration hit the deadline).
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: u8,
    pub depth_evaluated: i32,
    pub visited_nodes: u64,
    pub timed_out: bool,
    pub telemetry: SearchTelemetry,
}
