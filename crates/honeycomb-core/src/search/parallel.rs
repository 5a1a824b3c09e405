//! Fork-join parallel negamax.
//!
//! The root and every principal-variation node split: the first move is
//! searched sequentially with the full window, then the remaining
//! siblings are scouted concurrently with null windows ("young brothers
//! wait"). Scout results are gathered in submission order; a scout that
//! beats alpha triggers a sequential full-window re-search. A split-local
//! flag cancels outstanding siblings once a refutation at or above beta
//! is seen; cancelled slots carry no information and are re-probed
//! sequentially, which keeps the final move and score identical to the
//! sequential search on an empty table without a binding deadline.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::SearchError;
use crate::geometry::canonical_key;
use crate::search::control::SearchControl;
use crate::search::negamax::{
    bound_flag, iterative_deepening, negamax, store_entry, INFINITY,
};
use crate::search::stack::{SearchStack, SCORE_WEIGHT};
use crate::search::telemetry::SearchResult;
use crate::state::GameState;
use crate::tt::{TTEntry, TTFlag, TranspositionTable};

thread_local! {
    /// Per-worker free list of reusable search stacks.
    static STACK_POOL: RefCell<Vec<Box<SearchStack>>> = const { RefCell::new(Vec::new()) };
}

/// Stack borrowed from the worker-local pool; returned on drop, so a
/// panicking task still gives its stack back.
struct StackLease {
    stack: Option<Box<SearchStack>>,
}

impl StackLease {
    fn acquire() -> StackLease {
        let stack = STACK_POOL
            .with(|pool| pool.borrow_mut().pop())
            .unwrap_or_else(SearchStack::boxed);
        StackLease { stack: Some(stack) }
    }

    fn stack(&mut self) -> &mut SearchStack {
        self.stack.as_mut().expect("lease holds a stack until drop")
    }
}

impl Drop for StackLease {
    fn drop(&mut self) {
        if let Some(stack) = self.stack.take() {
            STACK_POOL.with(|pool| pool.borrow_mut().push(stack));
        }
    }
}

/// Decrements the active-task gauge on all exit paths.
struct TaskGuard<'a>(&'a SearchControl);

impl<'a> TaskGuard<'a> {
    fn enter(control: &'a SearchControl) -> TaskGuard<'a> {
        control.task_started();
        TaskGuard(control)
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.0.task_finished();
    }
}

struct SplitEnv<'a> {
    tt: &'a TranspositionTable,
    control: &'a SearchControl,
}

/// Scouts the siblings of a split point concurrently and gathers them in
/// submission order, updating `best_value`/`best_move`/`alpha` exactly as
/// the sequential loop would. Returns the final `(best_value, best_move,
/// alpha)` triple.
#[allow(clippy::too_many_arguments)]
fn split_siblings(
    env: &SplitEnv<'_>,
    stack: &mut SearchStack,
    siblings: &[u8],
    depth: i32,
    mut alpha: i32,
    beta: i32,
    mut best_value: i32,
    mut best_move: i32,
) -> (i32, i32, i32) {
    let parent = stack.snapshot();
    let split_abort = AtomicBool::new(false);
    let scout_alpha = alpha;

    let scouted: Vec<Option<i32>> = siblings
        .par_iter()
        .map(|&cell| {
            if env.control.should_abort() || split_abort.load(Ordering::Relaxed) {
                return None;
            }
            let _task = TaskGuard::enter(env.control);
            let mut lease = StackLease::acquire();
            let task_stack = lease.stack();
            task_stack.seed(parent);
            task_stack.push(cell);
            let value = -negamax(
                task_stack,
                env.tt,
                env.control,
                depth - 1,
                -scout_alpha - 1,
                -scout_alpha,
            );
            if env.control.was_aborted() {
                return None;
            }
            if value >= beta {
                // Refutation: siblings not yet joined cannot matter.
                split_abort.store(true, Ordering::Relaxed);
            }
            Some(value)
        })
        .collect();

    for (slot, &cell) in scouted.iter().zip(siblings) {
        if env.control.should_abort() {
            break;
        }
        // A cancelled scout carries no information; probe it here so the
        // gather sees every move the sequential loop would.
        let probe = match slot {
            Some(value) => *value,
            None => {
                stack.push(cell);
                let value = -negamax(stack, env.tt, env.control, depth - 1, -alpha - 1, -alpha);
                stack.pop_unchecked();
                value
            }
        };

        let score = if probe > alpha {
            env.control.pv_researches.fetch_add(1, Ordering::Relaxed);
            stack.push(cell);
            let value = -pv_negamax(env, stack, depth - 1, -beta, -alpha);
            stack.pop_unchecked();
            value
        } else {
            probe
        };

        if score > best_value {
            best_value = score;
            best_move = cell as i32;
        }
        if env.control.should_abort() {
            break;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            env.control.cutoffs.fetch_add(1, Ordering::Relaxed);
            split_abort.store(true, Ordering::Relaxed);
            break;
        }
    }

    (best_value, best_move, alpha)
}

/// Negamax along the principal variation. Follows the sequential node
/// contract, but sibling moves after the first are split across the
/// fork-join pool. Non-PV subtrees run the sequential procedure.
fn pv_negamax(
    env: &SplitEnv<'_>,
    stack: &mut SearchStack,
    depth: i32,
    mut alpha: i32,
    mut beta: i32,
) -> i32 {
    let control = env.control;
    if control.should_abort() {
        return stack.evaluate_current(SCORE_WEIGHT);
    }
    control.visited.fetch_add(1, Ordering::Relaxed);

    let key = canonical_key(stack.occupancy(), stack.is_first_turn());
    let original_alpha = alpha;
    let mut tt_hint = -1;
    if let Some(entry) = env.tt.get(key) {
        if entry.depth >= depth {
            control.tt_hits.fetch_add(1, Ordering::Relaxed);
            match entry.flag {
                TTFlag::Exact => return entry.value,
                TTFlag::LowerBound => alpha = alpha.max(entry.value),
                TTFlag::UpperBound => beta = beta.min(entry.value),
            }
            if alpha >= beta {
                return entry.value;
            }
            tt_hint = entry.best_move;
        }
    }

    if depth <= 0 || stack.is_terminal() {
        let evaluation = stack.evaluate_current(SCORE_WEIGHT);
        store_entry(
            env.tt,
            control,
            key,
            TTEntry::new(evaluation, depth, TTFlag::Exact, -1),
        );
        return evaluation;
    }

    let ply = stack.ply();
    let count = stack.generate_moves(tt_hint);
    if count == 0 {
        let evaluation = stack.evaluate_current(SCORE_WEIGHT);
        store_entry(
            env.tt,
            control,
            key,
            TTEntry::new(evaluation, depth, TTFlag::Exact, -1),
        );
        return evaluation;
    }

    // Young brothers wait: the eldest move establishes the bound.
    stack.push_generated(ply, 0);
    let first_score = -pv_negamax(env, stack, depth - 1, -beta, -alpha);
    stack.pop_unchecked();

    let mut best_value = first_score;
    let mut best_move = stack.move_at(ply, 0) as i32;
    if control.should_abort() {
        return best_value;
    }
    if first_score > alpha {
        alpha = first_score;
    }

    if alpha >= beta {
        control.cutoffs.fetch_add(1, Ordering::Relaxed);
    } else if count > 1 {
        let siblings: Vec<u8> = (1..count).map(|index| stack.move_at(ply, index)).collect();
        let (value, mv, _alpha) = split_siblings(
            env, stack, &siblings, depth, alpha, beta, best_value, best_move,
        );
        best_value = value;
        best_move = mv;
    }

    store_entry(
        env.tt,
        control,
        key,
        TTEntry::new(best_value, depth, bound_flag(best_value, original_alpha, beta), best_move),
    );
    best_value
}

/// One parallel root pass at `depth`, mirroring the sequential root with
/// a split across the sibling moves.
fn root_split(
    stack: &mut SearchStack,
    tt: &TranspositionTable,
    control: &SearchControl,
    depth: i32,
) -> (u8, i32) {
    let env = SplitEnv { tt, control };
    let alpha = -INFINITY;
    let beta = INFINITY;
    let root_alpha = alpha;

    let key = canonical_key(stack.occupancy(), stack.is_first_turn());
    let tt_hint = tt.get(key).map_or(-1, |entry| entry.best_move);

    let count = stack.generate_moves(tt_hint);
    debug_assert!(count > 0, "root search of a terminal position");

    stack.push_generated(0, 0);
    let first_score = -pv_negamax(&env, stack, depth - 1, -beta, -alpha);
    stack.pop_unchecked();

    let mut best_value = first_score;
    let mut best_move = stack.move_at(0, 0) as i32;
    let alpha = alpha.max(first_score);

    if !control.should_abort() && count > 1 && alpha < beta {
        let siblings: Vec<u8> = (1..count).map(|index| stack.move_at(0, index)).collect();
        let (value, mv, _alpha) = split_siblings(
            &env, stack, &siblings, depth, alpha, beta, best_value, best_move,
        );
        best_value = value;
        best_move = mv;
    }

    store_entry(
        tt,
        control,
        key,
        TTEntry::new(best_value, depth, bound_flag(best_value, root_alpha, beta), best_move),
    );
    (best_move as u8, best_value)
}

/// Fork-join searcher: a dedicated rayon pool sized to the CPU count by
/// default, shared table, and one stack for the PV path.
pub struct ParallelSearcher {
    pool: rayon::ThreadPool,
    tt: Arc<TranspositionTable>,
    stack: Box<SearchStack>,
}

impl ParallelSearcher {
    /// Pool sized to the available CPUs.
    pub fn new(tt: Arc<TranspositionTable>) -> Result<ParallelSearcher, SearchError> {
        ParallelSearcher::with_threads(tt, 0)
    }

    /// Pool with an explicit worker count; zero means the rayon default
    /// (one per CPU).
    pub fn with_threads(
        tt: Arc<TranspositionTable>,
        threads: usize,
    ) -> Result<ParallelSearcher, SearchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("honeycomb-search-{index}"))
            .build()
            .map_err(|err| {
                SearchError::InvalidState(format!("failed to build search pool: {err}"))
            })?;
        Ok(ParallelSearcher {
            pool,
            tt,
            stack: SearchStack::boxed(),
        })
    }

    pub(crate) fn run(
        &mut self,
        state: &GameState,
        bounded_depth: i32,
        control: &SearchControl,
        trace: bool,
    ) -> SearchResult {
        self.stack.reset(state);
        let stack = &mut self.stack;
        let tt = &self.tt;
        let pool = &self.pool;
        iterative_deepening(state, tt, control, bounded_depth, trace, |depth, control| {
            pool.install(|| root_split(stack, tt, control, depth))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::control::StopHandle;
    use crate::search::negamax::SequentialSearcher;
    use std::time::Instant;

    fn scratch() -> (tempfile::TempDir, Arc<TranspositionTable>) {
        let dir = tempfile::tempdir().unwrap();
        let tt = Arc::new(TranspositionTable::with_path(dir.path().join("t.bin")));
        (dir, tt)
    }

    fn unbounded() -> SearchControl {
        SearchControl::new(StopHandle::new(), None)
    }

    fn endgame_state(filled: u8) -> GameState {
        let mut state = GameState::open();
        for cell in 0..filled {
            state = state.apply_move(cell).unwrap();
        }
        state
    }

    #[test]
    fn test_matches_sequential_on_exhaustive_endgame() {
        // Nine empty cells searched to the bottom: every value is exact,
        // so the parallel result must equal the sequential one.
        let state = endgame_state(46);
        let depth = 9;

        let (_dir_a, tt_seq) = scratch();
        let mut sequential = SequentialSearcher::new(tt_seq);
        let seq_control = unbounded();
        let seq = sequential.run(&state, depth, &seq_control, false);

        let (_dir_b, tt_par) = scratch();
        let mut parallel = ParallelSearcher::with_threads(tt_par, 4).unwrap();
        let par_control = unbounded();
        let par = parallel.run(&state, depth, &par_control, false);

        assert_eq!(seq.best_move, par.best_move);
        assert!(!par.timed_out);
    }

    #[test]
    fn test_expired_deadline_returns_legal_move() {
        let (_dir, tt) = scratch();
        let mut parallel = ParallelSearcher::with_threads(tt, 2).unwrap();
        let control = SearchControl::new(StopHandle::new(), Some(Instant::now()));
        let result = parallel.run(&GameState::open(), 6, &control, false);
        assert!(result.timed_out);
        assert!(result.best_move < 55);
    }

    #[test]
    fn test_stop_request_aborts() {
        let (_dir, tt) = scratch();
        let stop = StopHandle::new();
        stop.request_stop();
        let control = SearchControl::new(stop, None);
        let mut parallel = ParallelSearcher::with_threads(tt, 2).unwrap();
        let result = parallel.run(&endgame_state(40), 10, &control, false);
        assert!(result.timed_out);
        assert!(result.best_move >= 40 && result.best_move < 55);
    }

    #[test]
    fn test_records_task_activity() {
        let (_dir, tt) = scratch();
        let mut parallel = ParallelSearcher::with_threads(tt, 4).unwrap();
        let control = unbounded();
        let result = parallel.run(&endgame_state(44), 8, &control, false);
        assert!(!result.timed_out);
        assert!(result.telemetry.max_active_tasks() >= 1);
    }
}
