//! Sequential negamax with alpha-beta pruning, transposition probing,
//! late-move reductions and iterative deepening.

use std::sync::atomic::Ordering;
use std::time::Instant;

use log::debug;

use crate::geometry::{canonical_key, BOARD_MASK};
use crate::search::control::SearchControl;
use crate::search::stack::{NodeSnapshot, SearchStack, SCORE_WEIGHT};
use crate::search::telemetry::{IterationTelemetry, PvLine, SearchResult, SearchTelemetry};
use crate::state::GameState;
use crate::tt::{TTEntry, TTFlag, TranspositionTable};

/// Alpha-beta window bound; half range keeps negation overflow-free.
pub(crate) const INFINITY: i32 = i32::MAX / 2;

/// Classifies a fail-soft result against the original window.
#[inline]
pub(crate) fn bound_flag(best_value: i32, original_alpha: i32, beta: i32) -> TTFlag {
    if best_value <= original_alpha {
        TTFlag::UpperBound
    } else if best_value >= beta {
        TTFlag::LowerBound
    } else {
        TTFlag::Exact
    }
}

/// Stores a node result unless the search already aborted.
#[inline]
pub(crate) fn store_entry(
    tt: &TranspositionTable,
    control: &SearchControl,
    key: u64,
    entry: TTEntry,
) {
    if !control.was_aborted() {
        tt.put(key, entry);
        control.tt_stores.fetch_add(1, Ordering::Relaxed);
    }
}

/// Negamax node procedure over the mutable search stack.
///
/// Fail-soft: the return value may lie outside the (alpha, beta) window.
/// Aborts return the static evaluation of whatever ply the walk reached;
/// the caller discards tainted values through the abort latch.
pub(crate) fn negamax(
    stack: &mut SearchStack,
    tt: &TranspositionTable,
    control: &SearchControl,
    depth: i32,
    mut alpha: i32,
    mut beta: i32,
) -> i32 {
    if control.should_abort() {
        return stack.evaluate_current(SCORE_WEIGHT);
    }
    control.visited.fetch_add(1, Ordering::Relaxed);

    let key = canonical_key(stack.occupancy(), stack.is_first_turn());
    let original_alpha = alpha;
    let mut tt_hint = -1;
    if let Some(entry) = tt.get(key) {
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
            tt,
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
            tt,
            control,
            key,
            TTEntry::new(evaluation, depth, TTFlag::Exact, -1),
        );
        return evaluation;
    }

    let is_pv_node = beta - alpha > 1;
    let mut best_value = i32::MIN;
    let mut best_move = -1;

    for index in 0..count {
        // Late-move reduction: quiet late moves at scout nodes drop one
        // ply, with a re-search on improvement.
        let reduce =
            !is_pv_node && depth > 2 && index > 0 && stack.delta_at(ply, index) == 0;

        stack.push_generated(ply, index);
        let score = if reduce {
            let scout = -negamax(stack, tt, control, depth - 2, -alpha - 1, -alpha);
            if scout > alpha {
                control.pv_researches.fetch_add(1, Ordering::Relaxed);
                -negamax(stack, tt, control, depth - 1, -beta, -alpha)
            } else {
                scout
            }
        } else {
            -negamax(stack, tt, control, depth - 1, -beta, -alpha)
        };
        stack.pop_unchecked();

        if score > best_value {
            best_value = score;
            best_move = stack.move_at(ply, index) as i32;
        }
        if control.should_abort() {
            return best_value;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            control.cutoffs.fetch_add(1, Ordering::Relaxed);
            break;
        }
    }

    store_entry(
        tt,
        control,
        key,
        TTEntry::new(best_value, depth, bound_flag(best_value, original_alpha, beta), best_move),
    );
    best_value
}

/// One full-window root pass at `depth`. The first move is always
/// evaluated before any abort check, so a legal best move exists even
/// under an expired deadline.
pub(crate) fn root_iteration(
    stack: &mut SearchStack,
    tt: &TranspositionTable,
    control: &SearchControl,
    depth: i32,
) -> (u8, i32) {
    let mut alpha = -INFINITY;
    let beta = INFINITY;
    let root_alpha = alpha;

    let key = canonical_key(stack.occupancy(), stack.is_first_turn());
    // Ordering hint only; root bounds are never narrowed by the table.
    let tt_hint = tt.get(key).map_or(-1, |entry| entry.best_move);

    let count = stack.generate_moves(tt_hint);
    debug_assert!(count > 0, "root search of a terminal position");

    let mut best_move = stack.move_at(0, 0);
    let mut best_value = i32::MIN;

    for index in 0..count {
        stack.push_generated(0, index);
        let score = -negamax(stack, tt, control, depth - 1, -beta, -alpha);
        stack.pop_unchecked();

        if score > best_value {
            best_value = score;
            best_move = stack.move_at(0, index);
        }
        if control.should_abort() {
            break;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            control.cutoffs.fetch_add(1, Ordering::Relaxed);
            break;
        }
    }

    store_entry(
        tt,
        control,
        key,
        TTEntry::new(
            best_value,
            depth,
            bound_flag(best_value, root_alpha, beta),
            best_move as i32,
        ),
    );
    (best_move, best_value)
}

/// Best-effort principal variation: follows the transposition table's
/// best-move chain from `root` for at most `max_len` plies.
pub(crate) fn extract_pv(
    tt: &TranspositionTable,
    root: NodeSnapshot,
    max_len: usize,
) -> PvLine {
    let mut pv = PvLine::new();
    let mut occupancy = root.occupancy;
    let mut first_to_move = root.first_to_move;
    while pv.len() < max_len && occupancy != BOARD_MASK {
        let key = canonical_key(occupancy, first_to_move);
        let Some(cell) = tt.get(key).and_then(|entry| entry.best_move_cell()) else {
            break;
        };
        if occupancy & (1 << cell) != 0 {
            // Stale entry pointing at an occupied cell; stop here.
            break;
        }
        pv.push(cell);
        occupancy |= 1 << cell;
        first_to_move = !first_to_move;
    }
    pv
}

/// Iterative-deepening driver shared by the sequential and parallel
/// backends. `run_root` performs one full root pass at the given depth.
pub(crate) fn iterative_deepening<F>(
    state: &GameState,
    tt: &TranspositionTable,
    control: &SearchControl,
    bounded_depth: i32,
    trace: bool,
    mut run_root: F,
) -> SearchResult
where
    F: FnMut(i32, &SearchControl) -> (u8, i32),
{
    let root = NodeSnapshot {
        occupancy: state.board().occupancy(),
        first_to_move: state.board().side_to_move().is_first(),
        first_score: state.score(crate::board::Player::First),
        second_score: state.score(crate::board::Player::Second),
    };

    let mut telemetry = SearchTelemetry::default();
    let mut best: Option<(u8, i32)> = None;
    let mut completed_depth = 0;

    for depth in 1..=bounded_depth {
        if control.should_abort() {
            break;
        }
        let started = Instant::now();
        let before = control.counters();
        let (candidate_move, candidate_score) = run_root(depth, control);

        if control.was_aborted() {
            // A timed-out iteration only counts when nothing completed.
            if best.is_none() {
                best = Some((candidate_move, candidate_score));
            }
            break;
        }

        best = Some((candidate_move, candidate_score));
        completed_depth = depth;
        let delta = control.counters().since(&before);
        let iteration = IterationTelemetry {
            depth,
            nodes: delta.visited,
            cutoffs: delta.cutoffs,
            tt_hits: delta.tt_hits,
            tt_stores: delta.tt_stores,
            pv_researches: delta.pv_researches,
            max_active_tasks: control.max_active_tasks(),
            elapsed: started.elapsed(),
            principal_variation: extract_pv(tt, root, depth as usize),
        };
        if trace {
            debug!(
                "depth {depth}: move {candidate_move} score {candidate_score} nodes {} cutoffs {} tt_hits {} researches {} pv {:?}",
                iteration.nodes,
                iteration.cutoffs,
                iteration.tt_hits,
                iteration.pv_researches,
                iteration.principal_variation
            );
        }
        telemetry.push_iteration(iteration);
    }

    let best_move = best.map(|(cell, _)| cell).unwrap_or_else(|| {
        // The deadline expired before the first iteration started; any
        // empty cell is a legal answer.
        (!root.occupancy & BOARD_MASK).trailing_zeros() as u8
    });

    SearchResult {
        best_move,
        depth_evaluated: completed_depth,
        visited_nodes: control.visited.load(Ordering::Relaxed),
        timed_out: control.was_aborted(),
        telemetry,
    }
}

/// Single-threaded searcher: one reusable stack, shared table.
pub struct SequentialSearcher {
    stack: Box<SearchStack>,
    tt: std::sync::Arc<TranspositionTable>,
}

impl SequentialSearcher {
    pub fn new(tt: std::sync::Arc<TranspositionTable>) -> SequentialSearcher {
        SequentialSearcher {
            stack: SearchStack::boxed(),
            tt,
        }
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
        iterative_deepening(state, tt, control, bounded_depth, trace, |depth, control| {
            root_iteration(stack, tt, control, depth)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::control::StopHandle;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn scratch() -> (tempfile::TempDir, Arc<TranspositionTable>) {
        let dir = tempfile::tempdir().unwrap();
        let tt = Arc::new(TranspositionTable::with_path(dir.path().join("t.bin")));
        (dir, tt)
    }

    fn unbounded_control() -> SearchControl {
        SearchControl::new(StopHandle::new(), None)
    }

    #[test]
    fn test_depth_two_prefers_the_free_point() {
        let (_dir, tt) = scratch();
        let mut searcher = SequentialSearcher::new(tt);
        let control = unbounded_control();
        let result = searcher.run(&GameState::open(), 2, &control, false);
        assert_eq!(result.best_move, 0);
        assert!(!result.timed_out);
        assert_eq!(result.depth_evaluated, 2);
        assert_eq!(result.telemetry.iterations().len(), 2);
    }

    #[test]
    fn test_expired_deadline_still_yields_legal_move() {
        let (_dir, tt) = scratch();
        let mut searcher = SequentialSearcher::new(tt);
        let control = SearchControl::new(StopHandle::new(), Some(Instant::now()));
        let result = searcher.run(&GameState::open(), 8, &control, false);
        assert!(result.timed_out);
        assert!(result.best_move < 55);
        assert_eq!(result.depth_evaluated, 0);
    }

    #[test]
    fn test_repeat_search_visits_no_more_nodes() {
        let (_dir, tt) = scratch();
        let mut searcher = SequentialSearcher::new(tt.clone());
        let state = GameState::open();

        let control = unbounded_control();
        let first = searcher.run(&state, 4, &control, false);
        let control = unbounded_control();
        let second = searcher.run(&state, 4, &control, false);
        assert_eq!(first.best_move, second.best_move);
        assert!(second.visited_nodes <= first.visited_nodes);
    }

    #[test]
    fn test_pv_starts_with_best_move() {
        let (_dir, tt) = scratch();
        let mut searcher = SequentialSearcher::new(tt);
        let control = unbounded_control();
        let result = searcher.run(&GameState::open(), 3, &control, false);
        let pv = &result.telemetry.latest().unwrap().principal_variation;
        assert!(!pv.is_empty());
        assert_eq!(pv[0], result.best_move);
    }

    #[test]
    fn test_deadline_mid_search_keeps_completed_iteration() {
        let (_dir, tt) = scratch();
        let mut searcher = SequentialSearcher::new(tt);
        let control = SearchControl::new(
            StopHandle::new(),
            Some(Instant::now() + Duration::from_millis(30)),
        );
        let result = searcher.run(&GameState::open(), 40, &control, false);
        assert!(result.timed_out);
        assert!(result.best_move < 55);
        assert_eq!(
            result.depth_evaluated as usize,
            result.telemetry.iterations().len()
        );
    }

    #[test]
    fn test_exhaustive_endgame_plays_scoring_cell() {
        // Cells 0..52 filled; 53 and 54 remain. Taking 54 first scores
        // nothing, but both orders complete lines; the engine must pick
        // the move maximizing its margin.
        let (_dir, tt) = scratch();
        let mut state = GameState::open();
        for cell in 0..53u8 {
            state = state.apply_move(cell).unwrap();
        }
        let mut searcher = SequentialSearcher::new(tt);
        let control = unbounded_control();
        let result = searcher.run(&state, 2, &control, false);
        assert!(result.best_move == 53 || result.best_move == 54);
        assert!(!result.timed_out);
    }
}
