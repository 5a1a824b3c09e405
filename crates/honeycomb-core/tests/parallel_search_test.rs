//! Parallel/sequential equivalence and cancellation behavior.

use std::sync::Arc;
use std::time::Duration;

use honeycomb_core::{
    GameState, SearchConstraints, SearchMode, Searcher, TranspositionTable,
};

fn scratch_table() -> (tempfile::TempDir, Arc<TranspositionTable>) {
    let dir = tempfile::tempdir().unwrap();
    let table = Arc::new(TranspositionTable::with_path(dir.path().join("table.bin")));
    (dir, table)
}

fn filled_state(cells: impl IntoIterator<Item = u8>) -> GameState {
    let mut state = GameState::open();
    for cell in cells {
        state = state.apply_move(cell).unwrap();
    }
    state
}

/// Searches the same position to full remaining depth with a fresh table
/// in each mode and expects identical moves.
fn assert_modes_agree(state: &GameState, depth: i32) {
    let (_dir_seq, table_seq) = scratch_table();
    let mut seq_searcher = Searcher::new(table_seq).unwrap();
    let seq = seq_searcher
        .search(state, &SearchConstraints::depth(depth).unwrap())
        .unwrap();

    let (_dir_par, table_par) = scratch_table();
    let mut par_searcher = Searcher::builder().table(table_par).threads(4).build().unwrap();
    let par = par_searcher
        .search(
            state,
            &SearchConstraints::depth(depth)
                .unwrap()
                .with_mode(SearchMode::Par),
        )
        .unwrap();

    assert!(!seq.timed_out && !par.timed_out);
    assert_eq!(seq.best_move, par.best_move, "modes disagree at depth {depth}");
}

#[test]
fn exhaustive_endgames_match_sequential() {
    // Searched to the bottom, every value is exact and ordering ties
    // break identically, so the chosen move must match.
    assert_modes_agree(&filled_state(0..46), 9);
    assert_modes_agree(&filled_state(0..48), 7);
    assert_modes_agree(&filled_state((0..46).map(|c| 54 - c)), 9);
}

#[test]
fn blocked_corner_endgame_matches_sequential() {
    let mut state = GameState::with_blocked_corner(0).unwrap();
    for cell in 1..47u8 {
        state = state.apply_move(cell).unwrap();
    }
    assert_modes_agree(&state, 8);
}

#[test]
fn parallel_timeout_returns_legal_move() {
    let (_dir, table) = scratch_table();
    let mut searcher = Searcher::new(table).unwrap();
    let constraints = SearchConstraints::depth(10)
        .unwrap()
        .with_time_limit(Duration::from_nanos(1))
        .with_mode(SearchMode::Par);
    let result = searcher.search(&GameState::open(), &constraints).unwrap();
    assert!(result.timed_out);
    assert!(GameState::open().apply_move(result.best_move).is_ok());
}

#[test]
fn parallel_records_task_telemetry() {
    let (_dir, table) = scratch_table();
    let mut searcher = Searcher::builder().table(table).threads(4).build().unwrap();
    let state = filled_state(0..44);
    let constraints = SearchConstraints::depth(8)
        .unwrap()
        .with_mode(SearchMode::Par);
    let result = searcher.search(&state, &constraints).unwrap();
    assert!(!result.timed_out);
    assert!(result.telemetry.max_active_tasks() >= 1);
}

#[test]
fn request_stop_interrupts_parallel_search() {
    let (_dir, table) = scratch_table();
    let mut searcher = Searcher::builder().table(table).threads(2).build().unwrap();
    // Deep search over a wide position would take far longer than the
    // test budget; stop it from another thread shortly after it starts.
    let state = GameState::open();
    let constraints = SearchConstraints::depth(12)
        .unwrap()
        .with_mode(SearchMode::Par);

    let stop = searcher.stop_handle();
    std::thread::scope(|scope| {
        scope.spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.request_stop();
        });
        let result = searcher.search(&state, &constraints).unwrap();
        assert!(result.timed_out);
        assert!(state.apply_move(result.best_move).is_ok());
    });
}
