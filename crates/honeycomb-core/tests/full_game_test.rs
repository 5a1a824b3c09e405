//! Game-model laws: scoring totals, symmetry invariants and the
//! blocked-corner variant.

use honeycomb_core::geometry::{
    apply_symmetry, canonical, line_length, lines_for_cell, BOARD_MASK, CELL_COUNT,
    LINE_COUNT, SYMMETRY_COUNT,
};
use honeycomb_core::{GameState, Player};

#[test]
fn three_lines_per_cell_and_165_total() {
    let mut total_cells = 0;
    for cell in 0..CELL_COUNT as u8 {
        assert_eq!(lines_for_cell(cell).len(), 3);
        total_cells += 3;
    }
    assert_eq!(total_cells, 165);

    let total_length: i32 = (0..LINE_COUNT).map(line_length).sum();
    assert_eq!(total_length, 165);
}

#[test]
fn symmetries_preserve_popcount_and_canonical() {
    let boards = [
        0u64,
        1,
        (1 << 7) | (1 << 23) | (1 << 42),
        BOARD_MASK,
        0x55_5555,
    ];
    for &board in &boards {
        let reference = canonical(board);
        for symmetry in 0..SYMMETRY_COUNT {
            let image = apply_symmetry(board, symmetry).unwrap();
            assert_eq!(image.count_ones(), board.count_ones());
            assert_eq!(canonical(image), reference);
        }
    }
}

#[test]
fn moves_one_three_two_score_two_for_first_player() {
    let mut state = GameState::open();
    for cell in [1u8, 3, 2] {
        state = state.apply_move(cell).unwrap();
    }
    assert_eq!(state.score(Player::First), 2);
    assert_eq!(state.score(Player::Second), 0);
}

#[test]
fn filling_the_board_awards_all_165_points() {
    let mut state = GameState::open();
    for cell in 0..55u8 {
        state = state.apply_move(cell).unwrap();
    }
    assert!(state.is_game_over());
    assert_eq!(state.move_number(), 55);
    assert_eq!(state.score(Player::First) + state.score(Player::Second), 165);
}

#[test]
fn filling_in_reverse_also_totals_165() {
    let mut state = GameState::open();
    for cell in (0..55u8).rev() {
        state = state.apply_move(cell).unwrap();
    }
    assert!(state.is_game_over());
    assert_eq!(state.score(Player::First) + state.score(Player::Second), 165);
}

#[test]
fn blocked_corner_initial_state() {
    let state = GameState::with_blocked_corner(0).unwrap();
    assert_eq!(state.move_number(), 0);
    assert_eq!(state.canonical_board(), 1);

    let next = state.apply_move(1).unwrap();
    assert_ne!(next.canonical_board(), 0);
    assert_eq!(next.score(Player::First), 0);
    assert_eq!(next.score(Player::Second), 0);
}

#[test]
fn blocked_corner_game_plays_54_moves() {
    let mut state = GameState::with_blocked_corner(45).unwrap();
    let mut played = 0;
    for cell in 0..55u8 {
        if state.board().is_blocked(cell) {
            continue;
        }
        state = state.apply_move(cell).unwrap();
        played += 1;
    }
    assert!(state.is_game_over());
    assert_eq!(played, 54);
    assert_eq!(state.move_number(), 54);
    // The blocked corner completes its lines for whoever fills them;
    // total score still counts every line once.
    let total = state.score(Player::First) + state.score(Player::Second);
    assert_eq!(total, 165);
}

#[test]
fn corner_choices_are_symmetric() {
    // The three corners lie in one symmetry orbit, so their initial
    // canonical boards coincide.
    let canonicals: Vec<u64> = [0u8, 45, 54]
        .into_iter()
        .map(|corner| {
            GameState::with_blocked_corner(corner)
                .unwrap()
                .canonical_board()
        })
        .collect();
    assert!(canonicals.windows(2).all(|pair| pair[0] == pair[1]));
}
