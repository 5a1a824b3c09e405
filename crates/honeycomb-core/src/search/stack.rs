//! Pre-allocated, ply-indexed search buffers.
//!
//! One `SearchStack` supports a whole tree walk without per-node
//! allocations: occupancy, side and scores are stored per ply, and each
//! ply owns a contiguous slice for its generated moves and their score
//! deltas.

use crate::board::Player;
use crate::error::SearchError;
use crate::geometry::{BOARD_MASK, CELL_COUNT};
use crate::score::score_delta;
use crate::state::GameState;

/// Maximum search depth: one ply per playable cell.
pub const MAX_PLY: usize = CELL_COUNT;

const SLICE: usize = CELL_COUNT;

/// Evaluation weight of one point of scored material.
pub const SCORE_WEIGHT: i32 = 100;

/// Position snapshot used to seed a detached stack for a forked task.
#[derive(Clone, Copy, Debug)]
pub struct NodeSnapshot {
    pub occupancy: u64,
    pub first_to_move: bool,
    pub first_score: i32,
    pub second_score: i32,
}

/// Mutable search buffers; created once per searcher or pool slot and
/// reused across searches.
pub struct SearchStack {
    occupancy: [u64; MAX_PLY + 1],
    first_to_move: [bool; MAX_PLY + 1],
    first_score: [i32; MAX_PLY + 1],
    second_score: [i32; MAX_PLY + 1],
    move_count: [usize; MAX_PLY + 1],
    moves: [u8; (MAX_PLY + 1) * SLICE],
    deltas: [i32; (MAX_PLY + 1) * SLICE],
    ply: usize,
}

impl SearchStack {
    /// A fresh stack mirroring an empty open board. The buffers are
    /// large; keep the stack boxed.
    pub fn boxed() -> Box<SearchStack> {
        Box::new(SearchStack {
            occupancy: [0; MAX_PLY + 1],
            first_to_move: [true; MAX_PLY + 1],
            first_score: [0; MAX_PLY + 1],
            second_score: [0; MAX_PLY + 1],
            move_count: [0; MAX_PLY + 1],
            moves: [0; (MAX_PLY + 1) * SLICE],
            deltas: [0; (MAX_PLY + 1) * SLICE],
            ply: 0,
        })
    }

    /// Resets ply zero to mirror `state`.
    pub fn reset(&mut self, state: &GameState) {
        let board = state.board();
        self.seed(NodeSnapshot {
            occupancy: board.occupancy(),
            first_to_move: board.side_to_move().is_first(),
            first_score: state.score(Player::First),
            second_score: state.score(Player::Second),
        });
    }

    /// Resets ply zero from a raw snapshot.
    pub fn seed(&mut self, snapshot: NodeSnapshot) {
        self.ply = 0;
        self.occupancy[0] = snapshot.occupancy;
        self.first_to_move[0] = snapshot.first_to_move;
        self.first_score[0] = snapshot.first_score;
        self.second_score[0] = snapshot.second_score;
        self.move_count[0] = 0;
    }

    #[inline]
    pub fn ply(&self) -> usize {
        self.ply
    }

    #[inline]
    pub fn occupancy(&self) -> u64 {
        self.occupancy[self.ply]
    }

    #[inline]
    pub fn is_first_turn(&self) -> bool {
        self.first_to_move[self.ply]
    }

    #[inline]
    pub fn first_score(&self) -> i32 {
        self.first_score[self.ply]
    }

    #[inline]
    pub fn second_score(&self) -> i32 {
        self.second_score[self.ply]
    }

    /// Snapshot of the current ply, for seeding a detached stack.
    #[inline]
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            occupancy: self.occupancy[self.ply],
            first_to_move: self.first_to_move[self.ply],
            first_score: self.first_score[self.ply],
            second_score: self.second_score[self.ply],
        }
    }

    /// Whether every cell is occupied at the current ply.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.occupancy[self.ply] == BOARD_MASK
    }

    /// Enumerates the legal moves of the current ply into its slice and
    /// returns their count.
    ///
    /// A legal `tt_hint` is placed at index 0; every other move follows
    /// in ascending cell order, which is the deterministic tie-break
    /// order the engine guarantees. Pass -1 for no hint.
    pub fn generate_moves(&mut self, tt_hint: i32) -> usize {
        let board = self.occupancy[self.ply];
        let base = self.ply * SLICE;
        let mut count = 0;

        let hint = match tt_hint {
            hint @ 0..=54 if board & (1u64 << hint) == 0 => {
                let cell = hint as u8;
                self.moves[base] = cell;
                self.deltas[base] = score_delta(board, board | (1 << cell), cell);
                count = 1;
                tt_hint
            }
            _ => -1,
        };

        let mut available = !board & BOARD_MASK;
        while available != 0 {
            let cell = available.trailing_zeros() as u8;
            available &= available - 1;
            if cell as i32 == hint {
                continue;
            }
            self.moves[base + count] = cell;
            self.deltas[base + count] = score_delta(board, board | (1 << cell), cell);
            count += 1;
        }
        self.move_count[self.ply] = count;
        count
    }

    #[inline]
    pub fn move_at(&self, ply: usize, index: usize) -> u8 {
        self.moves[ply * SLICE + index]
    }

    #[inline]
    pub fn delta_at(&self, ply: usize, index: usize) -> i32 {
        self.deltas[ply * SLICE + index]
    }

    #[inline]
    pub fn move_count(&self, ply: usize) -> usize {
        self.move_count[ply]
    }

    /// Advances one ply along a previously generated move, reusing its
    /// cached score delta.
    #[inline]
    pub fn push_generated(&mut self, ply: usize, index: usize) {
        let slot = ply * SLICE + index;
        self.advance(self.moves[slot], self.deltas[slot]);
    }

    /// Advances one ply along `cell`, computing the delta on the fly.
    pub fn push(&mut self, cell: u8) {
        let board = self.occupancy[self.ply];
        let delta = score_delta(board, board | (1 << cell), cell);
        self.advance(cell, delta);
    }

    #[inline]
    fn advance(&mut self, cell: u8, delta: i32) {
        debug_assert!(self.ply < MAX_PLY, "push beyond the deepest ply");
        debug_assert!(self.occupancy[self.ply] & (1 << cell) == 0);
        let first_turn = self.first_to_move[self.ply];
        let next_first = self.first_score[self.ply] + if first_turn { delta } else { 0 };
        let next_second = self.second_score[self.ply] + if first_turn { 0 } else { delta };

        self.ply += 1;
        self.occupancy[self.ply] = self.occupancy[self.ply - 1] | (1 << cell);
        self.first_to_move[self.ply] = !first_turn;
        self.first_score[self.ply] = next_first;
        self.second_score[self.ply] = next_second;
        self.move_count[self.ply] = 0;
    }

    /// Retreats one ply. Fails with `InvalidState` at the root.
    pub fn pop(&mut self) -> Result<(), SearchError> {
        if self.ply == 0 {
            return Err(SearchError::InvalidState("cannot pop the root state".into()));
        }
        self.ply -= 1;
        Ok(())
    }

    /// Retreats one ply without the root check; the search core pairs
    /// every push with exactly one pop.
    #[inline]
    pub(crate) fn pop_unchecked(&mut self) {
        debug_assert!(self.ply > 0, "pop at the root");
        self.ply -= 1;
    }

    /// Heuristic value of the current ply from the side to move:
    /// the score difference weighted by `score_weight` plus the best
    /// single-move score delta still available.
    pub fn evaluate_current(&self, score_weight: i32) -> i32 {
        let diff = self.first_score[self.ply] - self.second_score[self.ply];
        let perspective = if self.first_to_move[self.ply] {
            diff
        } else {
            -diff
        };
        perspective * score_weight + self.best_potential()
    }

    fn best_potential(&self) -> i32 {
        let board = self.occupancy[self.ply];
        let mut available = !board & BOARD_MASK;
        let mut best = 0;
        while available != 0 {
            let cell = available.trailing_zeros() as u8;
            available &= available - 1;
            let delta = score_delta(board, board | (1 << cell), cell);
            if delta > best {
                best = delta;
            }
        }
        best
    }
}
