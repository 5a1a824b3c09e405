//! Immutable match state: board plus both players' scores.

use rand::Rng;

use crate::board::{Board, Player};
use crate::error::SearchError;
use crate::geometry::{canonical, CORNER_CELLS};
use crate::score::score_delta;

/// Snapshot of a Honeycomb match. Applying a move produces a new state;
/// existing snapshots are never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    score_first: i32,
    score_second: i32,
}

impl GameState {
    /// Initial state with a randomly chosen blocked corner, the default
    /// match setup.
    pub fn new() -> GameState {
        let corner = CORNER_CELLS[rand::thread_rng().gen_range(0..CORNER_CELLS.len())];
        GameState::with_blocked_corner(corner).expect("corner cells are valid blocked cells")
    }

    /// Initial state with the given blocked corner (0, 45 or 54).
    pub fn with_blocked_corner(corner: u8) -> Result<GameState, SearchError> {
        Ok(GameState::from_board(Board::with_blocked_corner(corner)?))
    }

    /// Initial state of the open variant: no blocked cell.
    pub const fn open() -> GameState {
        GameState {
            board: Board::open(),
            score_first: 0,
            score_second: 0,
        }
    }

    const fn from_board(board: Board) -> GameState {
        GameState {
            board,
            score_first: 0,
            score_second: 0,
        }
    }

    /// The current board.
    #[inline]
    pub const fn board(&self) -> Board {
        self.board
    }

    /// Score of `player`.
    #[inline]
    pub const fn score(&self, player: Player) -> i32 {
        match player {
            Player::First => self.score_first,
            Player::Second => self.score_second,
        }
    }

    /// Number of moves played so far.
    #[inline]
    pub const fn move_number(&self) -> u32 {
        self.board.occupancy().count_ones() - self.board.blocked_mask().count_ones()
    }

    /// Whether every cell is occupied.
    #[inline]
    pub const fn is_game_over(&self) -> bool {
        self.board.is_full()
    }

    /// Canonical occupancy of the current board (symmetry-reduced).
    #[inline]
    pub fn canonical_board(&self) -> u64 {
        canonical(self.board.occupancy())
    }

    /// Applies a move for the side to move and returns the resulting
    /// state. Fails with `InvalidState` on a finished game and with
    /// `InvalidMove` on an occupied, blocked or out-of-range cell.
    pub fn apply_move(&self, cell: u8) -> Result<GameState, SearchError> {
        if self.is_game_over() {
            return Err(SearchError::InvalidState(
                "cannot apply a move to a finished game".into(),
            ));
        }
        let mover = self.board.side_to_move();
        let updated = self.board.place(cell)?;
        let delta = score_delta(self.board.occupancy(), updated.occupancy(), cell);

        let (score_first, score_second) = match mover {
            Player::First => (self.score_first + delta, self.score_second),
            Player::Second => (self.score_first, self.score_second + delta),
        };
        Ok(GameState {
            board: updated,
            score_first,
            score_second,
        })
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new()
    }
}
