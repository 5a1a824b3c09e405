//! Bitboard representation of the Honeycomb playing field.

use crate::error::SearchError;
use crate::geometry::{is_valid_cell, BOARD_MASK, CELL_COUNT, CORNER_CELLS};

/// The two players. The first player moves on move number 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    First,
    Second,
}

impl Player {
    /// The other player.
    #[inline]
    pub const fn opponent(self) -> Player {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }

    /// Whether this is the first player.
    #[inline]
    pub const fn is_first(self) -> bool {
        matches!(self, Player::First)
    }
}

/// Immutable board snapshot: occupancy bits, blocked-cell mask and the
/// side to move. Blocked bits are part of the occupancy from creation,
/// so a full board is simply `occupancy == BOARD_MASK`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Board {
    occupancy: u64,
    blocked: u64,
    side_to_move: Player,
}

impl Board {
    /// An open board: no blocked cell, all 55 cells playable.
    pub const fn open() -> Board {
        Board {
            occupancy: 0,
            blocked: 0,
            side_to_move: Player::First,
        }
    }

    /// A board with one neutral blocked corner.
    ///
    /// Fails with `InvalidArgument` unless `corner` is one of {0, 45, 54}.
    pub fn with_blocked_corner(corner: u8) -> Result<Board, SearchError> {
        if !CORNER_CELLS.contains(&corner) {
            return Err(SearchError::InvalidArgument(format!(
                "blocked cell must be a corner (0, 45 or 54), got {corner}"
            )));
        }
        let mask = 1u64 << corner;
        Ok(Board {
            occupancy: mask,
            blocked: mask,
            side_to_move: Player::First,
        })
    }

    /// Raw occupancy bits (blocked bits included).
    #[inline]
    pub const fn occupancy(&self) -> u64 {
        self.occupancy
    }

    /// Mask of blocked cells (empty for the open variant).
    #[inline]
    pub const fn blocked_mask(&self) -> u64 {
        self.blocked
    }

    /// The player who places the next stone.
    #[inline]
    pub const fn side_to_move(&self) -> Player {
        self.side_to_move
    }

    /// Whether the cell is unoccupied.
    #[inline]
    pub fn is_empty(&self, cell: u8) -> bool {
        debug_assert!(is_valid_cell(cell));
        self.occupancy & (1 << cell) == 0
    }

    /// Whether the cell is a blocked (neutral) cell.
    #[inline]
    pub fn is_blocked(&self, cell: u8) -> bool {
        debug_assert!(is_valid_cell(cell));
        self.blocked & (1 << cell) != 0
    }

    /// Number of occupied cells, blocked bits included.
    #[inline]
    pub const fn count_occupied(&self) -> u32 {
        self.occupancy.count_ones()
    }

    /// Number of cells still playable.
    #[inline]
    pub const fn playable_remaining(&self) -> u32 {
        CELL_COUNT as u32 - self.occupancy.count_ones()
    }

    /// Whether every cell is occupied.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.occupancy == BOARD_MASK
    }

    /// Returns a new board with a stone placed on `cell` and the side to
    /// move flipped. Fails with `InvalidMove` when the cell is out of
    /// range, occupied or blocked.
    pub fn place(&self, cell: u8) -> Result<Board, SearchError> {
        if !is_valid_cell(cell) || !self.is_empty(cell) {
            return Err(SearchError::InvalidMove { cell });
        }
        Ok(Board {
            occupancy: self.occupancy | (1 << cell),
            blocked: self.blocked,
            side_to_move: self.side_to_move.opponent(),
        })
    }
}
