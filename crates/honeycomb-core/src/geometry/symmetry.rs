//! The six symmetries of the triangular board.
//!
//! Each symmetry is a permutation of the 55 cell indices, derived from
//! cube coordinates (x = 9 - row, y = col, z = row - col) under the axis
//! permutations of the dihedral group of the equilateral triangle.

use once_cell::sync::Lazy;

use super::{cell_at, col_of, row_of, CELL_COUNT};
use crate::error::SearchError;

/// Size of the symmetry group.
pub const SYMMETRY_COUNT: usize = 6;

/// Axis permutations: identity, the two rotations, the three reflections.
const AXIS_PERMUTATIONS: [[usize; 3]; SYMMETRY_COUNT] = [
    [0, 1, 2],
    [1, 2, 0],
    [2, 0, 1],
    [0, 2, 1],
    [2, 1, 0],
    [1, 0, 2],
];

static PERMUTATIONS: Lazy<[[u8; CELL_COUNT]; SYMMETRY_COUNT]> = Lazy::new(|| {
    let max_coordinate = 9i32;
    let mut permutations = [[0u8; CELL_COUNT]; SYMMETRY_COUNT];

    for cell in 0..CELL_COUNT as u8 {
        let row = row_of(cell) as i32;
        let col = col_of(cell) as i32;
        let coords = [max_coordinate - row, col, row - col];

        for (s, axes) in AXIS_PERMUTATIONS.iter().enumerate() {
            let ny = coords[axes[1]];
            let nz = coords[axes[2]];
            let new_row = (ny + nz) as usize;
            let new_col = ny as usize;
            permutations[s][cell as usize] = cell_at(new_row, new_col);
        }
    }
    permutations
});

#[inline]
fn apply_unchecked(board: u64, symmetry: usize) -> u64 {
    let permutation = &PERMUTATIONS[symmetry];
    let mut result = 0u64;
    let mut remaining = board;
    while remaining != 0 {
        let bit = remaining.trailing_zeros() as usize;
        remaining &= remaining - 1;
        result |= 1 << permutation[bit];
    }
    result
}

/// Applies symmetry `symmetry` to the occupancy `board`.
///
/// Fails with `InvalidArgument` when the symmetry index is out of range.
pub fn apply_symmetry(board: u64, symmetry: usize) -> Result<u64, SearchError> {
    if symmetry >= SYMMETRY_COUNT {
        return Err(SearchError::InvalidArgument(format!(
            "symmetry index out of range: {symmetry}"
        )));
    }
    Ok(apply_unchecked(board, symmetry))
}

/// The canonical representative of `board`: the minimum of its six
/// symmetry images, compared as unsigned 64-bit values.
#[inline]
pub fn canonical(board: u64) -> u64 {
    let mut min = u64::MAX;
    for symmetry in 0..SYMMETRY_COUNT {
        let image = apply_unchecked(board, symmetry);
        if image < min {
            min = image;
        }
    }
    min
}

/// Transposition key: canonical occupancy shifted left one bit, the low
/// bit carrying the side to move.
#[inline]
pub fn canonical_key(board: u64, first_to_move: bool) -> u64 {
    (canonical(board) << 1) | first_to_move as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BOARD_MASK;

    #[test]
    fn test_permutations_are_bijections() {
        for s in 0..SYMMETRY_COUNT {
            let mut seen = [false; CELL_COUNT];
            for cell in 0..CELL_COUNT as u8 {
                let image = PERMUTATIONS[s][cell as usize] as usize;
                assert!(image < CELL_COUNT);
                assert!(!seen[image], "symmetry {s} maps two cells to {image}");
                seen[image] = true;
            }
        }
    }

    #[test]
    fn test_identity_symmetry() {
        for board in [0u64, 1, 0b1011, BOARD_MASK, 1 << 54] {
            assert_eq!(apply_symmetry(board, 0).unwrap(), board);
        }
    }

    #[test]
    fn test_apply_preserves_popcount() {
        let boards = [0u64, 1, (1 << 17) | (1 << 42), BOARD_MASK, 0x1F_0F3];
        for &board in &boards {
            for s in 0..SYMMETRY_COUNT {
                let image = apply_symmetry(board, s).unwrap();
                assert_eq!(image.count_ones(), board.count_ones());
                assert_eq!(image & !BOARD_MASK, 0);
            }
        }
    }

    #[test]
    fn test_canonical_invariant_under_symmetry() {
        let boards = [1u64, (1 << 5) | (1 << 23), 0xABC_DEF, BOARD_MASK >> 3];
        for &board in &boards {
            let expected = canonical(board);
            for s in 0..SYMMETRY_COUNT {
                let image = apply_symmetry(board, s).unwrap();
                assert_eq!(canonical(image), expected);
            }
        }
    }

    #[test]
    fn test_corner_cell_canonicalizes_to_origin() {
        // The three corners form one orbit; its minimum image is bit 0.
        for corner in crate::geometry::CORNER_CELLS {
            assert_eq!(canonical(1 << corner), 1);
        }
    }

    #[test]
    fn test_out_of_range_symmetry_rejected() {
        assert!(apply_symmetry(0, SYMMETRY_COUNT).is_err());
    }

    #[test]
    fn test_canonical_key_encodes_side() {
        let board = (1 << 3) | (1 << 30);
        assert_eq!(canonical_key(board, true), (canonical(board) << 1) | 1);
        assert_eq!(canonical_key(board, false), canonical(board) << 1);
    }
}
