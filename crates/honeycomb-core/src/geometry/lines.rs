//! The 30 scoring lines and the cell -> lines lookup table.

use once_cell::sync::Lazy;

use super::{cell_at, BOARD_HEIGHT, CELL_COUNT};

/// Number of scoring lines: 10 horizontal, 10 down-right, 10 down-left.
pub const LINE_COUNT: usize = 30;

/// Each cell lies on exactly this many lines.
const LINES_PER_CELL: usize = 3;

struct LineTables {
    masks: [u64; LINE_COUNT],
    by_cell: [[u8; LINES_PER_CELL]; CELL_COUNT],
}

/// Built once; construction panics if the geometry invariant
/// (every cell on exactly three lines) does not hold, refusing to start.
static TABLES: Lazy<LineTables> = Lazy::new(build_tables);

fn build_tables() -> LineTables {
    let mut masks = [0u64; LINE_COUNT];
    let mut by_cell = [[0u8; LINES_PER_CELL]; CELL_COUNT];
    let mut counts = [0usize; CELL_COUNT];

    let mut line_index = 0usize;
    let mut add_line = |cells: &[u8]| {
        let mut mask = 0u64;
        for &cell in cells {
            mask |= 1 << cell;
            let n = counts[cell as usize];
            assert!(
                n < LINES_PER_CELL,
                "cell {cell} belongs to more than three lines"
            );
            by_cell[cell as usize][n] = line_index as u8;
            counts[cell as usize] = n + 1;
        }
        masks[line_index] = mask;
        line_index += 1;
    };

    // Horizontal rows, lengths 1..=10.
    for row in 0..BOARD_HEIGHT {
        let cells: Vec<u8> = (0..=row).map(|col| cell_at(row, col)).collect();
        add_line(&cells);
    }
    // Down-right diagonals from (row, 0), stepping (+1, +1).
    for row in 0..BOARD_HEIGHT {
        add_line(&collect_line(row, 0, 1));
    }
    // Down-left diagonals from (row, row), stepping (+1, 0).
    for row in 0..BOARD_HEIGHT {
        add_line(&collect_line(row, row, 0));
    }

    assert_eq!(line_index, LINE_COUNT);
    for (cell, &n) in counts.iter().enumerate() {
        assert!(
            n == LINES_PER_CELL,
            "cell {cell} belongs to {n} lines instead of three"
        );
    }

    LineTables { masks, by_cell }
}

fn collect_line(start_row: usize, start_col: usize, col_step: usize) -> Vec<u8> {
    let mut cells = Vec::new();
    let (mut row, mut col) = (start_row, start_col);
    while row < BOARD_HEIGHT && col <= row {
        cells.push(cell_at(row, col));
        row += 1;
        col += col_step;
    }
    cells
}

/// Bit mask of line `index`.
#[inline]
pub fn line_mask(index: usize) -> u64 {
    TABLES.masks[index]
}

/// Length of line `index` (its cell count).
#[inline]
pub fn line_length(index: usize) -> i32 {
    TABLES.masks[index].count_ones() as i32
}

/// The three line indices through `cell`, in construction order.
#[inline]
pub fn lines_for_cell(cell: u8) -> [u8; 3] {
    TABLES.by_cell[cell as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{row_start, BOARD_MASK};

    #[test]
    fn test_every_cell_on_three_lines() {
        let mut total = 0usize;
        for cell in 0..CELL_COUNT as u8 {
            let lines = lines_for_cell(cell);
            for &line in &lines {
                assert!(line_mask(line as usize) & (1 << cell) != 0);
            }
            assert!(lines[0] != lines[1] && lines[1] != lines[2] && lines[0] != lines[2]);
            total += lines.len();
        }
        assert_eq!(total, 3 * CELL_COUNT);
    }

    #[test]
    fn test_line_masks_cover_board_three_times() {
        let mut coverage = [0u32; CELL_COUNT];
        for line in 0..LINE_COUNT {
            let mut mask = line_mask(line);
            while mask != 0 {
                let cell = mask.trailing_zeros() as usize;
                mask &= mask - 1;
                coverage[cell] += 1;
            }
            assert_eq!(line_mask(line) & !BOARD_MASK, 0);
        }
        assert!(coverage.iter().all(|&c| c == 3));
    }

    #[test]
    fn test_horizontal_lines_span_rows() {
        for row in 0..BOARD_HEIGHT {
            let mask = line_mask(row);
            assert_eq!(mask.count_ones() as usize, row + 1);
            assert_eq!(mask.trailing_zeros() as usize, row_start(row));
        }
    }

    #[test]
    fn test_line_lengths() {
        // Horizontals grow 1..=10, both diagonal families shrink 10..=1.
        for row in 0..BOARD_HEIGHT {
            assert_eq!(line_length(row), row as i32 + 1);
            assert_eq!(line_length(10 + row), 10 - row as i32);
            assert_eq!(line_length(20 + row), 10 - row as i32);
        }
    }
}
