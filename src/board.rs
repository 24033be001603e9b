//! Board dimensions and the occupancy grid used for collision detection

use crate::tetromino::TetrominoType;
use serde::{Deserialize, Serialize};

/// Standard board dimensions
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;
/// Hidden rows above the visible board (rows -BUFFER_HEIGHT..0)
pub const BUFFER_HEIGHT: usize = 20;
pub const TOTAL_HEIGHT: usize = BOARD_HEIGHT + BUFFER_HEIGHT;

/// One occupied cell, as exchanged with the opponent's mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub col: i32,
    pub row: i32,
    #[serde(rename = "type")]
    pub kind: TetrominoType,
}

/// Whether (col, row) lies on the board, buffer zone included
pub fn in_bounds(col: i32, row: i32) -> bool {
    (0..BOARD_WIDTH as i32).contains(&col) && (-(BUFFER_HEIGHT as i32)..BOARD_HEIGHT as i32).contains(&row)
}

/// Occupancy of settled cells, one bitset row per board row.
/// Row 0 is the top visible row, rows grow downward, negative rows are the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: [u16; TOTAL_HEIGHT],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Create a new empty grid
    pub fn new() -> Self {
        Self {
            rows: [0; TOTAL_HEIGHT],
        }
    }

    /// Build a grid from settled cell positions
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut grid = Self::new();
        for (col, row) in cells {
            let fresh = grid.set(col, row);
            debug_assert!(fresh || !in_bounds(col, row), "two settled cells at ({col}, {row})");
        }
        grid
    }

    fn index(row: i32) -> usize {
        (row + BUFFER_HEIGHT as i32) as usize
    }

    /// Mark a cell occupied. Returns false if it was already occupied
    /// or lies off the board.
    pub fn set(&mut self, col: i32, row: i32) -> bool {
        if !in_bounds(col, row) {
            return false;
        }
        let bits = &mut self.rows[Self::index(row)];
        let mask = 1u16 << col;
        let fresh = *bits & mask == 0;
        *bits |= mask;
        fresh
    }

    /// Whether a cell holds a settled block. Off-board cells are not blocks.
    pub fn is_occupied(&self, col: i32, row: i32) -> bool {
        in_bounds(col, row) && self.rows[Self::index(row)] & (1 << col) != 0
    }

    /// Check if a position is valid (within bounds and empty)
    pub fn is_valid_position(&self, col: i32, row: i32) -> bool {
        in_bounds(col, row) && !self.is_occupied(col, row)
    }

    /// Check if a set of block positions are all valid
    pub fn are_positions_valid(&self, positions: &[(i32, i32)]) -> bool {
        positions
            .iter()
            .all(|&(col, row)| self.is_valid_position(col, row))
    }

    /// Number of settled cells in a row
    pub fn row_count(&self, row: i32) -> usize {
        if !(-(BUFFER_HEIGHT as i32)..BOARD_HEIGHT as i32).contains(&row) {
            return 0;
        }
        self.rows[Self::index(row)].count_ones() as usize
    }

    /// Check if a line is completely filled
    pub fn is_row_full(&self, row: i32) -> bool {
        self.row_count(row) == BOARD_WIDTH
    }

    /// Check if the board is completely empty (for perfect-clear detection)
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|&bits| bits == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_empty() {
        let grid = Grid::new();
        assert!(grid.is_empty());
        assert!(grid.is_valid_position(0, 0));
    }

    #[test]
    fn test_set_and_query() {
        let mut grid = Grid::new();
        assert!(grid.set(5, 5));
        assert!(!grid.set(5, 5));
        assert!(grid.is_occupied(5, 5));
        assert!(!grid.is_valid_position(5, 5));
        assert_eq!(grid.row_count(5), 1);
    }

    #[test]
    fn test_bounds_include_buffer() {
        let grid = Grid::new();
        assert!(grid.is_valid_position(0, -20));
        assert!(!grid.is_valid_position(0, -21));
        assert!(!grid.is_valid_position(0, BOARD_HEIGHT as i32));
        assert!(!grid.is_valid_position(-1, 0));
        assert!(!grid.is_valid_position(BOARD_WIDTH as i32, 0));
    }

    #[test]
    fn test_full_row() {
        let grid = Grid::from_cells((0..BOARD_WIDTH as i32).map(|col| (col, 19)));
        assert!(grid.is_row_full(19));
        assert!(!grid.is_row_full(18));
    }

    #[test]
    fn test_cell_record_wire_shape() {
        let record = CellRecord {
            col: 1,
            row: -2,
            kind: TetrominoType::Garbage,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"col":1,"row":-2,"type":"GARBAGE"}"#);
    }
}
