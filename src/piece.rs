//! Falling and settled piece logic

use crate::board::{BOARD_HEIGHT, Grid};
use crate::srs::get_wall_kicks;
use crate::tetromino::{Rotation, RotationDirection, TetrominoType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extended placement: lock-delay resets allowed while grounded
pub const MAX_MANIPULATIONS: u32 = 15;

/// T-Spin corner template inside the 3x3 box, clockwise from top-left
const T_SPIN_CORNERS: [(i32, i32); 4] = [(0, 0), (2, 0), (2, 2), (0, 2)];

/// What caused a piece's last successful movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Movement {
    #[default]
    Spawn,
    Left,
    Right,
    SoftDrop,
    HardDrop,
    AutoDrop,
    Rotate,
}

impl Movement {
    pub fn name(&self) -> &'static str {
        match self {
            Movement::Spawn => "spawn",
            Movement::Left => "left",
            Movement::Right => "right",
            Movement::SoftDrop => "softDrop",
            Movement::HardDrop => "hardDrop",
            Movement::AutoDrop => "autoDrop",
            Movement::Rotate => "rotate",
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows travelled per drop kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropCounter {
    pub soft_drop: u32,
    pub hard_drop: u32,
    pub auto_drop: u32,
}

/// Occupied T-Spin corners, split by the side the T points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerCount {
    pub point_side: u32,
    pub flat_side: u32,
}

/// One piece on the board, active or settled
#[derive(Debug, Clone)]
pub struct Piece {
    /// The type of tetromino
    pub piece_type: TetrominoType,
    /// Current rotation state
    pub rotation: Rotation,
    /// Anchor (top-left of the bounding box). Negative rows are the buffer zone.
    pub col: i32,
    pub row: i32,
    /// Last successful movement (T-Spins need a rotation here)
    pub last_movement: Movement,
    /// Index of the kick offset used by the last rotation, 0 = no kick
    pub last_kick: usize,
    /// Lateral and rotational moves since the piece last reached a new lowest row
    pub manipulation_count: u32,
    /// Rows travelled per drop kind
    pub drop_counter: DropCounter,
    /// Lowest anchor row reached so far
    lowest_row: i32,
    /// Absolute cells, frozen once settled
    cells: Option<Vec<(i32, i32)>>,
}

impl Piece {
    /// Create an active piece at an anchor without checking the board
    pub fn new(piece_type: TetrominoType, col: i32, row: i32) -> Self {
        Self {
            piece_type,
            rotation: Rotation::North,
            col,
            row,
            last_movement: Movement::Spawn,
            last_kick: 0,
            manipulation_count: 0,
            drop_counter: DropCounter::default(),
            lowest_row: row,
            cells: None,
        }
    }

    /// Create a piece at its spawn anchor, `None` if the spawn position is blocked
    pub fn spawn(piece_type: TetrominoType, grid: &Grid) -> Option<Self> {
        let (col, row) = piece_type.spawn_position();
        let piece = Self::new(piece_type, col, row);
        piece
            .fits(piece.rotation, col, row, grid)
            .then_some(piece)
    }

    /// Create an already settled piece from explicit cells (garbage, mirrors)
    pub fn settled(piece_type: TetrominoType, cells: Vec<(i32, i32)>) -> Self {
        let mut piece = Self::new(piece_type, 0, 0);
        piece.cells = Some(cells);
        piece
    }

    pub fn is_settled(&self) -> bool {
        self.cells.is_some()
    }

    /// Freeze the current absolute cells
    pub fn settle(&mut self) {
        if self.cells.is_none() {
            self.cells = Some(self.blocks());
        }
    }

    /// Get the absolute (col, row) positions of the piece's blocks
    pub fn blocks(&self) -> Vec<(i32, i32)> {
        match &self.cells {
            Some(cells) => cells.clone(),
            None => self.blocks_at(self.rotation, self.col, self.row),
        }
    }

    fn blocks_at(&self, rotation: Rotation, col: i32, row: i32) -> Vec<(i32, i32)> {
        self.piece_type
            .shape(rotation)
            .iter()
            .map(|&(dc, dr)| (col + dc, row + dr))
            .collect()
    }

    fn fits(&self, rotation: Rotation, col: i32, row: i32, grid: &Grid) -> bool {
        grid.are_positions_valid(&self.blocks_at(rotation, col, row))
    }

    /// Move the anchor to (col, row). Fails without side effects when any
    /// resulting cell is off the board or blocked.
    pub fn move_to(&mut self, col: i32, row: i32, movement: Movement, grid: &Grid) -> bool {
        if self.is_settled() || !self.fits(self.rotation, col, row, grid) {
            return false;
        }
        let rows_down = (row - self.row).max(0) as u32;
        self.col = col;
        self.row = row;
        self.record(movement, rows_down);
        true
    }

    fn record(&mut self, movement: Movement, rows_down: u32) {
        match movement {
            Movement::SoftDrop => self.drop_counter.soft_drop += rows_down,
            Movement::HardDrop => self.drop_counter.hard_drop += rows_down,
            Movement::AutoDrop => self.drop_counter.auto_drop += rows_down,
            Movement::Left | Movement::Right | Movement::Rotate => self.manipulation_count += 1,
            Movement::Spawn => {}
        }
        // Genuine downward progress forgives earlier resets
        if self.row > self.lowest_row {
            self.lowest_row = self.row;
            self.manipulation_count = 0;
        }
        self.last_movement = movement;
    }

    /// Try to move left, returns true if successful
    pub fn move_left(&mut self, grid: &Grid) -> bool {
        self.move_to(self.col - 1, self.row, Movement::Left, grid)
    }

    /// Try to move right, returns true if successful
    pub fn move_right(&mut self, grid: &Grid) -> bool {
        self.move_to(self.col + 1, self.row, Movement::Right, grid)
    }

    /// Try to move down one row, returns true if successful
    pub fn move_down(&mut self, movement: Movement, grid: &Grid) -> bool {
        self.move_to(self.col, self.row + 1, movement, grid)
    }

    /// Try to rotate, using SRS wall kicks. The first offset that fits wins
    /// and its index is kept for Mini T-Spin classification.
    pub fn rotate(&mut self, direction: RotationDirection, grid: &Grid) -> bool {
        if self.is_settled() {
            return false;
        }
        let target = direction.apply(self.rotation);
        let kicks = get_wall_kicks(self.piece_type, self.rotation, target);

        // O has no kick table and never leaves its cells
        if kicks.is_empty() {
            self.rotation = target;
            self.last_kick = 0;
            self.record(Movement::Rotate, 0);
            return true;
        }

        for (kick_idx, &(dx, dy)) in kicks.iter().enumerate() {
            let col = self.col + dx;
            let row = self.row - dy; // kick y points up
            if self.fits(target, col, row, grid) {
                let rows_down = (row - self.row).max(0) as u32;
                self.rotation = target;
                self.col = col;
                self.row = row;
                self.last_kick = kick_idx;
                self.record(Movement::Rotate, rows_down);
                return true;
            }
        }
        false
    }

    /// True iff moving one row down would be invalid (the piece is grounded)
    pub fn is_lockable(&self, grid: &Grid) -> bool {
        !self.is_settled() && !self.fits(self.rotation, self.col, self.row + 1, grid)
    }

    /// Hard drop - move down as far as possible and return distance dropped
    pub fn hard_drop(&mut self, grid: &Grid) -> u32 {
        let mut distance = 0;
        while self.move_down(Movement::HardDrop, grid) {
            distance += 1;
        }
        distance
    }

    /// Get the anchor row a hard drop would reach
    pub fn ghost_row(&self, grid: &Grid) -> i32 {
        let mut row = self.row;
        while row < BOARD_HEIGHT as i32 && self.fits(self.rotation, self.col, row + 1, grid) {
            row += 1;
        }
        row
    }

    /// Count occupied T-Spin corners. Walls and floor count as occupied.
    /// Always zero for anything but an active T.
    pub fn t_spin_corners(&self, grid: &Grid) -> CornerCount {
        let mut count = CornerCount::default();
        if self.piece_type != TetrominoType::T || self.is_settled() {
            return count;
        }
        let k = self.rotation.index();
        for (i, &(dc, dr)) in T_SPIN_CORNERS.iter().enumerate() {
            let (col, row) = (self.col + dc, self.row + dr);
            if grid.is_valid_position(col, row) {
                continue;
            }
            // the two corners starting at the rotation index flank the point
            if (i + 4 - k) % 4 < 2 {
                count.point_side += 1;
            } else {
                count.flat_side += 1;
            }
        }
        count
    }

    /// Whether every block sits in the hidden buffer zone
    pub fn is_above_skyline(&self) -> bool {
        self.blocks().iter().all(|&(_, row)| row < 0)
    }

    /// Remove cells on `row` and shift cells strictly above it down by one.
    /// Returns true iff the piece has no cells left.
    pub fn clear_line(&mut self, row: i32) -> bool {
        self.clear_rows(&[row])
    }

    /// Remove every cell on the cleared rows in a single pass. Each
    /// remaining cell drops once per cleared row below it.
    /// Returns true iff the piece has no cells left.
    pub fn clear_rows(&mut self, rows: &[i32]) -> bool {
        self.settle();
        let Some(cells) = self.cells.take() else {
            return true;
        };
        let kept: Vec<(i32, i32)> = cells
            .into_iter()
            .filter(|(_, row)| !rows.contains(row))
            .map(|(col, row)| {
                let below = rows.iter().filter(|&&cleared| cleared > row).count() as i32;
                (col, row + below)
            })
            .collect();
        let empty = kept.is_empty();
        self.cells = Some(kept);
        empty
    }

    /// Forced upward shift, no collision check (garbage insertion)
    pub fn shift_up(&mut self, rows: i32) {
        match &mut self.cells {
            Some(cells) => cells.iter_mut().for_each(|(_, row)| *row -= rows),
            None => {
                self.row -= rows;
                self.lowest_row -= rows;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_position() {
        let grid = Grid::new();
        let piece = Piece::spawn(TetrominoType::T, &grid).unwrap();
        assert_eq!((piece.col, piece.row), (3, -2));
        let rows: Vec<i32> = piece.blocks().iter().map(|b| b.1).collect();
        assert!(rows.contains(&-2) && rows.contains(&-1));

        let i = Piece::spawn(TetrominoType::I, &grid).unwrap();
        assert!(i.blocks().iter().all(|&(_, row)| row == -1));
    }

    #[test]
    fn test_spawn_blocked() {
        let grid = Grid::from_cells([(4, -1)]);
        assert!(Piece::spawn(TetrominoType::T, &grid).is_none());
    }

    #[test]
    fn test_failed_move_leaves_state() {
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::O, -1, 5);
        assert!(!piece.move_left(&grid));
        assert_eq!((piece.col, piece.row), (-1, 5));
        assert_eq!(piece.manipulation_count, 0);
        assert_eq!(piece.last_movement, Movement::Spawn);
    }

    #[test]
    fn test_manipulation_counting() {
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::T, 3, 0);
        assert!(piece.move_left(&grid));
        assert!(piece.move_right(&grid));
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece.manipulation_count, 3);

        // a new lowest row resets the counter, drops never count
        assert!(piece.move_down(Movement::SoftDrop, &grid));
        assert_eq!(piece.manipulation_count, 0);
        assert_eq!(piece.drop_counter.soft_drop, 1);
    }

    #[test]
    fn test_rotation_wall_kick_records_index() {
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::T, -1, 5);
        piece.rotation = Rotation::East;
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece.rotation, Rotation::South);
        assert_eq!(piece.col, 0);
        assert_eq!(piece.last_kick, 1);
        assert_eq!(piece.last_movement, Movement::Rotate);
    }

    #[test]
    fn test_i_piece_kick_off_right_wall() {
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::I, 7, 5);
        piece.rotation = Rotation::East;
        assert!(piece.rotate(RotationDirection::CounterClockwise, &grid));
        assert_eq!(piece.rotation, Rotation::North);
        assert_eq!(piece.col, 6);
        assert_eq!(piece.last_kick, 2);
    }

    #[test]
    fn test_o_rotation_never_moves() {
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::O, 3, 5);
        let before = piece.blocks();
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece.blocks(), before);
        assert_eq!((piece.col, piece.row), (3, 5));
    }

    #[test]
    fn test_is_lockable_and_hard_drop() {
        let grid = Grid::new();
        let mut piece = Piece::spawn(TetrominoType::I, &grid).unwrap();
        assert!(!piece.is_lockable(&grid));
        let ghost = piece.ghost_row(&grid);
        let distance = piece.hard_drop(&grid);
        assert_eq!(distance, 20);
        assert_eq!(piece.row, ghost);
        assert!(piece.is_lockable(&grid));
        assert_eq!(piece.drop_counter.hard_drop, 20);
    }

    #[test]
    fn test_clear_line_shifts_cells_above() {
        let mut piece = Piece::settled(TetrominoType::J, vec![(0, 17), (0, 18), (1, 18), (0, 19)]);
        assert!(!piece.clear_line(18));
        let mut cells = piece.blocks();
        cells.sort();
        assert_eq!(cells, vec![(0, 18), (0, 19)]);
    }

    #[test]
    fn test_clear_line_reports_empty() {
        let mut piece = Piece::settled(TetrominoType::Garbage, vec![(0, 19), (1, 19)]);
        assert!(piece.clear_line(19));
        assert!(piece.blocks().is_empty());
    }

    #[test]
    fn test_clear_rows_single_pass() {
        let mut piece = Piece::settled(TetrominoType::L, vec![(0, 10), (0, 15), (0, 17), (0, 19)]);
        assert!(!piece.clear_rows(&[14, 17]));
        let mut cells = piece.blocks();
        cells.sort();
        // 10 is above both clears, 15 is between them, 19 is below both
        assert_eq!(cells, vec![(0, 12), (0, 16), (0, 19)]);
    }

    #[test]
    fn test_t_spin_corners() {
        // T pointing up at the floor: both bottom corners are off-board
        let grid = Grid::new();
        let mut piece = Piece::new(TetrominoType::T, 3, 18);
        assert_eq!(
            piece.t_spin_corners(&grid),
            CornerCount { point_side: 0, flat_side: 2 }
        );

        // pointing down into a slot: both bottom corners and one top corner filled
        let grid = Grid::from_cells([(3, 17), (3, 19), (5, 19)]);
        piece.rotation = Rotation::South;
        piece.row = 17;
        assert_eq!(
            piece.t_spin_corners(&grid),
            CornerCount { point_side: 2, flat_side: 1 }
        );
    }

    #[test]
    fn test_shift_up_is_forced() {
        let mut active = Piece::new(TetrominoType::T, 3, 0);
        active.shift_up(3);
        assert_eq!(active.row, -3);

        let mut settled = Piece::settled(TetrominoType::Garbage, vec![(0, 19)]);
        settled.shift_up(2);
        assert_eq!(settled.blocks(), vec![(0, 17)]);
    }
}
