//! Super Rotation System (SRS) wall kick data
//!
//! SRS defines the wall kicks attempted when rotating a piece.
//! If a rotation would cause collision, these offsets are tried in order.
//! Offsets are (x, y) with y pointing up, so applying one moves the
//! anchor to (col + x, row - y).

use crate::tetromino::{Rotation, TetrominoType};

type Kicks = &'static [(i32, i32)];

/// Get wall kick offsets for a rotation attempt from `from` to `to`.
/// Empty for O (it never moves) and for non-adjacent state pairs.
pub fn get_wall_kicks(piece_type: TetrominoType, from: Rotation, to: Rotation) -> Kicks {
    match piece_type {
        TetrominoType::O | TetrominoType::Garbage => &[],
        TetrominoType::I => i_piece_kicks(from, to),
        _ => jlstz_kicks(from, to),
    }
}

/// Table key in SRS notation, e.g. "0>R"
pub fn kick_key(from: Rotation, to: Rotation) -> String {
    format!("{}>{}", from.label(), to.label())
}

/// Parse an SRS table key ("0>R") back into its rotation pair
pub fn parse_kick_key(key: &str) -> Option<(Rotation, Rotation)> {
    let (from, to) = key.split_once('>')?;
    Some((Rotation::from_label(from)?, Rotation::from_label(to)?))
}

/// Wall kicks for J, L, S, T, Z pieces
fn jlstz_kicks(from: Rotation, to: Rotation) -> Kicks {
    use Rotation::*;

    match (from, to) {
        (North, East) => &[(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        (East, North) => &[(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        (East, South) => &[(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        (South, East) => &[(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        (South, West) => &[(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        (West, South) => &[(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
        (West, North) => &[(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
        (North, West) => &[(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        _ => &[],
    }
}

/// Wall kicks for I piece (different from other pieces)
fn i_piece_kicks(from: Rotation, to: Rotation) -> Kicks {
    use Rotation::*;

    match (from, to) {
        (North, East) => &[(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
        (East, North) => &[(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        (East, South) => &[(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        (South, East) => &[(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (South, West) => &[(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        (West, South) => &[(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
        (West, North) => &[(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (North, West) => &[(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        _ => &[],
    }
}
