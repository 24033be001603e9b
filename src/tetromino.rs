//! Tetromino definitions and shapes
//!
//! The 7 play types plus the non-playable garbage marker, their four SRS
//! rotation states and the block-offset table used to place them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column of the spawn anchor (pieces spawn centered).
pub const SPAWN_COL: i32 = 3;
/// Row of the spawn anchor, just above the skyline inside the buffer zone.
pub const SPAWN_ROW: i32 = -2;

/// The tetromino types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TetrominoType {
    I, // long bar
    J,
    L,
    O, // square, never kicks
    S,
    T,
    Z,
    /// Broken line sent by the opponent. Never active, only settled.
    #[serde(rename = "GARBAGE")]
    Garbage,
}

impl TetrominoType {
    /// Get all play types for bag randomization
    pub fn all() -> [TetrominoType; 7] {
        [
            TetrominoType::I,
            TetrominoType::J,
            TetrominoType::L,
            TetrominoType::O,
            TetrominoType::S,
            TetrominoType::T,
            TetrominoType::Z,
        ]
    }

    pub fn is_playable(&self) -> bool {
        !matches!(self, TetrominoType::Garbage)
    }

    /// Block offsets (col, row) inside the piece's bounding box for a rotation.
    /// Rows grow downward. Garbage has no shape.
    pub fn shape(&self, rotation: Rotation) -> &'static [(i32, i32)] {
        use Rotation::*;
        match self {
            TetrominoType::I => match rotation {
                North => &[(0, 1), (1, 1), (2, 1), (3, 1)],
                East => &[(2, 0), (2, 1), (2, 2), (2, 3)],
                South => &[(0, 2), (1, 2), (2, 2), (3, 2)],
                West => &[(1, 0), (1, 1), (1, 2), (1, 3)],
            },
            TetrominoType::J => match rotation {
                North => &[(0, 0), (0, 1), (1, 1), (2, 1)],
                East => &[(1, 0), (2, 0), (1, 1), (1, 2)],
                South => &[(0, 1), (1, 1), (2, 1), (2, 2)],
                West => &[(1, 0), (1, 1), (0, 2), (1, 2)],
            },
            TetrominoType::L => match rotation {
                North => &[(2, 0), (0, 1), (1, 1), (2, 1)],
                East => &[(1, 0), (2, 2), (1, 1), (1, 2)],
                South => &[(0, 1), (1, 1), (2, 1), (0, 2)],
                West => &[(1, 0), (1, 1), (0, 0), (1, 2)],
            },
            // O occupies the middle of a 4-wide box in every state
            TetrominoType::O => &[(1, 0), (2, 0), (1, 1), (2, 1)],
            TetrominoType::S => match rotation {
                North => &[(1, 0), (2, 0), (0, 1), (1, 1)],
                East => &[(1, 0), (1, 1), (2, 1), (2, 2)],
                South => &[(1, 1), (2, 1), (0, 2), (1, 2)],
                West => &[(0, 0), (0, 1), (1, 1), (1, 2)],
            },
            TetrominoType::T => match rotation {
                North => &[(1, 0), (0, 1), (1, 1), (2, 1)],
                East => &[(1, 0), (1, 1), (2, 1), (1, 2)],
                South => &[(0, 1), (1, 1), (2, 1), (1, 2)],
                West => &[(1, 0), (0, 1), (1, 1), (1, 2)],
            },
            TetrominoType::Z => match rotation {
                North => &[(0, 0), (1, 0), (1, 1), (2, 1)],
                East => &[(2, 0), (1, 1), (2, 1), (1, 2)],
                South => &[(0, 1), (1, 1), (2, 2), (1, 2)],
                West => &[(1, 0), (0, 1), (1, 1), (0, 2)],
            },
            TetrominoType::Garbage => &[],
        }
    }

    /// Get spawn anchor (col, row)
    pub fn spawn_position(&self) -> (i32, i32) {
        (SPAWN_COL, SPAWN_ROW)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TetrominoType::I => "I",
            TetrominoType::J => "J",
            TetrominoType::L => "L",
            TetrominoType::O => "O",
            TetrominoType::S => "S",
            TetrominoType::T => "T",
            TetrominoType::Z => "Z",
            TetrominoType::Garbage => "GARBAGE",
        }
    }
}

impl fmt::Display for TetrominoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rotation states (using SRS naming convention)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    North, // Spawn state, "0"
    East,  // Clockwise from North, "R"
    South, // 180 from North, "2"
    West,  // Counter-clockwise from North, "L"
}

impl Rotation {
    /// Fixed rotation cycle, clockwise order
    pub const SEQUENCE: [Rotation; 4] = [
        Rotation::North,
        Rotation::East,
        Rotation::South,
        Rotation::West,
    ];

    /// Rotate clockwise: North → East → South → West → North
    pub fn cw(&self) -> Rotation {
        Self::SEQUENCE[(self.index() + 1) % 4]
    }

    /// Rotate counter-clockwise: North → West → South → East → North
    pub fn ccw(&self) -> Rotation {
        Self::SEQUENCE[(self.index() + 3) % 4]
    }

    /// Position in the clockwise cycle
    pub fn index(&self) -> usize {
        match self {
            Rotation::North => 0,
            Rotation::East => 1,
            Rotation::South => 2,
            Rotation::West => 3,
        }
    }

    /// SRS label used by kick tables ("0", "R", "2", "L")
    pub fn label(&self) -> &'static str {
        match self {
            Rotation::North => "0",
            Rotation::East => "R",
            Rotation::South => "2",
            Rotation::West => "L",
        }
    }

    pub fn from_label(label: &str) -> Option<Rotation> {
        Self::SEQUENCE.into_iter().find(|r| r.label() == label)
    }
}

/// Direction for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    pub fn apply(&self, from: Rotation) -> Rotation {
        match self {
            RotationDirection::Clockwise => from.cw(),
            RotationDirection::CounterClockwise => from.ccw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_play_shape_has_four_blocks() {
        for piece in TetrominoType::all() {
            for rotation in Rotation::SEQUENCE {
                assert_eq!(piece.shape(rotation).len(), 4, "{piece} {rotation:?}");
            }
        }
        assert!(TetrominoType::Garbage.shape(Rotation::North).is_empty());
    }

    #[test]
    fn test_rotation_cycle() {
        assert_eq!(Rotation::North.cw(), Rotation::East);
        assert_eq!(Rotation::West.cw(), Rotation::North);
        assert_eq!(Rotation::North.ccw(), Rotation::West);
        for r in Rotation::SEQUENCE {
            assert_eq!(r.cw().ccw(), r);
            assert_eq!(Rotation::from_label(r.label()), Some(r));
        }
    }

    #[test]
    fn test_garbage_serializes_in_upper_case() {
        let json = serde_json::to_string(&TetrominoType::Garbage).unwrap();
        assert_eq!(json, "\"GARBAGE\"");
        let t: TetrominoType = serde_json::from_str("\"T\"").unwrap();
        assert_eq!(t, TetrominoType::T);
    }
}
