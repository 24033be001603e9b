//! Hold slot: a single-item swap buffer.
//!
//! The once-per-spawn gate lives in the playfield; the slot only swaps.

use crate::tetromino::TetrominoType;

#[derive(Debug, Clone, Default)]
pub struct HoldSlot {
    held: Option<TetrominoType>,
}

impl HoldSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `piece` in the slot and return what was there before.
    /// Passing `None` simply clears the slot.
    pub fn hold(&mut self, piece: Option<TetrominoType>) -> Option<TetrominoType> {
        std::mem::replace(&mut self.held, piece)
    }

    pub fn held(&self) -> Option<TetrominoType> {
        self.held
    }

    pub fn clear(&mut self) {
        self.held = None;
    }
}
