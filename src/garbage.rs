//! Garbage ("broken line") generation for versus attacks

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One attack's worth of broken lines, bottom row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarbageBatch {
    pub hole: i32,
    pub lines: Vec<Vec<(i32, i32)>>,
}

/// Chooses hole columns and builds broken lines
#[derive(Debug, Clone)]
pub struct GarbageGenerator {
    rng: ChaCha8Rng,
    last_hole: Option<i32>,
}

impl GarbageGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_hole: None,
        }
    }

    /// Pick the hole for a new batch. It never repeats the previous hole:
    /// the new column is the previous one shifted by 1..width.
    /// `previous` is the gap found on the board; when the board no longer
    /// holds garbage the last hole this generator handed out is used.
    pub fn pick_hole(&mut self, previous: Option<i32>) -> i32 {
        let width = BOARD_WIDTH as i32;
        let hole = match previous.or(self.last_hole) {
            Some(prev) => (prev + self.rng.gen_range(1..width)) % width,
            None => self.rng.gen_range(0..width),
        };
        self.last_hole = Some(hole);
        hole
    }

    /// Build `count` broken lines on the bottom rows, all sharing one hole
    pub fn generate(&mut self, count: usize, previous: Option<i32>) -> GarbageBatch {
        let hole = self.pick_hole(previous);
        let lines = (0..count)
            .map(|i| {
                let row = BOARD_HEIGHT as i32 - 1 - i as i32;
                (0..BOARD_WIDTH as i32)
                    .filter(|&col| col != hole)
                    .map(|col| (col, row))
                    .collect()
            })
            .collect();
        GarbageBatch { hole, lines }
    }

    /// Forget the remembered hole (new game)
    pub fn reset(&mut self) {
        self.last_hole = None;
    }
}

/// First column missing from a broken line's cells
pub fn find_hole(cells: &[(i32, i32)]) -> Option<i32> {
    (0..BOARD_WIDTH as i32).find(|col| cells.iter().all(|&(c, _)| c != *col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_shares_one_hole() {
        let mut generator = GarbageGenerator::with_seed(9);
        let batch = generator.generate(3, None);
        assert_eq!(batch.lines.len(), 3);
        for (i, line) in batch.lines.iter().enumerate() {
            assert_eq!(line.len(), BOARD_WIDTH - 1);
            assert!(line.iter().all(|&(_, row)| row == BOARD_HEIGHT as i32 - 1 - i as i32));
            assert_eq!(find_hole(line), Some(batch.hole));
        }
    }

    #[test]
    fn test_hole_always_moves() {
        let mut generator = GarbageGenerator::with_seed(1234);
        let mut previous = generator.pick_hole(None);
        for _ in 0..500 {
            let hole = generator.pick_hole(Some(previous));
            assert_ne!(hole, previous);
            assert!((0..BOARD_WIDTH as i32).contains(&hole));
            previous = hole;
        }
    }

    #[test]
    fn test_remembers_hole_without_board_garbage() {
        let mut generator = GarbageGenerator::with_seed(5);
        let first = generator.pick_hole(None);
        for _ in 0..50 {
            let next = generator.pick_hole(None);
            assert_ne!(next, first);
            generator.last_hole = Some(first);
        }
    }
}
