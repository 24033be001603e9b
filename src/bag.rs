//! 7-bag randomizer for piece generation
//!
//! Tetris uses a "7-bag" system where all 7 pieces are put in a bag and
//! drawn one at a time at random; the bag is refilled only when empty.
//! This prevents long droughts.

use crate::tetromino::TetrominoType;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Number of upcoming pieces kept visible
pub const PREVIEW_LEN: usize = 5;

/// The 7-bag piece randomizer
#[derive(Debug, Clone)]
pub struct Bag {
    /// Types still in the current bag
    bag: Vec<TetrominoType>,
    /// Preview queue for upcoming pieces, already drawn from the bag
    queue: VecDeque<TetrominoType>,
    rng: ChaCha8Rng,
    seed: u64,
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}

impl Bag {
    /// Create a new bag randomizer with a random seed
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create a bag with a fixed seed (versus players share one)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            bag: Vec::with_capacity(7),
            queue: VecDeque::with_capacity(PREVIEW_LEN + 1),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get the next piece
    pub fn next(&mut self) -> TetrominoType {
        self.fill_queue();
        match self.queue.pop_front() {
            Some(piece) => {
                self.fill_queue();
                piece
            }
            None => self.draw(),
        }
    }

    /// Preview the next N pieces without removing them
    pub fn preview(&mut self, count: usize) -> Vec<TetrominoType> {
        self.fill_queue();
        self.queue.iter().take(count).copied().collect()
    }

    /// Drop the current bag and queue and restart the sequence from the seed
    pub fn reset(&mut self) {
        *self = Self::with_seed(self.seed);
    }

    fn fill_queue(&mut self) {
        while self.queue.len() < PREVIEW_LEN {
            let piece = self.draw();
            self.queue.push_back(piece);
        }
    }

    /// Draw one type uniformly from the bag, refilling it when exhausted
    fn draw(&mut self) -> TetrominoType {
        if self.bag.is_empty() {
            self.bag.extend(TetrominoType::all());
        }
        let idx = self.rng.gen_range(0..self.bag.len());
        self.bag.swap_remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bag_contains_all_pieces() {
        let mut bag = Bag::with_seed(7);
        for _ in 0..20 {
            let pieces: HashSet<_> = (0..7).map(|_| bag.next()).collect();
            assert_eq!(pieces.len(), 7);
        }
    }

    #[test]
    fn test_preview() {
        let mut bag = Bag::with_seed(1);
        let preview = bag.preview(5);
        assert_eq!(preview.len(), 5);
        assert_eq!(bag.next(), preview[0]);
        assert_eq!(bag.preview(4), preview[1..].to_vec());
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Bag::with_seed(42);
        let mut b = Bag::with_seed(42);
        let sa: Vec<_> = (0..50).map(|_| a.next()).collect();
        let sb: Vec<_> = (0..50).map(|_| b.next()).collect();
        assert_eq!(sa, sb);

        a.reset();
        let again: Vec<_> = (0..50).map(|_| a.next()).collect();
        assert_eq!(again, sa);
    }

    #[test]
    fn test_never_deals_garbage() {
        let mut bag = Bag::with_seed(3);
        assert!((0..100).all(|_| bag.next().is_playable()));
    }
}
