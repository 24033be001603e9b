//! Scoring system following the 2009 Tetris Guideline
//!
//! One transition, [`ScoreSystem::on_lock`], turns a lock into a score delta,
//! level progress, combo and back-to-back state and the garbage to send.

use crate::piece::Movement;
use crate::playfield::LockEvent;
use crate::rules;
use crate::tetromino::TetrominoType;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Lines needed to leave level 1
const FIRST_LEVEL_GOAL: u32 = 5;

/// Outcome of one lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResult {
    pub score_added: u64,
    /// Scoring action ("T-Spin Double", ...), `None` when nothing scored
    pub action: Option<String>,
    /// Whether the back-to-back bonus applied
    pub back_to_back: bool,
    /// Garbage lines to send, before any Perfect Clear bonus
    pub garbage: u32,
    pub cleared_lines: u32,
    pub combo: i32,
    pub level: u32,
}

impl LockResult {
    /// Display name, e.g. "Back to Back Tetris"
    pub fn label(&self) -> Option<String> {
        self.action.as_ref().map(|action| {
            if self.back_to_back {
                format!("Back to Back {action}")
            } else {
                action.clone()
            }
        })
    }
}

/// Derived statistics for the end-of-game summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub score: u64,
    pub level: u32,
    /// Rows actually cleared, not the weighted count
    pub lines: u32,
    /// "MM:SS.cc"
    pub time: String,
    /// Weighted lines left until the next level
    pub goal: u32,
    pub tetrises: u32,
    pub tspins: u32,
    /// Highest combo reached
    pub combos: i32,
    /// Pieces per minute
    pub tpm: u32,
    /// Lines per minute
    pub lpm: u32,
}

#[derive(Debug, Clone)]
pub struct ScoreSystem {
    level: u32,
    score: u64,
    /// Weighted line count used for leveling
    cleared_lines: u32,
    next_level_lines: u32,
    /// -1 = no combo
    combo: i32,
    back_to_back_chain: bool,
    total_lines: u32,
    tetrises: u32,
    t_spins: u32,
    max_combo: i32,
    pieces: u32,
}

impl Default for ScoreSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreSystem {
    pub fn new() -> Self {
        Self {
            level: 1,
            score: 0,
            cleared_lines: 0,
            next_level_lines: FIRST_LEVEL_GOAL,
            combo: -1,
            back_to_back_chain: false,
            total_lines: 0,
            tetrises: 0,
            t_spins: 0,
            max_combo: 0,
            pieces: 0,
        }
    }

    /// Reset every counter (new game)
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> i32 {
        self.combo
    }

    /// Weighted lines cleared so far and the threshold for the next level
    pub fn progress(&self) -> (u32, u32) {
        (self.cleared_lines, self.next_level_lines)
    }

    pub fn on_lock(&mut self, lock: &LockEvent) -> LockResult {
        let cleared = lock.cleared;
        self.pieces += 1;
        self.total_lines += cleared;

        let corners = lock.corners;
        let t_spin = lock.piece_type == TetrominoType::T
            && lock.dropped_rotation != lock.locked_rotation
            && lock.last_movement == Movement::Rotate
            && corners.point_side + corners.flat_side > 2;
        let mini = t_spin && corners.point_side < 2 && lock.kick_index < 3;
        if t_spin {
            self.t_spins += 1;
        }
        if cleared == 4 {
            self.tetrises += 1;
        }

        // Non-clearing T-Spins keep a chain alive but never start one
        let mut back_to_back = false;
        if self.back_to_back_chain {
            self.back_to_back_chain = t_spin || cleared == 4 || cleared == 0;
            back_to_back = self.back_to_back_chain && cleared > 0;
        } else {
            self.back_to_back_chain = (t_spin && cleared > 0) || cleared == 4;
        }

        let action = rules::action_name(t_spin, mini, cleared);
        let mut score_added = 0u64;
        if let Some(name) = &action {
            let base = rules::base_score(name) as u64;
            if base == 0 {
                warn!("unexpected action {name}");
            }
            let mut points = base * self.level as u64;
            if back_to_back {
                points = points * 3 / 2;
            }
            score_added += points;
        }

        if cleared > 0 {
            self.combo += 1;
        } else {
            self.combo = -1;
        }
        self.max_combo = self.max_combo.max(self.combo);
        if self.combo > 0 {
            score_added += 50 * self.combo as u64 * self.level as u64;
        }

        // Soft drop is 1 point per row, hard drop 2, gravity nothing
        score_added += lock.drop_counter.soft_drop as u64;
        score_added += lock.drop_counter.hard_drop as u64 * 2;
        self.score += score_added;

        if let Some(name) = &action {
            let mut lines = rules::line_count(name);
            if back_to_back {
                lines = (lines * 3).div_ceil(2);
            }
            self.add_line_count(lines);
        }

        let garbage = self.garbage_for(t_spin, mini, cleared, back_to_back);
        if let Some(name) = &action {
            debug!(
                "{}{} +{} (level {}, combo {})",
                if back_to_back { "Back to Back " } else { "" },
                name,
                score_added,
                self.level,
                self.combo
            );
        }

        LockResult {
            score_added,
            action,
            back_to_back,
            garbage,
            cleared_lines: cleared,
            combo: self.combo,
            level: self.level,
        }
    }

    fn garbage_for(&self, t_spin: bool, mini: bool, cleared: u32, back_to_back: bool) -> u32 {
        let mut garbage = if mini {
            if cleared == 2 { 1 } else { 0 }
        } else if t_spin {
            match cleared {
                1 => 2,
                2 => 4,
                3 => 6,
                _ => 0,
            }
        } else {
            match cleared {
                2 => 1,
                3 => 2,
                4 => 4,
                _ => 0,
            }
        };
        if back_to_back {
            garbage += 1;
        }
        garbage += match self.combo {
            ..=1 => 0,
            2..=3 => 1,
            4..=5 => 2,
            6..=7 => 3,
            8..=9 => 4,
            _ => 5,
        };
        garbage
    }

    /// Add weighted lines, levelling up as many times as they cover.
    /// Each level-up raises the next threshold by 5 x the new level.
    fn add_line_count(&mut self, count: u32) {
        self.cleared_lines += count;
        while self.cleared_lines >= self.next_level_lines {
            self.level += 1;
            self.next_level_lines += self.level * 5;
        }
    }

    /// Gravity interval for the current level
    pub fn auto_drop_delay(&self) -> Duration {
        gravity(self.level)
    }

    pub fn stats(&self, game_time: Duration) -> Stats {
        let minutes = game_time.as_secs_f64() / 60.0;
        let per_minute = |count: u32| {
            if minutes > 0.0 {
                (count as f64 / minutes).floor() as u32
            } else {
                0
            }
        };
        Stats {
            score: self.score,
            level: self.level,
            lines: self.total_lines,
            time: format_time(game_time),
            goal: self.next_level_lines - self.cleared_lines,
            tetrises: self.tetrises,
            tspins: self.t_spins,
            combos: self.max_combo,
            tpm: per_minute(self.pieces),
            lpm: per_minute(self.total_lines),
        }
    }
}

/// Guideline gravity: `(0.8 - (level - 1) * 0.007) ^ (level - 1)` seconds
/// per row, never below one millisecond
pub fn gravity(level: u32) -> Duration {
    let steps = level.saturating_sub(1) as i32;
    let millis = (0.8 - steps as f64 * 0.007).powi(steps) * 1000.0;
    if millis.is_finite() && millis >= 1.0 {
        Duration::from_secs_f64(millis / 1000.0)
    } else {
        Duration::from_millis(1)
    }
}

/// Format elapsed time as MM:SS.cc
pub fn format_time(elapsed: Duration) -> String {
    let total_millis = elapsed.as_millis();
    let minutes = total_millis / 60_000;
    let seconds = (total_millis % 60_000) / 1000;
    let centis = (total_millis % 1000) / 10;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{CornerCount, DropCounter};
    use crate::tetromino::Rotation;

    fn lock(cleared: u32, piece_type: TetrominoType) -> LockEvent {
        LockEvent {
            cleared,
            piece_type,
            dropped_rotation: Rotation::North,
            locked_rotation: Rotation::North,
            last_movement: Movement::AutoDrop,
            kick_index: 0,
            drop_counter: DropCounter::default(),
            corners: CornerCount::default(),
            perfect_clear: false,
        }
    }

    fn t_spin(cleared: u32, point_side: u32, flat_side: u32, kick_index: usize) -> LockEvent {
        LockEvent {
            dropped_rotation: Rotation::East,
            last_movement: Movement::Rotate,
            kick_index,
            corners: CornerCount {
                point_side,
                flat_side,
            },
            ..lock(cleared, TetrominoType::T)
        }
    }

    #[test]
    fn test_single_clear() {
        let mut score = ScoreSystem::new();
        let result = score.on_lock(&lock(1, TetrominoType::I));
        assert_eq!(result.score_added, 100);
        assert_eq!(result.action.as_deref(), Some("Single"));
        assert_eq!(result.garbage, 0);
        assert_eq!(score.level(), 1);
    }

    #[test]
    fn test_tetris_levels_up() {
        let mut score = ScoreSystem::new();
        let result = score.on_lock(&lock(4, TetrominoType::I));
        assert_eq!(result.score_added, 800);
        assert_eq!(result.level, 2);
        assert_eq!(result.garbage, 4);
        assert_eq!(score.progress(), (8, 15));
    }

    #[test]
    fn test_back_to_back_tetris() {
        let mut score = ScoreSystem::new();
        score.on_lock(&lock(4, TetrominoType::I));
        let result = score.on_lock(&lock(4, TetrominoType::I));
        // 800 x 1.5 x 2 + combo 50 x 1 x 2
        assert_eq!(result.score_added, 2500);
        assert!(result.back_to_back);
        assert_eq!(result.label().as_deref(), Some("Back to Back Tetris"));
        assert_eq!(result.garbage, 5);
        assert_eq!(score.score(), 3300);
    }

    #[test]
    fn test_t_spin_double() {
        let mut score = ScoreSystem::new();
        let result = score.on_lock(&t_spin(2, 3, 0, 0));
        assert_eq!(result.action.as_deref(), Some("T-Spin Double"));
        assert_eq!(result.score_added, 1200);
        assert_eq!(result.garbage, 4);
    }

    #[test]
    fn test_t_spin_needs_rotation_and_corners() {
        let mut score = ScoreSystem::new();
        let mut no_rotate = t_spin(2, 3, 0, 0);
        no_rotate.last_movement = Movement::Left;
        assert_eq!(score.on_lock(&no_rotate).action.as_deref(), Some("Double"));

        let mut same_rotation = t_spin(2, 3, 0, 0);
        same_rotation.dropped_rotation = Rotation::North;
        assert_eq!(score.on_lock(&same_rotation).action.as_deref(), Some("Double"));

        assert_eq!(score.on_lock(&t_spin(2, 1, 1, 0)).action.as_deref(), Some("Double"));
    }

    #[test]
    fn test_mini_t_spin() {
        let mut score = ScoreSystem::new();
        let result = score.on_lock(&t_spin(1, 1, 2, 2));
        assert_eq!(result.action.as_deref(), Some("T-Spin Mini Single"));
        assert_eq!(result.score_added, 200);
        assert_eq!(result.garbage, 0);

        // a late kick upgrades it to a full T-Spin
        let result = score.on_lock(&t_spin(1, 1, 2, 4));
        assert_eq!(result.action.as_deref(), Some("T-Spin Single"));
    }

    #[test]
    fn test_unlisted_action_scores_nothing() {
        let mut score = ScoreSystem::new();
        let result = score.on_lock(&t_spin(2, 1, 2, 0));
        assert_eq!(result.action.as_deref(), Some("T-Spin Mini Double"));
        assert_eq!(result.score_added, 0);
        assert_eq!(result.garbage, 1);
        assert_eq!(score.progress(), (0, 5));
    }

    #[test]
    fn test_non_clearing_lock_keeps_chain_and_breaks_combo() {
        let mut score = ScoreSystem::new();
        score.on_lock(&lock(4, TetrominoType::I));
        let result = score.on_lock(&lock(0, TetrominoType::O));
        assert_eq!(result.combo, -1);
        assert!(!result.back_to_back);
        assert_eq!(result.action, None);

        let result = score.on_lock(&lock(4, TetrominoType::I));
        assert!(result.back_to_back);

        // an ordinary single breaks the chain
        score.on_lock(&lock(1, TetrominoType::L));
        assert!(!score.on_lock(&lock(4, TetrominoType::I)).back_to_back);
    }

    #[test]
    fn test_combo_garbage_steps() {
        let mut score = ScoreSystem::new();
        let garbage: Vec<u32> = (0..6)
            .map(|_| score.on_lock(&lock(1, TetrominoType::J)).garbage)
            .collect();
        // combo 0..5
        assert_eq!(garbage, vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(score.combo(), 5);
    }

    #[test]
    fn test_drop_points() {
        let mut score = ScoreSystem::new();
        let mut event = lock(0, TetrominoType::S);
        event.drop_counter = DropCounter {
            soft_drop: 3,
            hard_drop: 10,
            auto_drop: 7,
        };
        assert_eq!(score.on_lock(&event).score_added, 23);
    }

    #[test]
    fn test_level_cascade() {
        let mut score = ScoreSystem::new();
        // 12, then 18 with the back-to-back bonus: 30 weighted lines
        score.on_lock(&t_spin(2, 3, 0, 0));
        score.on_lock(&t_spin(2, 3, 0, 0));
        // thresholds 5, 15, 30, 50
        assert_eq!(score.level(), 4);
    }

    #[test]
    fn test_same_input_same_delta() {
        let mut a = ScoreSystem::new();
        let mut b = ScoreSystem::new();
        for event in [lock(2, TetrominoType::Z), t_spin(1, 2, 1, 0), lock(4, TetrominoType::I)] {
            assert_eq!(a.on_lock(&event), b.on_lock(&event));
        }
    }

    #[test]
    fn test_gravity_curve() {
        assert_eq!(gravity(1), Duration::from_secs(1));
        let level_2 = gravity(2).as_secs_f64();
        assert!((level_2 - 0.793).abs() < 1e-6);
        assert!(gravity(15) < gravity(14));
        assert_eq!(gravity(200), Duration::from_millis(1));
    }

    #[test]
    fn test_stats() {
        let mut score = ScoreSystem::new();
        for _ in 0..3 {
            score.on_lock(&lock(1, TetrominoType::T));
        }
        score.on_lock(&lock(0, TetrominoType::T));
        let stats = score.stats(Duration::from_millis(61_230));
        assert_eq!(stats.time, "01:01.23");
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.combos, 2);
        assert_eq!(stats.tpm, 3);
        assert_eq!(stats.lpm, 2);
        assert_eq!(stats.goal, 2);
        assert_eq!(score.stats(Duration::ZERO).tpm, 0);
    }
}
