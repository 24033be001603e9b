//! Greedy placement search used by the `simulate` and `bot` commands
//!
//! Every rotation and column of the active piece is tried on a copy of the
//! engine, and the resulting board is scored on height, holes and bumpiness.

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, BUFFER_HEIGHT, Grid};
use crate::engine::{Engine, EngineEvent};
use crate::input::{InputAction, InputState};

/// How to reach a landing spot from the spawn position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Clockwise turns, 0..4
    pub rotations: u8,
    /// Columns to move, negative is left
    pub shift: i32,
}

impl Placement {
    /// Inputs that perform this placement, hard drop included
    pub fn inputs(&self) -> Vec<InputAction> {
        let step = if self.shift < 0 {
            InputAction::Left
        } else {
            InputAction::Right
        };
        let mut inputs = vec![InputAction::Clockwise; self.rotations as usize];
        inputs.extend(std::iter::repeat_n(step, self.shift.unsigned_abs() as usize));
        inputs.push(InputAction::HardDrop);
        inputs
    }
}

/// Shape of a settled board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardMetrics {
    pub aggregate_height: u32,
    pub max_height: u32,
    /// Empty cells with a filled cell somewhere above them
    pub holes: u32,
    /// Sum of height differences between neighbouring columns
    pub bumpiness: u32,
}

impl BoardMetrics {
    pub fn from_grid(grid: &Grid) -> Self {
        let top = -(BUFFER_HEIGHT as i32);
        let bottom = BOARD_HEIGHT as i32;
        let mut heights = [0u32; BOARD_WIDTH];
        let mut holes = 0;

        for (col, height) in heights.iter_mut().enumerate() {
            let col = col as i32;
            let Some(surface) = (top..bottom).find(|&row| grid.is_occupied(col, row)) else {
                continue;
            };
            *height = (bottom - surface) as u32;
            holes += (surface..bottom)
                .filter(|&row| !grid.is_occupied(col, row))
                .count() as u32;
        }

        Self {
            aggregate_height: heights.iter().sum(),
            max_height: heights.iter().copied().max().unwrap_or(0),
            holes,
            bumpiness: heights.windows(2).map(|w| w[0].abs_diff(w[1])).sum(),
        }
    }

    fn score(&self, cleared: u32) -> f64 {
        -0.510066 * f64::from(self.aggregate_height) + 0.760666 * f64::from(cleared)
            - 0.35663 * f64::from(self.holes)
            - 0.184483 * f64::from(self.bumpiness)
    }
}

/// Pick the best landing spot for the active piece, or `None` without one
pub fn best_placement(engine: &Engine) -> Option<Placement> {
    engine.field().active()?;
    let half = BOARD_WIDTH as i32 / 2;

    let mut best: Option<(f64, Placement)> = None;
    for rotations in 0..4u8 {
        for shift in -half..=half {
            let placement = Placement { rotations, shift };
            let Some(score) = try_placement(engine, placement) else {
                continue;
            };
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, placement));
            }
        }
    }
    best.map(|(_, placement)| placement)
}

fn try_placement(engine: &Engine, placement: Placement) -> Option<f64> {
    let mut trial = engine.clone();
    trial.drain_events();
    for action in placement.inputs() {
        trial.on_input(action, InputState::Press);
    }
    // a line-clearing lock reports once its rows are gone
    let clear_delay = trial.field().clear_delay();
    if !clear_delay.is_zero() {
        trial.update(clear_delay);
    }

    let mut cleared = 0;
    for event in trial.drain_events() {
        match event {
            EngineEvent::Locked(result) => cleared += result.cleared_lines,
            EngineEvent::GameOver(_) => return None,
            _ => {}
        }
    }
    Some(BoardMetrics::from_grid(trial.field().grid()).score(cleared))
}

/// Perform `placement` on the engine
pub fn apply(engine: &mut Engine, placement: Placement) {
    for action in placement.inputs() {
        engine.on_input(action, InputState::Press);
    }
}
