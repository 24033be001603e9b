//! Game engine: wires the playfield to the piece generator, the hold slot
//! and the score system.
//!
//! The playfield queues what happened; after every call the engine drains
//! that queue, scores locks and turns them into [`EngineEvent`]s for the
//! caller (UI, network session, simulator).

use crate::bag::{Bag, PREVIEW_LEN};
use crate::board::CellRecord;
use crate::hold::HoldSlot;
use crate::input::{InputAction, InputState};
use crate::playfield::{FieldEvent, FieldHooks, GameOverReason, LockEvent, PlayField};
use crate::score::{LockResult, ScoreSystem, Stats};
use crate::tetromino::TetrominoType;
use std::time::Duration;
use tracing::{debug, info};

/// Garbage bonus for leaving the board empty
pub const PERFECT_CLEAR_GARBAGE: u32 = 10;

/// What the engine reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Locked(LockResult),
    LevelUp(u32),
    /// Garbage lines to send to the opponent
    Attack(u32),
    GameOver(GameOverReason),
}

/// The pieces the playfield asks for
#[derive(Debug, Clone)]
struct EngineContext {
    bag: Bag,
    hold: HoldSlot,
}

impl FieldHooks for EngineContext {
    fn next_type(&mut self) -> TetrominoType {
        self.bag.next()
    }

    fn swap_hold(&mut self, piece: TetrominoType) -> Option<TetrominoType> {
        self.hold.hold(Some(piece))
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    field: PlayField,
    ctx: EngineContext,
    score: ScoreSystem,
    events: Vec<EngineEvent>,
    running: bool,
    game_time: Duration,
}

impl Engine {
    /// Create an engine whose piece sequence and garbage holes follow `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            field: PlayField::new(seed.rotate_left(32)),
            ctx: EngineContext {
                bag: Bag::with_seed(seed),
                hold: HoldSlot::new(),
            },
            score: ScoreSystem::new(),
            events: Vec::new(),
            running: false,
            game_time: Duration::ZERO,
        }
    }

    /// Override lock delay and ARE
    pub fn with_timing(mut self, lock_delay: Duration, are_delay: Duration) -> Self {
        self.field = self.field.with_timing(lock_delay, are_delay);
        self
    }

    /// Hold full rows on the board for `delay` before removing them
    pub fn with_clear_delay(mut self, delay: Duration) -> Self {
        self.field = self.field.with_clear_delay(delay);
        self
    }

    /// Reset everything and spawn the first piece
    pub fn start(&mut self) {
        self.score.clear();
        self.ctx.hold.clear();
        self.ctx.bag.reset();
        self.game_time = Duration::ZERO;
        self.running = true;
        self.field.set_auto_drop_delay(self.score.auto_drop_delay());
        info!("starting game with seed {}", self.ctx.bag.seed());
        self.field.start(&mut self.ctx);
        self.process_field_events();
    }

    pub fn on_input(&mut self, action: InputAction, state: InputState) {
        if !self.running {
            return;
        }
        self.field.on_input(action, state, &mut self.ctx);
        self.process_field_events();
    }

    /// Advance game time by `dt`
    pub fn update(&mut self, dt: Duration) {
        if !self.running {
            return;
        }
        self.game_time += dt;
        self.field.advance(dt, &mut self.ctx);
        self.process_field_events();
    }

    /// Apply an attack from the opponent. Counts of zero or less are ignored.
    pub fn receive_garbage(&mut self, count: i32) {
        if !self.running || count <= 0 {
            return;
        }
        self.field.insert_garbage(count);
        self.process_field_events();
    }

    /// Take everything that happened since the last call
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn process_field_events(&mut self) {
        for event in self.field.take_events() {
            match event {
                FieldEvent::Started => self.events.push(EngineEvent::Started),
                FieldEvent::Locked(lock) => self.handle_lock(&lock),
                FieldEvent::GameOver(reason) => {
                    info!("game over ({}) with score {}", reason, self.score.score());
                    self.running = false;
                    self.field.stop();
                    self.events.push(EngineEvent::GameOver(reason));
                }
            }
        }
    }

    fn handle_lock(&mut self, lock: &LockEvent) {
        let level_before = self.score.level();
        let result = self.score.on_lock(lock);
        let mut garbage = result.garbage;
        if lock.perfect_clear {
            debug!("perfect clear");
            garbage += PERFECT_CLEAR_GARBAGE;
        }

        let level = result.level;
        self.events.push(EngineEvent::Locked(result));
        if level != level_before {
            info!("level up to {}", level);
            self.field.set_auto_drop_delay(self.score.auto_drop_delay());
            self.events.push(EngineEvent::LevelUp(level));
        }
        if garbage > 0 {
            self.events.push(EngineEvent::Attack(garbage));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn field(&self) -> &PlayField {
        &self.field
    }

    pub fn score(&self) -> &ScoreSystem {
        &self.score
    }

    pub fn held(&self) -> Option<TetrominoType> {
        self.ctx.hold.held()
    }

    /// Upcoming piece types
    pub fn preview(&mut self) -> Vec<TetrominoType> {
        self.ctx.bag.preview(PREVIEW_LEN)
    }

    /// Board cells for the opponent's mirror
    pub fn board(&self) -> Vec<CellRecord> {
        self.field.serialize()
    }

    pub fn game_time(&self) -> Duration {
        self.game_time
    }

    pub fn stats(&self) -> Stats {
        self.score.stats(self.game_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{CornerCount, DropCounter, Movement};
    use crate::score::gravity;
    use crate::tetromino::Rotation;

    fn lock(cleared: u32, perfect_clear: bool) -> LockEvent {
        LockEvent {
            cleared,
            piece_type: TetrominoType::I,
            dropped_rotation: Rotation::North,
            locked_rotation: Rotation::North,
            last_movement: Movement::HardDrop,
            kick_index: 0,
            drop_counter: DropCounter::default(),
            corners: CornerCount::default(),
            perfect_clear,
        }
    }

    #[test]
    fn test_start_spawns_from_bag() {
        let mut engine = Engine::new(11);
        let first = engine.preview()[0];
        engine.start();
        assert_eq!(engine.drain_events(), vec![EngineEvent::Started]);
        assert_eq!(engine.field().active().unwrap().piece_type, first);
        assert_eq!(engine.preview().len(), PREVIEW_LEN);
    }

    #[test]
    fn test_hard_drop_scores() {
        let mut engine = Engine::new(4);
        engine.start();
        engine.drain_events();
        engine.on_input(InputAction::HardDrop, InputState::Press);
        let events = engine.drain_events();
        let Some(EngineEvent::Locked(result)) = events.first() else {
            panic!("expected a lock, got {events:?}");
        };
        assert!(result.score_added > 0);
        assert_eq!(result.action, None);
        assert_eq!(engine.score().score(), result.score_added);
    }

    #[test]
    fn test_hold_goes_through_slot() {
        let mut engine = Engine::new(8);
        engine.start();
        let first = engine.field().active().unwrap().piece_type;
        engine.on_input(InputAction::Hold, InputState::Press);
        assert_eq!(engine.held(), Some(first));
    }

    #[test]
    fn test_level_up_speeds_gravity() {
        let mut engine = Engine::new(1);
        engine.start();
        engine.drain_events();
        engine.handle_lock(&lock(4, false));
        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::LevelUp(2)));
        assert!(events.contains(&EngineEvent::Attack(4)));
        assert_eq!(engine.field().auto_drop_delay(), gravity(2));
    }

    #[test]
    fn test_perfect_clear_adds_ten() {
        let mut engine = Engine::new(1);
        engine.handle_lock(&lock(1, true));
        let events = engine.drain_events();
        assert_eq!(events.last(), Some(&EngineEvent::Attack(10)));
    }

    #[test]
    fn test_garbage_top_out_ends_game() {
        let mut engine = Engine::new(2);
        engine.start();
        engine.drain_events();
        engine.receive_garbage(0);
        engine.receive_garbage(-5);
        assert_eq!(engine.field().settled_cell_count(), 0);

        engine.receive_garbage(45);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::GameOver(GameOverReason::TopOut)]
        );
        assert!(!engine.is_running());

        // nothing moves after game over
        let before = engine.board();
        engine.on_input(InputAction::HardDrop, InputState::Press);
        engine.update(Duration::from_secs(10));
        assert_eq!(engine.board(), before);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_gravity_alone_eventually_blocks_out() {
        let mut engine = Engine::new(3);
        engine.start();
        let mut over = None;
        for _ in 0..10_000 {
            engine.update(Duration::from_millis(100));
            if let Some(EngineEvent::GameOver(reason)) = engine
                .drain_events()
                .into_iter()
                .find(|event| matches!(event, EngineEvent::GameOver(_)))
            {
                over = Some(reason);
                break;
            }
        }
        // pieces stack in the middle columns until the spawn area fills up
        assert!(matches!(
            over,
            Some(GameOverReason::BlockOut) | Some(GameOverReason::LockOut)
        ));
        assert!(engine.stats().tpm > 0);
    }
}
