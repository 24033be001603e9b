//! The playfield: settled pieces, the active piece and the lock/auto-drop
//! state machine.
//!
//! The field is a union of settled pieces plus at most one active piece.
//! An occupancy grid is rebuilt from the settled cells whenever they change
//! so collision checks stay O(1). Everything the engine must answer
//! synchronously (next type, hold swap) goes through [`FieldHooks`];
//! everything the engine should react to is queued as a [`FieldEvent`].

use crate::board::{BUFFER_HEIGHT, CellRecord, Grid, TOTAL_HEIGHT, in_bounds};
use crate::garbage::{GarbageGenerator, find_hole};
use crate::input::{InputAction, InputState};
use crate::piece::{CornerCount, DropCounter, MAX_MANIPULATIONS, Movement, Piece};
use crate::tetromino::{Rotation, RotationDirection, TetrominoType};
use crate::timer::{TimerKind, Timers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Grace period before a grounded piece locks
pub const LOCK_DELAY: Duration = Duration::from_millis(500);
/// Delay between a lock and the next spawn
pub const ARE_DELAY: Duration = Duration::from_millis(200);
/// Gravity interval at level 1
pub const DEFAULT_AUTO_DROP: Duration = Duration::from_millis(1000);
/// Line-clear animation time; full rows are removed right away by default
pub const CLEAR_DELAY: Duration = Duration::ZERO;

/// Requests the playfield needs answered right away
pub trait FieldHooks {
    /// Next type from the generator
    fn next_type(&mut self) -> TetrominoType;
    /// Put `piece` in the hold slot, returning what was held before
    fn swap_hold(&mut self, piece: TetrominoType) -> Option<TetrominoType>;
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    /// The spawn position was blocked
    #[serde(rename = "Block Out")]
    BlockOut,
    /// A piece locked entirely inside the buffer zone
    #[serde(rename = "Lock Out")]
    LockOut,
    /// Garbage pushed cells above the buffer zone
    #[serde(rename = "Top Out")]
    TopOut,
}

impl GameOverReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameOverReason::BlockOut => "Block Out",
            GameOverReason::LockOut => "Lock Out",
            GameOverReason::TopOut => "Top Out",
        }
    }
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the score system needs to know about one lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEvent {
    pub cleared: u32,
    pub piece_type: TetrominoType,
    /// Rotation when the piece last became grounded
    pub dropped_rotation: Rotation,
    pub locked_rotation: Rotation,
    pub last_movement: Movement,
    pub kick_index: usize,
    pub drop_counter: DropCounter,
    pub corners: CornerCount,
    /// No settled cell is left after the clear
    pub perfect_clear: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    Started,
    Locked(LockEvent),
    GameOver(GameOverReason),
}

/// Coarse state of the field, for callers that only need to display it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started yet
    Idle,
    Falling,
    /// Grounded with the lock timer running
    LockPending,
    /// Full rows still on the board, waiting for the clear delay
    Clearing,
    /// Between a lock and the next spawn
    Spawning,
    GameOver,
    /// Display-only copy of an opponent's board
    Mirror,
}

/// A lock whose full rows are still waiting to be removed
#[derive(Debug, Clone)]
struct PendingClear {
    rows: Vec<i32>,
    event: LockEvent,
}

#[derive(Debug, Clone)]
pub struct PlayField {
    settled: Vec<Piece>,
    grid: Grid,
    active: Option<Piece>,
    can_hold: bool,
    dropped_rotation: Rotation,
    timers: Timers,
    garbage: GarbageGenerator,
    auto_drop_delay: Duration,
    lock_delay: Duration,
    are_delay: Duration,
    clear_delay: Duration,
    pending_clear: Option<PendingClear>,
    events: Vec<FieldEvent>,
    started: bool,
    game_over: bool,
    display_only: bool,
}

impl PlayField {
    /// Create an empty field. `garbage_seed` drives the hole columns.
    pub fn new(garbage_seed: u64) -> Self {
        Self {
            settled: Vec::new(),
            grid: Grid::new(),
            active: None,
            can_hold: true,
            dropped_rotation: Rotation::North,
            timers: Timers::new(),
            garbage: GarbageGenerator::with_seed(garbage_seed),
            auto_drop_delay: DEFAULT_AUTO_DROP,
            lock_delay: LOCK_DELAY,
            are_delay: ARE_DELAY,
            clear_delay: CLEAR_DELAY,
            pending_clear: None,
            events: Vec::new(),
            started: false,
            game_over: false,
            display_only: false,
        }
    }

    /// Override lock delay and ARE
    pub fn with_timing(mut self, lock_delay: Duration, are_delay: Duration) -> Self {
        self.lock_delay = lock_delay;
        self.are_delay = are_delay;
        self
    }

    /// Keep full rows on the board for `delay` before removing them. The
    /// `Locked` event and the next spawn wait for the removal.
    pub fn with_clear_delay(mut self, delay: Duration) -> Self {
        self.clear_delay = delay;
        self
    }

    /// Remove every piece and stop all timers
    pub fn clear(&mut self) {
        self.settled.clear();
        self.grid = Grid::new();
        self.active = None;
        self.can_hold = true;
        self.dropped_rotation = Rotation::North;
        self.timers.cancel_all();
        self.pending_clear = None;
        self.garbage.reset();
        self.started = false;
        self.game_over = false;
        self.display_only = false;
    }

    /// Clear the field and spawn the first piece
    pub fn start(&mut self, hooks: &mut impl FieldHooks) {
        self.clear();
        self.started = true;
        self.events.push(FieldEvent::Started);
        self.spawn_tetromino(None, hooks);
    }

    /// Stop every timer (game over, pause)
    pub fn stop(&mut self) {
        self.timers.cancel_all();
    }

    /// Spawn a piece of `piece_type`, or the generator's next type.
    /// A blocked spawn position ends the game with Block Out.
    pub fn spawn_tetromino(&mut self, piece_type: Option<TetrominoType>, hooks: &mut impl FieldHooks) {
        if self.game_over || self.display_only {
            return;
        }
        let piece_type = piece_type.unwrap_or_else(|| hooks.next_type());
        self.timers.cancel_all();
        self.can_hold = true;

        let Some(mut piece) = Piece::spawn(piece_type, &self.grid) else {
            self.end(GameOverReason::BlockOut);
            return;
        };
        // Guideline 2009 3.4: drop one row right away unless already grounded
        if !piece.is_lockable(&self.grid) {
            piece.move_down(Movement::AutoDrop, &self.grid);
        }
        let grounded = piece.is_lockable(&self.grid);
        debug!("spawned {} at ({}, {})", piece.piece_type, piece.col, piece.row);
        self.dropped_rotation = piece.rotation;
        self.active = Some(piece);

        if grounded {
            self.timers.start(TimerKind::Lock, self.lock_delay);
        }
        self.restart_auto_drop();
    }

    /// Apply one input event to the active piece
    pub fn on_input(&mut self, action: InputAction, state: InputState, hooks: &mut impl FieldHooks) {
        if self.game_over || self.display_only || !state.triggers(action) {
            return;
        }
        let grid = &self.grid;
        let Some(piece) = self.active.as_mut() else {
            return;
        };

        match action {
            InputAction::Left | InputAction::Right => {
                let was_lockable = piece.is_lockable(grid);
                let moved = if action == InputAction::Left {
                    piece.move_left(grid)
                } else {
                    piece.move_right(grid)
                };
                let lockable = piece.is_lockable(grid);
                self.update_lock_timer(moved, true);
                // stepping off a ledge restarts gravity
                if was_lockable && !lockable {
                    self.restart_auto_drop();
                }
            }
            InputAction::SoftDrop => {
                let moved = piece.move_down(Movement::SoftDrop, grid);
                self.update_lock_timer(moved, true);
                if moved {
                    self.restart_auto_drop();
                }
            }
            InputAction::Clockwise | InputAction::Anticlockwise => {
                let direction = if action == InputAction::Clockwise {
                    RotationDirection::Clockwise
                } else {
                    RotationDirection::CounterClockwise
                };
                let before_row = piece.row;
                let rotated = piece.rotate(direction, grid);
                let after_row = piece.row;
                self.update_lock_timer(rotated, false);
                if before_row < after_row {
                    self.restart_auto_drop();
                }
            }
            InputAction::HardDrop => {
                if piece.hard_drop(grid) > 0 {
                    self.dropped_rotation = piece.rotation;
                }
                self.lock();
            }
            InputAction::Hold => self.hold(hooks),
        }
    }

    fn hold(&mut self, hooks: &mut impl FieldHooks) {
        if !self.can_hold {
            return;
        }
        let Some(piece) = self.active.take() else {
            return;
        };
        self.timers.cancel_all();
        let released = hooks.swap_hold(piece.piece_type);
        debug!("held {}, released {:?}", piece.piece_type, released);
        self.spawn_tetromino(released, hooks);
        self.can_hold = false;
    }

    /// Lock-timer bookkeeping after a move or rotation
    fn update_lock_timer(&mut self, moved: bool, record_dropped: bool) {
        if !moved {
            return;
        }
        let Some(piece) = &self.active else {
            return;
        };
        if piece.is_lockable(&self.grid) {
            if record_dropped {
                self.dropped_rotation = piece.rotation;
            }
            // extended placement: past the cap the running timer keeps counting
            if piece.manipulation_count <= MAX_MANIPULATIONS || !self.timers.is_running(TimerKind::Lock) {
                self.timers.start(TimerKind::Lock, self.lock_delay);
            }
        } else {
            self.timers.cancel(TimerKind::Lock);
        }
    }

    fn restart_auto_drop(&mut self) {
        self.timers.start(TimerKind::AutoDrop, self.auto_drop_delay);
    }

    fn auto_drop_tick(&mut self) {
        let Some(piece) = self.active.as_mut() else {
            return;
        };
        if piece.move_down(Movement::AutoDrop, &self.grid) && piece.is_lockable(&self.grid) {
            self.dropped_rotation = piece.rotation;
            self.timers.start(TimerKind::Lock, self.lock_delay);
        }
    }

    /// Settle the active piece if it is grounded. Clears full rows, queues a
    /// `Locked` event and schedules the next spawn. Returns false without
    /// touching the board when there is nothing to lock.
    pub fn lock(&mut self) -> bool {
        self.timers.cancel(TimerKind::Lock);
        let grounded = self
            .active
            .as_ref()
            .is_some_and(|piece| piece.is_lockable(&self.grid));
        if !grounded {
            return false;
        }
        let Some(mut piece) = self.active.take() else {
            return false;
        };
        self.timers.cancel(TimerKind::AutoDrop);

        let corners = piece.t_spin_corners(&self.grid);
        piece.settle();
        let blocks = piece.blocks();
        for &(col, row) in &blocks {
            let fresh = self.grid.set(col, row);
            debug_assert!(
                fresh || !in_bounds(col, row),
                "locked onto a settled cell at ({col}, {row})"
            );
        }
        let event = LockEvent {
            cleared: 0,
            piece_type: piece.piece_type,
            dropped_rotation: self.dropped_rotation,
            locked_rotation: piece.rotation,
            last_movement: piece.last_movement,
            kick_index: piece.last_kick,
            drop_counter: piece.drop_counter,
            corners,
            perfect_clear: false,
        };
        let lock_out = piece.is_above_skyline();
        self.settled.push(piece);

        if lock_out {
            self.end(GameOverReason::LockOut);
            return true;
        }

        let rows = self.full_rows(&blocks);
        if rows.is_empty() || self.clear_delay.is_zero() {
            self.finish_lock(event, &rows);
        } else {
            debug!("locked {}, clearing {} rows after the delay", event.piece_type, rows.len());
            self.pending_clear = Some(PendingClear { rows, event });
            self.timers.start(TimerKind::Clear, self.clear_delay);
        }
        true
    }

    /// Full rows among those touched by `blocks`, top to bottom
    fn full_rows(&self, blocks: &[(i32, i32)]) -> Vec<i32> {
        let mut rows: Vec<i32> = blocks.iter().map(|&(_, row)| row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.retain(|&row| self.grid.is_row_full(row));
        rows
    }

    /// Remove `rows`, report the lock and schedule the next spawn
    fn finish_lock(&mut self, mut event: LockEvent, rows: &[i32]) {
        event.cleared = self.clear_rows(rows);
        event.perfect_clear = self.grid.is_empty();
        debug!("locked {} clearing {} rows", event.piece_type, event.cleared);
        self.events.push(FieldEvent::Locked(event));
        self.timers.start(TimerKind::Are, self.are_delay);
    }

    fn finish_pending_clear(&mut self) {
        if let Some(PendingClear { rows, event }) = self.pending_clear.take() {
            self.finish_lock(event, &rows);
        }
    }

    /// Cells above a cleared row drop once for every cleared row beneath them
    fn clear_rows(&mut self, rows: &[i32]) -> u32 {
        if rows.is_empty() {
            return 0;
        }
        self.settled.retain_mut(|piece| !piece.clear_rows(rows));
        self.rebuild_grid();
        rows.len() as u32
    }

    fn rebuild_grid(&mut self) {
        self.grid = Grid::from_cells(self.settled.iter().flat_map(|piece| piece.blocks()));
    }

    /// Push the stack up by `count` rows and fill the bottom with broken
    /// lines sharing one hole. Counts of zero or less are ignored.
    pub fn insert_garbage(&mut self, count: i32) {
        if count <= 0 || self.game_over || self.display_only {
            return;
        }
        // anything taller than the whole board tops out the same way
        let count = count.min(TOTAL_HEIGHT as i32 + 1);

        for piece in &mut self.settled {
            piece.shift_up(count);
        }
        if let Some(active) = &mut self.active {
            active.shift_up(count);
        }
        if let Some(pending) = &mut self.pending_clear {
            for row in &mut pending.rows {
                *row -= count;
            }
        }

        let previous = self
            .settled
            .iter()
            .rev()
            .find(|piece| piece.piece_type == TetrominoType::Garbage)
            .and_then(|piece| find_hole(&piece.blocks()));
        let batch = self.garbage.generate(count as usize, previous);
        info!("received {} garbage lines, hole at column {}", count, batch.hole);
        for line in batch.lines {
            self.settled.push(Piece::settled(TetrominoType::Garbage, line));
        }
        self.rebuild_grid();

        let top = -(BUFFER_HEIGHT as i32);
        let topped_out = self
            .settled
            .iter()
            .chain(self.active.iter())
            .any(|piece| piece.blocks().iter().any(|&(_, row)| row < top));
        if topped_out {
            self.end(GameOverReason::TopOut);
            return;
        }
        if let Some(piece) = &self.active {
            if piece.is_lockable(&self.grid) && !self.timers.is_running(TimerKind::Lock) {
                self.timers.start(TimerKind::Lock, self.lock_delay);
            }
        }
    }

    fn end(&mut self, reason: GameOverReason) {
        info!("game over: {}", reason);
        self.game_over = true;
        self.timers.cancel_all();
        self.pending_clear = None;
        self.events.push(FieldEvent::GameOver(reason));
    }

    /// Move the clock forward by `dt`, firing every timer that falls due
    pub fn advance(&mut self, dt: Duration, hooks: &mut impl FieldHooks) {
        if self.display_only {
            return;
        }
        let until = self.timers.now() + dt;
        while let Some(kind) = self.timers.pop_due(until) {
            match kind {
                TimerKind::Are => self.spawn_tetromino(None, hooks),
                TimerKind::Clear => self.finish_pending_clear(),
                TimerKind::Lock => {
                    self.lock();
                }
                TimerKind::AutoDrop => self.auto_drop_tick(),
            }
        }
        self.timers.settle(until);
    }

    /// Gravity interval. Takes effect the next time auto-drop restarts.
    pub fn set_auto_drop_delay(&mut self, delay: Duration) {
        self.auto_drop_delay = delay;
    }

    pub fn auto_drop_delay(&self) -> Duration {
        self.auto_drop_delay
    }

    pub fn clear_delay(&self) -> Duration {
        self.clear_delay
    }

    /// Every visible cell as `{col, row, type}`, active piece included
    pub fn serialize(&self) -> Vec<CellRecord> {
        self.settled
            .iter()
            .chain(self.active.iter())
            .flat_map(|piece| {
                piece.blocks().into_iter().map(move |(col, row)| CellRecord {
                    col,
                    row,
                    kind: piece.piece_type,
                })
            })
            .collect()
    }

    /// Replace the contents with a mirrored board. The field becomes
    /// display-only: no input, no timers, no collision checks.
    pub fn deserialize(&mut self, cells: &[CellRecord]) {
        self.clear();
        self.display_only = true;
        let mut by_type: Vec<(TetrominoType, Vec<(i32, i32)>)> = Vec::new();
        for cell in cells {
            match by_type.iter_mut().find(|(kind, _)| *kind == cell.kind) {
                Some((_, group)) => group.push((cell.col, cell.row)),
                None => by_type.push((cell.kind, vec![(cell.col, cell.row)])),
            }
        }
        self.settled = by_type
            .into_iter()
            .map(|(kind, group)| Piece::settled(kind, group))
            .collect();
    }

    /// Take the queued notifications
    pub fn take_events(&mut self) -> Vec<FieldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn phase(&self) -> Phase {
        if self.display_only {
            Phase::Mirror
        } else if self.game_over {
            Phase::GameOver
        } else if self.active.is_some() {
            if self.timers.is_running(TimerKind::Lock) {
                Phase::LockPending
            } else {
                Phase::Falling
            }
        } else if self.pending_clear.is_some() {
            Phase::Clearing
        } else if self.timers.is_running(TimerKind::Are) {
            Phase::Spawning
        } else if self.started {
            Phase::Falling
        } else {
            Phase::Idle
        }
    }

    pub fn active(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    /// Anchor row the active piece would hard-drop to
    pub fn ghost_row(&self) -> Option<i32> {
        self.active.as_ref().map(|piece| piece.ghost_row(&self.grid))
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn settled_cell_count(&self) -> usize {
        self.settled.iter().map(|piece| piece.blocks().len()).sum()
    }

    pub fn can_hold(&self) -> bool {
        self.can_hold
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_display_only(&self) -> bool {
        self.display_only
    }

    /// Virtual time elapsed on this field
    pub fn now(&self) -> Duration {
        self.timers.now()
    }
}
