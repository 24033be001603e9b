//! Scheduled callbacks on a virtual clock
//!
//! The playfield never blocks: lock delay, ARE and gravity are deadlines
//! that fire while the owner advances the clock.

use std::time::Duration;

/// Timer classes, in tie-break order when deadlines coincide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Delay between a lock and the next spawn
    Are,
    /// Delay between a line-clearing lock and the removal of its rows
    Clear,
    /// Lock delay of a grounded piece
    Lock,
    /// Gravity, repeating
    AutoDrop,
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    now: Duration,
    are: Option<Duration>,
    clear: Option<Duration>,
    lock: Option<Duration>,
    /// (deadline, interval)
    auto_drop: Option<(Duration, Duration)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Start a one-shot timer, superseding a running one of the same kind
    pub fn start(&mut self, kind: TimerKind, delay: Duration) {
        let deadline = self.now + delay;
        match kind {
            TimerKind::Are => self.are = Some(deadline),
            TimerKind::Clear => self.clear = Some(deadline),
            TimerKind::Lock => self.lock = Some(deadline),
            TimerKind::AutoDrop => self.auto_drop = Some((deadline, delay)),
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Are => self.are = None,
            TimerKind::Clear => self.clear = None,
            TimerKind::Lock => self.lock = None,
            TimerKind::AutoDrop => self.auto_drop = None,
        }
    }

    pub fn cancel_all(&mut self) {
        self.are = None;
        self.clear = None;
        self.lock = None;
        self.auto_drop = None;
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Are => self.are.is_some(),
            TimerKind::Clear => self.clear.is_some(),
            TimerKind::Lock => self.lock.is_some(),
            TimerKind::AutoDrop => self.auto_drop.is_some(),
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline. One-shots are cleared, the repeating timer re-arms.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerKind> {
        let candidates = [
            (TimerKind::Are, self.are),
            (TimerKind::Clear, self.clear),
            (TimerKind::Lock, self.lock),
            (TimerKind::AutoDrop, self.auto_drop.map(|(deadline, _)| deadline)),
        ];
        let (kind, deadline) = candidates
            .into_iter()
            .filter_map(|(kind, deadline)| deadline.map(|d| (kind, d)))
            .filter(|&(_, deadline)| deadline <= until)
            .min_by_key(|&(kind, deadline)| (deadline, kind))?;

        self.now = self.now.max(deadline);
        match kind {
            TimerKind::AutoDrop => {
                if let Some((deadline, interval)) = &mut self.auto_drop {
                    *deadline += *interval;
                }
            }
            other => self.cancel(other),
        }
        Some(kind)
    }

    /// Move the clock to `until` once nothing else is due
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = Timers::new();
        timers.start(TimerKind::Lock, ms(500));
        assert_eq!(timers.pop_due(ms(499)), None);
        assert_eq!(timers.pop_due(ms(500)), Some(TimerKind::Lock));
        assert_eq!(timers.now(), ms(500));
        assert_eq!(timers.pop_due(ms(10_000)), None);
    }

    #[test]
    fn test_repeating_rearms() {
        let mut timers = Timers::new();
        timers.start(TimerKind::AutoDrop, ms(100));
        let mut fired = 0;
        while timers.pop_due(ms(350)).is_some() {
            fired += 1;
        }
        assert_eq!(fired, 3);
        assert_eq!(timers.now(), ms(300));
        timers.settle(ms(350));
        assert_eq!(timers.now(), ms(350));
    }

    #[test]
    fn test_restart_supersedes() {
        let mut timers = Timers::new();
        timers.start(TimerKind::Lock, ms(500));
        timers.settle(ms(400));
        timers.start(TimerKind::Lock, ms(500));
        assert_eq!(timers.pop_due(ms(800)), None);
        assert_eq!(timers.pop_due(ms(900)), Some(TimerKind::Lock));
    }

    #[test]
    fn test_ties_follow_kind_order() {
        let mut timers = Timers::new();
        timers.start(TimerKind::AutoDrop, ms(200));
        timers.start(TimerKind::Lock, ms(200));
        timers.start(TimerKind::Are, ms(200));
        timers.start(TimerKind::Clear, ms(200));
        assert_eq!(timers.pop_due(ms(200)), Some(TimerKind::Are));
        assert_eq!(timers.pop_due(ms(200)), Some(TimerKind::Clear));
        assert_eq!(timers.pop_due(ms(200)), Some(TimerKind::Lock));
        assert_eq!(timers.pop_due(ms(200)), Some(TimerKind::AutoDrop));
    }
}
