//! Guideline rules tables: named scoring actions, base scores and the
//! weighted line counts used for leveling.

use crate::srs;
use crate::tetromino::TetrominoType;
use std::fmt;
use std::str::FromStr;

/// A named scoring action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Single,
    Double,
    Triple,
    Tetris,
    TSpin,
    TSpinMini,
    TSpinSingle,
    TSpinDouble,
    TSpinTriple,
    TSpinMiniSingle,
}

/// (action, base score, weighted line count)
const ACTION_TABLE: [(Action, u32, u32); 10] = [
    (Action::Single, 100, 1),
    (Action::TSpinMini, 100, 1),
    (Action::TSpinMiniSingle, 200, 2),
    (Action::Double, 300, 3),
    (Action::TSpin, 400, 4),
    (Action::Triple, 500, 5),
    (Action::Tetris, 800, 8),
    (Action::TSpinSingle, 800, 8),
    (Action::TSpinDouble, 1200, 12),
    (Action::TSpinTriple, 1600, 16),
];

const LINE_NAMES: [&str; 4] = ["Single", "Double", "Triple", "Tetris"];

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Single => "Single",
            Action::Double => "Double",
            Action::Triple => "Triple",
            Action::Tetris => "Tetris",
            Action::TSpin => "T-Spin",
            Action::TSpinMini => "T-Spin Mini",
            Action::TSpinSingle => "T-Spin Single",
            Action::TSpinDouble => "T-Spin Double",
            Action::TSpinTriple => "T-Spin Triple",
            Action::TSpinMiniSingle => "T-Spin Mini Single",
        }
    }

    /// Base score before level and back-to-back multipliers
    pub fn base_score(&self) -> u32 {
        self.entry().1
    }

    /// Weighted line count used for leveling (not the cleared row count)
    pub fn line_count(&self) -> u32 {
        self.entry().2
    }

    fn entry(&self) -> (Action, u32, u32) {
        ACTION_TABLE
            .into_iter()
            .find(|(action, _, _)| action == self)
            .unwrap_or((*self, 0, 0))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTION_TABLE
            .into_iter()
            .map(|(action, _, _)| action)
            .find(|action| action.name() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// Build the action name for a lock: "T-Spin", "Mini" and the line-count
/// name, joined by spaces. `None` when the lock is not a scoring action.
pub fn action_name(t_spin: bool, mini: bool, cleared_lines: u32) -> Option<String> {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if t_spin {
        parts.push("T-Spin");
    }
    if mini {
        parts.push("Mini");
    }
    if cleared_lines > 0 {
        parts.push(LINE_NAMES[(cleared_lines.min(4) - 1) as usize]);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Kick offsets for a piece type and an SRS key such as "0>R".
/// Empty for O and for unknown keys.
pub fn kick_data(piece_type: TetrominoType, key: &str) -> &'static [(i32, i32)] {
    match srs::parse_kick_key(key) {
        Some((from, to)) => srs::get_wall_kicks(piece_type, from, to),
        None => &[],
    }
}

/// Base score for a named action, 0 when the name is not in the table
pub fn base_score(name: &str) -> u32 {
    name.parse::<Action>().map(|a| a.base_score()).unwrap_or(0)
}

/// Weighted line count for a named action, 0 when the name is not in the table
pub fn line_count(name: &str) -> u32 {
    name.parse::<Action>().map(|a| a.line_count()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_scores() {
        assert_eq!(base_score("Single"), 100);
        assert_eq!(base_score("Tetris"), 800);
        assert_eq!(base_score("T-Spin Double"), 1200);
        assert_eq!(base_score("T-Spin Mini Single"), 200);
        assert_eq!(base_score("T-Spin Mini Double"), 0);
        assert_eq!(base_score("Nonsense"), 0);
    }

    #[test]
    fn test_line_counts_are_weighted() {
        assert_eq!(line_count("Tetris"), 8);
        assert_eq!(line_count("Double"), 3);
        assert_eq!(line_count("T-Spin Triple"), 16);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(action_name(false, false, 0), None);
        assert_eq!(action_name(false, false, 4).as_deref(), Some("Tetris"));
        assert_eq!(action_name(true, false, 0).as_deref(), Some("T-Spin"));
        assert_eq!(action_name(true, true, 1).as_deref(), Some("T-Spin Mini Single"));
        for (action, _, _) in ACTION_TABLE {
            assert_eq!(action.name().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn test_kick_data_lookup() {
        assert!(kick_data(TetrominoType::O, "0>R").is_empty());
        assert_eq!(kick_data(TetrominoType::I, "0>R")[1], (-2, 0));
        assert_eq!(kick_data(TetrominoType::T, "0>R")[1], (-1, 0));
        assert!(kick_data(TetrominoType::T, "0>2").is_empty());
    }
}
