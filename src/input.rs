//! Abstract input events delivered to the playfield
//!
//! Key and touch handling (DAS/ARR timing) live outside the engine; whatever
//! drives it must deliver `Press` once on activation, `Hold` at a fixed repeat
//! cadence while held and `Release` once on deactivation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input actions the playfield can process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputAction {
    Left,
    Right,
    SoftDrop,
    HardDrop,
    Clockwise,
    Anticlockwise,
    Hold,
}

impl InputAction {
    pub fn all() -> [InputAction; 7] {
        [
            InputAction::Left,
            InputAction::Right,
            InputAction::SoftDrop,
            InputAction::HardDrop,
            InputAction::Clockwise,
            InputAction::Anticlockwise,
            InputAction::Hold,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputAction::Left => "left",
            InputAction::Right => "right",
            InputAction::SoftDrop => "softDrop",
            InputAction::HardDrop => "hardDrop",
            InputAction::Clockwise => "clockwise",
            InputAction::Anticlockwise => "anticlockwise",
            InputAction::Hold => "hold",
        }
    }

    /// Movement actions repeat while held, everything else fires on press only
    pub fn repeats(&self) -> bool {
        matches!(
            self,
            InputAction::Left | InputAction::Right | InputAction::SoftDrop
        )
    }
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputAction::all()
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown input action '{s}'"))
    }
}

/// Key state lifecycle: Press -> Hold -> Hold -> ... -> Release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputState {
    Press,
    Hold,
    Release,
}

impl InputState {
    pub fn name(&self) -> &'static str {
        match self {
            InputState::Press => "press",
            InputState::Hold => "hold",
            InputState::Release => "release",
        }
    }

    /// Whether an action should fire for this state
    pub fn triggers(&self, action: InputAction) -> bool {
        match self {
            InputState::Press => true,
            InputState::Hold => action.repeats(),
            InputState::Release => false,
        }
    }
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "press" => Ok(InputState::Press),
            "hold" => Ok(InputState::Hold),
            "release" => Ok(InputState::Release),
            _ => Err(format!("unknown input state '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("softDrop".parse::<InputAction>(), Ok(InputAction::SoftDrop));
        assert_eq!("HARDDROP".parse::<InputAction>(), Ok(InputAction::HardDrop));
        assert_eq!("Hold".parse::<InputState>(), Ok(InputState::Hold));
        assert!("jump".parse::<InputAction>().is_err());
    }

    #[test]
    fn test_hold_only_repeats_movement() {
        assert!(InputState::Hold.triggers(InputAction::Left));
        assert!(InputState::Hold.triggers(InputAction::SoftDrop));
        assert!(!InputState::Hold.triggers(InputAction::Clockwise));
        assert!(!InputState::Hold.triggers(InputAction::HardDrop));
        assert!(InputState::Press.triggers(InputAction::Hold));
        assert!(!InputState::Release.triggers(InputAction::Left));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&InputAction::Anticlockwise).unwrap();
        assert_eq!(json, r#""anticlockwise""#);
    }
}
