// ============================================================
// Layer 3 — Fine-Tuning Stages
// ============================================================
// A run is two stages:
//
//   Stage::Frozen   — backbone frozen, only the head learns
//   Stage::Unfrozen — every parameter learns
//
// The controller walks a fixed sequence of states and never
// skips one:
//
//   Initializing → Stage1Training → Stage1Complete
//                → Stage2Training → Done
//
// Stage1Complete is where the best stage-1 snapshot is
// reloaded, so stage 2 always starts from it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Frozen,
    Unfrozen,
}

impl Stage {
    /// 1-based stage number, as printed and written to the metrics CSV.
    pub fn number(self) -> u8 {
        match self {
            Stage::Frozen   => 1,
            Stage::Unfrozen => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Frozen   => write!(f, "classifier"),
            Stage::Unfrozen => write!(f, "full network"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    Stage1Training,
    Stage1Complete,
    Stage2Training,
    Done,
}

impl ControllerState {
    /// The single state that follows this one. `Done` is terminal.
    pub fn next(self) -> Option<ControllerState> {
        match self {
            ControllerState::Initializing   => Some(ControllerState::Stage1Training),
            ControllerState::Stage1Training => Some(ControllerState::Stage1Complete),
            ControllerState::Stage1Complete => Some(ControllerState::Stage2Training),
            ControllerState::Stage2Training => Some(ControllerState::Done),
            ControllerState::Done           => None,
        }
    }

    /// Stage being trained in this state, if any.
    pub fn training_stage(self) -> Option<Stage> {
        match self {
            ControllerState::Stage1Training => Some(Stage::Frozen),
            ControllerState::Stage2Training => Some(Stage::Unfrozen),
            _ => None,
        }
    }
}
