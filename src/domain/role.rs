// ============================================================
// Layer 3 — Role
// ============================================================
// Which of the two fine-tuning routines a run follows. The
// routines share the staged flow and differ only in presets
// (plateau factor, default unfrozen epoch count) and in the
// architecture they train.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Multiplier the plateau scheduler applies when accuracy stalls.
    pub fn plateau_factor(self) -> f64 {
        match self {
            Role::Teacher => 0.5,
            Role::Student => 0.1,
        }
    }

    /// Unfrozen epoch count when none is given explicitly.
    pub fn default_unfrozen_epochs(self, frozen_epochs: usize) -> usize {
        match self {
            Role::Teacher => 10,
            Role::Student => frozen_epochs,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}
