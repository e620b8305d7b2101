// ============================================================
// Layer 3 — Phase
// ============================================================
// Every epoch is a train phase followed by a validate phase.
// Only the train phase is allowed to change the parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Validate,
}

impl Phase {
    /// Short lowercase key, used in the metrics CSV and on disk ("train", "val").
    pub fn key(self) -> &'static str {
        match self {
            Phase::Train    => "train",
            Phase::Validate => "val",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train    => write!(f, "Train"),
            Phase::Validate => write!(f, "Val"),
        }
    }
}
