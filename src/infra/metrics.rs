// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per phase per epoch.
//
// Columns:
//   model     type name of the network (TeacherNet, StudentNet)
//   stage     1 (classifier only) or 2 (full network)
//   epoch     1-based within the stage
//   phase     train | val
//   loss      mean cross-entropy over the phase's examples
//   accuracy  fraction correct, in [0, 1]
//   lr        learning rate in effect during the epoch
//
// Output file: <weights-dir>/metrics.csv
//
// Example:
//   model,stage,epoch,phase,loss,accuracy,lr
//   StudentNet,1,1,train,0.693100,0.512000,0.001000
//   StudentNet,1,1,val,0.684200,0.560000,0.001000
//
// The header is written only when the file is new, so repeated
// runs append to the same log. Teacher and student runs sharing
// a weights dir are told apart by the model column.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::{phase::Phase, stage::Stage, tally::PhaseOutcome};

pub const METRICS_HEADER: &str = "model,stage,epoch,phase,loss,accuracy,lr";

/// One row of the metrics CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub stage:    Stage,
    pub epoch:    usize,
    pub phase:    Phase,
    pub loss:     f64,
    pub accuracy: f64,
    pub lr:       f64,
}

impl EpochMetrics {
    pub fn new(stage: Stage, epoch: usize, phase: Phase, outcome: PhaseOutcome, lr: f64) -> Self {
        Self { stage, epoch, phase, loss: outcome.loss, accuracy: outcome.accuracy, lr }
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{:.6},{:.6}",
            self.stage.number(),
            self.epoch,
            self.phase.key(),
            self.loss,
            self.accuracy,
            self.lr,
        )
    }
}

/// Appends one model's epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
    model:    String,
}

impl MetricsLogger {
    /// Open (or create) `<dir>/metrics.csv`. Every row is tagged with `model`.
    pub fn new(dir: impl AsRef<Path>, model: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{METRICS_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, model: model.to_string() })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{}", self.model, m.csv_row())?;

        tracing::debug!(
            "Logged {} stage {} epoch {} {}: loss={:.4}, acc={:.4}",
            self.model, m.stage.number(), m.epoch, m.phase.key(), m.loss, m.accuracy,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
