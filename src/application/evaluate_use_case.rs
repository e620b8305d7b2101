// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores a saved model on validation data:
//
//   1. Read the run config saved next to the weights
//   2. Rebuild the same architecture on the plain backend
//   3. Load the weights into it
//   4. Load the validation images with the run's class order
//      (or re-create the run's seeded hold-out if there is no
//      val/ folder)
//   5. One pass, no parameter updates

use anyhow::{bail, Result};
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};
use std::path::PathBuf;

use crate::application::train_use_case::{load_phase_samples, FineTuneConfig};
use crate::data::{loader::ImageFolderLoader, pipeline::ordered_loader};
use crate::domain::{role::Role, tally::PhaseOutcome};
use crate::infra::checkpoint::{config_path_for, load_config, WeightFile};
use crate::ml::{epoch_runner::evaluate, ComputeBackend};

pub struct EvaluateUseCase {
    role:         Role,
    weights_path: PathBuf,
    data_dir:     PathBuf,
    batch_size:   usize,
}

/// Validation numbers plus how many examples they cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub outcome:  PhaseOutcome,
    pub examples: usize,
}

impl EvaluateUseCase {
    pub fn new(role: Role, weights_path: PathBuf, data_dir: PathBuf, batch_size: usize) -> Self {
        Self { role, weights_path, data_dir, batch_size }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let file = WeightFile::<ComputeBackend>::new(&self.weights_path);
        let cfg: FineTuneConfig = load_config(&config_path_for(file.path()))?;

        if cfg.role != self.role {
            bail!(
                "'{}' holds a {} model, not a {} model",
                file.path().display(), cfg.role, self.role,
            );
        }
        if cfg.class_names.is_empty() {
            bail!("Run config for '{}' lists no classes", file.path().display());
        }

        let loader = ImageFolderLoader::new(&self.data_dir, cfg.image_size);
        let (_, valid) = load_phase_samples(&loader, &cfg.class_names, cfg.val_fraction, cfg.seed)?;
        let examples = valid.len();
        tracing::info!("Evaluating '{}' on {} images", file.path().display(), examples);

        let device = <ComputeBackend as Backend>::Device::default();
        let batches = ordered_loader::<ComputeBackend>(valid, self.batch_size, cfg.image_size, &device);
        let loss = CrossEntropyLossConfig::new();
        let num_classes = cfg.class_names.len();

        let outcome = match cfg.role {
            Role::Teacher => {
                let model = file.load(cfg.teacher_net(num_classes).init::<ComputeBackend>(&device), &device)?;
                evaluate(&model, batches.as_ref(), &loss, examples)
            }
            Role::Student => {
                let model = file.load(cfg.student_net(num_classes).init::<ComputeBackend>(&device), &device)?;
                evaluate(&model, batches.as_ref(), &loss, examples)
            }
        };

        Ok(EvaluationReport { outcome, examples })
    }
}
