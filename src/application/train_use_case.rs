// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a fine-tuning run in order:
//
//   Step 1: Discover class folders          (Layer 4 - data)
//   Step 2: Load train / val images         (Layer 4 - data)
//           (seeded split when val/ is missing)
//   Step 3: Build per-phase data loaders    (Layer 4 - data)
//   Step 4: Build the role's architecture   (Layer 5 - ml)
//   Step 5: Save the resolved config        (Layer 6 - infra)
//   Step 6: Run the staged fine-tuner       (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::ImageSample,
    loader::ImageFolderLoader,
    pipeline::PhaseData,
    splitter::split_train_val,
};
use crate::domain::{best_state::Origin, role::Role, stage::Stage};
use crate::infra::{
    checkpoint::{config_path_for, save_config, WeightFile},
    metrics::MetricsLogger,
};
use crate::ml::{
    epoch_runner::EpochSummary,
    model::{Classifier, FineTune, StudentNetConfig, TeacherNetConfig},
    staged::{StagePlan, StagedFineTuner},
    ComputeBackend, TrainBackend,
};

// ─── Fine-Tuning Configuration ───────────────────────────────────────────────
// Everything needed to repeat a run. Saved next to the weights
// so `evaluate` can rebuild the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuneConfig {
    pub role:         Role,
    pub data_dir:     String,
    pub weights_dir:  String,
    pub weights_path: Option<String>,
    pub image_size:   usize,
    pub batch_size:   usize,
    /// Expected class count; taken from the data when absent.
    pub num_classes:  Option<usize>,
    /// Class folder names in index order, filled in when the run starts.
    #[serde(default)]
    pub class_names:  Vec<String>,
    pub width:        usize,
    pub dropout:      f64,
    pub val_fraction: f64,
    pub seed:         u64,
    pub plan:         StagePlan,
}

impl FineTuneConfig {
    pub fn for_role(role: Role, epochs_freeze: usize, epochs_unfreeze: Option<usize>) -> Self {
        Self {
            role,
            data_dir:     "data".to_string(),
            weights_dir:  "Weights".to_string(),
            weights_path: None,
            image_size:   64,
            batch_size:   32,
            num_classes:  None,
            class_names:  Vec::new(),
            width:        default_width(role),
            dropout:      0.2,
            val_fraction: 0.2,
            seed:         42,
            plan:         StagePlan::for_role(role, epochs_freeze, epochs_unfreeze),
        }
    }

    pub fn teacher_net(&self, num_classes: usize) -> TeacherNetConfig {
        TeacherNetConfig::new(num_classes)
            .with_width(self.width)
            .with_dropout(self.dropout)
    }

    pub fn student_net(&self, num_classes: usize) -> StudentNetConfig {
        StudentNetConfig::new(num_classes).with_width(self.width)
    }
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self::for_role(Role::Teacher, 10, None)
    }
}

/// Base channel width of each role's backbone.
pub fn default_width(role: Role) -> usize {
    match role {
        Role::Teacher => 32,
        Role::Student => 16,
    }
}

/// Train and validate samples, by the rule the run used to produce them.
pub fn load_phase_samples(
    loader:       &ImageFolderLoader,
    classes:      &[String],
    val_fraction: f64,
    seed:         u64,
) -> Result<(Vec<ImageSample>, Vec<ImageSample>)> {
    let train = loader.load_split("train", classes)?;
    if train.is_empty() {
        bail!("No training images found under '{}'", loader.root().join("train").display());
    }

    if loader.has_split("val") {
        let valid = loader.load_split("val", classes)?;
        return Ok((train, valid));
    }

    tracing::info!(
        "No 'val' folder; holding out {:.0}% of train (seed {})",
        100.0 * val_fraction, seed,
    );
    Ok(split_train_val(train, 1.0 - val_fraction, seed))
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub weights_path:  PathBuf,
    pub best_accuracy: f64,
    pub best_origin:   Origin,
    /// Every epoch of both stages, in run order.
    pub history:       Vec<(Stage, EpochSummary)>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: FineTuneConfig,
}

impl TrainUseCase {
    pub fn new(config: FineTuneConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg    = &self.config;
        let device = <TrainBackend as Backend>::Device::default();
        TrainBackend::seed(cfg.seed);

        // ── Step 1: Discover classes ──────────────────────────────────────────
        let loader  = ImageFolderLoader::new(&cfg.data_dir, cfg.image_size);
        let classes = loader.class_names("train")?;
        if let Some(expected) = cfg.num_classes {
            if expected != classes.len() {
                bail!(
                    "Model expects {} classes but '{}' has {} class folders",
                    expected, loader.root().join("train").display(), classes.len(),
                );
            }
        }
        tracing::info!("Found {} classes: {:?}", classes.len(), classes);

        // ── Step 2: Load images ───────────────────────────────────────────────
        let (train, valid) = load_phase_samples(&loader, &classes, cfg.val_fraction, cfg.seed)?;
        tracing::info!("Split: {} train, {} validation", train.len(), valid.len());

        // ── Step 3: Per-phase loaders ─────────────────────────────────────────
        let data = PhaseData::<TrainBackend>::new(
            train, valid, cfg.batch_size, cfg.image_size, cfg.seed, &device,
        );

        let mut resolved = cfg.clone();
        resolved.num_classes = Some(classes.len());
        resolved.class_names = classes;
        let num_classes = resolved.class_names.len();

        // ── Steps 4–6: Build model, save config, fine-tune ────────────────────
        match cfg.role {
            Role::Teacher => {
                let model = resolved.teacher_net(num_classes).init::<TrainBackend>(&device);
                run_role(model, &resolved, &data, device)
            }
            Role::Student => {
                let model = resolved.student_net(num_classes).init::<TrainBackend>(&device);
                run_role(model, &resolved, &data, device)
            }
        }
    }
}

fn run_role<M>(
    model:  M,
    cfg:    &FineTuneConfig,
    data:   &PhaseData<TrainBackend>,
    device: <TrainBackend as Backend>::Device,
) -> Result<TrainReport>
where
    M: FineTune<TrainBackend>,
    M::InnerModule: Classifier<ComputeBackend>,
{
    let weights_dir  = Path::new(&cfg.weights_dir);
    let weights_path = cfg.weights_path.as_ref().map(PathBuf::from);

    let target = WeightFile::<TrainBackend>::resolve::<M>(weights_path.clone(), weights_dir);
    save_config(&config_path_for(target.path()), cfg)?;

    let metrics = MetricsLogger::new(weights_dir, M::type_name())?;
    tracing::info!("Appending epoch metrics to '{}'", metrics.csv_path().display());
    let (outcome, file) = StagedFineTuner::new(&cfg.plan, data, device)
        .with_metrics(&metrics)
        .run_to_file(model, weights_path, weights_dir)?;

    Ok(TrainReport {
        weights_path:  file.path().to_path_buf(),
        best_accuracy: outcome.best_accuracy(),
        best_origin:   outcome.best.origin(),
        history:       outcome.history().map(|(stage, e)| (stage, *e)).collect(),
    })
}
