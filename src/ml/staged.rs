// ============================================================
// Layer 5 — Staged Fine-Tuning Controller
// ============================================================
// Transfer learning in two stages around the epoch runner:
//
//   Stage 1 — backbone frozen, head only
//             Adam(lr 1e-3, weight decay 1e-5)
//             plateau scheduler: max mode, patience 3
//   reload  — the best checkpoint so far becomes the live model
//   Stage 2 — every parameter trainable
//             Adam(lr 1e-4, no weight decay)
//             plateau scheduler: max mode, patience 2
//   final   — the best checkpoint is written once more
//
// A single best state is threaded through both stages, so the
// weight file always holds the highest validation accuracy seen
// in the whole run.
//
// Each stage gets a fresh optimizer. In stage 1 only the head
// produces gradients, so Adam only ever updates the head there.

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig, Optimizer},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::data::pipeline::PhaseData;
use crate::domain::{
    best_state::BestState,
    role::Role,
    stage::{ControllerState, Stage},
    traits::WeightSink,
};
use crate::infra::{checkpoint::WeightFile, metrics::MetricsLogger};
use crate::ml::{
    epoch_runner::{EpochRunner, EpochSummary, StageRun},
    model::{Classifier, FineTune},
    scheduler::{PlateauConfig, PlateauMode, ReduceLrOnPlateau},
};

// ─── Stage Settings ───────────────────────────────────────────────────────────

/// Adam hyper-parameters for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamSettings {
    pub lr:           f64,
    pub weight_decay: f64,
    pub beta_1:       f64,
    pub beta_2:       f64,
    pub epsilon:      f64,
}

impl AdamSettings {
    pub fn new(lr: f64, weight_decay: f64) -> Self {
        Self { lr, weight_decay, beta_1: 0.9, beta_2: 0.999, epsilon: 1e-8 }
    }

    /// A fresh optimizer with empty moment estimates.
    pub fn init<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let weight_decay = (self.weight_decay > 0.0)
            .then(|| WeightDecayConfig::new(self.weight_decay as f32));

        AdamConfig::new()
            .with_beta_1(self.beta_1 as f32)
            .with_beta_2(self.beta_2 as f32)
            .with_epsilon(self.epsilon as f32)
            .with_weight_decay(weight_decay)
            .init()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSettings {
    pub epochs:  usize,
    pub adam:    AdamSettings,
    pub plateau: PlateauConfig,
}

/// Settings for both stages of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePlan {
    pub frozen:   StageSettings,
    pub unfrozen: StageSettings,
}

impl StagePlan {
    /// The standard schedule for `role`. `epochs_unfreeze` falls back
    /// to the role's default when not given.
    pub fn for_role(role: Role, epochs_freeze: usize, epochs_unfreeze: Option<usize>) -> Self {
        let factor = role.plateau_factor();
        let epochs_unfreeze = epochs_unfreeze
            .unwrap_or_else(|| role.default_unfrozen_epochs(epochs_freeze));

        Self {
            frozen: StageSettings {
                epochs:  epochs_freeze,
                adam:    AdamSettings::new(1e-3, 1e-5),
                plateau: PlateauConfig::new(PlateauMode::Max, factor, 3),
            },
            unfrozen: StageSettings {
                epochs:  epochs_unfreeze,
                adam:    AdamSettings::new(1e-4, 0.0),
                plateau: PlateauConfig::new(PlateauMode::Max, factor, 2),
            },
        }
    }

    pub fn settings(&self, stage: Stage) -> &StageSettings {
        match stage {
            Stage::Frozen   => &self.frozen,
            Stage::Unfrozen => &self.unfrozen,
        }
    }
}

// ─── Controller ───────────────────────────────────────────────────────────────

pub struct FineTuneOutcome<M> {
    pub best:   BestState<M>,
    pub stage1: Vec<EpochSummary>,
    pub stage2: Vec<EpochSummary>,
}

impl<M> FineTuneOutcome<M> {
    pub fn best_accuracy(&self) -> f64 {
        self.best.accuracy()
    }

    /// Every epoch of both stages, in the order they ran.
    pub fn history(&self) -> impl Iterator<Item = (Stage, &EpochSummary)> {
        let stage1 = self.stage1.iter().map(|e| (Stage::Frozen, e));
        let stage2 = self.stage2.iter().map(|e| (Stage::Unfrozen, e));
        stage1.chain(stage2)
    }
}

pub struct StagedFineTuner<'a, B: AutodiffBackend> {
    plan:    &'a StagePlan,
    data:    &'a PhaseData<B>,
    device:  B::Device,
    loss:    CrossEntropyLossConfig,
    metrics: Option<&'a MetricsLogger>,
}

impl<'a, B: AutodiffBackend> StagedFineTuner<'a, B> {
    pub fn new(plan: &'a StagePlan, data: &'a PhaseData<B>, device: B::Device) -> Self {
        Self { plan, data, device, loss: CrossEntropyLossConfig::new(), metrics: None }
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fine-tune into a weight file: `weights_path` if given, otherwise
    /// `<weights_dir>/<TypeName>.mpk`. Returns the file handle too.
    pub fn run_to_file<M>(
        &self,
        model:        M,
        weights_path: Option<PathBuf>,
        weights_dir:  &Path,
    ) -> Result<(FineTuneOutcome<M>, WeightFile<B>)>
    where
        M: FineTune<B>,
        M::InnerModule: Classifier<B::InnerBackend>,
    {
        let mut file = WeightFile::<B>::resolve::<M>(weights_path, weights_dir);
        tracing::info!("Best weights will be written to '{}'", file.path().display());
        let outcome = self.run(model, &mut file)?;
        tracing::info!("Wrote '{}' {} times", file.path().display(), file.writes());
        Ok((outcome, file))
    }

    pub fn run<M, W>(&self, model: M, sink: &mut W) -> Result<FineTuneOutcome<M>>
    where
        M: FineTune<B>,
        M::InnerModule: Classifier<B::InnerBackend>,
        W: WeightSink<M> + ?Sized,
    {
        let started = Instant::now();
        let mut state = ControllerState::Initializing;

        println!("Training {} ({} classes)", M::type_name(), model.num_classes());
        let best = BestState::seed(model.clone());

        // ── Stage 1: head only ────────────────────────────────────────────────
        state = advance(state);
        let model  = model.freeze_backbone();
        let stage1 = self.run_stage(state, model, best, sink, started)?;

        let elapsed = started.elapsed().as_secs_f64();
        println!("CLASSIFIER TRAINING TIME {} : {:.3}", (elapsed / 60.0).floor(), elapsed % 60.0);

        // ── Reload best, unfreeze ─────────────────────────────────────────────
        state = advance(state);
        println!("Unfreeze all layers of {} model", M::type_name());
        println!("{}", "=".repeat(44));
        let model = reload_best::<B, M>(&stage1.best, &self.device);

        // ── Stage 2: full network ─────────────────────────────────────────────
        state = advance(state);
        let stage2 = self.run_stage(state, model, stage1.best, sink, started)?;

        // ── Final write ───────────────────────────────────────────────────────
        state = advance(state);
        sink.persist(stage2.best.checkpoint())?;

        let elapsed = started.elapsed().as_secs_f64();
        println!("ALL NET TRAINING TIME {} m {:.3}s", (elapsed / 60.0).floor(), elapsed % 60.0);
        tracing::info!(
            "{:?}: best validation accuracy {:.3}% from {:?}",
            state, 100.0 * stage2.best.accuracy(), stage2.best.origin(),
        );

        Ok(FineTuneOutcome {
            best:   stage2.best,
            stage1: stage1.history,
            stage2: stage2.history,
        })
    }

    fn run_stage<M, W>(
        &self,
        state:   ControllerState,
        model:   M,
        best:    BestState<M>,
        sink:    &mut W,
        started: Instant,
    ) -> Result<StageRun<M>>
    where
        M: FineTune<B>,
        M::InnerModule: Classifier<B::InnerBackend>,
        W: WeightSink<M> + ?Sized,
    {
        let Some(stage) = state.training_stage() else {
            bail!("Controller state {:?} does not train a stage", state);
        };
        let settings = self.plan.settings(stage);
        tracing::info!(
            "Stage {} ({}): {} epochs, lr={:.1e}, weight_decay={:.1e}",
            stage.number(), stage, settings.epochs, settings.adam.lr, settings.adam.weight_decay,
        );

        let mut optimizer = settings.adam.init::<B, M>();
        let mut scheduler = ReduceLrOnPlateau::new(settings.adam.lr, settings.plateau.clone());

        let mut runner = EpochRunner::new(self.data, &self.loss, sink, self.metrics, started);
        runner.run(stage, model, &mut optimizer, &mut scheduler, settings.epochs, best)
    }
}

/// The best checkpoint so far, fully trainable, as the new live model.
pub(crate) fn reload_best<B, M>(best: &BestState<M>, device: &B::Device) -> M
where
    B: AutodiffBackend,
    M: FineTune<B>,
{
    best.checkpoint().clone().unfreeze_all(device)
}

fn advance(state: ControllerState) -> ControllerState {
    let next = state.next().unwrap_or(state);
    tracing::debug!("Controller {:?} -> {:?}", state, next);
    next
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{two_tone_samples, ImageSample};
    use crate::data::pipeline::ordered_loader;
    use crate::domain::best_state::Origin;
    use crate::ml::epoch_runner::evaluate;
    use crate::ml::model::{StudentNet, StudentNetConfig};
    use burn::backend::{Autodiff, NdArray};
    use burn::prelude::*;

    type TestBackend = Autodiff<NdArray>;

    fn head_weights<B: Backend>(model: &StudentNet<B>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_role_plans() {
        let teacher = StagePlan::for_role(Role::Teacher, 4, Some(6));
        assert_eq!(teacher.frozen.epochs, 4);
        assert_eq!(teacher.unfrozen.epochs, 6);
        assert_eq!(teacher.frozen.adam, AdamSettings::new(1e-3, 1e-5));
        assert_eq!(teacher.unfrozen.adam, AdamSettings::new(1e-4, 0.0));
        assert_eq!(teacher.frozen.plateau.patience, 3);
        assert_eq!(teacher.unfrozen.plateau.patience, 2);
        assert_eq!(teacher.unfrozen.plateau.mode, PlateauMode::Max);
        assert_eq!(teacher.frozen.plateau.factor, 0.5);

        let student = StagePlan::for_role(Role::Student, 5, None);
        assert_eq!(student.unfrozen.epochs, 5);
        assert_eq!(student.unfrozen.plateau.factor, 0.1);
    }

    #[test]
    fn test_separable_data_reaches_full_accuracy() {
        TestBackend::seed(42);
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();

        let data = PhaseData::<TestBackend>::new(
            two_tone_samples(10, 4), two_tone_samples(10, 4), 5, 4, 42, &device,
        );
        let mut plan = StagePlan::for_role(Role::Student, 3, Some(1));
        // Six Adam steps at the stock 1e-3 leave a random head on the wrong
        // side of the class boundary; 0.1 separates the classes in one epoch.
        plan.frozen.adam.lr = 0.1;

        let model = StudentNetConfig::new(2).with_width(8).init::<TestBackend>(&device);
        let metrics = MetricsLogger::new(dir.path(), "StudentNet").unwrap();
        let (outcome, file) = StagedFineTuner::new(&plan, &data, device)
            .with_metrics(&metrics)
            .run_to_file(model, None, dir.path())
            .unwrap();

        assert_eq!(outcome.stage1.len(), 3);
        assert_eq!(outcome.stage2.len(), 1);
        let stage1_best = outcome.stage1.iter().map(|e| e.valid.accuracy).fold(0.0, f64::max);
        assert_eq!(stage1_best, 1.0);
        assert!(matches!(outcome.best.origin(), Origin::Epoch { stage: Stage::Frozen, .. }));
        assert_eq!(outcome.history().count(), 4);
        assert!(file.path().exists());
        assert_eq!(file.path(), dir.path().join("StudentNet.mpk"));

        // One write per improvement plus the final one.
        let improvements = outcome.stage1.iter().chain(&outcome.stage2).filter(|e| e.improved).count();
        assert_eq!(file.writes(), improvements + 1);

        // Header plus train and val rows for four epochs.
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1 + 2 * 4);

        // The file holds the best snapshot.
        let reader = WeightFile::<NdArray>::new(file.path());
        let fresh = StudentNetConfig::new(2).with_width(8).init::<NdArray>(&Default::default());
        let stored = reader.load(fresh, &Default::default()).unwrap();
        assert_eq!(head_weights(&stored), head_weights(outcome.best.checkpoint()));
    }

    #[test]
    fn test_best_accuracy_never_drops_across_stages() {
        TestBackend::seed(9);
        let device = Default::default();
        let data = PhaseData::<TestBackend>::new(
            two_tone_samples(8, 4), two_tone_samples(6, 4), 4, 4, 1, &device,
        );
        let plan = StagePlan::for_role(Role::Teacher, 2, Some(2));
        let model = StudentNetConfig::new(2).with_width(4).init::<TestBackend>(&device);

        struct Discard;
        impl<M> WeightSink<M> for Discard {
            fn persist(&mut self, _model: &M) -> Result<()> {
                Ok(())
            }
        }

        let outcome = StagedFineTuner::new(&plan, &data, device).run(model, &mut Discard).unwrap();
        let best_seen = outcome.stage1.iter()
            .chain(&outcome.stage2)
            .map(|e| e.valid.accuracy)
            .fold(0.0, f64::max);
        assert_eq!(outcome.best_accuracy(), best_seen);
    }

    /// Keeps a copy of every model written.
    struct RecordingSink<M> {
        writes: Vec<M>,
    }

    impl<M: Clone> WeightSink<M> for RecordingSink<M> {
        fn persist(&mut self, model: &M) -> Result<()> {
            self.writes.push(model.clone());
            Ok(())
        }
    }

    #[test]
    fn test_reload_best_is_trainable_copy_of_best() {
        TestBackend::seed(1);
        let device = Default::default();

        // Best snapshot taken at epoch 1; the live model then regressed.
        let best_model = StudentNetConfig::new(2).with_width(4).init::<TestBackend>(&device).freeze_backbone();
        let mut best = BestState::seed(best_model.clone());
        assert!(best.offer(0.9, Stage::Frozen, 1, || best_model.clone()));
        let regressed = StudentNetConfig::new(2).with_width(4).init::<TestBackend>(&device);
        assert!(!best.offer(0.4, Stage::Frozen, 2, || regressed.clone()));

        let live = reload_best::<TestBackend, _>(&best, &device);
        assert_eq!(head_weights(&live), head_weights(&best_model));
        assert_ne!(head_weights(&live), head_weights(&regressed));
        assert!(live.backbone.blocks[0].conv.weight.val().is_require_grad());
    }

    #[test]
    fn test_stage_two_starts_from_best_not_last() {
        TestBackend::seed(4);
        let device = Default::default();

        // Two identical validation images with different labels: every model
        // scores exactly 0.5, so only stage-1 epoch 1 is an improvement while
        // epochs 2 and 3 keep training the live model away from it.
        let train = two_tone_samples(8, 4);
        let valid = vec![ImageSample::filled(0.0, 4, 0), ImageSample::filled(0.0, 4, 1)];
        let data  = PhaseData::<TestBackend>::new(train.clone(), valid, 4, 4, 3, &device);

        let mut plan = StagePlan::for_role(Role::Student, 3, Some(1));
        plan.frozen.adam.lr   = 0.05;
        // Stage 2 never moves the weights, so its train loss is the loss
        // of whatever model it started from.
        plan.unfrozen.adam.lr = 0.0;

        let model = StudentNetConfig::new(2).with_width(4).init::<TestBackend>(&device);
        let mut sink = RecordingSink { writes: Vec::new() };
        let outcome = StagedFineTuner::new(&plan, &data, device)
            .run(model, &mut sink)
            .unwrap();

        let improved: Vec<bool> = outcome.stage1.iter().map(|e| e.improved).collect();
        assert_eq!(improved, vec![true, false, false]);
        assert_eq!(outcome.best.origin(), Origin::Epoch { stage: Stage::Frozen, epoch: 1 });

        // Epoch-1 write plus the final write, both of the epoch-1 snapshot.
        assert_eq!(sink.writes.len(), 2);
        let best_head = head_weights(outcome.best.checkpoint());
        assert_eq!(head_weights(&sink.writes[0]), best_head);
        assert_eq!(head_weights(&sink.writes[1]), best_head);

        // The live model moved on after the snapshot.
        let last_stage1 = outcome.stage1[2].train.loss;
        let best_train = evaluate(
            &outcome.best.checkpoint().valid(),
            ordered_loader::<NdArray>(train, 4, 4, &Default::default()).as_ref(),
            &CrossEntropyLossConfig::new(),
            8,
        );
        assert!((last_stage1 - best_train.loss).abs() > 1e-4);

        // Stage 2 trained the snapshot, not the last stage-1 state.
        let stage2_start = outcome.stage2[0].train;
        assert!((stage2_start.loss - best_train.loss).abs() < 1e-4);
        assert_eq!(stage2_start.accuracy, best_train.accuracy);
    }
}
