// ============================================================
// Layer 5 — Epoch Loop Runner
// ============================================================
// Runs a fixed number of epochs for one fine-tuning stage.
//
// Per epoch:
//   1. Train phase    — model on the autodiff backend, one Adam
//                       step per batch at the scheduler's lr
//   2. Validate phase — model.valid() on the inner backend, no
//                       graph, no updates
//   3. If val accuracy > best accuracy: snapshot the live model
//      into the best state and write it to the weight sink now
//   4. Step the plateau scheduler with 100 × TRAIN accuracy
//
// Phase numbers:
//   loss     = Σ(batch mean loss × batch size) / phase size
//   accuracy = Σ correct / phase size
//
// The best state comes in and goes out by value, so stage 2
// continues comparing against whatever stage 1 achieved.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::time::Instant;

use crate::data::{batcher::ImageBatch, pipeline::PhaseData};
use crate::domain::{
    best_state::BestState,
    phase::Phase,
    stage::Stage,
    tally::{PhaseOutcome, PhaseTally},
    traits::WeightSink,
};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::{model::Classifier, scheduler::ReduceLrOnPlateau};

/// What one epoch produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch:    usize,
    pub train:    PhaseOutcome,
    pub valid:    PhaseOutcome,
    pub lr:       f64,
    pub improved: bool,
}

/// Result of running one stage. The live model after the last
/// epoch is dropped; only the best snapshot carries on.
pub struct StageRun<M> {
    pub best:    BestState<M>,
    pub history: Vec<EpochSummary>,
}

/// Everything an epoch loop needs besides the model, optimizer and scheduler.
pub struct EpochRunner<'a, B: AutodiffBackend, W: ?Sized> {
    pub data:    &'a PhaseData<B>,
    pub loss:    &'a CrossEntropyLossConfig,
    pub sink:    &'a mut W,
    pub metrics: Option<&'a MetricsLogger>,
    /// Wall-clock origin for the "Time:" line.
    pub started: Instant,
}

impl<'a, B: AutodiffBackend, W: ?Sized> EpochRunner<'a, B, W> {
    pub fn new(
        data:    &'a PhaseData<B>,
        loss:    &'a CrossEntropyLossConfig,
        sink:    &'a mut W,
        metrics: Option<&'a MetricsLogger>,
        started: Instant,
    ) -> Self {
        Self { data, loss, sink, metrics, started }
    }

    pub fn run<M, O>(
        &mut self,
        stage:     Stage,
        model:     M,
        optimizer: &mut O,
        scheduler: &mut ReduceLrOnPlateau,
        epochs:    usize,
        mut best:  BestState<M>,
    ) -> Result<StageRun<M>>
    where
        M: Classifier<B> + AutodiffModule<B>,
        M::InnerModule: Classifier<B::InnerBackend>,
        O: Optimizer<M, B>,
        W: WeightSink<M>,
    {
        let mut model   = model;
        let mut history = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            println!();
            println!("Epoch : {:>2}/{:<2}", epoch, epochs);
            println!("{}", "-".repeat(10));

            let lr = scheduler.lr();

            // ── Train phase ───────────────────────────────────────────────────
            let (trained, train) = self.train_phase(model, optimizer, lr);
            model = trained;
            self.report(stage, epoch, Phase::Train, train, lr)?;

            // ── Validate phase ────────────────────────────────────────────────
            let valid = evaluate(
                &model.valid(),
                self.data.valid.as_ref(),
                self.loss,
                self.data.sizes.get(Phase::Validate),
            );
            self.report(stage, epoch, Phase::Validate, valid, lr)?;

            let improved = best.promote_and_persist(
                valid.accuracy, stage, epoch, &model, &mut *self.sink,
            )?;
            if improved {
                tracing::info!(
                    "New best validation accuracy {:.3}% (stage {}, epoch {})",
                    valid.accuracy_percent(), stage.number(), epoch,
                );
            }

            let elapsed = self.started.elapsed().as_secs_f64();
            println!("Time: {}m {:.3}s", (elapsed / 60.0).floor(), elapsed % 60.0);
            println!("{}", "=".repeat(44));

            scheduler.step(train.accuracy_percent());

            history.push(EpochSummary { epoch, train, valid, lr, improved });
        }

        Ok(StageRun { best, history })
    }

    fn train_phase<M, O>(&self, mut model: M, optimizer: &mut O, lr: f64) -> (M, PhaseOutcome)
    where
        M: Classifier<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let mut tally = PhaseTally::new();

        for batch in self.data.train.iter() {
            let batch_size = batch.size();
            let logits     = model.forward(batch.images);
            let criterion  = self.loss.init(&logits.device());

            let correct = count_correct(logits.clone(), batch.targets.clone());
            let loss    = criterion.forward(logits, batch.targets);
            let mean_loss: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + Adam update
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            tally.add_batch(mean_loss, batch_size, correct);
        }

        (model, tally.finish(self.data.sizes.get(Phase::Train)))
    }

    fn report(&self, stage: Stage, epoch: usize, phase: Phase, outcome: PhaseOutcome, lr: f64) -> Result<()> {
        println!(
            "{} - loss = {:.6}, accuracy = {:.3}",
            phase, outcome.loss, outcome.accuracy_percent(),
        );
        if let Some(metrics) = self.metrics {
            metrics.log(&EpochMetrics::new(stage, epoch, phase, outcome, lr))?;
        }
        Ok(())
    }
}

/// Loss and accuracy of `model` over every batch of `loader`, without
/// touching its parameters. `example_count` is the dataset size.
pub fn evaluate<B, C>(
    model:         &C,
    loader:        &dyn DataLoader<ImageBatch<B>>,
    loss:          &CrossEntropyLossConfig,
    example_count: usize,
) -> PhaseOutcome
where
    B: Backend,
    C: Classifier<B>,
{
    let mut tally = PhaseTally::new();

    for batch in loader.iter() {
        let batch_size = batch.size();
        let logits     = model.forward(batch.images);
        let criterion  = loss.init(&logits.device());

        let correct = count_correct(logits.clone(), batch.targets.clone());
        let mean_loss: f64 = criterion
            .forward(logits, batch.targets)
            .into_scalar()
            .elem::<f64>();

        tally.add_batch(mean_loss, batch_size, correct);
    }

    tally.finish(example_count)
}

/// argmax over classes, compared with the targets.
/// argmax(1) returns [N, 1], so it is flattened to [N] first.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted.equal(targets).int().sum().into_scalar().elem::<i64>();
    correct as usize
}
