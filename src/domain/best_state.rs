// ============================================================
// Layer 3 — Best State
// ============================================================
// The (best_accuracy, best_checkpoint) pair that survives
// across both fine-tuning stages.
//
// It is created once by the controller, seeded from the
// untrained model with accuracy 0.0, handed to the stage-1
// runner by value, returned, handed to the stage-2 runner,
// and returned again. There is no global "best".
//
// The checkpoint type S is whatever the caller snapshots:
// a Burn module in the ML layer, plain numbers in tests.
// A snapshot is taken ONLY when a validation accuracy is
// strictly greater than the current best, so ties keep the
// older checkpoint.

use anyhow::Result;
use std::fmt;

use crate::domain::stage::Stage;
use crate::domain::traits::WeightSink;

/// Where the current best checkpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The model as it was before any training.
    Seed,
    /// Validation phase of `epoch` (1-based) in `stage`.
    Epoch { stage: Stage, epoch: usize },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Seed                   => write!(f, "initial weights"),
            Origin::Epoch { stage, epoch } => write!(f, "stage {}, epoch {}", stage.number(), epoch),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BestState<S> {
    accuracy:   f64,
    checkpoint: S,
    origin:     Origin,
}

impl<S> BestState<S> {
    /// Start tracking from the initial model with accuracy 0.
    pub fn seed(initial: S) -> Self {
        Self { accuracy: 0.0, checkpoint: initial, origin: Origin::Seed }
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn checkpoint(&self) -> &S {
        &self.checkpoint
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Offer a validation accuracy. If it strictly beats the current
    /// best, `snapshot` is called and its result becomes the new
    /// checkpoint. Returns whether the best state changed.
    pub fn offer<F>(&mut self, accuracy: f64, stage: Stage, epoch: usize, snapshot: F) -> bool
    where
        F: FnOnce() -> S,
    {
        if accuracy > self.accuracy {
            self.accuracy   = accuracy;
            self.checkpoint = snapshot();
            self.origin     = Origin::Epoch { stage, epoch };
            true
        } else {
            false
        }
    }
}

impl<S: Clone> BestState<S> {
    /// Offer `live` as a candidate and, on improvement, write the new
    /// checkpoint to `sink` right away so a later crash never loses it.
    pub fn promote_and_persist<W>(
        &mut self,
        accuracy: f64,
        stage:    Stage,
        epoch:    usize,
        live:     &S,
        sink:     &mut W,
    ) -> Result<bool>
    where
        W: WeightSink<S> + ?Sized,
    {
        if !self.offer(accuracy, stage, epoch, || live.clone()) {
            return Ok(false);
        }
        sink.persist(&self.checkpoint)?;
        Ok(true)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Records every persisted snapshot.
    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<Vec<f32>>,
    }

    impl WeightSink<Vec<f32>> for RecordingSink {
        fn persist(&mut self, model: &Vec<f32>) -> Result<()> {
            self.writes.push(model.clone());
            Ok(())
        }
    }

    #[test]
    fn test_seed_starts_at_zero() {
        let best = BestState::seed(vec![0.0_f32]);
        assert_eq!(best.accuracy(), 0.0);
        assert_eq!(best.origin(), Origin::Seed);
    }

    #[test]
    fn test_regression_is_skipped_and_writes_once_per_improvement() {
        let mut best = BestState::seed(vec![0.0_f32]);
        let mut sink = RecordingSink::default();
        let mut tracked = Vec::new();

        for (i, acc) in [0.5, 0.7, 0.6, 0.9].into_iter().enumerate() {
            // The "model" changes every epoch; its value is the epoch index.
            let live = vec![i as f32];
            best.promote_and_persist(acc, Stage::Frozen, i + 1, &live, &mut sink).unwrap();
            tracked.push(best.accuracy());
        }

        assert_eq!(tracked, vec![0.5, 0.7, 0.7, 0.9]);
        assert_eq!(sink.writes.len(), 3);
        assert_eq!(sink.writes, vec![vec![0.0], vec![1.0], vec![3.0]]);
        assert_eq!(best.checkpoint(), &vec![3.0]);
        assert_eq!(best.origin(), Origin::Epoch { stage: Stage::Frozen, epoch: 4 });
        assert_eq!(best.origin().to_string(), "stage 1, epoch 4");
    }

    #[test]
    fn test_tie_keeps_older_checkpoint() {
        let mut best = BestState::seed(vec![0.0_f32]);
        assert!(best.offer(0.8, Stage::Frozen, 1, || vec![1.0]));
        assert!(!best.offer(0.8, Stage::Unfrozen, 1, || vec![2.0]));
        assert_eq!(best.checkpoint(), &vec![1.0]);
    }

    #[test]
    fn test_zero_accuracy_never_replaces_seed() {
        let mut best = BestState::seed(vec![7.0_f32]);
        assert!(!best.offer(0.0, Stage::Frozen, 1, || vec![1.0]));
        assert_eq!(best.checkpoint(), &vec![7.0]);
        assert_eq!(best.origin().to_string(), "initial weights");
    }

    #[test]
    fn test_best_is_monotonic() {
        let mut best = BestState::seed(0_u32);
        let mut last = best.accuracy();
        for (i, acc) in [0.1, 0.4, 0.2, 0.4, 0.9, 0.3].into_iter().enumerate() {
            best.offer(acc, Stage::Unfrozen, i + 1, || i as u32);
            assert!(best.accuracy() >= last);
            last = best.accuracy();
        }
        assert_eq!(*best.checkpoint(), 4);
    }
}
