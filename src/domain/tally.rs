// ============================================================
// Layer 3 — Phase Tally
// ============================================================
// Accumulates what one phase of one epoch observed:
//
//   running_loss    = Σ (mean batch loss × batch size)
//   running_correct = Σ correct predictions
//
// and reduces it to the epoch numbers at the end:
//
//   loss     = running_loss    / example_count
//   accuracy = running_correct / example_count
//
// example_count is the phase's dataset size, passed in by the
// caller, not the number of items seen. With a count of zero
// both numbers are reported as 0.0.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTally {
    pub running_loss:    f64,
    pub running_correct: usize,
}

/// Reduced result of one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseOutcome {
    pub loss:     f64,
    pub accuracy: f64,
}

impl PhaseOutcome {
    /// Accuracy on the 0–100 scale used by the plateau scheduler and console.
    pub fn accuracy_percent(&self) -> f64 {
        100.0 * self.accuracy
    }
}

impl PhaseTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch: its mean loss, its size, and how many it got right.
    pub fn add_batch(&mut self, mean_loss: f64, batch_size: usize, correct: usize) {
        self.running_loss    += mean_loss * batch_size as f64;
        self.running_correct += correct;
    }

    pub fn finish(&self, example_count: usize) -> PhaseOutcome {
        if example_count == 0 {
            return PhaseOutcome { loss: 0.0, accuracy: 0.0 };
        }
        PhaseOutcome {
            loss:     self.running_loss / example_count as f64,
            accuracy: self.running_correct as f64 / example_count as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_by_batch_size() {
        let mut t = PhaseTally::new();
        t.add_batch(1.0, 5, 4);
        t.add_batch(0.5, 3, 3);
        let out = t.finish(8);
        // (1.0*5 + 0.5*3) / 8
        assert!((out.loss - 6.5 / 8.0).abs() < 1e-12);
        assert!((out.accuracy - 7.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_phase() {
        let out = PhaseTally::new().finish(0);
        assert_eq!(out.loss, 0.0);
        assert_eq!(out.accuracy, 0.0);
    }

    #[test]
    fn test_accuracy_stays_in_unit_range() {
        let mut t = PhaseTally::new();
        t.add_batch(0.2, 4, 4);
        let out = t.finish(4);
        assert!((0.0..=1.0).contains(&out.accuracy));
        assert!(out.loss >= 0.0);
        assert_eq!(out.accuracy_percent(), 100.0);
    }
}
