// ============================================================
// Layer 5 — Plateau Learning-Rate Scheduler
// ============================================================
// Burn's optimizers take the learning rate as an argument to
// every `step`, and Burn's built-in schedulers advance on a
// fixed timetable. Fine-tuning here needs a metric-driven
// policy instead: lower the rate when the monitored number
// stops getting better.
//
// Rules (same as PyTorch's ReduceLROnPlateau with rel threshold):
//
//   better(a, best) =  a > best·(1 + threshold)   in Max mode
//                      a < best·(1 − threshold)   in Min mode
//
//   better      → best = a, bad_epochs = 0
//   not better  → bad_epochs += 1
//   in cooldown → cooldown_left −= 1, bad_epochs = 0
//   bad_epochs > patience
//               → lr = max(lr·factor, min_lr),
//                 cooldown_left = cooldown, bad_epochs = 0
//
// The first observed value is always "better".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    /// The metric should go up (accuracy).
    Max,
    /// The metric should go down (loss).
    Min,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    pub mode:      PlateauMode,
    pub factor:    f64,
    pub patience:  usize,
    pub threshold: f64,
    pub cooldown:  usize,
    pub min_lr:    f64,
}

impl PlateauConfig {
    pub fn new(mode: PlateauMode, factor: f64, patience: usize) -> Self {
        Self { mode, factor, patience, threshold: 1e-4, cooldown: 0, min_lr: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    config:        PlateauConfig,
    lr:            f64,
    best:          Option<f64>,
    bad_epochs:    usize,
    cooldown_left: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(initial_lr: f64, config: PlateauConfig) -> Self {
        Self { config, lr: initial_lr, best: None, bad_epochs: 0, cooldown_left: 0 }
    }

    /// Learning rate to use for the next optimizer steps.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed one epoch's metric. Returns the new learning rate if it was reduced.
    pub fn step(&mut self, metric: f64) -> Option<f64> {
        if self.is_better(metric) {
            self.best       = Some(metric);
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
            self.bad_epochs = 0;
        }

        if self.bad_epochs <= self.config.patience {
            return None;
        }

        self.bad_epochs    = 0;
        self.cooldown_left = self.config.cooldown;

        let reduced = (self.lr * self.config.factor).max(self.config.min_lr);
        if self.lr - reduced > 1e-12 {
            tracing::info!("Reducing learning rate {:.3e} -> {:.3e}", self.lr, reduced);
            self.lr = reduced;
            Some(reduced)
        } else {
            None
        }
    }

    fn is_better(&self, metric: f64) -> bool {
        let Some(best) = self.best else {
            return true;
        };
        match self.config.mode {
            PlateauMode::Max => metric > best * (1.0 + self.config.threshold),
            PlateauMode::Min => metric < best * (1.0 - self.config.threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_mode_halves_after_patience() {
        let mut s = ReduceLrOnPlateau::new(1e-3, PlateauConfig::new(PlateauMode::Max, 0.5, 2));
        assert_eq!(s.step(50.0), None); // first value is best
        assert_eq!(s.step(60.0), None); // improved
        assert_eq!(s.step(60.0), None); // bad 1
        assert_eq!(s.step(59.0), None); // bad 2
        assert_eq!(s.step(58.0), Some(5e-4)); // bad 3 > patience
        assert_eq!(s.lr(), 5e-4);
        // Counter restarts after a reduction.
        assert_eq!(s.step(58.0), None);
        assert_eq!(s.step(58.0), None);
        assert_eq!(s.lr(), 5e-4);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut s = ReduceLrOnPlateau::new(1.0, PlateauConfig::new(PlateauMode::Max, 0.1, 1));
        s.step(10.0);
        s.step(9.0);          // bad 1
        s.step(11.0);         // better
        assert_eq!(s.step(11.0), None); // bad 1
        assert!(s.step(10.0).is_some()); // bad 2
        assert!((s.lr() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_min_mode() {
        let mut s = ReduceLrOnPlateau::new(1.0, PlateauConfig::new(PlateauMode::Min, 0.5, 0));
        s.step(1.0);
        assert_eq!(s.step(0.5), None);
        assert_eq!(s.step(0.6), Some(0.5));
    }

    #[test]
    fn test_threshold_ignores_tiny_gains() {
        let mut s = ReduceLrOnPlateau::new(1.0, PlateauConfig::new(PlateauMode::Max, 0.5, 0));
        s.step(100.0);
        // 100.005 is within the 1e-4 relative threshold of 100.0.
        assert_eq!(s.step(100.005), Some(0.5));
    }

    #[test]
    fn test_min_lr_floor() {
        let mut cfg = PlateauConfig::new(PlateauMode::Max, 0.1, 0);
        cfg.min_lr = 0.05;
        let mut s = ReduceLrOnPlateau::new(0.1, cfg);
        s.step(1.0);
        assert_eq!(s.step(1.0), Some(0.05));
        // Already at the floor: no further change is reported.
        assert_eq!(s.step(1.0), None);
        assert_eq!(s.lr(), 0.05);
    }

    #[test]
    fn test_cooldown_suspends_counting() {
        let mut cfg = PlateauConfig::new(PlateauMode::Max, 0.5, 0);
        cfg.cooldown = 2;
        let mut s = ReduceLrOnPlateau::new(1.0, cfg);
        s.step(1.0);
        assert_eq!(s.step(1.0), Some(0.5));
        assert_eq!(s.step(1.0), None); // cooldown 2 -> 1
        assert_eq!(s.step(1.0), None); // cooldown 1 -> 0
        assert_eq!(s.step(1.0), Some(0.25));
    }
}
