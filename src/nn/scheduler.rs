//! Learning-rate scheduling.
//!
//! Plateau-based adjustment: when the monitored metric stops improving
//! for a set number of epochs, the learning rate is multiplied by a
//! reduction factor.

use super::optim::Optimizer;

/// Direction in which the monitored metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateauMode {
    /// Lower is better (e.g. validation loss)
    Min,
    /// Higher is better (e.g. validation F1)
    Max,
}

/// Reduce the learning rate when a metric has stopped improving.
#[derive(Debug)]
pub struct ReduceLROnPlateau {
    mode: PlateauMode,
    factor: f32,
    patience: usize,
    best: Option<f32>,
    num_bad_epochs: usize,
}

impl ReduceLROnPlateau {
    /// Create a scheduler.
    ///
    /// # Arguments
    ///
    /// * `mode` - Whether the metric should decrease or increase
    /// * `factor` - Multiplier applied to the learning rate on plateau
    /// * `patience` - Number of non-improving epochs tolerated
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not in (0, 1).
    #[must_use]
    pub fn new(mode: PlateauMode, factor: f32, patience: usize) -> Self {
        assert!(
            factor > 0.0 && factor < 1.0,
            "Reduction factor must be in (0, 1), got {factor}"
        );
        Self {
            mode,
            factor,
            patience,
            best: None,
            num_bad_epochs: 0,
        }
    }

    /// Record one epoch's metric and adjust the optimizer if plateaued.
    pub fn step_with_metric<O: Optimizer>(&mut self, optimizer: &mut O, metric: f32) {
        let improved = match self.best {
            None => true,
            Some(best) => match self.mode {
                PlateauMode::Min => metric < best,
                PlateauMode::Max => metric > best,
            },
        };

        if improved {
            self.best = Some(metric);
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
            if self.num_bad_epochs >= self.patience {
                optimizer.set_lr(optimizer.lr() * self.factor);
                self.num_bad_epochs = 0;
            }
        }
    }

    /// Best metric value seen so far.
    #[must_use]
    pub fn best(&self) -> Option<f32> {
        self.best
    }
}
