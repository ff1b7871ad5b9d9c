//! Dropout regularization.
//!
//! Randomly zeroes elements during training to prevent co-adaptation;
//! the output is scaled by `1/(1-p)` so expected values are preserved
//! (inverted dropout). During evaluation the input passes through
//! unchanged.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent
//!   neural networks from overfitting. JMLR.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Module;
use crate::tensor::Tensor;

/// Dropout layer with a cached mask for the backward pass.
pub struct Dropout {
    /// Probability of an element being zeroed
    p: f32,

    /// Whether in training mode
    training: bool,

    /// Random number generator
    rng: StdRng,

    /// Per-element multiplier (0 or scale) from the last training forward
    mask: Option<Vec<f32>>,
}

impl Dropout {
    /// Create a new Dropout layer.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn new(p: f32) -> Self {
        assert!(
            (0.0..1.0).contains(&p),
            "Dropout probability must be in [0, 1), got {p}",
        );

        Self {
            p,
            training: true,
            rng: StdRng::from_entropy(),
            mask: None,
        }
    }

    /// Create a Dropout layer with a specific seed for reproducibility.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn with_seed(p: f32, seed: u64) -> Self {
        assert!(
            (0.0..1.0).contains(&p),
            "Dropout probability must be in [0, 1), got {p}",
        );

        Self {
            p,
            training: true,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        }
    }

    /// Get the dropout probability.
    #[must_use]
    pub fn probability(&self) -> f32 {
        self.p
    }

    /// Forward pass; draws and caches a fresh mask in training mode.
    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            self.mask = None;
            return input.clone();
        }

        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = (0..input.numel())
            .map(|_| if self.rng.gen::<f32>() < self.p { 0.0 } else { scale })
            .collect();

        let data: Vec<f32> = input
            .data()
            .iter()
            .zip(mask.iter())
            .map(|(&x, &m)| x * m)
            .collect();

        self.mask = Some(mask);
        Tensor::new(&data, input.shape())
    }

    /// Backward pass: apply the cached mask to the incoming gradient.
    #[must_use]
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        match self.mask.take() {
            Some(mask) => {
                let data: Vec<f32> = grad_output
                    .data()
                    .iter()
                    .zip(mask.iter())
                    .map(|(&g, &m)| g * m)
                    .collect();
                Tensor::new(&data, grad_output.shape())
            }
            // Eval-mode (or p = 0) forward was an identity.
            None => grad_output.clone(),
        }
    }
}

impl Module for Dropout {
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("p", &self.p)
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}
