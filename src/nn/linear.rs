//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b with an explicit backward
//! pass. Weight initialization follows Xavier/Glorot (Glorot & Bengio,
//! 2010).

use super::init::{xavier_uniform, zeros};
use super::Module;
use crate::tensor::Tensor;

/// Fully connected layer: y = xW^T + b
///
/// # Shape
///
/// - Input: `(batch, in_features)`
/// - Output: `(batch, out_features)`
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Tensor,

    /// Bias vector, shape: [out_features]
    bias: Tensor,

    /// Number of input features
    in_features: usize,

    /// Number of output features
    out_features: usize,

    /// Input cached by the last forward pass, consumed by backward
    cached_input: Option<Tensor>,
}

impl Linear {
    /// Create a new Linear layer with Xavier initialization.
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Create a Linear layer with a specific random seed.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let weight = xavier_uniform(&[out_features, in_features], in_features, out_features, seed);
        let bias = zeros(&[out_features]);

        Self {
            weight,
            bias,
            in_features,
            out_features,
            cached_input: None,
        }
    }

    /// Get the input feature dimension.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Get the output feature dimension.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Get reference to the weight tensor.
    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Get reference to the bias tensor.
    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Forward pass, caching the input for backward.
    ///
    /// # Panics
    ///
    /// Panics if the input's second dimension doesn't match `in_features`.
    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(input.ndim(), 2, "Linear expects 2D input [batch, features]");
        let batch = input.shape()[0];
        assert_eq!(
            input.shape()[1],
            self.in_features,
            "Expected {} input features, got {}",
            self.in_features,
            input.shape()[1]
        );

        let x = input.data();
        let w = self.weight.data();
        let b = self.bias.data();

        let mut out = vec![0.0f32; batch * self.out_features];
        for row in 0..batch {
            for o in 0..self.out_features {
                let mut sum = b[o];
                for i in 0..self.in_features {
                    sum += x[row * self.in_features + i] * w[o * self.in_features + i];
                }
                out[row * self.out_features + o] = sum;
            }
        }

        self.cached_input = Some(input.clone());
        Tensor::new(&out, &[batch, self.out_features])
    }

    /// Backward pass: accumulate dW and db, return dL/dx.
    ///
    /// # Panics
    ///
    /// Panics if called before a forward pass.
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let input = self
            .cached_input
            .as_ref()
            .expect("Linear::backward called before forward");
        let batch = input.shape()[0];
        assert_eq!(grad_output.shape(), &[batch, self.out_features]);

        let x = input.data();
        let g = grad_output.data();

        let mut grad_w = vec![0.0f32; self.out_features * self.in_features];
        let mut grad_b = vec![0.0f32; self.out_features];
        for row in 0..batch {
            for o in 0..self.out_features {
                let g_ro = g[row * self.out_features + o];
                grad_b[o] += g_ro;
                for i in 0..self.in_features {
                    grad_w[o * self.in_features + i] += g_ro * x[row * self.in_features + i];
                }
            }
        }

        let w = self.weight.data();
        let mut grad_x = vec![0.0f32; batch * self.in_features];
        for row in 0..batch {
            for i in 0..self.in_features {
                let mut sum = 0.0;
                for o in 0..self.out_features {
                    sum += g[row * self.out_features + o] * w[o * self.in_features + i];
                }
                grad_x[row * self.in_features + i] = sum;
            }
        }

        self.weight.accumulate_grad(Tensor::new(
            &grad_w,
            &[self.out_features, self.in_features],
        ));
        self.bias
            .accumulate_grad(Tensor::new(&grad_b, &[self.out_features]));

        Tensor::new(&grad_x, &[batch, self.in_features])
    }
}

impl Module for Linear {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_forward_shape() {
        let mut layer = Linear::with_seed(4, 3, Some(42));
        let x = Tensor::ones(&[2, 4]);
        let y = layer.forward(&x);
        assert_eq!(y.shape(), &[2, 3]);
    }

    #[test]
    fn test_linear_known_values() {
        let mut layer = Linear::with_seed(2, 1, Some(0));
        // Overwrite with known weights: y = 2*x0 + 3*x1 + 1
        layer.weight.data_mut().copy_from_slice(&[2.0, 3.0]);
        layer.bias.data_mut().copy_from_slice(&[1.0]);

        let x = Tensor::new(&[1.0, 1.0, 0.5, 2.0], &[2, 2]);
        let y = layer.forward(&x);

        assert!((y.data()[0] - 6.0).abs() < 1e-6);
        assert!((y.data()[1] - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_linear_backward_gradients() {
        let mut layer = Linear::with_seed(2, 1, Some(0));
        layer.weight.data_mut().copy_from_slice(&[2.0, 3.0]);
        layer.bias.data_mut().copy_from_slice(&[0.0]);

        let x = Tensor::new(&[1.0, 2.0], &[1, 2]);
        let _ = layer.forward(&x);
        let grad_x = layer.backward(&Tensor::new(&[1.0], &[1, 1]));

        // dW = g^T x = [1, 2]; db = 1; dx = g W = [2, 3]
        let grad_w = layer.weight.grad().expect("weight grad set");
        assert_eq!(grad_w.data(), &[1.0, 2.0]);
        let grad_b = layer.bias.grad().expect("bias grad set");
        assert_eq!(grad_b.data(), &[1.0]);
        assert_eq!(grad_x.data(), &[2.0, 3.0]);
    }

    #[test]
    fn test_linear_backward_accumulates_over_batch() {
        let mut layer = Linear::with_seed(1, 1, Some(0));
        layer.weight.data_mut().copy_from_slice(&[1.0]);

        let x = Tensor::new(&[1.0, 2.0, 3.0], &[3, 1]);
        let _ = layer.forward(&x);
        let _ = layer.backward(&Tensor::new(&[1.0, 1.0, 1.0], &[3, 1]));

        let grad_w = layer.weight.grad().expect("weight grad set");
        assert_eq!(grad_w.data(), &[6.0]);
        let grad_b = layer.bias.grad().expect("bias grad set");
        assert_eq!(grad_b.data(), &[3.0]);
    }

    #[test]
    fn test_linear_finite_difference() {
        let mut layer = Linear::with_seed(3, 2, Some(7));
        let x = Tensor::new(&[0.3, -0.5, 0.8], &[1, 3]);

        // Analytic gradient of sum(y) w.r.t. weight[0].
        let _ = layer.forward(&x);
        let _ = layer.backward(&Tensor::ones(&[1, 2]));
        let analytic = layer.weight.grad().expect("weight grad set").data()[0];

        // Central finite difference on the same entry.
        let eps = 1e-3;
        let base = layer.weight.data()[0];
        layer.weight.data_mut()[0] = base + eps;
        let up: f32 = layer.forward(&x).data().iter().sum();
        layer.weight.data_mut()[0] = base - eps;
        let down: f32 = layer.forward(&x).data().iter().sum();
        let numeric = (up - down) / (2.0 * eps);

        assert!(
            (analytic - numeric).abs() < 1e-2,
            "analytic {analytic} vs numeric {numeric}"
        );
    }

    #[test]
    fn test_linear_parameters() {
        let layer = Linear::with_seed(4, 3, Some(1));
        assert_eq!(layer.parameters().len(), 2);
    }
}
