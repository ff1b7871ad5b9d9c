//! Class-weighted cross-entropy loss for classification.
//!
//! Combines log-softmax and negative log likelihood for numerical
//! stability, with per-class weights correcting class imbalance. The
//! analytic gradient with respect to the logits is returned alongside the
//! loss, so no graph machinery is required.

use crate::tensor::Tensor;

/// Cross-entropy loss with fixed per-class weights.
///
/// ```text
/// loss = Σ_b w[t_b] * (-log softmax(logits_b)[t_b]) / Σ_b w[t_b]
/// ```
///
/// The weighted-mean normalization matches the convention that a batch
/// full of minority-class samples produces the same loss scale as a
/// majority batch.
#[derive(Debug, Clone)]
pub struct WeightedCrossEntropy {
    weights: Vec<f32>,
}

impl WeightedCrossEntropy {
    /// Create the loss with one weight per class.
    ///
    /// # Panics
    ///
    /// Panics if `weights` is empty or contains a non-positive weight.
    #[must_use]
    pub fn new(weights: Vec<f32>) -> Self {
        assert!(!weights.is_empty(), "At least one class weight required");
        assert!(
            weights.iter().all(|&w| w > 0.0),
            "Class weights must be positive"
        );
        Self { weights }
    }

    /// Uniform weights over `n_classes` (no imbalance correction).
    #[must_use]
    pub fn unweighted(n_classes: usize) -> Self {
        Self::new(vec![1.0; n_classes])
    }

    /// Number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.weights.len()
    }

    /// Compute the scalar loss and its gradient w.r.t. the logits.
    ///
    /// # Arguments
    ///
    /// * `logits` - Raw model outputs, shape `[batch, n_classes]`
    /// * `targets` - Target class indices, length `batch`
    ///
    /// # Panics
    ///
    /// Panics on shape mismatch or an out-of-range target.
    #[must_use]
    pub fn loss_and_grad(&self, logits: &Tensor, targets: &[usize]) -> (f32, Tensor) {
        assert_eq!(logits.ndim(), 2, "Logits must be 2D [batch, classes]");
        let batch = logits.shape()[0];
        let n_classes = logits.shape()[1];
        assert_eq!(batch, targets.len(), "Batch sizes must match");
        assert_eq!(
            n_classes,
            self.weights.len(),
            "Logit width must match class-weight count"
        );

        let data = logits.data();
        let mut total = 0.0f32;
        let mut weight_sum = 0.0f32;
        let mut grad = vec![0.0f32; batch * n_classes];

        for (b, &target) in targets.iter().enumerate() {
            assert!(
                target < n_classes,
                "Target class {target} out of bounds for {n_classes} classes"
            );

            let row = &data[b * n_classes..(b + 1) * n_classes];
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp_sum: f32 = row.iter().map(|&v| (v - max).exp()).sum();
            let log_sum = exp_sum.ln() + max;

            let w = self.weights[target];
            total += w * (log_sum - row[target]);
            weight_sum += w;

            for c in 0..n_classes {
                let softmax = (row[c] - log_sum).exp();
                let indicator = if c == target { 1.0 } else { 0.0 };
                grad[b * n_classes + c] = w * (softmax - indicator);
            }
        }

        let loss = total / weight_sum;
        for g in &mut grad {
            *g /= weight_sum;
        }

        (loss, Tensor::new(&grad, &[batch, n_classes]))
    }
}

/// Predicted class index per row (argmax over logits).
#[must_use]
pub fn predictions(logits: &Tensor) -> Vec<usize> {
    let batch = logits.shape()[0];
    let n_classes = logits.shape()[1];
    let data = logits.data();

    (0..batch)
        .map(|b| {
            let row = &data[b * n_classes..(b + 1) * n_classes];
            row.iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_loss_matches_plain_cross_entropy() {
        let loss_fn = WeightedCrossEntropy::unweighted(2);
        let logits = Tensor::new(&[2.0, 0.0], &[1, 2]);
        let (loss, _) = loss_fn.loss_and_grad(&logits, &[0]);

        // -log(e^2 / (e^2 + e^0)) = log(1 + e^-2)
        let expected = (1.0 + (-2.0f32).exp()).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_confident_correct_prediction_has_low_loss() {
        let loss_fn = WeightedCrossEntropy::unweighted(2);
        let confident = Tensor::new(&[10.0, -10.0], &[1, 2]);
        let uncertain = Tensor::new(&[0.1, 0.0], &[1, 2]);

        let (low, _) = loss_fn.loss_and_grad(&confident, &[0]);
        let (high, _) = loss_fn.loss_and_grad(&uncertain, &[0]);
        assert!(low < high);
    }

    #[test]
    fn test_gradient_is_softmax_minus_onehot() {
        let loss_fn = WeightedCrossEntropy::unweighted(2);
        let logits = Tensor::new(&[0.0, 0.0], &[1, 2]);
        let (_, grad) = loss_fn.loss_and_grad(&logits, &[1]);

        // softmax = [0.5, 0.5], onehot = [0, 1]
        assert!((grad.data()[0] - 0.5).abs() < 1e-6);
        assert!((grad.data()[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_class_weights_rescale_loss() {
        let unweighted = WeightedCrossEntropy::unweighted(2);
        let weighted = WeightedCrossEntropy::new(vec![1.0, 3.0]);
        let logits = Tensor::new(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);

        // With weights the positive sample counts three times as much,
        // but the weighted mean re-normalizes by the weight sum.
        let (plain, _) = unweighted.loss_and_grad(&logits, &[0, 1]);
        let (scaled, _) = weighted.loss_and_grad(&logits, &[0, 1]);

        // Both samples have identical per-sample loss here, so the
        // weighted mean equals the plain mean.
        assert!((plain - scaled).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_mean_normalization() {
        let weighted = WeightedCrossEntropy::new(vec![1.0, 2.0]);
        let logits = Tensor::new(&[0.0, 0.0], &[1, 2]);

        // Single positive sample: normalization cancels the weight in the
        // loss but not in the gradient scale relative to a 2-sample batch.
        let (loss, grad) = weighted.loss_and_grad(&logits, &[1]);
        assert!((loss - (2.0f32).ln()).abs() < 1e-5);
        assert!((grad.data()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_finite_difference() {
        let loss_fn = WeightedCrossEntropy::new(vec![0.75, 1.5]);
        let base = [0.3f32, -0.2, 0.7, 0.1];
        let targets = [1usize, 0];

        let logits = Tensor::new(&base, &[2, 2]);
        let (_, grad) = loss_fn.loss_and_grad(&logits, &targets);

        let eps = 1e-3;
        for k in 0..base.len() {
            let mut up = base;
            up[k] += eps;
            let mut down = base;
            down[k] -= eps;

            let (l_up, _) = loss_fn.loss_and_grad(&Tensor::new(&up, &[2, 2]), &targets);
            let (l_down, _) = loss_fn.loss_and_grad(&Tensor::new(&down, &[2, 2]), &targets);
            let numeric = (l_up - l_down) / (2.0 * eps);

            assert!(
                (grad.data()[k] - numeric).abs() < 1e-3,
                "entry {k}: analytic {} vs numeric {numeric}",
                grad.data()[k]
            );
        }
    }

    #[test]
    fn test_predictions_argmax() {
        let logits = Tensor::new(&[0.1, 0.9, 2.0, -1.0], &[2, 2]);
        assert_eq!(predictions(&logits), vec![1, 0]);
    }

    #[test]
    #[should_panic(expected = "Class weights must be positive")]
    fn test_nonpositive_weight_panics() {
        let _ = WeightedCrossEntropy::new(vec![1.0, 0.0]);
    }
}
