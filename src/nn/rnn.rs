//! Recurrent unit applied to the pooled graph representation.
//!
//! The pooled vector is treated as a length-1 sequence: one LSTM step
//! from a zero initial hidden/cell state, whose final hidden state feeds
//! the classifier head. Gate layout follows Hochreiter & Schmidhuber
//! (1997):
//!
//! ```text
//! f_t = σ(W_if @ x_t + W_hf @ h_{t-1} + b_f)  // forget gate
//! i_t = σ(W_ii @ x_t + W_hi @ h_{t-1} + b_i)  // input gate
//! g_t = tanh(W_ig @ x_t + W_hg @ h_{t-1} + b_g)  // candidate cell
//! o_t = σ(W_io @ x_t + W_ho @ h_{t-1} + b_o)  // output gate
//! c_t = f_t * c_{t-1} + i_t * g_t
//! h_t = o_t * tanh(c_t)
//! ```
//!
//! With a single step and zero initial state, c_t reduces to i_t * g_t
//! and the recurrent weight matrices never influence the output; they are
//! still carried as parameters so the checkpoint layout matches the
//! architecture contract.

use super::linear::Linear;
use super::Module;
use crate::tensor::Tensor;

/// Single-layer LSTM evaluated for one timestep.
pub struct Lstm {
    input_size: usize,
    hidden_size: usize,
    // Gates: forget, input, cell, output
    w_if: Linear,
    w_hf: Linear,
    w_ii: Linear,
    w_hi: Linear,
    w_ig: Linear,
    w_hg: Linear,
    w_io: Linear,
    w_ho: Linear,
    cache: Option<StepCache>,
}

struct StepCache {
    i: Vec<f32>,
    g: Vec<f32>,
    o: Vec<f32>,
    tanh_c: Vec<f32>,
}

impl Lstm {
    /// Create a new LSTM with the given dimensions.
    #[must_use]
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self::with_seed(input_size, hidden_size, None)
    }

    /// Create an LSTM with a specific random seed.
    #[must_use]
    pub fn with_seed(input_size: usize, hidden_size: usize, seed: Option<u64>) -> Self {
        let offset = |k: u64| seed.map(|s| s.wrapping_add(k));
        Self {
            input_size,
            hidden_size,
            w_if: Linear::with_seed(input_size, hidden_size, offset(0)),
            w_hf: Linear::with_seed(hidden_size, hidden_size, offset(1)),
            w_ii: Linear::with_seed(input_size, hidden_size, offset(2)),
            w_hi: Linear::with_seed(hidden_size, hidden_size, offset(3)),
            w_ig: Linear::with_seed(input_size, hidden_size, offset(4)),
            w_hg: Linear::with_seed(hidden_size, hidden_size, offset(5)),
            w_io: Linear::with_seed(input_size, hidden_size, offset(6)),
            w_ho: Linear::with_seed(hidden_size, hidden_size, offset(7)),
            cache: None,
        }
    }

    /// Get the input dimension.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Get the hidden dimension.
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// One timestep from zero initial state; returns the hidden state.
    pub fn forward_step(&mut self, x: &Tensor) -> Tensor {
        let batch = x.shape()[0];
        let h0 = Tensor::zeros(&[batch, self.hidden_size]);

        // Forget gate participates in the forward pass but multiplies the
        // zero initial cell state, so it cannot affect the output.
        let _f = sigmoid(&add(
            &self.w_if.forward(x),
            &self.w_hf.forward(&h0),
        ));
        let i = sigmoid(&add(&self.w_ii.forward(x), &self.w_hi.forward(&h0)));
        let g = tanh(&add(&self.w_ig.forward(x), &self.w_hg.forward(&h0)));
        let o = sigmoid(&add(&self.w_io.forward(x), &self.w_ho.forward(&h0)));

        // c = f * c0 + i * g, with c0 = 0
        let c: Vec<f32> = i.iter().zip(g.iter()).map(|(a, b)| a * b).collect();
        let tanh_c: Vec<f32> = c.iter().map(|v| v.tanh()).collect();
        let h: Vec<f32> = o.iter().zip(tanh_c.iter()).map(|(a, b)| a * b).collect();

        self.cache = Some(StepCache { i, g, o, tanh_c });
        Tensor::new(&h, &[batch, self.hidden_size])
    }

    /// Backward through the step: accumulate gate gradients, return dL/dx.
    ///
    /// # Panics
    ///
    /// Panics if called before a forward pass.
    pub fn backward(&mut self, grad_h: &Tensor) -> Tensor {
        let cache = self
            .cache
            .take()
            .expect("Lstm::backward called before forward_step");
        let batch = grad_h.shape()[0];
        let dh = grad_h.data();

        let n = batch * self.hidden_size;
        let mut d_pre_o = vec![0.0f32; n];
        let mut d_pre_i = vec![0.0f32; n];
        let mut d_pre_g = vec![0.0f32; n];

        for idx in 0..n {
            let o = cache.o[idx];
            let i = cache.i[idx];
            let g = cache.g[idx];
            let tc = cache.tanh_c[idx];

            let d_o = dh[idx] * tc;
            let d_c = dh[idx] * o * (1.0 - tc * tc);
            let d_i = d_c * g;
            let d_g = d_c * i;

            d_pre_o[idx] = d_o * o * (1.0 - o);
            d_pre_i[idx] = d_i * i * (1.0 - i);
            d_pre_g[idx] = d_g * (1.0 - g * g);
        }

        let shape = [batch, self.hidden_size];
        let d_pre_o = Tensor::new(&d_pre_o, &shape);
        let d_pre_i = Tensor::new(&d_pre_i, &shape);
        let d_pre_g = Tensor::new(&d_pre_g, &shape);

        // The forget gate's pre-activation gradient is exactly zero
        // (d_c * c0), so w_if/w_hf receive none.
        let dx_o = self.w_io.backward(&d_pre_o);
        let dx_i = self.w_ii.backward(&d_pre_i);
        let dx_g = self.w_ig.backward(&d_pre_g);

        // Recurrent linears saw a zero input: their weight gradients are
        // zero but their biases still accumulate.
        let _ = self.w_ho.backward(&d_pre_o);
        let _ = self.w_hi.backward(&d_pre_i);
        let _ = self.w_hg.backward(&d_pre_g);

        let dx: Vec<f32> = dx_o
            .data()
            .iter()
            .zip(dx_i.data().iter())
            .zip(dx_g.data().iter())
            .map(|((a, b), c)| a + b + c)
            .collect();
        Tensor::new(&dx, &[batch, self.input_size])
    }
}

impl Module for Lstm {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut p = self.w_if.parameters();
        p.extend(self.w_hf.parameters());
        p.extend(self.w_ii.parameters());
        p.extend(self.w_hi.parameters());
        p.extend(self.w_ig.parameters());
        p.extend(self.w_hg.parameters());
        p.extend(self.w_io.parameters());
        p.extend(self.w_ho.parameters());
        p
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut p = self.w_if.parameters_mut();
        p.extend(self.w_hf.parameters_mut());
        p.extend(self.w_ii.parameters_mut());
        p.extend(self.w_hi.parameters_mut());
        p.extend(self.w_ig.parameters_mut());
        p.extend(self.w_hg.parameters_mut());
        p.extend(self.w_io.parameters_mut());
        p.extend(self.w_ho.parameters_mut());
        p
    }
}

impl std::fmt::Debug for Lstm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lstm")
            .field("input_size", &self.input_size)
            .field("hidden_size", &self.hidden_size)
            .finish_non_exhaustive()
    }
}

// Elementwise helpers over tensor data.
fn sigmoid(x: &Tensor) -> Vec<f32> {
    x.data().iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect()
}

fn tanh(x: &Tensor) -> Vec<f32> {
    x.data().iter().map(|&v| v.tanh()).collect()
}

fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data: Vec<f32> = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| x + y)
        .collect();
    Tensor::new(&data, a.shape())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lstm_creation() {
        let lstm = Lstm::with_seed(10, 20, Some(42));
        assert_eq!(lstm.input_size(), 10);
        assert_eq!(lstm.hidden_size(), 20);
    }

    #[test]
    fn test_lstm_forward_step_shape() {
        let mut lstm = Lstm::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[2, 4]);
        let h = lstm.forward_step(&x);
        assert_eq!(h.shape(), &[2, 8]);
    }

    #[test]
    fn test_lstm_hidden_state_bounded() {
        let mut lstm = Lstm::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[1, 4]);
        let h = lstm.forward_step(&x);

        // h = o * tanh(c) with o in (0,1) and tanh in (-1,1).
        for &val in h.data() {
            assert!((-1.0..=1.0).contains(&val), "Hidden state bounded");
        }
    }

    #[test]
    fn test_lstm_parameters() {
        let lstm = Lstm::with_seed(4, 8, Some(42));
        // 8 linear layers * 2 (weight + bias) = 16
        assert_eq!(lstm.parameters().len(), 16);
    }

    #[test]
    fn test_lstm_deterministic_with_seed() {
        let mut a = Lstm::with_seed(4, 8, Some(7));
        let mut b = Lstm::with_seed(4, 8, Some(7));
        let x = Tensor::ones(&[2, 4]);

        assert_eq!(a.forward_step(&x).data(), b.forward_step(&x).data());
    }

    #[test]
    fn test_lstm_backward_shape() {
        let mut lstm = Lstm::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[3, 4]);
        let _ = lstm.forward_step(&x);
        let dx = lstm.backward(&Tensor::ones(&[3, 8]));
        assert_eq!(dx.shape(), &[3, 4]);
    }

    #[test]
    fn test_lstm_forget_gate_gets_no_gradient() {
        let mut lstm = Lstm::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[2, 4]);
        let _ = lstm.forward_step(&x);
        let _ = lstm.backward(&Tensor::ones(&[2, 8]));

        // One step from zero cell state: nothing flows to the forget gate.
        assert!(lstm.w_if.parameters()[0].grad().is_none());
        // Input and output gates do receive gradients.
        assert!(lstm.w_ii.parameters()[0].grad().is_some());
        assert!(lstm.w_io.parameters()[0].grad().is_some());
    }

    #[test]
    fn test_lstm_input_weight_finite_difference() {
        let mut lstm = Lstm::with_seed(3, 2, Some(11));
        let x = Tensor::new(&[0.4, -0.3, 0.7], &[1, 3]);

        let _ = lstm.forward_step(&x);
        let _ = lstm.backward(&Tensor::ones(&[1, 2]));
        let analytic = lstm.w_ii.parameters()[0]
            .grad()
            .expect("input-gate grad")
            .data()[0];

        let eps = 1e-3;
        let base = lstm.w_ii.parameters()[0].data()[0];
        lstm.w_ii.parameters_mut()[0].data_mut()[0] = base + eps;
        let up: f32 = lstm.forward_step(&x).data().iter().sum();
        lstm.w_ii.parameters_mut()[0].data_mut()[0] = base - eps;
        let down: f32 = lstm.forward_step(&x).data().iter().sum();
        let numeric = (up - down) / (2.0 * eps);

        assert!(
            (analytic - numeric).abs() < 1e-2,
            "analytic {analytic} vs numeric {numeric}"
        );
    }
}
