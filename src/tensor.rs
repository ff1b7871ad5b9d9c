//! Dense f32 tensor with an explicit gradient slot.
//!
//! Layers compute gradients through explicit per-layer `backward` calls
//! and deposit them here via [`Tensor::accumulate_grad`]; there is no
//! process-wide computation graph. Optimizers read the slot through
//! [`Tensor::grad`] and clear it with [`Tensor::zero_grad_`].

use std::fmt;

/// A tensor holding row-major f32 data and an optional gradient.
///
/// # Design
///
/// The tensor stores:
/// - `data`: the numerical values
/// - `shape`: dimensions of the tensor
/// - `grad`: accumulated gradient, populated by layer backward passes
#[derive(Clone)]
pub struct Tensor {
    /// Underlying data storage
    data: Vec<f32>,

    /// Shape of the tensor
    shape: Vec<usize>,

    /// Gradient (populated during the backward pass)
    grad: Option<Box<Tensor>>,
}

impl Tensor {
    /// Create a new tensor from a slice with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data: data.to_vec(),
            shape: shape.to_vec(),
            grad: None,
        }
    }

    /// Create a tensor from a 1D slice (vector).
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Create a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![0.0; len], shape)
    }

    /// Create a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![1.0; len], shape)
    }

    /// Get the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Get the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get a reference to the underlying data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get a mutable reference to the underlying data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Get the gradient tensor (if computed).
    #[must_use]
    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_deref()
    }

    /// Get mutable access to the gradient tensor (if computed).
    pub fn grad_mut(&mut self) -> Option<&mut Tensor> {
        self.grad.as_deref_mut()
    }

    /// Zero out the gradient.
    pub fn zero_grad_(&mut self) {
        self.grad = None;
    }

    /// Accumulate a gradient into this tensor's slot.
    ///
    /// Adds element-wise when a gradient is already present.
    ///
    /// # Panics
    ///
    /// Panics if the gradient shape doesn't match the tensor shape.
    pub fn accumulate_grad(&mut self, grad: Tensor) {
        assert_eq!(
            grad.shape(),
            self.shape(),
            "Gradient shape {:?} doesn't match parameter shape {:?}",
            grad.shape(),
            self.shape()
        );
        match &mut self.grad {
            Some(existing) => {
                for (e, g) in existing.data.iter_mut().zip(grad.data.iter()) {
                    *e += g;
                }
            }
            None => {
                self.grad = Some(Box::new(grad));
            }
        }
    }

    /// Get a scalar value (for 1-element tensors).
    ///
    /// # Panics
    ///
    /// Panics if the tensor has more than one element.
    #[must_use]
    pub fn item(&self) -> f32 {
        assert_eq!(
            self.numel(),
            1,
            "item() only works on tensors with exactly 1 element, got {}",
            self.numel()
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("has_grad", &self.grad.is_some())
            .finish_non_exhaustive()
    }
}
