//! Neural network building blocks for the graph classifier.
//!
//! The module is organized around the [`Module`] trait, which exposes a
//! layer's parameters to the optimizer and the checkpoint serializer:
//!
//! - **Layers**: [`Linear`], [`GraphConv`], [`Lstm`]
//! - **Pooling**: [`mean_pool`] / [`mean_pool_backward`]
//! - **Regularization**: [`Dropout`]
//! - **Loss**: [`WeightedCrossEntropy`]
//! - **Optimization**: [`Adam`], [`clip_grad_norm`], [`ReduceLROnPlateau`]
//! - **Persistence**: [`serialize::state_dict`], [`serialize::save_model`]
//!
//! Each layer pairs its forward pass with an explicit `backward` method
//! that consumes the gradient of its output and returns the gradient of
//! its input, accumulating parameter gradients along the way. Forward
//! passes cache what backward needs, so training calls take `&mut self`.
//!
//! # References
//!
//! - Kipf, T. N., & Welling, M. (2017). Semi-Supervised Classification
//!   with Graph Convolutional Networks. ICLR.
//! - Hochreiter, S., & Schmidhuber, J. (1997). Long Short-Term Memory.
//!   Neural Computation.
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic
//!   optimization. ICLR.

mod dropout;
mod gcn;
pub mod init;
mod linear;
mod loss;
mod optim;
mod rnn;
mod scheduler;
pub mod serialize;

pub use dropout::Dropout;
pub use gcn::{mean_pool, mean_pool_backward, GraphConv};
pub use linear::Linear;
pub use loss::{predictions, WeightedCrossEntropy};
pub use optim::{clip_grad_norm, Adam, Optimizer};
pub use rnn::Lstm;
pub use scheduler::{PlateauMode, ReduceLROnPlateau};

use crate::tensor::Tensor;

/// Common interface for all trainable layers.
pub trait Module {
    /// All parameter tensors, in a stable order.
    fn parameters(&self) -> Vec<&Tensor>;

    /// Mutable access to the parameter tensors, in the same order.
    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    /// Switch to training mode.
    fn train(&mut self) {}

    /// Switch to evaluation mode.
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        true
    }

    /// Clear every parameter's gradient slot.
    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad_();
        }
    }
}
