//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use centinela::prelude::*;
//! ```

pub use crate::dataset::{class_weights, stratified_split, Batch, BatchLoader};
pub use crate::error::{CentinelaError, Result};
pub use crate::graph::{Graph, GraphCollection};
pub use crate::metrics::EpochMetrics;
pub use crate::model::{ClassifierConfig, GcnLstmClassifier};
pub use crate::nn::{Module, WeightedCrossEntropy};
pub use crate::syntax::{clean_source, parse_samples, SourceParser, SyntaxNode};
pub use crate::tensor::Tensor;
pub use crate::train::{evaluate, StopReason, Trainer, TrainerConfig, TrainingState};
pub use crate::vocab::Vocabulary;
