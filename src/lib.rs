//! Centinela: graph-based vulnerability classification for parsed source
//! code, in pure Rust.
//!
//! Labeled source samples are cleaned, handed to an external parser, and
//! turned into graphs of their syntax (one node per tree node, edges from
//! parent to child, one-hot node-kind features over a corpus-wide
//! vocabulary). A stacked graph-convolution classifier is then trained on
//! the graph collection with class-imbalance correction, gradient
//! clipping, early stopping on validation F1, plateau learning-rate
//! scheduling, and best-model checkpointing.
//!
//! # Pipeline
//!
//! ```text
//! source text -> clean_source -> SourceParser -> SyntaxNode trees
//!   -> Vocabulary (corpus-wide pass) -> Graph per sample
//!   -> GraphCollection -> stratified_split -> class_weights
//!   -> BatchLoader -> GcnLstmClassifier <-> Trainer -> EpochMetrics
//! ```
//!
//! # Quick Start
//!
//! ```
//! use centinela::prelude::*;
//!
//! // Trees normally come from the external parser.
//! let tree = SyntaxNode::new("FuncDef").with_child(SyntaxNode::new("Return"));
//! let trees: Vec<(SyntaxNode, usize)> =
//!     (0..8usize).map(|i| (tree.clone(), i % 2)).collect();
//!
//! let vocab = Vocabulary::build(trees.iter().map(|(t, _)| t)).unwrap();
//! let collection = GraphCollection::from_trees(&trees, &vocab).unwrap();
//! let (train, val) = stratified_split(&collection, 0.25, 42).unwrap();
//!
//! assert_eq!(train.len() + val.len(), collection.len());
//! let weights = class_weights(&train.labels(), 2).unwrap();
//! assert!(weights.iter().all(|&w| w > 0.0));
//! ```
//!
//! # Modules
//!
//! - [`syntax`]: `SyntaxNode`, the parser boundary, source cleaning
//! - [`vocab`]: corpus-wide node-kind vocabulary
//! - [`graph`]: tree-to-graph conversion and the labeled collection
//! - [`dataset`]: stratified splitting, class weights, batching
//! - [`tensor`]: dense f32 tensor with explicit gradients
//! - [`nn`]: layers, loss, optimizer, scheduler, serialization
//! - [`model`]: the graph-convolution + LSTM classifier
//! - [`train`]: the training loop controller
//! - [`metrics`]: accuracy, precision, recall, F1
//! - [`error`]: crate-wide error type

pub mod dataset;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod model;
pub mod nn;
pub mod prelude;
pub mod serialization;
pub mod syntax;
pub mod tensor;
pub mod train;
pub mod vocab;

pub use error::{CentinelaError, Result};
pub use graph::{Graph, GraphCollection};
pub use syntax::SyntaxNode;
pub use tensor::Tensor;
pub use vocab::Vocabulary;
