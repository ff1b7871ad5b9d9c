//! The graph classifier: convolution stack, pooling, recurrent unit,
//! linear head.
//!
//! Architecture, in order: a stack of [`GraphConv`] layers each followed
//! by ReLU; dropout over the node embeddings; mean pooling per graph; the
//! pooled vector treated as a length-1 sequence through a single-step
//! [`Lstm`]; the final hidden state through a [`Linear`] head producing
//! per-class logits; dropout on the logits. The single-step recurrence is
//! part of the architecture contract even though one timestep carries no
//! sequence information.

use crate::dataset::Batch;
use crate::error::{CentinelaError, Result};
use crate::nn::{
    mean_pool, mean_pool_backward, Dropout, GraphConv, Linear, Lstm, Module,
};
use crate::tensor::Tensor;

/// Hyperparameters for [`GcnLstmClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// One-hot input width (vocabulary size)
    pub feature_dim: usize,
    /// Graph-convolution channel width
    pub hidden_dim: usize,
    /// LSTM hidden width
    pub lstm_hidden: usize,
    /// Number of graph-convolution layers
    pub num_layers: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Dropout probability (applied after the conv stack and the head)
    pub dropout: f32,
    /// Seed for weight initialization and dropout masks
    pub seed: Option<u64>,
}

impl ClassifierConfig {
    /// Defaults matching the reference run: 3 conv layers of width 512,
    /// LSTM width 256, dropout 0.2, binary output.
    #[must_use]
    pub fn new(feature_dim: usize) -> Self {
        Self {
            feature_dim,
            hidden_dim: 512,
            lstm_hidden: 256,
            num_layers: 3,
            num_classes: 2,
            dropout: 0.2,
            seed: None,
        }
    }

    /// Set the graph-convolution width.
    #[must_use]
    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    /// Set the LSTM width.
    #[must_use]
    pub fn with_lstm_hidden(mut self, lstm_hidden: usize) -> Self {
        self.lstm_hidden = lstm_hidden;
        self
    }

    /// Set the number of convolution layers.
    #[must_use]
    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    /// Set the dropout probability.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Set the initialization seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.feature_dim == 0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "feature_dim",
                self.feature_dim,
                ">= 1",
            ));
        }
        if self.num_layers == 0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "num_layers",
                self.num_layers,
                ">= 1",
            ));
        }
        if self.num_classes < 2 {
            return Err(CentinelaError::invalid_hyperparameter(
                "num_classes",
                self.num_classes,
                ">= 2",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(CentinelaError::invalid_hyperparameter(
                "dropout",
                self.dropout,
                "0 <= dropout < 1",
            ));
        }
        Ok(())
    }
}

/// Graph-convolutional classifier with a vestigial single-step LSTM.
pub struct GcnLstmClassifier {
    convs: Vec<GraphConv>,
    gcn_dropout: Dropout,
    lstm: Lstm,
    fc: Linear,
    fc_dropout: Dropout,
    training: bool,
    /// ReLU masks cached per conv layer during forward
    relu_masks: Vec<Vec<f32>>,
    /// Membership vector cached for the pooling backward
    cached_membership: Option<Vec<usize>>,
}

impl GcnLstmClassifier {
    /// Build the classifier from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CentinelaError::InvalidHyperparameter`] on a bad config.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;

        let offset = |k: u64| config.seed.map(|s| s.wrapping_add(k));

        let mut convs = Vec::with_capacity(config.num_layers);
        convs.push(GraphConv::with_seed(
            config.feature_dim,
            config.hidden_dim,
            offset(0),
        ));
        for layer in 1..config.num_layers {
            convs.push(GraphConv::with_seed(
                config.hidden_dim,
                config.hidden_dim,
                offset(layer as u64),
            ));
        }

        let dropout_seed = config.seed.unwrap_or(0);
        Ok(Self {
            convs,
            gcn_dropout: match config.seed {
                Some(_) => Dropout::with_seed(config.dropout, dropout_seed.wrapping_add(100)),
                None => Dropout::new(config.dropout),
            },
            lstm: Lstm::with_seed(config.hidden_dim, config.lstm_hidden, offset(200)),
            fc: Linear::with_seed(config.lstm_hidden, config.num_classes, offset(300)),
            fc_dropout: match config.seed {
                Some(_) => Dropout::with_seed(config.dropout, dropout_seed.wrapping_add(400)),
                None => Dropout::new(config.dropout),
            },
            training: true,
            relu_masks: Vec::new(),
            cached_membership: None,
        })
    }

    /// Forward pass over one batch, producing per-graph logits.
    pub fn forward(&mut self, batch: &Batch) -> Tensor {
        let mut h = batch.features.clone();

        self.relu_masks.clear();
        for conv in &mut self.convs {
            let pre = conv.forward(&h, &batch.edges);
            let mask: Vec<f32> = pre
                .data()
                .iter()
                .map(|&v| if v > 0.0 { 1.0 } else { 0.0 })
                .collect();
            let activated: Vec<f32> = pre
                .data()
                .iter()
                .zip(mask.iter())
                .map(|(&v, &m)| v * m)
                .collect();
            h = Tensor::new(&activated, pre.shape());
            self.relu_masks.push(mask);
        }

        let h = self.gcn_dropout.forward(&h);
        let pooled = mean_pool(&h, &batch.membership, batch.num_graphs());

        // Length-1 sequence: one recurrent step, final hidden state out.
        let hidden = self.lstm.forward_step(&pooled);
        let logits = self.fc.forward(&hidden);
        let out = self.fc_dropout.forward(&logits);

        self.cached_membership = Some(batch.membership.clone());
        out
    }

    /// Backward pass from the loss gradient over the logits.
    ///
    /// # Panics
    ///
    /// Panics if called before a forward pass.
    pub fn backward(&mut self, grad_logits: &Tensor) {
        let membership = self
            .cached_membership
            .take()
            .expect("GcnLstmClassifier::backward called before forward");

        let grad = self.fc_dropout.backward(grad_logits);
        let grad = self.fc.backward(&grad);
        let grad = self.lstm.backward(&grad);
        let grad = mean_pool_backward(&grad, &membership);
        let mut grad = self.gcn_dropout.backward(&grad);

        for (conv, mask) in self
            .convs
            .iter_mut()
            .rev()
            .zip(self.relu_masks.iter().rev())
        {
            let gated: Vec<f32> = grad
                .data()
                .iter()
                .zip(mask.iter())
                .map(|(&g, &m)| g * m)
                .collect();
            grad = conv.backward(&Tensor::new(&gated, grad.shape()));
        }
    }

    /// Number of convolution layers.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.convs.len()
    }
}

impl Module for GcnLstmClassifier {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        for conv in &self.convs {
            params.extend(conv.parameters());
        }
        params.extend(self.lstm.parameters());
        params.extend(self.fc.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        for conv in &mut self.convs {
            params.extend(conv.parameters_mut());
        }
        params.extend(self.lstm.parameters_mut());
        params.extend(self.fc.parameters_mut());
        params
    }

    fn train(&mut self) {
        self.training = true;
        self.gcn_dropout.train();
        self.fc_dropout.train();
    }

    fn eval(&mut self) {
        self.training = false;
        self.gcn_dropout.eval();
        self.fc_dropout.eval();
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for GcnLstmClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcnLstmClassifier")
            .field("num_layers", &self.convs.len())
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, GraphCollection};
    use crate::syntax::SyntaxNode;
    use crate::vocab::Vocabulary;

    fn tiny_config(feature_dim: usize) -> ClassifierConfig {
        ClassifierConfig::new(feature_dim)
            .with_hidden_dim(8)
            .with_lstm_hidden(4)
            .with_dropout(0.0)
            .with_seed(42)
    }

    fn sample_batch() -> Batch {
        let tree = SyntaxNode::new("FuncDef")
            .with_child(SyntaxNode::new("Decl"))
            .with_child(SyntaxNode::new("Return"));
        let vocab = Vocabulary::build([&tree]).expect("non-empty corpus");
        let graphs = vec![
            Graph::from_tree(&tree, &vocab, 0).expect("known kinds"),
            Graph::from_tree(&tree, &vocab, 1).expect("known kinds"),
        ];
        let mut collection = GraphCollection::new(vocab.len());
        for g in graphs {
            collection.push(g);
        }
        let refs: Vec<&Graph> = collection.graphs().iter().collect();
        Batch::from_graphs(&refs, collection.feature_dim())
    }

    #[test]
    fn test_forward_shape() {
        let batch = sample_batch();
        let mut model = GcnLstmClassifier::new(&tiny_config(3)).expect("valid config");

        let logits = model.forward(&batch);
        assert_eq!(logits.shape(), &[2, 2]);
        assert!(logits.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forward_deterministic_in_eval_mode() {
        let batch = sample_batch();
        let mut model = GcnLstmClassifier::new(&tiny_config(3)).expect("valid config");
        model.eval();

        let a = model.forward(&batch).data().to_vec();
        let b = model.forward(&batch).data().to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn test_backward_populates_gradients() {
        let batch = sample_batch();
        let mut model = GcnLstmClassifier::new(&tiny_config(3)).expect("valid config");

        let logits = model.forward(&batch);
        model.backward(&Tensor::ones(logits.shape()));

        // Conv and head weights must all have gradients.
        let grads_present = model
            .parameters()
            .iter()
            .filter(|p| p.grad().is_some())
            .count();
        assert!(grads_present > 0);
        // First conv weight specifically.
        assert!(model.convs[0].parameters()[0].grad().is_some());
        assert!(model.fc.parameters()[0].grad().is_some());
    }

    #[test]
    fn test_parameter_count_stable_order() {
        let model = GcnLstmClassifier::new(&tiny_config(3)).expect("valid config");
        // 3 convs * 2 + lstm 16 + fc 2
        assert_eq!(model.parameters().len(), 3 * 2 + 16 + 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(GcnLstmClassifier::new(&ClassifierConfig::new(0)).is_err());
        assert!(
            GcnLstmClassifier::new(&ClassifierConfig::new(4).with_num_layers(0)).is_err()
        );
        assert!(
            GcnLstmClassifier::new(&ClassifierConfig::new(4).with_dropout(1.0)).is_err()
        );
    }

    #[test]
    fn test_single_node_graph_batch() {
        let tree = SyntaxNode::new("FileAST");
        let vocab = Vocabulary::build([&tree]).expect("non-empty corpus");
        let graph = Graph::from_tree(&tree, &vocab, 1).expect("known kinds");
        let batch = Batch::from_graphs(&[&graph], vocab.len());

        let mut model = GcnLstmClassifier::new(&tiny_config(1)).expect("valid config");
        let logits = model.forward(&batch);

        assert_eq!(logits.shape(), &[1, 2]);
        assert!(logits.data().iter().all(|v| v.is_finite()));
    }
}
