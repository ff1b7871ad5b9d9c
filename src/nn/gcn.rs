//! Graph convolution layer and graph-level pooling.
//!
//! The convolution follows Kipf & Welling (2017): neighbor features are
//! aggregated with symmetric degree normalization and self-loops, then
//! linearly transformed. Edges are treated as undirected for message
//! passing, which makes the aggregation operator symmetric; the backward
//! pass exploits that by pushing gradients through the same operator.

use super::linear::Linear;
use super::Module;
use crate::graph::EdgeIndex;
use crate::tensor::Tensor;

/// Graph Convolutional Network layer.
///
/// ```text
/// h_i' = W * (Σ_j (1/√(d_i d_j)) h_j) + b
/// ```
///
/// where the sum runs over neighbors of i plus i itself (self-loop), and
/// d is the self-loop-inclusive degree.
pub struct GraphConv {
    /// Linear transformation applied after aggregation
    linear: Linear,
    /// Input feature dimension
    in_features: usize,
    /// Output feature dimension
    out_features: usize,
    /// Normalization coefficients cached by forward for backward
    cached_norm: Option<Vec<f32>>,
    /// Edge list cached by forward for backward
    cached_edges: Option<Vec<EdgeIndex>>,
}

impl GraphConv {
    /// Create a new graph convolution layer.
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Create a graph convolution layer with a specific random seed.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        Self {
            linear: Linear::with_seed(in_features, out_features, seed),
            in_features,
            out_features,
            cached_norm: None,
            cached_edges: None,
        }
    }

    /// Get input feature dimension.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Get output feature dimension.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Forward pass over one (possibly batched, disjoint) graph.
    ///
    /// # Arguments
    ///
    /// * `x` - Node features `[num_nodes, in_features]`
    /// * `edges` - Parent→child pairs; traversed as undirected
    ///
    /// # Panics
    ///
    /// Panics if the input feature width doesn't match the layer.
    pub fn forward(&mut self, x: &Tensor, edges: &[EdgeIndex]) -> Tensor {
        let num_nodes = x.shape()[0];
        assert_eq!(
            x.shape()[1],
            self.in_features,
            "Expected {} input features, got {}",
            self.in_features,
            x.shape()[1]
        );

        // Self-loop-inclusive degrees for symmetric normalization.
        let mut degrees = vec![1.0f32; num_nodes];
        for &(src, tgt) in edges {
            degrees[src] += 1.0;
            degrees[tgt] += 1.0;
        }
        let norm: Vec<f32> = degrees.iter().map(|&d| 1.0 / d.sqrt().max(1e-6)).collect();

        let aggregated = aggregate(x.data(), num_nodes, self.in_features, edges, &norm);
        let agg_tensor = Tensor::new(&aggregated, &[num_nodes, self.in_features]);

        self.cached_norm = Some(norm);
        self.cached_edges = Some(edges.to_vec());

        self.linear.forward(&agg_tensor)
    }

    /// Backward pass: accumulate parameter gradients, return dL/dx.
    ///
    /// # Panics
    ///
    /// Panics if called before a forward pass.
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let norm = self
            .cached_norm
            .take()
            .expect("GraphConv::backward called before forward");
        let edges = self
            .cached_edges
            .take()
            .expect("GraphConv::backward called before forward");

        let grad_agg = self.linear.backward(grad_output);
        let num_nodes = grad_agg.shape()[0];

        // The aggregation operator is symmetric, so its transpose is itself.
        let grad_x = aggregate(grad_agg.data(), num_nodes, self.in_features, &edges, &norm);
        Tensor::new(&grad_x, &[num_nodes, self.in_features])
    }
}

/// Apply the normalized aggregation: out_i = Σ_j n_i n_j x_j over
/// undirected neighbors plus the self-loop term n_i² x_i.
fn aggregate(
    x: &[f32],
    num_nodes: usize,
    features: usize,
    edges: &[EdgeIndex],
    norm: &[f32],
) -> Vec<f32> {
    let mut out = vec![0.0f32; num_nodes * features];

    for i in 0..num_nodes {
        let coeff = norm[i] * norm[i];
        for f in 0..features {
            out[i * features + f] += coeff * x[i * features + f];
        }
    }

    for &(src, tgt) in edges {
        let coeff = norm[src] * norm[tgt];
        for f in 0..features {
            out[tgt * features + f] += coeff * x[src * features + f];
            out[src * features + f] += coeff * x[tgt * features + f];
        }
    }

    out
}

impl Module for GraphConv {
    fn parameters(&self) -> Vec<&Tensor> {
        self.linear.parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.linear.parameters_mut()
    }
}

impl std::fmt::Debug for GraphConv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConv")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .finish_non_exhaustive()
    }
}

/// Mean pooling over nodes of each graph in a batch.
///
/// `membership[i]` is the batch-local graph slot of node `i`; the result
/// has one row per graph.
///
/// # Panics
///
/// Panics if `membership` length doesn't match the node count.
#[must_use]
pub fn mean_pool(x: &Tensor, membership: &[usize], num_graphs: usize) -> Tensor {
    let num_nodes = x.shape()[0];
    let features = x.shape()[1];
    assert_eq!(
        membership.len(),
        num_nodes,
        "membership length must equal node count"
    );

    let x_data = x.data();
    let mut counts = vec![0usize; num_graphs];
    let mut sums = vec![0.0f32; num_graphs * features];

    for (i, &graph) in membership.iter().enumerate() {
        counts[graph] += 1;
        for f in 0..features {
            sums[graph * features + f] += x_data[i * features + f];
        }
    }

    for g in 0..num_graphs {
        let count = counts[g].max(1) as f32;
        for f in 0..features {
            sums[g * features + f] /= count;
        }
    }

    Tensor::new(&sums, &[num_graphs, features])
}

/// Backward of [`mean_pool`]: distribute each graph's gradient evenly
/// over its member nodes.
#[must_use]
pub fn mean_pool_backward(grad_pooled: &Tensor, membership: &[usize]) -> Tensor {
    let num_graphs = grad_pooled.shape()[0];
    let features = grad_pooled.shape()[1];
    let num_nodes = membership.len();

    let mut counts = vec![0usize; num_graphs];
    for &graph in membership {
        counts[graph] += 1;
    }

    let g = grad_pooled.data();
    let mut grad_x = vec![0.0f32; num_nodes * features];
    for (i, &graph) in membership.iter().enumerate() {
        let count = counts[graph].max(1) as f32;
        for f in 0..features {
            grad_x[i * features + f] = g[graph * features + f] / count;
        }
    }

    Tensor::new(&grad_x, &[num_nodes, features])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph_edges() -> Vec<EdgeIndex> {
        // Line: 0-1-2-3
        vec![(0, 1), (1, 2), (2, 3)]
    }

    #[test]
    fn test_graph_conv_shape() {
        let mut gcn = GraphConv::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[4, 4]);
        let out = gcn.forward(&x, &line_graph_edges());
        assert_eq!(out.shape(), &[4, 8]);
    }

    #[test]
    fn test_graph_conv_empty_edges() {
        // Single-node graphs carry no edges; only the self-loop remains.
        let mut gcn = GraphConv::with_seed(4, 8, Some(42));
        let x = Tensor::ones(&[3, 4]);
        let out = gcn.forward(&x, &[]);
        assert_eq!(out.shape(), &[3, 8]);
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_aggregation_normalization() {
        // Two nodes with one edge: degrees (with self-loops) are both 2,
        // so out_0 = x_0/2 + x_1/2.
        let norm = vec![1.0 / 2.0f32.sqrt(), 1.0 / 2.0f32.sqrt()];
        let out = aggregate(&[2.0, 4.0], 2, 1, &[(0, 1)], &norm);

        assert!((out[0] - 3.0).abs() < 1e-6);
        assert!((out[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_graph_conv_backward_finite_difference() {
        let mut gcn = GraphConv::with_seed(2, 2, Some(3));
        let x = Tensor::new(&[0.5, -0.2, 0.1, 0.9], &[2, 2]);
        let edges = vec![(0, 1)];

        let _ = gcn.forward(&x, &edges);
        let _ = gcn.backward(&Tensor::ones(&[2, 2]));
        let analytic = gcn.linear.weight().grad().expect("weight grad").data()[0];

        let eps = 1e-3;
        let base = gcn.linear.parameters()[0].data()[0];
        gcn.linear.parameters_mut()[0].data_mut()[0] = base + eps;
        let up: f32 = gcn.forward(&x, &edges).data().iter().sum();
        gcn.linear.parameters_mut()[0].data_mut()[0] = base - eps;
        let down: f32 = gcn.forward(&x, &edges).data().iter().sum();
        let numeric = (up - down) / (2.0 * eps);

        assert!(
            (analytic - numeric).abs() < 1e-2,
            "analytic {analytic} vs numeric {numeric}"
        );
    }

    #[test]
    fn test_graph_conv_input_gradient_symmetry() {
        // With identity-ish weights, dL/dx through the symmetric operator
        // must itself be symmetric for a symmetric graph.
        let mut gcn = GraphConv::with_seed(1, 1, Some(5));
        let x = Tensor::new(&[1.0, 1.0], &[2, 1]);
        let _ = gcn.forward(&x, &[(0, 1)]);
        let grad_x = gcn.backward(&Tensor::ones(&[2, 1]));
        assert!((grad_x.data()[0] - grad_x.data()[1]).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_batched() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], &[4, 2]);
        let membership = vec![0, 0, 1, 1];

        let pooled = mean_pool(&x, &membership, 2);

        assert_eq!(pooled.shape(), &[2, 2]);
        let data = pooled.data();
        assert!((data[0] - 2.0).abs() < 1e-6);
        assert!((data[1] - 3.0).abs() < 1e-6);
        assert!((data[2] - 6.0).abs() < 1e-6);
        assert!((data[3] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_single_node_graph() {
        let x = Tensor::new(&[3.5, 1.5], &[1, 2]);
        let pooled = mean_pool(&x, &[0], 1);
        assert_eq!(pooled.data(), &[3.5, 1.5]);
    }

    #[test]
    fn test_mean_pool_backward_distributes() {
        let grad = Tensor::new(&[2.0, 4.0], &[2, 1]);
        let membership = vec![0, 0, 1];

        let grad_x = mean_pool_backward(&grad, &membership);

        assert_eq!(grad_x.shape(), &[3, 1]);
        // Graph 0 has two nodes sharing grad 2.0; graph 1 has one node.
        assert_eq!(grad_x.data(), &[1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_graph_conv_parameters() {
        let gcn = GraphConv::with_seed(4, 8, Some(1));
        assert_eq!(gcn.parameters().len(), 2);
    }
}
