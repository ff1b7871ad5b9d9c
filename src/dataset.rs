//! Dataset preparation: stratified splitting, class weights, batching.
//!
//! The splitter and the batch loader both draw their shuffles from seeded
//! [`rand::rngs::StdRng`] state so that runs are reproducible end to end.
//! Validation passes never shuffle; training passes draw a fresh
//! permutation at the start of every pass over the subset.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{CentinelaError, Result};
use crate::graph::{EdgeIndex, Graph, GraphCollection};
use crate::tensor::Tensor;

/// Split a collection into training and validation subsets, stratified by
/// label.
///
/// Each class's indices are pooled, shuffled with the seeded generator,
/// and split so the validation share of every class is
/// `round(class_size * val_fraction)`, clamped to leave at least one
/// member on each side. Label proportions in each subset therefore match
/// the full collection within rounding.
///
/// # Errors
///
/// - [`CentinelaError::InvalidHyperparameter`] if `val_fraction` is not in (0, 1).
/// - [`CentinelaError::EmptyCorpus`] if the collection is empty.
/// - [`CentinelaError::InsufficientSamples`] if any class has fewer than
///   two members and cannot appear in both subsets.
pub fn stratified_split(
    collection: &GraphCollection,
    val_fraction: f32,
    seed: u64,
) -> Result<(GraphCollection, GraphCollection)> {
    if !(0.0..1.0).contains(&val_fraction) || val_fraction == 0.0 {
        return Err(CentinelaError::invalid_hyperparameter(
            "val_fraction",
            val_fraction,
            "0 < val_fraction < 1",
        ));
    }
    if collection.is_empty() {
        return Err(CentinelaError::EmptyCorpus);
    }

    let labels = collection.labels();
    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);

    // Pool sample indices per class.
    let mut class_pools: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        class_pools[label].push(i);
    }

    for (label, pool) in class_pools.iter().enumerate() {
        if pool.len() < 2 {
            return Err(CentinelaError::InsufficientSamples {
                label,
                count: pool.len(),
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = GraphCollection::new(collection.feature_dim());
    let mut val = GraphCollection::new(collection.feature_dim());

    for pool in &mut class_pools {
        pool.shuffle(&mut rng);

        let n_val = ((pool.len() as f32 * val_fraction).round() as usize)
            .max(1)
            .min(pool.len() - 1);

        for &idx in &pool[..n_val] {
            val.push(collection.get(idx).expect("index from labels").clone());
        }
        for &idx in &pool[n_val..] {
            train.push(collection.get(idx).expect("index from labels").clone());
        }
    }

    Ok((train, val))
}

/// Per-class loss weights, inversely proportional to class frequency.
///
/// `w_c = n_samples / (n_classes * count_c)`, the balanced weighting
/// scheme. Computed from *training* labels only; consulting validation
/// labels here would leak the evaluation distribution into the loss.
///
/// # Errors
///
/// Returns [`CentinelaError::DegenerateClass`] if any class in
/// `0..n_classes` has zero training samples.
pub fn class_weights(train_labels: &[usize], n_classes: usize) -> Result<Vec<f32>> {
    let mut counts = vec![0usize; n_classes];
    for &label in train_labels {
        counts[label] += 1;
    }

    let total = train_labels.len() as f32;
    let mut weights = Vec::with_capacity(n_classes);
    for (label, &count) in counts.iter().enumerate() {
        if count == 0 {
            return Err(CentinelaError::DegenerateClass { label });
        }
        weights.push(total / (n_classes as f32 * count as f32));
    }

    Ok(weights)
}

/// A disjoint union of several graphs, ready for one forward pass.
///
/// Node features of all member graphs are stacked into one one-hot
/// matrix; edge indices are offset per graph; `membership[i]` names the
/// batch-local slot of the graph that node `i` belongs to, which is what
/// mean pooling uses to recover per-graph vectors.
#[derive(Debug)]
pub struct Batch {
    /// One-hot node features `[total_nodes, feature_dim]`
    pub features: Tensor,
    /// Edges with row indices offset per member graph
    pub edges: Vec<EdgeIndex>,
    /// Node → batch-local graph slot
    pub membership: Vec<usize>,
    /// Per-graph labels in slot order
    pub labels: Vec<usize>,
}

impl Batch {
    /// Assemble a batch from member graphs.
    #[must_use]
    pub fn from_graphs(graphs: &[&Graph], feature_dim: usize) -> Self {
        let total_nodes: usize = graphs.iter().map(|g| g.node_count()).sum();

        let mut features = vec![0.0f32; total_nodes * feature_dim];
        let mut edges = Vec::new();
        let mut membership = Vec::with_capacity(total_nodes);
        let mut labels = Vec::with_capacity(graphs.len());

        let mut offset = 0;
        for (slot, graph) in graphs.iter().enumerate() {
            for (row, &kind) in graph.kinds().iter().enumerate() {
                features[(offset + row) * feature_dim + kind] = 1.0;
                membership.push(slot);
            }
            for &(parent, child) in graph.edges() {
                edges.push((parent + offset, child + offset));
            }
            labels.push(graph.label());
            offset += graph.node_count();
        }

        Self {
            features: Tensor::new(&features, &[total_nodes, feature_dim]),
            edges,
            membership,
            labels,
        }
    }

    /// Number of graphs in the batch.
    #[must_use]
    pub fn num_graphs(&self) -> usize {
        self.labels.len()
    }

    /// Total node count across member graphs.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.membership.len()
    }
}

/// Groups a collection into mini-batches.
///
/// Every call to [`BatchLoader::iter`] starts a fresh pass yielding
/// `ceil(len / batch_size)` batches; the last batch may be short. With
/// shuffling enabled the loader draws a new permutation from its own
/// advancing generator at the start of each pass, so consecutive training
/// passes see different orders while remaining reproducible from the
/// seed. Without shuffling, every pass yields identical batches in
/// collection order.
#[derive(Debug)]
pub struct BatchLoader {
    batch_size: usize,
    rng: Option<StdRng>,
}

impl BatchLoader {
    /// Create a loader that preserves collection order (validation mode).
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            batch_size,
            rng: None,
        }
    }

    /// Enable per-pass shuffling with a reproducible seed (training mode).
    #[must_use]
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches one pass over `collection` yields.
    #[must_use]
    pub fn num_batches(&self, collection: &GraphCollection) -> usize {
        collection.len().div_ceil(self.batch_size)
    }

    /// Start a pass over the collection.
    pub fn iter<'a>(&mut self, collection: &'a GraphCollection) -> BatchIter<'a> {
        let mut order: Vec<usize> = (0..collection.len()).collect();
        if let Some(rng) = &mut self.rng {
            order.shuffle(rng);
        }

        BatchIter {
            collection,
            order,
            batch_size: self.batch_size,
            pos: 0,
        }
    }
}

/// Lazy iterator over one pass of batches.
pub struct BatchIter<'a> {
    collection: &'a GraphCollection,
    order: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.pos >= self.order.len() {
            return None;
        }

        let end = (self.pos + self.batch_size).min(self.order.len());
        let members: Vec<&Graph> = self.order[self.pos..end]
            .iter()
            .map(|&i| self.collection.get(i).expect("index in range"))
            .collect();
        self.pos = end;

        Some(Batch::from_graphs(&members, self.collection.feature_dim()))
    }
}
