//! Tree-to-graph conversion and the labeled graph collection.
//!
//! Each parsed tree becomes a directed graph: one row per node in
//! depth-first order (root at row 0), an edge per parent→child link, and
//! the node feature recorded as the scalar vocabulary index of its kind.
//! One-hot expansion is deferred to batch assembly.

use crate::error::{CentinelaError, Result};
use crate::syntax::SyntaxNode;
use crate::vocab::Vocabulary;

/// Edge type: (parent_row, child_row)
pub type EdgeIndex = (usize, usize);

/// A single sample's syntax graph with its binary label.
///
/// Invariants: at least one node; edge count equals node count − 1; row 0
/// is the root; every non-root row appears exactly once as a child. A
/// single-node tree yields an empty edge list, which all downstream code
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// Vocabulary index of each node's kind, in DFS row order
    kinds: Vec<usize>,
    /// Parent→child edges in visit order
    edges: Vec<EdgeIndex>,
    /// Sample label: 0 = negative, 1 = positive
    label: usize,
}

impl Graph {
    /// Convert one syntax tree into a graph using the shared vocabulary.
    ///
    /// Nodes are assigned sequential row indices by an explicit-stack
    /// depth-first traversal (each node before its children, children in
    /// original order); every non-root visit appends a (parent, child)
    /// edge.
    ///
    /// # Errors
    ///
    /// Returns [`CentinelaError::UnknownNodeKind`] if a kind tag is absent
    /// from the vocabulary. That means vocabulary construction and graph
    /// construction ran against different corpora; it is never ignored.
    pub fn from_tree(root: &SyntaxNode, vocab: &Vocabulary, label: usize) -> Result<Self> {
        let mut kinds = Vec::with_capacity(root.node_count());
        let mut edges = Vec::with_capacity(root.node_count().saturating_sub(1));

        let mut stack: Vec<(&SyntaxNode, Option<usize>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let row = kinds.len();
            let kind_index =
                vocab
                    .index_of(node.kind())
                    .ok_or_else(|| CentinelaError::UnknownNodeKind {
                        kind: node.kind().to_string(),
                    })?;
            kinds.push(kind_index);
            if let Some(parent_row) = parent {
                edges.push((parent_row, row));
            }
            // Reverse push keeps children in their original order on pop.
            for child in node.children().iter().rev() {
                stack.push((child, Some(row)));
            }
        }

        Ok(Self {
            kinds,
            edges,
            label,
        })
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    /// Vocabulary index of each node's kind.
    #[must_use]
    pub fn kinds(&self) -> &[usize] {
        &self.kinds
    }

    /// Parent→child edge list.
    #[must_use]
    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    /// Sample label.
    #[must_use]
    pub fn label(&self) -> usize {
        self.label
    }
}

/// An ordered collection of labeled graphs sharing one vocabulary.
#[derive(Debug, Clone)]
pub struct GraphCollection {
    graphs: Vec<Graph>,
    /// One-hot feature width, captured from the vocabulary at construction
    feature_dim: usize,
}

impl GraphCollection {
    /// Create an empty collection with the given feature width.
    #[must_use]
    pub fn new(feature_dim: usize) -> Self {
        Self {
            graphs: Vec::new(),
            feature_dim,
        }
    }

    /// Convert a parsed, labeled corpus into a graph collection.
    ///
    /// # Errors
    ///
    /// Returns [`CentinelaError::EmptyCorpus`] for an empty corpus, or
    /// propagates [`CentinelaError::UnknownNodeKind`] from construction.
    pub fn from_trees(trees: &[(SyntaxNode, usize)], vocab: &Vocabulary) -> Result<Self> {
        if trees.is_empty() {
            return Err(CentinelaError::EmptyCorpus);
        }

        let mut graphs = Vec::with_capacity(trees.len());
        for (tree, label) in trees {
            graphs.push(Graph::from_tree(tree, vocab, *label)?);
        }

        Ok(Self {
            graphs,
            feature_dim: vocab.len(),
        })
    }

    /// Append a graph.
    pub fn push(&mut self, graph: Graph) {
        self.graphs.push(graph);
    }

    /// Number of graphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Check whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// One-hot feature width shared by every graph.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Access a graph by position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Graph> {
        self.graphs.get(index)
    }

    /// All graphs in order.
    #[must_use]
    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }

    /// Labels in collection order.
    #[must_use]
    pub fn labels(&self) -> Vec<usize> {
        self.graphs.iter().map(Graph::label).collect()
    }

    /// Per-class sample counts, indexed by label.
    #[must_use]
    pub fn label_counts(&self) -> Vec<usize> {
        let n_classes = self
            .graphs
            .iter()
            .map(|g| g.label() + 1)
            .max()
            .unwrap_or(0);
        let mut counts = vec![0usize; n_classes];
        for graph in &self.graphs {
            counts[graph.label()] += 1;
        }
        counts
    }
}
