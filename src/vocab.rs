//! Corpus-wide node-kind vocabulary.
//!
//! Built once per corpus in a single pass, then read-only during graph
//! construction. Indices are assigned from the *sorted* set of kind tags,
//! not traversal order, so two runs over the same corpus always agree.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CentinelaError, Result};
use crate::syntax::SyntaxNode;

/// Mapping from node-kind tag to a dense integer index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    index: BTreeMap<String, usize>,
}

impl Vocabulary {
    /// Build the vocabulary from every tree in the corpus.
    ///
    /// Visits each node depth-first (node before its children, children in
    /// order) and collects the distinct kind tags; consecutive indices are
    /// then assigned over the sorted tag set.
    ///
    /// # Errors
    ///
    /// Returns [`CentinelaError::EmptyCorpus`] when `trees` is empty.
    pub fn build<'a, I>(trees: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SyntaxNode>,
    {
        let mut kinds = BTreeSet::new();
        let mut seen_any = false;

        for tree in trees {
            seen_any = true;
            collect_kinds(tree, &mut kinds);
        }

        if !seen_any {
            return Err(CentinelaError::EmptyCorpus);
        }

        let index = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| (kind, i))
            .collect();

        Ok(Self { index })
    }

    /// Look up the index of a kind tag.
    #[must_use]
    pub fn index_of(&self, kind: &str) -> Option<usize> {
        self.index.get(kind).copied()
    }

    /// Check whether a kind tag is present.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Number of distinct kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check whether the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterate over (kind, index) pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index.iter().map(|(k, &i)| (k.as_str(), i))
    }
}

fn collect_kinds(node: &SyntaxNode, kinds: &mut BTreeSet<String>) {
    kinds.insert(node.kind().to_string());
    for child in node.children() {
        collect_kinds(child, kinds);
    }
}
