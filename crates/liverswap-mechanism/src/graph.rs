//! Directed compatibility graph over the active pairs.
//!
//! Edge `A -> B` exists iff A's patient can receive a graft from B's donor.
//! The graph is built fresh from an active pair set and never mutated in
//! place; [`CompatibilityGraph::induced`] produces a new graph over a
//! subset without consulting the predicate again.
//!
//! Nodes are stored in ascending [`PairId`] order and successor lists are
//! ascending as well, so every traversal of the graph is deterministic.

use std::collections::HashMap;

use liverswap_types::{LiverswapError, Pair, PairId, Result};

/// A compatibility predicate supplied by the caller.
///
/// `compatible(a, b)` answers whether `a`'s patient can receive from `b`'s
/// donor, i.e. whether the edge `a -> b` exists. Implementations must be
/// pure: the same two pairs always give the same answer.
pub trait Compatibility: Send + Sync {
    fn compatible(&self, a: &Pair, b: &Pair) -> bool;
}

impl<F> Compatibility for F
where
    F: Fn(&Pair, &Pair) -> bool + Send + Sync,
{
    fn compatible(&self, a: &Pair, b: &Pair) -> bool {
        self(a, b)
    }
}

/// Lobe-threshold compatibility on [`liverswap_types::LiverProfile`]:
/// `a -> b` iff `b`'s donor can give `a`'s patient the left lobe, or the
/// right lobe when that donor is willing to give it. The edge is dropped
/// when `a` prefers its direct option and that option is the same lobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct LobeCompatibility;

impl Compatibility for LobeCompatibility {
    fn compatible(&self, a: &Pair, b: &Pair) -> bool {
        b.profile
            .exchange_lobe(&a.profile)
            .is_some_and(|lobe| a.profile.accepts_exchange(lobe))
    }
}

/// Directed graph over a set of pairs.
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    /// Nodes in ascending id order.
    pairs: Vec<Pair>,
    /// `PairId -> node index`.
    index: HashMap<PairId, usize>,
    /// `adjacency[i][j]` iff edge `i -> j`.
    adjacency: Vec<Vec<bool>>,
    /// Ascending successor indices per node.
    successors: Vec<Vec<usize>>,
}

impl CompatibilityGraph {
    /// Build the graph by evaluating `predicate` on every ordered pair of
    /// distinct nodes.
    ///
    /// # Errors
    /// Returns `DuplicatePair` if two input pairs share an id.
    pub fn build<C>(pairs: &[Pair], predicate: &C) -> Result<Self>
    where
        C: Compatibility + ?Sized,
    {
        let mut nodes = pairs.to_vec();
        nodes.sort_by_key(|p| p.id);
        if let Some(dup) = nodes.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(LiverswapError::DuplicatePair(dup[0].id));
        }

        let n = nodes.len();
        let mut adjacency = vec![vec![false; n]; n];
        for (i, row) in adjacency.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    *cell = predicate.compatible(&nodes[i], &nodes[j]);
                }
            }
        }
        Ok(Self::from_parts(nodes, adjacency))
    }

    fn from_parts(pairs: Vec<Pair>, adjacency: Vec<Vec<bool>>) -> Self {
        let index = pairs.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let successors = adjacency
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter_map(|(j, &edge)| edge.then_some(j))
                    .collect()
            })
            .collect();
        Self {
            pairs,
            index,
            adjacency,
            successors,
        }
    }

    /// A new graph over the nodes for which `keep` holds, with the edges
    /// already computed for them.
    #[must_use]
    pub fn induced(&self, keep: impl Fn(&Pair) -> bool) -> Self {
        let kept: Vec<usize> = (0..self.len()).filter(|&i| keep(&self.pairs[i])).collect();
        let pairs = kept.iter().map(|&i| self.pairs[i].clone()).collect();
        let adjacency = kept
            .iter()
            .map(|&i| kept.iter().map(|&j| self.adjacency[i][j]).collect())
            .collect();
        Self::from_parts(pairs, adjacency)
    }

    // =================================================================
    // Node queries
    // =================================================================

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Nodes in ascending id order.
    #[must_use]
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    #[must_use]
    pub fn pair(&self, id: PairId) -> Option<&Pair> {
        self.index.get(&id).map(|&i| &self.pairs[i])
    }

    #[must_use]
    pub fn contains(&self, id: PairId) -> bool {
        self.index.contains_key(&id)
    }

    #[must_use]
    pub fn index_of(&self, id: PairId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// The pair at node index `i`.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn pair_at(&self, i: usize) -> &Pair {
        &self.pairs[i]
    }

    // =================================================================
    // Edge queries
    // =================================================================

    /// Whether `from -> to` is an edge. Unknown ids have no edges.
    #[must_use]
    pub fn has_edge(&self, from: PairId, to: PairId) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(i), Some(j)) => self.adjacency[i][j],
            _ => false,
        }
    }

    #[must_use]
    pub fn has_edge_at(&self, i: usize, j: usize) -> bool {
        self.adjacency[i][j]
    }

    /// Whether both `a -> b` and `b -> a` exist (a feasible two-way
    /// exchange).
    #[must_use]
    pub fn is_mutual(&self, a: PairId, b: PairId) -> bool {
        self.has_edge(a, b) && self.has_edge(b, a)
    }

    /// Successor indices of node `i`, ascending.
    #[must_use]
    pub fn successors_at(&self, i: usize) -> &[usize] {
        &self.successors[i]
    }

    /// Successor ids of `id`, ascending. Empty for unknown ids.
    pub fn successors(&self, id: PairId) -> impl Iterator<Item = PairId> + '_ {
        self.index_of(id)
            .map(|i| self.successors[i].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&j| self.pairs[j].id)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }
}

/// Evaluate `predicate` twice on every ordered pair of distinct pairs and
/// report the first disagreement.
///
/// The graph builder trusts the predicate to be pure; this is the test-time
/// check for that assumption.
///
/// # Errors
/// Returns `InconsistentPredicate` on the first mismatching pair of calls.
pub fn check_predicate_consistency<C>(pairs: &[Pair], predicate: &C) -> Result<()>
where
    C: Compatibility + ?Sized,
{
    for a in pairs {
        for b in pairs {
            if a.id == b.id {
                continue;
            }
            if predicate.compatible(a, b) != predicate.compatible(a, b) {
                return Err(LiverswapError::InconsistentPredicate {
                    from: a.id,
                    to: b.id,
                });
            }
        }
    }
    Ok(())
}
