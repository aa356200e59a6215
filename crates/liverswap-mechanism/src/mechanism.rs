//! Precedence-induced adaptive-priority mechanism.
//!
//! The mechanism repeatedly serves the highest-priority pair that is still
//! active. Serving a pair means choosing, among the bounded-length cycles
//! through it, the one whose other members rank highest; if no cycle exists
//! the pair is resolved as unmatched. Either way the served pair leaves the
//! active set, so the loop terminates after at most `n` rounds.
//!
//! ## Maximum preservation
//!
//! With `preserve_maximum` (the default) a candidate cycle `C` is only
//! eligible if `|C| + cover(active \ C) == cover(active)`, i.e. taking it
//! still leaves room for a maximum cover. The final matching is therefore
//! a maximum cover of the graph, chosen lexicographically by priority, and
//! the matched count can only grow when edges are added.
//!
//! Preservation is limited to two-way exchange, where `cover` is a maximum
//! matching over mutual edges (blossom, O(n³) per query) and the whole run
//! stays polynomial. Longer cycle bounds use the plain precedence rule,
//! which gives no monotonicity guarantee.
//!
//! ```text
//! run(graph, order) -> StaticOutcome { matching, unmatched, root }
//! ```

use std::cmp::Ordering;

use liverswap_types::{Cycle, Matching, MechanismConfig, Pair, PairId, Result, Validate};

use crate::cover::two_way_cover;
use crate::cycles::cycles_through;
use crate::determinism::compute_matching_root;
use crate::validation::validate_matching;
use crate::{CompatibilityGraph, PriorityOrder};

/// Result of one mechanism run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOutcome {
    /// Selected cycles, in selection order. Each cycle starts with the pair
    /// being served when it was chosen.
    pub matching: Matching,
    /// Served pairs left without a cycle, in the order they were resolved.
    pub unmatched: Vec<PairId>,
    /// Hash of `matching` for reproducibility checks.
    pub root: [u8; 32],
}

impl StaticOutcome {
    /// Number of pairs receiving a transplant.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matching.pair_count()
    }
}

/// A candidate cycle with the keys used to rank it.
struct Candidate {
    nodes: Vec<usize>,
    /// Priority positions of the non-served members, best first.
    sorted: Vec<usize>,
    /// Priority positions of the non-served members, in cycle order.
    along: Vec<usize>,
}

impl Candidate {
    fn new(nodes: Vec<usize>, graph: &CompatibilityGraph, order: &PriorityOrder) -> Self {
        let along: Vec<usize> = nodes[1..]
            .iter()
            .map(|&i| order.position(graph.pair_at(i).id).unwrap_or(usize::MAX))
            .collect();
        let mut sorted = along.clone();
        sorted.sort_unstable();
        Self {
            nodes,
            sorted,
            along,
        }
    }

    /// `Less` when `self` takes precedence over `other`.
    fn precedence(&self, other: &Self) -> Ordering {
        for (a, b) in self.sorted.iter().zip(&other.sorted) {
            match a.cmp(b) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }
        other
            .sorted
            .len()
            .cmp(&self.sorted.len())
            .then_with(|| self.along.cmp(&other.along))
    }
}

/// The static matching mechanism.
#[derive(Debug, Clone, Copy)]
pub struct StaticMechanism {
    config: MechanismConfig,
}

impl StaticMechanism {
    /// # Errors
    /// Returns `InvalidConfig` if the cycle bound is out of range.
    pub fn new(config: MechanismConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &MechanismConfig {
        &self.config
    }

    /// Compute a matching over every pair in `graph`.
    ///
    /// # Errors
    /// - `UnknownPair` if `order` does not rank every node of `graph`
    /// - an invariant violation if the computed matching fails validation
    pub fn run(&self, graph: &CompatibilityGraph, order: &PriorityOrder) -> Result<StaticOutcome> {
        self.solve(graph, order, |_| true, self.config.preserve_maximum)
    }

    /// Serve only the pairs for which `eligible` holds; any active pair may
    /// still be a partner. Uses the plain precedence rule.
    ///
    /// `unmatched` lists only served pairs.
    ///
    /// # Errors
    /// Same as [`StaticMechanism::run`].
    pub fn run_serving(
        &self,
        graph: &CompatibilityGraph,
        order: &PriorityOrder,
        eligible: impl Fn(&Pair) -> bool,
    ) -> Result<StaticOutcome> {
        self.solve(graph, order, eligible, false)
    }

    fn solve(
        &self,
        graph: &CompatibilityGraph,
        order: &PriorityOrder,
        eligible: impl Fn(&Pair) -> bool,
        preserve_maximum: bool,
    ) -> Result<StaticOutcome> {
        order.ensure_ranks(graph.pairs().iter().map(|p| p.id))?;

        let max_len = self.config.max_cycle_len;
        let serve: Vec<bool> = graph.pairs().iter().map(&eligible).collect();
        let mut active = vec![true; graph.len()];
        let mut matching = Matching::new();
        let mut unmatched = Vec::new();

        // Config validation limits preservation to two-way cycles.
        let preserve_maximum = preserve_maximum && max_len == 2;
        let mut target = if preserve_maximum {
            two_way_cover(graph, &active)
        } else {
            0
        };

        while let Some(served) = order.highest_among(|id| {
            graph
                .index_of(id)
                .is_some_and(|i| active[i] && serve[i])
        }) {
            let Some(p) = graph.index_of(served) else {
                break;
            };

            let mut candidates: Vec<Candidate> = cycles_through(graph, p, &active, max_len)
                .into_iter()
                .map(|nodes| Candidate::new(nodes, graph, order))
                .collect();

            if preserve_maximum {
                candidates.retain(|c| {
                    let mut rest = active.clone();
                    for &i in &c.nodes {
                        rest[i] = false;
                    }
                    c.nodes.len() + two_way_cover(graph, &rest) == target
                });
            }

            let Some(best) = candidates.into_iter().min_by(Candidate::precedence) else {
                tracing::debug!(pair = %served, "No eligible cycle; pair unmatched");
                unmatched.push(served);
                active[p] = false;
                continue;
            };

            for &i in &best.nodes {
                active[i] = false;
            }
            target = target.saturating_sub(best.nodes.len());
            let cycle = Cycle::new(best.nodes.iter().map(|&i| graph.pair_at(i).id).collect())?;
            tracing::debug!(pair = %served, cycle = %cycle, "Cycle selected");
            matching.push(cycle)?;
        }

        validate_matching(graph, &matching, max_len)?;
        let root = compute_matching_root(&matching);

        tracing::info!(
            pairs = graph.len(),
            cycles = matching.len(),
            matched = matching.pair_count(),
            unmatched = unmatched.len(),
            root = hex::encode(root),
            "Static mechanism complete"
        );

        Ok(StaticOutcome {
            matching,
            unmatched,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use liverswap_types::LiverswapError;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::determinism::verify_matching_root;

    const A: u64 = 0;
    const B: u64 = 1;
    const C: u64 = 2;
    const D: u64 = 3;

    fn graph_from(n: u64, edges: Vec<(u64, u64)>) -> CompatibilityGraph {
        let pairs: Vec<Pair> = (0..n).map(Pair::dummy).collect();
        CompatibilityGraph::build(&pairs, &move |a: &Pair, b: &Pair| {
            edges.contains(&(a.id.0, b.id.0))
        })
        .unwrap()
    }

    fn mutual(list: &[(u64, u64)]) -> Vec<(u64, u64)> {
        list.iter().flat_map(|&(a, b)| [(a, b), (b, a)]).collect()
    }

    fn order(ranked: &[u64]) -> PriorityOrder {
        PriorityOrder::from_ranked(ranked.iter().copied().map(PairId).collect()).unwrap()
    }

    fn mechanism(max_cycle_len: usize, preserve_maximum: bool) -> StaticMechanism {
        StaticMechanism::new(MechanismConfig {
            max_cycle_len,
            preserve_maximum,
        })
        .unwrap()
    }

    fn cycles_of(outcome: &StaticOutcome) -> Vec<Vec<u64>> {
        outcome
            .matching
            .cycles()
            .iter()
            .map(|c| c.members().iter().map(|id| id.0).collect())
            .collect()
    }

    #[test]
    fn two_disjoint_two_cycles() {
        let g = graph_from(4, mutual(&[(A, B), (C, D)]));
        let out = StaticMechanism::new(MechanismConfig::default())
            .unwrap()
            .run(&g, &order(&[A, B, C, D]))
            .unwrap();
        assert_eq!(cycles_of(&out), vec![vec![A, B], vec![C, D]]);
        assert!(out.unmatched.is_empty());
    }

    #[test]
    fn three_cycle_under_two_way_bound_matches_nothing() {
        let g = graph_from(3, vec![(A, B), (B, C), (C, A)]);
        let out = mechanism(2, true).run(&g, &order(&[A, B, C])).unwrap();
        assert!(out.matching.is_empty());
        assert_eq!(out.unmatched, vec![PairId(A), PairId(B), PairId(C)]);

        let out = mechanism(3, false).run(&g, &order(&[A, B, C])).unwrap();
        assert_eq!(cycles_of(&out), vec![vec![A, B, C]]);
    }

    #[test]
    fn partner_choice_follows_priority() {
        // A can pair with C or B; B ranks higher, so (A, B) is chosen.
        let g = graph_from(3, mutual(&[(A, B), (A, C)]));
        let out = mechanism(2, true).run(&g, &order(&[A, B, C])).unwrap();
        assert_eq!(cycles_of(&out), vec![vec![A, B]]);
        assert_eq!(out.unmatched, vec![PairId(C)]);
    }

    #[test]
    fn maximum_preservation_overrides_local_preference() {
        // B-C and A-D are mutual; adding A-B tempts A away from D.
        let edges = mutual(&[(B, C), (A, D), (A, B)]);
        let g = graph_from(4, edges);
        let ranked = order(&[A, B, C, D]);

        let plain = mechanism(2, false).run(&g, &ranked).unwrap();
        assert_eq!(cycles_of(&plain), vec![vec![A, B]]);
        assert_eq!(plain.matched_count(), 2);

        let preserving = mechanism(2, true).run(&g, &ranked).unwrap();
        assert_eq!(cycles_of(&preserving), vec![vec![A, D], vec![B, C]]);
        assert_eq!(preserving.matched_count(), 4);
    }

    #[test]
    fn longer_cycle_wins_on_common_prefix() {
        // From A: (A, B) and (A, B, C) share B; the longer one covers more.
        let mut edges = mutual(&[(A, B)]);
        edges.extend([(B, C), (C, A)]);
        let g = graph_from(3, edges);
        let out = mechanism(3, false).run(&g, &order(&[A, B, C])).unwrap();
        assert_eq!(cycles_of(&out), vec![vec![A, B, C]]);
    }

    #[test]
    fn same_members_prefer_better_sequence() {
        // Both directions of the triangle exist; pick A -> B -> C.
        let edges = vec![(A, B), (B, C), (C, A), (A, C), (C, B), (B, A)];
        let g = graph_from(3, edges);
        let out = mechanism(3, false).run(&g, &order(&[A, B, C])).unwrap();
        assert_eq!(cycles_of(&out), vec![vec![A, B, C]]);
    }

    #[test]
    fn isolated_pair_reported_unmatched() {
        let g = graph_from(3, mutual(&[(A, B)]));
        let out = mechanism(2, true).run(&g, &order(&[C, A, B])).unwrap();
        assert_eq!(out.unmatched, vec![PairId(C)]);
        assert_eq!(cycles_of(&out), vec![vec![A, B]]);
    }

    #[test]
    fn empty_graph() {
        let g = graph_from(0, vec![]);
        let out = mechanism(2, true).run(&g, &order(&[])).unwrap();
        assert!(out.matching.is_empty());
        assert!(out.unmatched.is_empty());
        assert!(verify_matching_root(&out.matching, &out.root));
    }

    #[test]
    fn unranked_node_rejected() {
        let g = graph_from(2, mutual(&[(A, B)]));
        let err = mechanism(2, true).run(&g, &order(&[A])).unwrap_err();
        assert!(matches!(err, LiverswapError::UnknownPair(PairId(1))));
    }

    #[test]
    fn invalid_config_rejected() {
        let err = StaticMechanism::new(MechanismConfig {
            max_cycle_len: 1,
            preserve_maximum: true,
        })
        .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn run_serving_only_serves_eligible() {
        // Only C is served; its best partner is B (A ranks higher but is
        // not compatible with C).
        let g = graph_from(4, mutual(&[(A, B), (B, C), (C, D)]));
        let out = mechanism(2, true)
            .run_serving(&g, &order(&[A, B, C, D]), |p| p.id == PairId(C))
            .unwrap();
        assert_eq!(cycles_of(&out), vec![vec![C, B]]);
        assert!(out.unmatched.is_empty());

        let out = mechanism(2, true)
            .run_serving(&g, &order(&[A, B, C, D]), |_| false)
            .unwrap();
        assert!(out.matching.is_empty());
        assert!(out.unmatched.is_empty());
    }

    fn random_edges(rng: &mut ChaCha8Rng, n: u64, p: f64) -> Vec<(u64, u64)> {
        let mut edges = Vec::new();
        for a in 0..n {
            for b in 0..n {
                if a != b && rng.gen_bool(p) {
                    edges.push((a, b));
                }
            }
        }
        edges
    }

    #[test]
    fn outputs_are_valid_and_deterministic_on_random_graphs() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for round in 0..30 {
            let n = rng.gen_range(1..9u64);
            let edges = random_edges(&mut rng, n, 0.4);
            let g = graph_from(n, edges);
            let ranked = order(&(0..n).rev().collect::<Vec<_>>());
            let max_len = 2 + round % 2;
            let mech = mechanism(max_len, max_len == 2);

            let first = mech.run(&g, &ranked).unwrap();
            let second = mech.run(&g, &ranked).unwrap();
            assert_eq!(first, second);
            assert!(validate_matching(&g, &first.matching, max_len).is_ok());

            // Every pair is either matched or reported unmatched.
            let accounted = first.matching.pair_count() + first.unmatched.len();
            assert_eq!(accounted, g.len());
        }
    }

    #[test]
    fn adding_an_edge_never_lowers_matched_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        for round in 0..40 {
            let n = rng.gen_range(2..8u64);
            let edges = random_edges(&mut rng, n, 0.3);
            let a = rng.gen_range(0..n);
            let b = (a + rng.gen_range(1..n)) % n;
            let mut extended = edges.clone();
            extended.push((a, b));

            let ranked = order(&(0..n).collect::<Vec<_>>());
            let mech = mechanism(2, true);
            let before = mech.run(&graph_from(n, edges), &ranked).unwrap();
            let after = mech.run(&graph_from(n, extended), &ranked).unwrap();
            assert!(
                after.matched_count() >= before.matched_count(),
                "round {round}: {} -> {}",
                before.matched_count(),
                after.matched_count()
            );
        }
    }

    #[test]
    fn forty_pair_pools_finish_quickly_at_every_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let n = 40;
        let g = graph_from(n, random_edges(&mut rng, n, 0.15));
        let ranked = order(&(0..n).collect::<Vec<_>>());
        for (max_len, preserve) in [(2, true), (2, false), (3, false), (4, false)] {
            let start = std::time::Instant::now();
            let out = mechanism(max_len, preserve).run(&g, &ranked).unwrap();
            let elapsed = start.elapsed();
            assert!(validate_matching(&g, &out.matching, max_len).is_ok());
            assert!(
                elapsed < std::time::Duration::from_secs(2),
                "bound {max_len}: {elapsed:?}"
            );
        }
    }

    #[test]
    fn preserving_longer_cycles_is_rejected() {
        let err = StaticMechanism::new(MechanismConfig {
            max_cycle_len: 3,
            preserve_maximum: true,
        })
        .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
