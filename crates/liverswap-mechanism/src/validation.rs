//! Structural checks on a matching against the graph it was computed on.
//!
//! Any failure here is an invariant violation: the matching is rejected
//! whole and never patched up.

use liverswap_types::{LiverswapError, Matching, Result};

use crate::CompatibilityGraph;

/// Check that `matching` is a valid cycle cover on `graph`:
/// vertex-disjoint cycles, every member a node of the graph, every
/// traversed edge present, and no cycle longer than `max_len`.
///
/// # Errors
/// `OverlappingCycles`, `InactivePair`, `MissingEdge` or `CycleTooLong`
/// for the first problem found.
pub fn validate_matching(
    graph: &CompatibilityGraph,
    matching: &Matching,
    max_len: usize,
) -> Result<()> {
    matching.check_disjoint()?;
    for cycle in matching.cycles() {
        if cycle.len() > max_len {
            return Err(LiverswapError::CycleTooLong {
                len: cycle.len(),
                max: max_len,
            });
        }
        if let Some(id) = cycle.members().iter().find(|id| !graph.contains(**id)) {
            return Err(LiverswapError::InactivePair(*id));
        }
        if let Some((from, to)) = cycle.edges().find(|&(a, b)| !graph.has_edge(a, b)) {
            return Err(LiverswapError::MissingEdge { from, to });
        }
    }
    Ok(())
}
