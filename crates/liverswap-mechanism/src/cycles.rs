//! Bounded-length cycle search.
//!
//! Cycles are enumerated by depth-first search from the served pair along
//! ascending successor lists, so the result order is deterministic. Each
//! directed cycle through the start node is reported exactly once, as a
//! node sequence beginning with the start node.

use crate::CompatibilityGraph;

/// All cycles of length `2..=max_len` through node `start` that use only
/// nodes with `active[i] == true`.
///
/// Returns node-index sequences starting at `start`. Empty if `start` is
/// inactive.
#[must_use]
pub fn cycles_through(
    graph: &CompatibilityGraph,
    start: usize,
    active: &[bool],
    max_len: usize,
) -> Vec<Vec<usize>> {
    let mut found = Vec::new();
    if !active[start] || max_len < 2 {
        return found;
    }
    let mut path = vec![start];
    let mut on_path = vec![false; graph.len()];
    on_path[start] = true;
    extend(graph, active, max_len, &mut path, &mut on_path, &mut found);
    found
}

fn extend(
    graph: &CompatibilityGraph,
    active: &[bool],
    max_len: usize,
    path: &mut Vec<usize>,
    on_path: &mut [bool],
    found: &mut Vec<Vec<usize>>,
) {
    let start = path[0];
    let Some(&last) = path.last() else {
        return;
    };
    for &next in graph.successors_at(last) {
        if !active[next] {
            continue;
        }
        if next == start {
            if path.len() >= 2 {
                found.push(path.clone());
            }
            continue;
        }
        if on_path[next] || path.len() >= max_len {
            continue;
        }
        path.push(next);
        on_path[next] = true;
        extend(graph, active, max_len, path, on_path, found);
        on_path[next] = false;
        path.pop();
    }
}

/// Whether node `start` lies on any active cycle of bounded length.
#[must_use]
pub fn has_cycle_through(
    graph: &CompatibilityGraph,
    start: usize,
    active: &[bool],
    max_len: usize,
) -> bool {
    !cycles_through(graph, start, active, max_len).is_empty()
}
