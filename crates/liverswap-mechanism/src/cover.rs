//! Maximum number of pairs coverable by disjoint bounded-length cycles.
//!
//! With two-way exchanges only, a cover is a matching in the undirected
//! graph of mutual edges and Edmonds' blossom algorithm finds a maximum one
//! in O(n³). Longer cycles fall back to an exact memoized search that
//! branches on the lowest active node: either it stays uncovered or one of
//! the cycles through it is taken. That search is exponential in the pool
//! size and is meant for small pools and offline checks; the mechanism
//! only queries the two-way cover.

use std::collections::{HashMap, VecDeque};

use crate::CompatibilityGraph;
use crate::cycles::cycles_through;

const NONE: usize = usize::MAX;

/// Cover oracle bound to one graph. Results are memoized per active set.
#[derive(Debug)]
pub struct MaxCover<'g> {
    graph: &'g CompatibilityGraph,
    max_len: usize,
    memo: HashMap<Vec<bool>, usize>,
}

impl<'g> MaxCover<'g> {
    #[must_use]
    pub fn new(graph: &'g CompatibilityGraph, max_len: usize) -> Self {
        Self {
            graph,
            max_len,
            memo: HashMap::new(),
        }
    }

    /// Maximum number of pairs coverable using only nodes with
    /// `active[i] == true`.
    pub fn cover(&mut self, active: &[bool]) -> usize {
        if self.max_len <= 2 {
            return two_way_cover(self.graph, active);
        }
        let mut scratch = active.to_vec();
        self.exact(&mut scratch)
    }

    fn exact(&mut self, active: &mut [bool]) -> usize {
        let Some(v) = active.iter().position(|&a| a) else {
            return 0;
        };
        if let Some(&known) = self.memo.get(&*active) {
            return known;
        }
        let remaining = active.iter().filter(|&&a| a).count();

        let cycles = cycles_through(self.graph, v, active, self.max_len);
        active[v] = false;
        let mut best = self.exact(active);
        active[v] = true;

        for cycle in cycles {
            if best == remaining {
                break;
            }
            for &u in &cycle {
                active[u] = false;
            }
            best = best.max(cycle.len() + self.exact(active));
            for &u in &cycle {
                active[u] = true;
            }
        }

        self.memo.insert(active.to_vec(), best);
        best
    }
}

/// Convenience wrapper for a single cover query.
#[must_use]
pub fn max_cover(graph: &CompatibilityGraph, active: &[bool], max_len: usize) -> usize {
    MaxCover::new(graph, max_len).cover(active)
}

/// Number of pairs matched by a maximum two-way matching on active nodes.
#[must_use]
pub fn two_way_cover(graph: &CompatibilityGraph, active: &[bool]) -> usize {
    let n = graph.len();
    let adj: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            if !active[i] {
                return Vec::new();
            }
            graph
                .successors_at(i)
                .iter()
                .copied()
                .filter(|&j| active[j] && graph.has_edge_at(j, i))
                .collect()
        })
        .collect();
    let mut blossom = Blossom::new(adj);
    2 * blossom.solve()
}

/// Edmonds' blossom algorithm on an undirected adjacency list.
struct Blossom {
    adj: Vec<Vec<usize>>,
    matched: Vec<usize>,
    parent: Vec<usize>,
    base: Vec<usize>,
    used: Vec<bool>,
    in_blossom: Vec<bool>,
    queue: VecDeque<usize>,
}

impl Blossom {
    fn new(adj: Vec<Vec<usize>>) -> Self {
        let n = adj.len();
        Self {
            adj,
            matched: vec![NONE; n],
            parent: vec![NONE; n],
            base: (0..n).collect(),
            used: vec![false; n],
            in_blossom: vec![false; n],
            queue: VecDeque::new(),
        }
    }

    /// Size of a maximum matching.
    fn solve(&mut self) -> usize {
        let n = self.adj.len();
        for root in 0..n {
            if self.matched[root] != NONE || self.adj[root].is_empty() {
                continue;
            }
            let mut v = self.find_path(root);
            while v != NONE {
                let pv = self.parent[v];
                let next = self.matched[pv];
                self.matched[v] = pv;
                self.matched[pv] = v;
                v = next;
            }
        }
        self.matched.iter().filter(|&&m| m != NONE).count() / 2
    }

    fn lca(&self, a: usize, b: usize) -> usize {
        let mut seen = vec![false; self.adj.len()];
        let mut a = a;
        loop {
            a = self.base[a];
            seen[a] = true;
            if self.matched[a] == NONE {
                break;
            }
            a = self.parent[self.matched[a]];
        }
        let mut b = b;
        loop {
            b = self.base[b];
            if seen[b] {
                return b;
            }
            b = self.parent[self.matched[b]];
        }
    }

    fn mark_path(&mut self, mut v: usize, b: usize, mut child: usize) {
        while self.base[v] != b {
            let m = self.matched[v];
            self.in_blossom[self.base[v]] = true;
            self.in_blossom[self.base[m]] = true;
            self.parent[v] = child;
            child = m;
            v = self.parent[m];
        }
    }

    /// Grow an alternating tree from `root`; returns the free node that
    /// ends an augmenting path, or `NONE`.
    fn find_path(&mut self, root: usize) -> usize {
        let n = self.adj.len();
        self.used.fill(false);
        self.parent.fill(NONE);
        for (i, b) in self.base.iter_mut().enumerate() {
            *b = i;
        }
        self.used[root] = true;
        self.queue.clear();
        self.queue.push_back(root);

        while let Some(v) = self.queue.pop_front() {
            for k in 0..self.adj[v].len() {
                let to = self.adj[v][k];
                if self.base[v] == self.base[to] || self.matched[v] == to {
                    continue;
                }
                if to == root || (self.matched[to] != NONE && self.parent[self.matched[to]] != NONE)
                {
                    let cur = self.lca(v, to);
                    self.in_blossom.fill(false);
                    self.mark_path(v, cur, to);
                    self.mark_path(to, cur, v);
                    for i in 0..n {
                        if self.in_blossom[self.base[i]] {
                            self.base[i] = cur;
                            if !self.used[i] {
                                self.used[i] = true;
                                self.queue.push_back(i);
                            }
                        }
                    }
                } else if self.parent[to] == NONE {
                    self.parent[to] = v;
                    if self.matched[to] == NONE {
                        return to;
                    }
                    let m = self.matched[to];
                    self.used[m] = true;
                    self.queue.push_back(m);
                }
            }
        }
        NONE
    }
}
