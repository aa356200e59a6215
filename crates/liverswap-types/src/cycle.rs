//! Exchange cycles and matchings.
//!
//! A [`Cycle`] `P1 -> P2 -> ... -> Pk -> P1` means each `Pi`'s patient is
//! compatible with `P(i+1)`'s donor, so all `k` transplants can happen
//! simultaneously. A [`Matching`] is a set of vertex-disjoint cycles.
//!
//! Both types deserialize through their checked constructors, so a decoded
//! value holds the same invariants as a built one.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{LiverswapError, PairId, Result};

/// An ordered exchange cycle of at least two distinct pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCycle")]
pub struct Cycle {
    members: Vec<PairId>,
}

#[derive(Deserialize)]
struct RawCycle {
    members: Vec<PairId>,
}

impl TryFrom<RawCycle> for Cycle {
    type Error = LiverswapError;

    fn try_from(raw: RawCycle) -> Result<Self> {
        Self::new(raw.members)
    }
}

impl Cycle {
    /// Build a cycle from its members in traversal order.
    ///
    /// # Errors
    /// Returns `DegenerateCycle` for fewer than two members or a repeated
    /// member.
    pub fn new(members: Vec<PairId>) -> Result<Self> {
        if members.len() < 2 {
            return Err(LiverswapError::DegenerateCycle {
                reason: format!("{} member(s), need at least 2", members.len()),
            });
        }
        let mut seen = HashSet::with_capacity(members.len());
        for id in &members {
            if !seen.insert(*id) {
                return Err(LiverswapError::DegenerateCycle {
                    reason: format!("{id} appears twice"),
                });
            }
        }
        Ok(Self { members })
    }

    /// A two-way exchange between `a` and `b`.
    ///
    /// # Errors
    /// Returns `DegenerateCycle` if `a == b`.
    pub fn pair(a: PairId, b: PairId) -> Result<Self> {
        Self::new(vec![a, b])
    }

    #[must_use]
    pub fn members(&self) -> &[PairId] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: a cycle has at least two members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: PairId) -> bool {
        self.members.contains(&id)
    }

    /// The directed edges `(from, to)` the cycle relies on, closing edge
    /// included.
    pub fn edges(&self) -> impl Iterator<Item = (PairId, PairId)> + '_ {
        let n = self.members.len();
        (0..n).map(move |i| (self.members[i], self.members[(i + 1) % n]))
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, id) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", id.0)?;
        }
        write!(f, ")")
    }
}

/// A set of vertex-disjoint cycles, kept in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMatching")]
pub struct Matching {
    cycles: Vec<Cycle>,
}

#[derive(Deserialize)]
struct RawMatching {
    cycles: Vec<Cycle>,
}

impl TryFrom<RawMatching> for Matching {
    type Error = LiverswapError;

    fn try_from(raw: RawMatching) -> Result<Self> {
        Self::from_cycles(raw.cycles)
    }
}

impl Matching {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matching from cycles, rejecting any overlap.
    ///
    /// # Errors
    /// Returns `OverlappingCycles` if a pair appears in two cycles.
    pub fn from_cycles(cycles: Vec<Cycle>) -> Result<Self> {
        let matching = Self { cycles };
        matching.check_disjoint()?;
        Ok(matching)
    }

    /// Append a cycle.
    ///
    /// # Errors
    /// Returns `OverlappingCycles` if the cycle shares a pair with one
    /// already in the matching. The matching is left unchanged.
    pub fn push(&mut self, cycle: Cycle) -> Result<()> {
        if let Some(id) = cycle.members().iter().find(|id| self.contains(**id)) {
            return Err(LiverswapError::OverlappingCycles(*id));
        }
        self.cycles.push(cycle);
        Ok(())
    }

    #[must_use]
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Number of cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Number of matched pairs (transplants).
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.cycles.iter().map(Cycle::len).sum()
    }

    #[must_use]
    pub fn contains(&self, id: PairId) -> bool {
        self.cycles.iter().any(|c| c.contains(id))
    }

    /// All matched pairs, cycle by cycle.
    pub fn pairs(&self) -> impl Iterator<Item = PairId> + '_ {
        self.cycles.iter().flat_map(|c| c.members().iter().copied())
    }

    /// Verify that no pair appears twice.
    ///
    /// # Errors
    /// Returns `OverlappingCycles` naming the first repeated pair.
    pub fn check_disjoint(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in self.pairs() {
            if !seen.insert(id) {
                return Err(LiverswapError::OverlappingCycles(id));
            }
        }
        Ok(())
    }

    /// Keep only the cycles for which `keep` holds.
    #[must_use]
    pub fn filtered(self, mut keep: impl FnMut(&Cycle) -> bool) -> Self {
        Self {
            cycles: self.cycles.into_iter().filter(|c| keep(c)).collect(),
        }
    }
}

impl IntoIterator for Matching {
    type Item = Cycle;
    type IntoIter = std::vec::IntoIter<Cycle>;

    fn into_iter(self) -> Self::IntoIter {
        self.cycles.into_iter()
    }
}
