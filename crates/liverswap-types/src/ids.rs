//! Identifiers and discrete time used throughout LiverSwap.
//!
//! Pair identities are plain integers: the static mechanism and the
//! dynamic market both need a total, stable order over them for
//! tie-breaking, and the market allocates them sequentially so that a
//! seeded run always produces the same ids.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PairId
// ---------------------------------------------------------------------------

/// Unique identifier of a patient-donor pair.
///
/// The numeric order is the last-resort tiebreak of priority ranking,
/// so it must never be derived from anything random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PairId(pub u64);

impl PairId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// A discrete market period. Period 0 is the first simulated period.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Period(pub u32);

impl Period {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The period `periods` after this one.
    #[must_use]
    pub fn after(self, periods: u32) -> Self {
        Self(self.0.saturating_add(periods))
    }

    /// Number of periods from `self` until `later` (zero if `later` is not
    /// in the future).
    #[must_use]
    pub fn until(self, later: Period) -> u32 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
