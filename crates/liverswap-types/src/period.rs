//! Market lifecycle and per-period outcome types.
//!
//! A dynamic market moves through three phases:
//! **PRE_START → RUNNING → FINISHED**
//!
//! Every RUNNING period expires overdue pairs, admits arrivals, asks the
//! active policy for a decision, applies it, and emits a [`PeriodReport`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Matching, Pair, PairId, Period};

/// Lifecycle phase of a dynamic market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketPhase {
    /// Built but not yet started; no period has run.
    PreStart,
    /// Periods are being simulated.
    Running,
    /// Horizon reached or stopped externally. Terminal.
    Finished,
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreStart => write!(f, "PRE_START"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Outcome of one market period.
///
/// Conservation: `matched ∪ expired ∪ still active = previously active ∪
/// arrived`, with no pair in two of the three outcome sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: Period,
    /// Pairs admitted this period, in id order.
    pub arrived: Vec<Pair>,
    /// Pairs removed unmatched because their deadline was reached.
    pub expired: Vec<Pair>,
    /// The executed policy decision.
    pub matched: Matching,
    /// The matched pairs' records, in matching order.
    pub matched_pairs: Vec<Pair>,
    /// Ids still active after the decision was applied, in id order.
    pub active_after: Vec<PairId>,
}

impl PeriodReport {
    /// Number of transplants carried out this period.
    #[must_use]
    pub fn transplants(&self) -> usize {
        self.matched.pair_count()
    }
}
