//! Matching policies for the dynamic market.
//!
//! ```text
//! Greedy        match everything the static mechanism finds, every period
//! Patient       only serve pairs about to reach their deadline
//! PatientAlpha  run Greedy, then keep a cycle only if matching now beats
//!               alpha times the estimated value of waiting
//! ```
//!
//! Every decision is checked by [`validate_decision`] before the market
//! applies it.

use std::fmt;
use std::sync::Arc;

use liverswap_mechanism::{CompatibilityGraph, PriorityOrder, StaticMechanism, validate_matching};
use liverswap_types::{
    LiverswapError, MarketConfig, Matching, Pair, Period, PriorityWeights, Result, constants,
    validate_alpha,
};

use crate::MarketState;

/// Everything a policy needs besides the state and the graph.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub mechanism: StaticMechanism,
    pub weights: PriorityWeights,
}

impl DecisionContext {
    /// # Errors
    /// Returns `InvalidConfig` if the mechanism config is invalid.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            mechanism: StaticMechanism::new(config.mechanism)?,
            weights: config.weights,
        })
    }

    /// Sum of member weights: the value of executing a cycle now.
    #[must_use]
    pub fn quality(&self, members: &[&Pair]) -> f64 {
        members.iter().map(|p| self.weights.weight(p.class)).sum()
    }
}

/// Estimates the value of postponing a candidate cycle by one period.
pub trait WaitValueEstimator: Send + Sync {
    fn wait_value(&self, members: &[&Pair], period: Period, weights: &PriorityWeights) -> f64;
}

/// Values waiting at `Σ weight × survival × (1 + growth)`.
///
/// `survival` is 0 for a member whose deadline falls before the next
/// period and 1 otherwise; `growth` is the expected gain from a thicker
/// market next period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurvivalWeightedEstimator {
    pub growth: f64,
}

impl Default for SurvivalWeightedEstimator {
    fn default() -> Self {
        Self {
            growth: constants::DEFAULT_WAIT_GROWTH,
        }
    }
}

impl WaitValueEstimator for SurvivalWeightedEstimator {
    fn wait_value(&self, members: &[&Pair], period: Period, weights: &PriorityWeights) -> f64 {
        let next = period.next();
        members
            .iter()
            .filter(|p| p.deadline > next)
            .map(|p| weights.weight(p.class) * (1.0 + self.growth))
            .sum()
    }
}

/// A matching policy.
#[derive(Clone)]
pub enum Policy {
    Greedy,
    Patient {
        /// A pair is critical when it has at most this many periods left.
        threshold: u32,
    },
    PatientAlpha {
        alpha: f64,
        estimator: Arc<dyn WaitValueEstimator>,
    },
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greedy => write!(f, "Greedy"),
            Self::Patient { threshold } => {
                f.debug_struct("Patient").field("threshold", threshold).finish()
            }
            Self::PatientAlpha { alpha, .. } => {
                f.debug_struct("PatientAlpha").field("alpha", alpha).finish_non_exhaustive()
            }
        }
    }
}

impl Policy {
    /// Patient with the default threshold (match in the last period before
    /// the deadline).
    #[must_use]
    pub fn patient() -> Self {
        Self::Patient {
            threshold: constants::DEFAULT_PATIENT_THRESHOLD,
        }
    }

    /// Patient-α with the survival-weighted estimator.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `alpha` is outside `[0, 1]`.
    pub fn patient_alpha(alpha: f64) -> Result<Self> {
        Self::patient_alpha_with(alpha, Arc::new(SurvivalWeightedEstimator::default()))
    }

    /// Patient-α with a caller-supplied estimator.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `alpha` is outside `[0, 1]`.
    pub fn patient_alpha_with(alpha: f64, estimator: Arc<dyn WaitValueEstimator>) -> Result<Self> {
        validate_alpha(alpha)?;
        Ok(Self::PatientAlpha { alpha, estimator })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Greedy => "greedy",
            Self::Patient { .. } => "patient",
            Self::PatientAlpha { .. } => "patient_alpha",
        }
    }

    /// # Errors
    /// Returns `InvalidConfig` for a zero threshold or α outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Greedy => Ok(()),
            Self::Patient { threshold: 0 } => Err(LiverswapError::config(
                "threshold",
                "a zero threshold never serves anyone",
            )),
            Self::Patient { .. } => Ok(()),
            Self::PatientAlpha { alpha, .. } => validate_alpha(*alpha),
        }
    }

    /// The matching this policy executes in `state`.
    ///
    /// `graph` must be the compatibility graph over `state.active()`.
    ///
    /// # Errors
    /// Propagates ranking and mechanism errors.
    pub fn decide(
        &self,
        state: &MarketState,
        graph: &CompatibilityGraph,
        ctx: &DecisionContext,
    ) -> Result<Matching> {
        let order = PriorityOrder::rank(state.active())?;
        let t = state.clock();
        match self {
            Self::Greedy => Ok(ctx.mechanism.run(graph, &order)?.matching),
            Self::Patient { threshold } => Ok(ctx
                .mechanism
                .run_serving(graph, &order, |p| p.periods_left(t) <= *threshold)?
                .matching),
            Self::PatientAlpha { alpha, estimator } => {
                let candidate = ctx.mechanism.run(graph, &order)?.matching;
                Ok(candidate.filtered(|cycle| {
                    let members: Vec<&Pair> =
                        cycle.members().iter().filter_map(|id| graph.pair(*id)).collect();
                    let quality = ctx.quality(&members);
                    let wait = estimator.wait_value(&members, t, &ctx.weights);
                    let execute = quality > alpha * wait;
                    if !execute {
                        tracing::debug!(cycle = %cycle, quality, wait, "Cycle deferred");
                    }
                    execute
                }))
            }
        }
    }
}

/// Reject a decision that could not be carried out in `state`.
///
/// # Errors
/// `InactivePair` for a member not active in `state`; otherwise whatever
/// [`validate_matching`] reports.
pub fn validate_decision(
    state: &MarketState,
    graph: &CompatibilityGraph,
    decision: &Matching,
    max_len: usize,
) -> Result<()> {
    if let Some(id) = decision.pairs().find(|id| !state.contains(*id)) {
        return Err(LiverswapError::InactivePair(id));
    }
    validate_matching(graph, decision, max_len)
}
