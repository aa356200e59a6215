//! # liverswap-mdp
//!
//! **Policy evaluation for the LiverSwap dynamic market.**
//!
//! Estimates how much a matching policy is worth over a horizon, either by
//! Monte Carlo rollouts of the market or by solving a small MDP estimated
//! from simulation.
//!
//! ## Architecture
//!
//! 1. **Reward**: per-period value of what was matched, discounted by period
//! 2. **Evaluator**: seeded trials, common random numbers across policies
//! 3. **EmpiricalMdp**: market states bucketed into [`StateShape`]s,
//!    policies as actions, frequencies as transition probabilities
//! 4. **value_iteration**: Bellman backups on a [`DiscreteMdp`]
//!
//! ```text
//! MarketSpec + Policy -> Evaluator::evaluate -> EvaluationReport
//! MarketSpec + [Policy] -> EmpiricalMdp::estimate -> solve -> ValueFunction
//! ```

pub mod empirical;
pub mod evaluator;
pub mod reward;
pub mod value_iteration;

pub use empirical::{EmpiricalMdp, StateShape};
pub use evaluator::{
    EvaluationReport, Evaluator, NamedPolicy, PeriodSample, PeriodStats, PolicyComparison,
    TrialOutcome, derive_seed, derive_trial_seed, reduce,
};
pub use reward::{RewardTally, matched_value, period_reward};
pub use value_iteration::{DiscreteMdp, Transition, ValueFunction, evaluate_fixed, value_iteration};
