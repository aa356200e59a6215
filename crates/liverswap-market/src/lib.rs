//! # liverswap-market
//!
//! **Dynamic exchange market for LiverSwap.**
//!
//! Pairs arrive over time and leave at their deadline. Each period the
//! market asks a [`Policy`] which cycles to execute now and which pairs to
//! keep waiting for a thicker pool.
//!
//! ## Architecture
//!
//! 1. **ArrivalProcess**: new pairs per period, from the seeded [`SimRng`]
//! 2. **DeadlineRule** sampling: how long each pair may wait
//! 3. **Policy**: Greedy, Patient, or Patient-α decision on the live graph
//! 4. **validate_decision**: hard gate before a decision is applied
//! 5. **DynamicMarket** / **MarketRun**: the period loop and its reports
//!
//! ```text
//! expire -> admit -> CompatibilityGraph::build -> Policy::decide
//!        -> validate_decision -> apply -> PeriodReport
//! ```

pub mod arrivals;
pub mod deadlines;
pub mod market;
pub mod policy;
pub mod state;

pub use arrivals::{
    Arrival, ArrivalProcess, NoArrivals, PoissonArrivals, ProfileSampler, RandomProfiles,
    ScriptedArrivals, SimRng,
};
pub use deadlines::{deadline_for, sample_sojourn};
pub use market::{DynamicMarket, MarketRun, MarketSpec};
pub use policy::{
    DecisionContext, Policy, SurvivalWeightedEstimator, WaitValueEstimator, validate_decision,
};
pub use state::MarketState;
