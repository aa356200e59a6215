//! The dynamic exchange market.
//!
//! ## Lifecycle
//!
//! ```text
//! PRE_START --start(policy)--> RUNNING --horizon / stop()--> FINISHED
//! ```
//!
//! ## One period at clock `t`
//!
//! 1. Expire pairs whose deadline is `<= t`
//! 2. Admit arrivals for `t` (ids allocated sequentially, deadlines from
//!    the `DeadlineRule` unless pinned)
//! 3. Build the compatibility graph and ask the policy for a decision
//! 4. Validate the decision (fail fast) and remove the matched pairs
//! 5. Check pair conservation, emit the `PeriodReport`, advance the clock

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;

use liverswap_mechanism::{Compatibility, CompatibilityGraph};
use liverswap_types::{
    LiverswapError, MarketConfig, MarketPhase, Pair, PairId, Period, PeriodReport, Result,
    Validate,
};

use crate::deadlines::{deadline_for, sample_sojourn};
use crate::policy::{DecisionContext, Policy, validate_decision};
use crate::{ArrivalProcess, MarketState, SimRng};

/// Everything needed to build a fresh market: parameters, arrivals, and
/// the compatibility predicate. Cheap to clone.
#[derive(Clone)]
pub struct MarketSpec {
    pub config: MarketConfig,
    pub arrivals: Arc<dyn ArrivalProcess>,
    pub compatibility: Arc<dyn Compatibility>,
}

impl fmt::Debug for MarketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketSpec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MarketSpec {
    /// # Errors
    /// Returns `InvalidConfig` if the config or the arrival process is
    /// invalid.
    pub fn new(
        config: MarketConfig,
        arrivals: impl ArrivalProcess + 'static,
        compatibility: impl Compatibility + 'static,
    ) -> Result<Self> {
        let spec = Self {
            config,
            arrivals: Arc::new(arrivals),
            compatibility: Arc::new(compatibility),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// # Errors
    /// Returns `InvalidConfig` naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.arrivals.validate()
    }
}

/// A running simulation of the exchange market.
pub struct DynamicMarket {
    spec: MarketSpec,
    ctx: DecisionContext,
    seed: u64,
    horizon: Option<u32>,
    rng: SimRng,
    phase: MarketPhase,
    state: MarketState,
    next_id: PairId,
    policy: Option<Policy>,
}

impl fmt::Debug for DynamicMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicMarket")
            .field("phase", &self.phase)
            .field("clock", &self.state.clock())
            .field("active", &self.state.len())
            .field("seed", &self.seed)
            .field("horizon", &self.horizon)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DynamicMarket {
    /// A market in PRE_START with no horizon (it runs until stopped).
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `spec` is invalid.
    pub fn new(spec: MarketSpec, seed: u64) -> Result<Self> {
        spec.validate()?;
        let ctx = DecisionContext::from_config(&spec.config)?;
        Ok(Self {
            spec,
            ctx,
            seed,
            horizon: None,
            rng: SimRng::seed_from_u64(seed),
            phase: MarketPhase::PreStart,
            state: MarketState::default(),
            next_id: PairId(0),
            policy: None,
        })
    }

    /// Finish automatically after `horizon` periods.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `horizon` is zero.
    pub fn with_horizon(mut self, horizon: u32) -> Result<Self> {
        if horizon == 0 {
            return Err(LiverswapError::config("horizon", "must be positive"));
        }
        self.horizon = Some(horizon);
        Ok(self)
    }

    /// Build, start, and wrap a market in a lazy report iterator.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a bad spec, horizon or policy.
    pub fn run(spec: MarketSpec, seed: u64, horizon: u32, policy: Policy) -> Result<MarketRun> {
        MarketRun::new(spec, seed, horizon, policy)
    }

    // =================================================================
    // Lifecycle
    // =================================================================

    /// PRE_START -> RUNNING with `policy` as the default decision rule.
    ///
    /// # Errors
    /// `WrongPhase` unless in PRE_START; `InvalidConfig` for a bad policy.
    pub fn start(&mut self, policy: Policy) -> Result<()> {
        self.expect_phase(MarketPhase::PreStart)?;
        policy.validate()?;
        tracing::debug!(seed = self.seed, policy = policy.name(), "Market started");
        self.policy = Some(policy);
        self.phase = MarketPhase::Running;
        Ok(())
    }

    /// Stop the market. Idempotent.
    pub fn stop(&mut self) {
        if self.phase != MarketPhase::Finished {
            tracing::debug!(clock = %self.state.clock(), "Market stopped");
        }
        self.phase = MarketPhase::Finished;
    }

    /// Run one period with the policy given to [`DynamicMarket::start`].
    ///
    /// # Errors
    /// See [`DynamicMarket::step_with`].
    pub fn step(&mut self) -> Result<PeriodReport> {
        self.expect_phase(MarketPhase::Running)?;
        let policy = self
            .policy
            .clone()
            .ok_or_else(|| LiverswapError::Internal("running market has no policy".into()))?;
        self.step_with(&policy)
    }

    /// Run one period deciding with `policy`.
    ///
    /// # Errors
    /// - `MarketFinished` after the horizon or `stop()`
    /// - `WrongPhase` before `start()`
    /// - an invariant violation if the decision or the period outcome is
    ///   inconsistent; the market is left FINISHED
    pub fn step_with(&mut self, policy: &Policy) -> Result<PeriodReport> {
        self.expect_phase(MarketPhase::Running)?;
        match self.advance(policy) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.phase = MarketPhase::Finished;
                Err(e)
            }
        }
    }

    fn advance(&mut self, policy: &Policy) -> Result<PeriodReport> {
        let t = self.state.clock();
        let before: Vec<PairId> = self.state.active().iter().map(|p| p.id).collect();

        // (i) expire
        let expired = self.state.take_expired();
        for pair in &expired {
            tracing::debug!(pair = %pair.id, deadline = %pair.deadline, "Pair expired");
        }

        // (ii) admit
        let arrived = self.admit_arrivals(t)?;

        // (iii) decide
        let graph = CompatibilityGraph::build(self.state.active(), &*self.spec.compatibility)?;
        let decision = policy.decide(&self.state, &graph, &self.ctx)?;

        // (iv) validate and apply
        let max_len = self.ctx.mechanism.config().max_cycle_len;
        if let Err(e) = validate_decision(&self.state, &graph, &decision, max_len) {
            tracing::warn!(period = %t, policy = policy.name(), error = %e, "Decision rejected");
            return Err(e);
        }
        let mut matched_pairs = Vec::with_capacity(decision.pair_count());
        for id in decision.pairs() {
            let pair = self.state.remove(id).ok_or(LiverswapError::InactivePair(id))?;
            matched_pairs.push(pair);
        }

        let report = PeriodReport {
            period: t,
            arrived,
            expired,
            matched: decision,
            matched_pairs,
            active_after: self.state.active().iter().map(|p| p.id).collect(),
        };
        check_conservation(&before, &report)?;

        tracing::debug!(
            period = %t,
            arrived = report.arrived.len(),
            expired = report.expired.len(),
            matched = report.transplants(),
            active = report.active_after.len(),
            "Period complete"
        );

        // (v) advance
        let next = t.next();
        self.state.set_clock(next);
        if self.horizon.is_some_and(|h| next.0 >= h) {
            self.phase = MarketPhase::Finished;
        }
        Ok(report)
    }

    fn admit_arrivals(&mut self, t: Period) -> Result<Vec<Pair>> {
        let arrivals = self.spec.arrivals.arrivals(t, &mut self.rng);
        let mut admitted = Vec::with_capacity(arrivals.len());
        for arrival in arrivals {
            let sojourn = match arrival.sojourn {
                Some(s) => s,
                None => sample_sojourn(&self.spec.config.deadlines, &mut self.rng),
            };
            let pair = Pair::new(
                self.next_id,
                arrival.profile,
                t,
                deadline_for(t, sojourn),
                arrival.class,
            );
            pair.validate()?;
            self.next_id = self.next_id.next();
            self.state.admit(pair.clone());
            admitted.push(pair);
        }
        Ok(admitted)
    }

    fn expect_phase(&self, expected: MarketPhase) -> Result<()> {
        if self.phase == expected {
            return Ok(());
        }
        if self.phase == MarketPhase::Finished {
            return Err(LiverswapError::MarketFinished);
        }
        Err(LiverswapError::WrongPhase {
            expected,
            actual: self.phase,
        })
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn phase(&self) -> MarketPhase {
        self.phase
    }

    #[must_use]
    pub fn clock(&self) -> Period {
        self.state.clock()
    }

    #[must_use]
    pub fn state(&self) -> &MarketState {
        &self.state
    }

    #[must_use]
    pub fn spec(&self) -> &MarketSpec {
        &self.spec
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// `matched ∪ expired ∪ active_after == before ∪ arrived`, all disjoint.
fn check_conservation(before: &[PairId], report: &PeriodReport) -> Result<()> {
    let violation = |reason: String| LiverswapError::ConservationViolated {
        period: report.period.0,
        reason,
    };

    let mut inputs = BTreeSet::new();
    for id in before.iter().copied().chain(report.arrived.iter().map(|p| p.id)) {
        if !inputs.insert(id) {
            return Err(violation(format!("{id} both active and arriving")));
        }
    }

    let mut outputs = BTreeSet::new();
    let outcome_ids = report
        .matched_pairs
        .iter()
        .map(|p| p.id)
        .chain(report.expired.iter().map(|p| p.id))
        .chain(report.active_after.iter().copied());
    for id in outcome_ids {
        if !outputs.insert(id) {
            return Err(violation(format!("{id} counted twice")));
        }
    }

    if let Some(id) = inputs.symmetric_difference(&outputs).next() {
        let reason = if inputs.contains(id) {
            format!("{id} disappeared")
        } else {
            format!("{id} appeared from nowhere")
        };
        return Err(violation(reason));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MarketRun
// ---------------------------------------------------------------------------

/// A finite lazy sequence of period reports.
///
/// Yields one `Result<PeriodReport>` per period until the horizon; after
/// an error it yields nothing more. [`MarketRun::restart`] rebuilds the
/// market from the stored seed and replays the identical sequence.
#[derive(Debug)]
pub struct MarketRun {
    spec: MarketSpec,
    seed: u64,
    horizon: u32,
    policy: Policy,
    market: DynamicMarket,
    failed: bool,
}

impl MarketRun {
    fn new(spec: MarketSpec, seed: u64, horizon: u32, policy: Policy) -> Result<Self> {
        let market = Self::fresh(&spec, seed, horizon, &policy)?;
        Ok(Self {
            spec,
            seed,
            horizon,
            policy,
            market,
            failed: false,
        })
    }

    fn fresh(spec: &MarketSpec, seed: u64, horizon: u32, policy: &Policy) -> Result<DynamicMarket> {
        let mut market = DynamicMarket::new(spec.clone(), seed)?.with_horizon(horizon)?;
        market.start(policy.clone())?;
        Ok(market)
    }

    /// Start over from period 0 with the same seed.
    ///
    /// # Errors
    /// Cannot fail for a run that was built successfully; propagates
    /// construction errors otherwise.
    pub fn restart(&mut self) -> Result<()> {
        self.market = Self::fresh(&self.spec, self.seed, self.horizon, &self.policy)?;
        self.failed = false;
        Ok(())
    }

    #[must_use]
    pub fn market(&self) -> &DynamicMarket {
        &self.market
    }

    #[must_use]
    pub fn horizon(&self) -> u32 {
        self.horizon
    }
}

impl Iterator for MarketRun {
    type Item = Result<PeriodReport>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.market.phase() == MarketPhase::Finished {
            return None;
        }
        let result = self.market.step();
        self.failed = result.is_err();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use liverswap_mechanism::LobeCompatibility;
    use liverswap_types::{DeadlineRule, LiverProfile, Matching, PriorityClass};

    use super::*;
    use crate::{Arrival, NoArrivals, PoissonArrivals, ScriptedArrivals};

    fn scripted(pairs: usize, sojourn: u32) -> MarketSpec {
        let mut script = ScriptedArrivals::new();
        for _ in 0..pairs {
            script = script.at(
                0,
                Arrival::new(LiverProfile::default(), PriorityClass::ROUTINE).with_sojourn(sojourn),
            );
        }
        MarketSpec::new(MarketConfig::default(), script, LobeCompatibility).unwrap()
    }

    #[test]
    fn lifecycle_phases() {
        let mut market = DynamicMarket::new(scripted(2, 3), 0).unwrap();
        assert_eq!(market.phase(), MarketPhase::PreStart);
        assert!(matches!(
            market.step(),
            Err(LiverswapError::WrongPhase {
                expected: MarketPhase::Running,
                actual: MarketPhase::PreStart
            })
        ));

        market.start(Policy::Greedy).unwrap();
        assert_eq!(market.phase(), MarketPhase::Running);
        assert!(market.start(Policy::Greedy).is_err());

        market.stop();
        assert_eq!(market.phase(), MarketPhase::Finished);
        assert!(matches!(market.step(), Err(LiverswapError::MarketFinished)));
    }

    #[test]
    fn horizon_finishes_market() {
        let mut market = DynamicMarket::new(scripted(0, 1), 0)
            .unwrap()
            .with_horizon(3)
            .unwrap();
        market.start(Policy::Greedy).unwrap();
        for _ in 0..3 {
            market.step().unwrap();
        }
        assert_eq!(market.phase(), MarketPhase::Finished);
        assert_eq!(market.clock(), Period(3));
        assert!(DynamicMarket::new(scripted(0, 1), 0).unwrap().with_horizon(0).is_err());
    }

    #[test]
    fn ids_are_sequential_and_deadlines_follow_rule() {
        let config = MarketConfig {
            deadlines: DeadlineRule::Fixed { sojourn: 5 },
            ..MarketConfig::default()
        };
        let script = ScriptedArrivals::new()
            .at(0, Arrival::new(LiverProfile::default(), PriorityClass(1)))
            .at(1, Arrival::new(LiverProfile::default(), PriorityClass(0)).with_sojourn(2));
        let spec = MarketSpec::new(config, script, |_: &Pair, _: &Pair| false).unwrap();
        let mut market = DynamicMarket::new(spec, 0).unwrap();
        market.start(Policy::Greedy).unwrap();

        let r0 = market.step().unwrap();
        assert_eq!(r0.arrived[0].id, PairId(0));
        assert_eq!(r0.arrived[0].deadline, Period(5));
        let r1 = market.step().unwrap();
        assert_eq!(r1.arrived[0].id, PairId(1));
        assert_eq!(r1.arrived[0].deadline, Period(3));
    }

    #[test]
    fn pairs_expire_at_deadline() {
        let spec = MarketSpec::new(
            MarketConfig::default(),
            ScriptedArrivals::new().at(
                0,
                Arrival::new(LiverProfile::default(), PriorityClass(0)).with_sojourn(2),
            ),
            |_: &Pair, _: &Pair| false,
        )
        .unwrap();
        let mut market = DynamicMarket::new(spec, 0).unwrap();
        market.start(Policy::Greedy).unwrap();
        assert!(market.step().unwrap().expired.is_empty());
        assert!(market.step().unwrap().expired.is_empty());
        let r2 = market.step().unwrap();
        assert_eq!(r2.period, Period(2));
        assert_eq!(r2.expired.len(), 1);
        assert!(r2.active_after.is_empty());
    }

    #[test]
    fn step_with_overrides_policy() {
        let mut market = DynamicMarket::new(scripted(2, 4), 0).unwrap();
        market.start(Policy::patient()).unwrap();
        let report = market.step_with(&Policy::Greedy).unwrap();
        assert_eq!(report.transplants(), 2);
    }

    #[test]
    fn conservation_check_catches_lost_pairs() {
        let report = PeriodReport {
            period: Period(1),
            arrived: vec![Pair::dummy(2)],
            expired: vec![],
            matched: Matching::new(),
            matched_pairs: vec![],
            active_after: vec![PairId(2)],
        };
        assert!(check_conservation(&[], &report).is_ok());
        let err = check_conservation(&[PairId(1)], &report).unwrap_err();
        assert!(err.is_invariant_violation());

        let doubled = PeriodReport {
            expired: vec![Pair::dummy(2)],
            ..report
        };
        assert!(check_conservation(&[], &doubled).is_err());
    }

    #[test]
    fn run_is_finite_and_restartable() {
        let spec = MarketSpec::new(
            MarketConfig::default(),
            PoissonArrivals::default(),
            LobeCompatibility,
        )
        .unwrap();
        let mut run = DynamicMarket::run(spec, 17, 12, Policy::Greedy).unwrap();
        let first: Vec<PeriodReport> = run.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(first.len(), 12);
        assert!(run.next().is_none());

        run.restart().unwrap();
        let second: Vec<PeriodReport> = run.collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_spec_rejected() {
        let config = MarketConfig {
            deadlines: DeadlineRule::Fixed { sojourn: 0 },
            ..MarketConfig::default()
        };
        let err = MarketSpec::new(config, NoArrivals, LobeCompatibility).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(
            MarketSpec::new(MarketConfig::default(), PoissonArrivals::new(-2.0), LobeCompatibility)
                .is_err()
        );
    }
}
