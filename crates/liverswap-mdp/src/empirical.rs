//! Empirical MDP over a coarse view of the market.
//!
//! The market state is reduced to a [`StateShape`]: how many pairs are
//! waiting and how many of them are within `critical_threshold` periods of
//! their deadline, both capped. Simulated episodes pick one of the candidate
//! policies uniformly at random each period and record the resulting
//! shape transitions and rewards. The frequencies form a [`DiscreteMdp`]
//! whose actions are the candidate policies; solving it tells which
//! policy to use in which shape, and its values cross-check the Monte
//! Carlo estimates.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use liverswap_market::{DynamicMarket, MarketSpec, MarketState, Policy, SimRng};
use liverswap_types::{EmpiricalMdpConfig, LiverswapError, MarketPhase, Result, Validate};

use crate::evaluator::derive_seed;
use crate::reward::period_reward;
use crate::value_iteration::{DiscreteMdp, ValueFunction, value_iteration};

/// Discretized market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateShape {
    pub pool: usize,
    pub critical: usize,
}

impl StateShape {
    /// Observe `state`, counting pairs with at most `threshold` periods
    /// left as critical and capping both coordinates. The critical count
    /// never exceeds the capped pool.
    #[must_use]
    pub fn observe(
        state: &MarketState,
        threshold: u32,
        pool_cap: usize,
        critical_cap: usize,
    ) -> Self {
        let pool = state.len().min(pool_cap);
        let critical = state.critical(threshold).count().min(critical_cap).min(pool);
        Self { pool, critical }
    }
}

/// Running sums for one `(state, action)`.
#[derive(Debug, Clone, Default)]
struct Counts {
    visits: usize,
    reward: f64,
    next: BTreeMap<usize, usize>,
}

/// A [`DiscreteMdp`] estimated from simulation.
#[derive(Debug, Clone)]
pub struct EmpiricalMdp {
    /// Shape of each non-terminal state index.
    pub shapes: Vec<StateShape>,
    /// Index of the absorbing end-of-horizon state.
    pub terminal: usize,
    /// Name of the policy behind each action index.
    pub actions: Vec<&'static str>,
    /// `visits[state][action]`.
    pub visits: Vec<Vec<usize>>,
    pub mdp: DiscreteMdp,
    config: EmpiricalMdpConfig,
}

impl EmpiricalMdp {
    /// Simulate `config.episodes` episodes and build the MDP.
    ///
    /// # Errors
    /// `InvalidConfig` for a bad config or an empty policy list; market
    /// errors are propagated.
    pub fn estimate(spec: &MarketSpec, policies: &[Policy], config: &EmpiricalMdpConfig) -> Result<Self> {
        config.validate()?;
        if policies.is_empty() {
            return Err(LiverswapError::config("policies", "need at least one policy"));
        }
        for policy in policies {
            policy.validate()?;
        }

        let shapes: Vec<StateShape> = (0..=config.pool_cap)
            .flat_map(|pool| {
                (0..=config.critical_cap.min(pool)).map(move |critical| StateShape { pool, critical })
            })
            .collect();
        let index: BTreeMap<StateShape, usize> =
            shapes.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let terminal = shapes.len();
        let num_states = terminal + 1;
        let num_actions = policies.len();
        let locate = |state: &MarketState| -> Result<usize> {
            let shape = StateShape::observe(
                state,
                config.critical_threshold,
                config.pool_cap,
                config.critical_cap,
            );
            index
                .get(&shape)
                .copied()
                .ok_or_else(|| LiverswapError::Internal(format!("unindexed shape {shape:?}")))
        };

        let mut counts = vec![vec![Counts::default(); num_actions]; num_states];
        for episode in 0..config.episodes {
            let seed = derive_seed("mdp_episode", config.seed, episode as u64);
            let mut chooser = SimRng::seed_from_u64(derive_seed("mdp_choice", config.seed, episode as u64));
            let mut market = DynamicMarket::new(spec.clone(), seed)?.with_horizon(config.horizon)?;
            market.start(policies[0].clone())?;

            while market.phase() == MarketPhase::Running {
                let from = locate(market.state())?;
                let action = chooser.gen_range(0..num_actions);
                let report = market.step_with(&policies[action])?;
                let to = if market.phase() == MarketPhase::Finished {
                    terminal
                } else {
                    locate(market.state())?
                };
                let cell = &mut counts[from][action];
                cell.visits += 1;
                cell.reward += period_reward(&config.reward, &report);
                *cell.next.entry(to).or_default() += 1;
            }
        }

        let mut mdp = DiscreteMdp::new(num_states, num_actions, config.vi_discount)?;
        for (s, row) in counts.iter().enumerate() {
            let observed = s != terminal && row.iter().any(|c| c.visits > 0);
            for (a, cell) in row.iter().enumerate() {
                if observed {
                    if cell.visits == 0 {
                        continue;
                    }
                    let n = cell.visits as f64;
                    let mean_reward = cell.reward / n;
                    for (&next, &k) in &cell.next {
                        mdp.add_transition(s, a, next, k as f64 / n, mean_reward)?;
                    }
                } else {
                    // Terminal or never visited: absorbing with no reward.
                    mdp.add_transition(s, a, s, 1.0, 0.0)?;
                }
            }
        }

        let visits = counts
            .iter()
            .map(|row| row.iter().map(|c| c.visits).collect())
            .collect();
        tracing::info!(
            episodes = config.episodes,
            states = num_states,
            actions = num_actions,
            "Empirical MDP estimated"
        );
        Ok(Self {
            shapes,
            terminal,
            actions: policies.iter().map(Policy::name).collect(),
            visits,
            mdp,
            config: *config,
        })
    }

    /// Solve by value iteration with the configured tolerance and budget.
    ///
    /// # Errors
    /// Propagates value-iteration errors.
    pub fn solve(&self) -> Result<ValueFunction> {
        value_iteration(&self.mdp, self.config.tolerance, self.config.max_iterations)
    }

    /// State index of `shape`, if it lies within the caps.
    #[must_use]
    pub fn index_of(&self, shape: StateShape) -> Option<usize> {
        self.shapes.iter().position(|s| *s == shape)
    }

    /// Total recorded transitions.
    #[must_use]
    pub fn total_visits(&self) -> usize {
        self.visits.iter().flatten().sum()
    }
}
