//! Monte Carlo policy evaluation.
//!
//! Trial `i` simulates `horizon` periods of a fresh market seeded with
//! `derive_trial_seed(seed, i)`. Comparing policies reuses the same trial
//! seeds for each of them (common random numbers), so differences in the
//! reports come from the policies and not from the arrival draws.
//!
//! Trials are reduced in trial-index order. With the `parallel` feature
//! they are simulated on the rayon pool, and the report is identical to
//! the sequential one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use liverswap_market::{DynamicMarket, MarketSpec, Policy};
use liverswap_types::{EvaluationConfig, Result, Validate};

use crate::reward::RewardTally;

/// Domain-separated seed derivation.
#[must_use]
pub fn derive_seed(domain: &str, master: u64, index: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"liverswap:seed:v1:");
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(master.to_le_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Seed of trial `trial` under master seed `master`.
#[must_use]
pub fn derive_trial_seed(master: u64, trial: usize) -> u64 {
    derive_seed("trial", master, trial as u64)
}

/// A policy with a label for reports.
#[derive(Debug, Clone)]
pub struct NamedPolicy {
    pub name: String,
    pub policy: Policy,
}

impl NamedPolicy {
    #[must_use]
    pub fn new(name: impl Into<String>, policy: Policy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

impl From<Policy> for NamedPolicy {
    fn from(policy: Policy) -> Self {
        Self::new(policy.name(), policy)
    }
}

/// One simulated trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub seed: u64,
    /// Discounted total reward.
    pub reward: f64,
    pub matched: usize,
    pub expired: usize,
    pub periods: Vec<PeriodSample>,
}

/// What happened in one period of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodSample {
    /// Discounted reward of the period.
    pub reward: f64,
    pub matched: usize,
    pub expired: usize,
    pub active: usize,
}

/// Across-trial means for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: u32,
    pub mean_reward: f64,
    pub mean_matched: f64,
    pub mean_expired: f64,
    pub mean_active: f64,
}

/// Aggregate result of evaluating one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub trials: usize,
    pub mean_reward: f64,
    /// Sample variance of the per-trial reward (0 for a single trial).
    pub variance_reward: f64,
    pub std_error: f64,
    pub mean_matched: f64,
    pub mean_expired: f64,
    pub per_period: Vec<PeriodStats>,
}

/// A labelled evaluation, as returned by [`Evaluator::compare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyComparison {
    pub name: String,
    pub report: EvaluationReport,
}

/// Monte Carlo evaluator.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    config: EvaluationConfig,
}

impl Evaluator {
    /// # Errors
    /// Returns `InvalidConfig` for zero trials, zero horizon, or a bad
    /// reward config.
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Simulate trial `trial` of `policy`.
    ///
    /// # Errors
    /// Propagates market errors (invalid spec, invariant violations).
    pub fn run_trial(&self, spec: &MarketSpec, policy: &Policy, trial: usize) -> Result<TrialOutcome> {
        let seed = derive_trial_seed(self.config.seed, trial);
        let run = DynamicMarket::run(spec.clone(), seed, self.config.horizon, policy.clone())?;
        let mut tally = RewardTally::new(self.config.reward);
        let mut periods = Vec::with_capacity(self.config.horizon as usize);
        for report in run {
            let report = report?;
            let reward = tally.record(&report);
            periods.push(PeriodSample {
                reward,
                matched: report.transplants(),
                expired: report.expired.len(),
                active: report.active_after.len(),
            });
        }
        tracing::debug!(
            trial,
            seed,
            policy = policy.name(),
            reward = tally.total,
            matched = tally.matched,
            expired = tally.expired,
            "Trial complete"
        );
        Ok(TrialOutcome {
            seed,
            reward: tally.total,
            matched: tally.matched,
            expired: tally.expired,
            periods,
        })
    }

    /// Run every trial of `policy`, in trial-index order.
    ///
    /// # Errors
    /// Returns the first failing trial's error.
    pub fn run_trials(&self, spec: &MarketSpec, policy: &Policy) -> Result<Vec<TrialOutcome>> {
        policy.validate()?;
        spec.validate()?;
        let n = self.config.num_trials;

        #[cfg(feature = "parallel")]
        let outcomes: Vec<Result<TrialOutcome>> = {
            use rayon::prelude::*;
            (0..n)
                .into_par_iter()
                .map(|i| self.run_trial(spec, policy, i))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<Result<TrialOutcome>> =
            (0..n).map(|i| self.run_trial(spec, policy, i)).collect();

        outcomes.into_iter().collect()
    }

    /// Evaluate `policy` on `spec`.
    ///
    /// # Errors
    /// Returns the first failing trial's error.
    pub fn evaluate(&self, spec: &MarketSpec, policy: &Policy) -> Result<EvaluationReport> {
        let outcomes = self.run_trials(spec, policy)?;
        let report = reduce(&outcomes, self.config.horizon);
        tracing::info!(
            policy = policy.name(),
            trials = report.trials,
            mean_reward = report.mean_reward,
            std_error = report.std_error,
            mean_matched = report.mean_matched,
            mean_expired = report.mean_expired,
            "Policy evaluated"
        );
        Ok(report)
    }

    /// Evaluate each policy against the same trial seeds.
    ///
    /// # Errors
    /// Returns the first failing evaluation's error.
    pub fn compare(&self, spec: &MarketSpec, policies: &[NamedPolicy]) -> Result<Vec<PolicyComparison>> {
        policies
            .iter()
            .map(|named| {
                Ok(PolicyComparison {
                    name: named.name.clone(),
                    report: self.evaluate(spec, &named.policy)?,
                })
            })
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Fold trial outcomes, in order, into an [`EvaluationReport`].
#[must_use]
pub fn reduce(outcomes: &[TrialOutcome], horizon: u32) -> EvaluationReport {
    let n = outcomes.len();
    let mean_reward = mean(outcomes.iter().map(|o| o.reward), n);
    let variance_reward = if n > 1 {
        outcomes
            .iter()
            .map(|o| (o.reward - mean_reward).powi(2))
            .sum::<f64>()
            / (n - 1) as f64
    } else {
        0.0
    };
    let std_error = if n > 0 {
        (variance_reward / n as f64).sqrt()
    } else {
        0.0
    };

    let per_period = (0..horizon)
        .map(|t| {
            let at = |o: &TrialOutcome| o.periods.get(t as usize).copied();
            PeriodStats {
                period: t,
                mean_reward: mean(outcomes.iter().filter_map(at).map(|s| s.reward), n),
                mean_matched: mean(outcomes.iter().filter_map(at).map(|s| s.matched as f64), n),
                mean_expired: mean(outcomes.iter().filter_map(at).map(|s| s.expired as f64), n),
                mean_active: mean(outcomes.iter().filter_map(at).map(|s| s.active as f64), n),
            }
        })
        .collect();

    EvaluationReport {
        trials: n,
        mean_reward,
        variance_reward,
        std_error,
        mean_matched: mean(outcomes.iter().map(|o| o.matched as f64), n),
        mean_expired: mean(outcomes.iter().map(|o| o.expired as f64), n),
        per_period,
    }
}
