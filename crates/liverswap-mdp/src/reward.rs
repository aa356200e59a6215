//! Per-period reward accounting.
//!
//! `reward(t) = value(matched) - expiry_penalty * |expired|`, where
//! `value` counts transplants or sums priority weights. Discounting by
//! `discount^t` is applied by [`RewardTally`].

use liverswap_types::{Pair, PeriodReport, RewardConfig, RewardMeasure};

/// Value of a set of matched pairs under `measure`.
#[must_use]
pub fn matched_value(measure: &RewardMeasure, matched: &[Pair]) -> f64 {
    match measure {
        RewardMeasure::MatchCount => matched.len() as f64,
        RewardMeasure::PriorityWeighted(weights) => {
            matched.iter().map(|p| weights.weight(p.class)).sum()
        }
    }
}

/// Undiscounted reward of one period.
#[must_use]
pub fn period_reward(config: &RewardConfig, report: &PeriodReport) -> f64 {
    matched_value(&config.measure, &report.matched_pairs)
        - config.expiry_penalty * report.expired.len() as f64
}

/// Running totals over one trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTally {
    config: RewardConfig,
    /// Discounted reward so far.
    pub total: f64,
    pub matched: usize,
    pub expired: usize,
}

impl RewardTally {
    #[must_use]
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            total: 0.0,
            matched: 0,
            expired: 0,
        }
    }

    /// Add one period; returns its discounted reward.
    pub fn record(&mut self, report: &PeriodReport) -> f64 {
        let exponent = i32::try_from(report.period.0).unwrap_or(i32::MAX);
        let reward = period_reward(&self.config, report) * self.config.discount.powi(exponent);
        self.total += reward;
        self.matched += report.transplants();
        self.expired += report.expired.len();
        reward
    }
}
