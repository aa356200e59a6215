//! Configuration types for the static mechanism, the dynamic market, and
//! policy evaluation.
//!
//! Every config has a `Default` built from [`crate::constants`] and a
//! `validate()` that reports out-of-range parameters as
//! [`LiverswapError::InvalidConfig`] before any computation starts.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{LiverswapError, PriorityClass, Result, constants};

/// Configs that can check their own parameters.
pub trait Validate {
    /// # Errors
    /// Returns `InvalidConfig` naming the first offending field.
    fn validate(&self) -> Result<()>;
}

/// Parse a config from JSON and validate it.
///
/// # Errors
/// `Serialization` on malformed JSON, `InvalidConfig` on bad values.
pub fn from_json<T: DeserializeOwned + Validate>(json: &str) -> Result<T> {
    let cfg: T = serde_json::from_str(json)?;
    cfg.validate()?;
    Ok(cfg)
}

fn check_probability(field: &'static str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(LiverswapError::config(field, format!("{p} is not in [0, 1]")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Static mechanism
// ---------------------------------------------------------------------------

/// Parameters of the adaptive-priority static mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanismConfig {
    /// Longest exchange cycle allowed (2 = two-way exchange only).
    pub max_cycle_len: usize,
    /// Only select cycles that keep the maximum number of coverable pairs
    /// unchanged. Disabling this gives the plain serial precedence rule.
    /// Supported for two-way exchange only, where the maximum is computed
    /// in polynomial time.
    pub preserve_maximum: bool,
}

impl Default for MechanismConfig {
    fn default() -> Self {
        Self {
            max_cycle_len: constants::DEFAULT_MAX_CYCLE_LEN,
            preserve_maximum: true,
        }
    }
}

impl Validate for MechanismConfig {
    fn validate(&self) -> Result<()> {
        if self.max_cycle_len < 2 {
            return Err(LiverswapError::config(
                "max_cycle_len",
                format!("{} is below 2", self.max_cycle_len),
            ));
        }
        if self.max_cycle_len > constants::MAX_SUPPORTED_CYCLE_LEN {
            return Err(LiverswapError::config(
                "max_cycle_len",
                format!(
                    "{} exceeds supported bound {}",
                    self.max_cycle_len,
                    constants::MAX_SUPPORTED_CYCLE_LEN
                ),
            ));
        }
        if self.preserve_maximum && self.max_cycle_len > 2 {
            return Err(LiverswapError::config(
                "preserve_maximum",
                format!(
                    "requires max_cycle_len 2, got {}; longer cycles use the plain rule",
                    self.max_cycle_len
                ),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Priority weights
// ---------------------------------------------------------------------------

/// Value of matching a pair, as a function of its priority class:
/// `base + per_class * class`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub base: f64,
    pub per_class: f64,
}

impl PriorityWeights {
    #[must_use]
    pub fn weight(&self, class: PriorityClass) -> f64 {
        self.base + self.per_class * f64::from(class.0)
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            base: constants::DEFAULT_BASE_WEIGHT,
            per_class: constants::DEFAULT_PER_CLASS_WEIGHT,
        }
    }
}

impl Validate for PriorityWeights {
    fn validate(&self) -> Result<()> {
        if !self.base.is_finite() || self.base <= 0.0 {
            return Err(LiverswapError::config(
                "base",
                format!("{} must be finite and positive", self.base),
            ));
        }
        if !self.per_class.is_finite() || self.per_class < 0.0 {
            return Err(LiverswapError::config(
                "per_class",
                format!("{} must be finite and non-negative", self.per_class),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dynamic market
// ---------------------------------------------------------------------------

/// How long an arriving pair stays before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeadlineRule {
    /// Every pair stays exactly `sojourn` periods.
    Fixed { sojourn: u32 },
    /// Sojourn drawn uniformly from `min..=max`.
    Uniform { min: u32, max: u32 },
    /// Each period the pair departs with probability `departure_prob`;
    /// sojourn is geometric with mean `1 / departure_prob`.
    Geometric { departure_prob: f64 },
}

impl Default for DeadlineRule {
    fn default() -> Self {
        Self::Fixed {
            sojourn: constants::DEFAULT_SOJOURN,
        }
    }
}

impl Validate for DeadlineRule {
    fn validate(&self) -> Result<()> {
        match *self {
            Self::Fixed { sojourn } if sojourn == 0 => Err(LiverswapError::config(
                "sojourn",
                "pairs must stay at least one period",
            )),
            Self::Uniform { min, max } if min == 0 || max < min => Err(LiverswapError::config(
                "sojourn",
                format!("uniform range {min}..={max} must be non-empty and start at 1 or later"),
            )),
            Self::Geometric { departure_prob } if !(departure_prob > 0.0 && departure_prob <= 1.0) => {
                Err(LiverswapError::config(
                    "departure_prob",
                    format!("{departure_prob} is not in (0, 1]"),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Parameters of a dynamic-market simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Mechanism used whenever a policy computes a matching.
    pub mechanism: MechanismConfig,
    /// Deadline assignment for arriving pairs.
    pub deadlines: DeadlineRule,
    /// Weights used by policies that trade off priority against waiting.
    pub weights: PriorityWeights,
}

impl Validate for MarketConfig {
    fn validate(&self) -> Result<()> {
        self.mechanism.validate()?;
        self.deadlines.validate()?;
        self.weights.validate()
    }
}

// ---------------------------------------------------------------------------
// Rewards and evaluation
// ---------------------------------------------------------------------------

/// Per-period efficiency measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum RewardMeasure {
    /// One unit per transplant.
    #[default]
    MatchCount,
    /// Priority weight per transplant.
    PriorityWeighted(PriorityWeights),
}

/// Reward accounting: `value(matched) - expiry_penalty * |expired|` per
/// period, discounted by `discount^t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub measure: RewardMeasure,
    pub expiry_penalty: f64,
    pub discount: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            measure: RewardMeasure::default(),
            expiry_penalty: 0.0,
            discount: constants::DEFAULT_DISCOUNT,
        }
    }
}

impl Validate for RewardConfig {
    fn validate(&self) -> Result<()> {
        if let RewardMeasure::PriorityWeighted(weights) = &self.measure {
            weights.validate()?;
        }
        if !self.expiry_penalty.is_finite() || self.expiry_penalty < 0.0 {
            return Err(LiverswapError::config(
                "expiry_penalty",
                format!("{} must be finite and non-negative", self.expiry_penalty),
            ));
        }
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(LiverswapError::config(
                "discount",
                format!("{} is not in (0, 1]", self.discount),
            ));
        }
        Ok(())
    }
}

/// Monte Carlo evaluation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub num_trials: usize,
    pub horizon: u32,
    /// Master seed; trial seeds are derived from it.
    pub seed: u64,
    pub reward: RewardConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            num_trials: constants::DEFAULT_NUM_TRIALS,
            horizon: constants::DEFAULT_HORIZON,
            seed: 0,
            reward: RewardConfig::default(),
        }
    }
}

impl Validate for EvaluationConfig {
    fn validate(&self) -> Result<()> {
        if self.num_trials == 0 {
            return Err(LiverswapError::config("num_trials", "must be positive"));
        }
        if self.horizon == 0 {
            return Err(LiverswapError::config("horizon", "must be positive"));
        }
        self.reward.validate()
    }
}

/// Parameters for estimating a discretized MDP from simulated transitions
/// and solving it by value iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalMdpConfig {
    /// Simulation episodes used to estimate transitions.
    pub episodes: usize,
    pub horizon: u32,
    pub seed: u64,
    /// States with more active pairs than this share one bucket.
    pub pool_cap: usize,
    /// States with more critical pairs than this share one bucket.
    pub critical_cap: usize,
    /// A pair is critical when it has at most this many periods left.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: u32,
    pub reward: RewardConfig,
    /// Discount used by value iteration; must be below 1.
    pub vi_discount: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

fn default_critical_threshold() -> u32 {
    constants::DEFAULT_PATIENT_THRESHOLD
}

impl Default for EmpiricalMdpConfig {
    fn default() -> Self {
        Self {
            episodes: constants::DEFAULT_NUM_TRIALS,
            horizon: constants::DEFAULT_HORIZON,
            seed: 0,
            pool_cap: constants::DEFAULT_POOL_CAP,
            critical_cap: constants::DEFAULT_CRITICAL_CAP,
            critical_threshold: constants::DEFAULT_PATIENT_THRESHOLD,
            reward: RewardConfig::default(),
            vi_discount: 0.95,
            tolerance: constants::DEFAULT_VI_TOLERANCE,
            max_iterations: constants::DEFAULT_VI_MAX_ITERATIONS,
        }
    }
}

impl Validate for EmpiricalMdpConfig {
    fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(LiverswapError::config("episodes", "must be positive"));
        }
        if self.horizon == 0 {
            return Err(LiverswapError::config("horizon", "must be positive"));
        }
        if self.critical_threshold == 0 {
            return Err(LiverswapError::config("critical_threshold", "must be positive"));
        }
        if !(self.vi_discount > 0.0 && self.vi_discount < 1.0) {
            return Err(LiverswapError::config(
                "vi_discount",
                format!("{} is not in (0, 1)", self.vi_discount),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(LiverswapError::config("tolerance", "must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(LiverswapError::config("max_iterations", "must be positive"));
        }
        self.reward.validate()
    }
}

/// Validate a Patient-α interpolation parameter.
///
/// # Errors
/// Returns `InvalidConfig` if `alpha` is not in `[0, 1]`.
pub fn validate_alpha(alpha: f64) -> Result<()> {
    check_probability("alpha", alpha)
}

/// Validate a probability-valued parameter.
///
/// # Errors
/// Returns `InvalidConfig` if `p` is not in `[0, 1]`.
pub fn validate_probability(field: &'static str, p: f64) -> Result<()> {
    check_probability(field, p)
}
