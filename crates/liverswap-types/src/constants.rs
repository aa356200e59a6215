//! System-wide constants for the LiverSwap exchange engine.

/// Highest (most urgent) priority class accepted by ranking.
pub const MAX_PRIORITY_CLASS: u8 = 3;

/// Default cycle-length bound: two-way exchange.
pub const DEFAULT_MAX_CYCLE_LEN: usize = 2;

/// Largest cycle-length bound accepted by configuration validation.
/// Bounded-cycle packing beyond two-way is solved by exact search.
pub const MAX_SUPPORTED_CYCLE_LEN: usize = 4;

/// Default Patient threshold: a pair is critical when it has at most this
/// many periods left before its deadline (1 = this period is its last).
pub const DEFAULT_PATIENT_THRESHOLD: u32 = 1;

/// Default Patient-α interpolation parameter.
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Default expected gain in option value from waiting one period
/// (used by the survival-weighted wait estimator).
pub const DEFAULT_WAIT_GROWTH: f64 = 0.25;

/// Default base weight of a matched pair in priority-weighted rewards.
pub const DEFAULT_BASE_WEIGHT: f64 = 1.0;

/// Default additional weight per priority class step.
pub const DEFAULT_PER_CLASS_WEIGHT: f64 = 1.0;

/// Default Poisson arrival rate (pairs per period).
pub const DEFAULT_ARRIVAL_RATE: f64 = 2.0;

/// Default fixed sojourn (periods a pair stays before its deadline).
pub const DEFAULT_SOJOURN: u32 = 4;

/// Default simulation horizon in periods.
pub const DEFAULT_HORIZON: u32 = 50;

/// Default number of Monte Carlo trials.
pub const DEFAULT_NUM_TRIALS: usize = 200;

/// Default reward discount factor.
pub const DEFAULT_DISCOUNT: f64 = 1.0;

/// Default cap on the pool-size coordinate of discretized MDP states.
pub const DEFAULT_POOL_CAP: usize = 12;

/// Default cap on the critical-count coordinate of discretized MDP states.
pub const DEFAULT_CRITICAL_CAP: usize = 3;

/// Default value-iteration convergence tolerance (sup norm).
pub const DEFAULT_VI_TOLERANCE: f64 = 1e-9;

/// Default value-iteration iteration budget.
pub const DEFAULT_VI_MAX_ITERATIONS: usize = 10_000;

/// Upper bound on Poisson arrivals sampled in a single period.
pub const MAX_ARRIVALS_PER_PERIOD: usize = 1_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "LiverSwap";
