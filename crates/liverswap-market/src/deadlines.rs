//! Sojourn sampling for arriving pairs.

use rand::Rng;

use liverswap_types::{DeadlineRule, Period};

use crate::SimRng;

/// Geometric sojourns are truncated here so a tiny departure probability
/// cannot stall the sampler.
const MAX_GEOMETRIC_SOJOURN: u32 = 10_000;

/// Number of periods a new pair stays, always at least 1.
///
/// `Fixed` consumes no randomness, so scripted scenarios with fixed
/// deadlines are independent of the random stream.
pub fn sample_sojourn(rule: &DeadlineRule, rng: &mut SimRng) -> u32 {
    let sojourn = match *rule {
        DeadlineRule::Fixed { sojourn } => sojourn,
        DeadlineRule::Uniform { min, max } => rng.gen_range(min..=max),
        DeadlineRule::Geometric { departure_prob } => {
            let mut periods = 1;
            while periods < MAX_GEOMETRIC_SOJOURN && !rng.gen_bool(departure_prob) {
                periods += 1;
            }
            periods
        }
    };
    sojourn.max(1)
}

/// Deadline of a pair arriving at `arrival` that stays `sojourn` periods.
#[must_use]
pub fn deadline_for(arrival: Period, sojourn: u32) -> Period {
    arrival.after(sojourn.max(1))
}
