//! Arrival processes.
//!
//! An [`ArrivalProcess`] is stateless: every bit of randomness comes from
//! the market's seeded [`SimRng`], so a market rebuilt from the same seed
//! sees exactly the same arrivals.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use liverswap_types::{
    LiverProfile, LiverswapError, Period, PriorityClass, Result, constants, validate_probability,
};

/// The simulation's random stream. Portable across platforms.
pub type SimRng = ChaCha8Rng;

/// A pair entering the market, before it is given an id and a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub profile: LiverProfile,
    pub class: PriorityClass,
    /// Pinned sojourn; `None` defers to the market's `DeadlineRule`.
    pub sojourn: Option<u32>,
}

impl Arrival {
    #[must_use]
    pub fn new(profile: LiverProfile, class: PriorityClass) -> Self {
        Self {
            profile,
            class,
            sojourn: None,
        }
    }

    #[must_use]
    pub fn with_sojourn(mut self, sojourn: u32) -> Self {
        self.sojourn = Some(sojourn);
        self
    }
}

/// Source of new pairs, one batch per period.
pub trait ArrivalProcess: Send + Sync {
    /// Pairs arriving in period `t`.
    fn arrivals(&self, t: Period, rng: &mut SimRng) -> Vec<Arrival>;

    /// Check parameters before a market is built.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for out-of-range parameters.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Draws a profile and priority class for a new pair.
pub trait ProfileSampler: Send + Sync {
    fn sample(&self, rng: &mut SimRng) -> (LiverProfile, PriorityClass);

    /// # Errors
    /// Returns `InvalidConfig` for out-of-range parameters.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Random lobe profiles
// ---------------------------------------------------------------------------

/// Independent random bits for blood type and size.
///
/// A donor's left lobe is always small (size threshold 0) and the right
/// lobe large (size threshold 1); both share the donor's blood-type bits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomProfiles {
    /// Probability of each blood-type bit being set.
    pub blood_bit_prob: f64,
    /// Probability a patient needs a large graft.
    pub large_patient_prob: f64,
    /// Probability a donor agrees to give the right lobe.
    pub willing_prob: f64,
    /// Relative frequency of each priority class, routine first.
    pub class_weights: [f64; constants::MAX_PRIORITY_CLASS as usize + 1],
}

impl Default for RandomProfiles {
    fn default() -> Self {
        Self {
            blood_bit_prob: 0.5,
            large_patient_prob: 0.5,
            willing_prob: 0.7,
            class_weights: [0.55, 0.25, 0.15, 0.05],
        }
    }
}

impl RandomProfiles {
    fn bit(rng: &mut SimRng, p: f64) -> f64 {
        if rng.gen_bool(p) { 1.0 } else { 0.0 }
    }

    fn class(&self, rng: &mut SimRng) -> PriorityClass {
        let total: f64 = self.class_weights.iter().sum();
        let mut draw = rng.gen_range(0.0..total);
        for (class, &w) in self.class_weights.iter().enumerate() {
            if draw < w {
                return PriorityClass(u8::try_from(class).unwrap_or(constants::MAX_PRIORITY_CLASS));
            }
            draw -= w;
        }
        PriorityClass::URGENT
    }
}

impl ProfileSampler for RandomProfiles {
    fn sample(&self, rng: &mut SimRng) -> (LiverProfile, PriorityClass) {
        let patient = [
            Self::bit(rng, self.blood_bit_prob),
            Self::bit(rng, self.blood_bit_prob),
            Self::bit(rng, self.large_patient_prob),
        ];
        let donor = [
            Self::bit(rng, self.blood_bit_prob),
            Self::bit(rng, self.blood_bit_prob),
        ];
        let profile = LiverProfile {
            patient,
            left_lobe: [donor[0], donor[1], 0.0],
            right_lobe: [donor[0], donor[1], 1.0],
            right_lobe_willing: rng.gen_bool(self.willing_prob),
            prefers_direct: false,
        };
        (profile, self.class(rng))
    }

    fn validate(&self) -> Result<()> {
        validate_probability("blood_bit_prob", self.blood_bit_prob)?;
        validate_probability("large_patient_prob", self.large_patient_prob)?;
        validate_probability("willing_prob", self.willing_prob)?;
        if self.class_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LiverswapError::config(
                "class_weights",
                "weights must be finite and non-negative",
            ));
        }
        if self.class_weights.iter().sum::<f64>() <= 0.0 {
            return Err(LiverswapError::config("class_weights", "all weights are zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Poisson arrivals
// ---------------------------------------------------------------------------

/// Poisson(`rate`) new pairs per period, each drawn from `profiles`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoissonArrivals<S = RandomProfiles> {
    pub rate: f64,
    pub profiles: S,
}

/// Rates above this make the per-period sampler impractically slow.
const MAX_RATE: f64 = 500.0;

impl PoissonArrivals<RandomProfiles> {
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            profiles: RandomProfiles::default(),
        }
    }
}

impl Default for PoissonArrivals<RandomProfiles> {
    fn default() -> Self {
        Self::new(constants::DEFAULT_ARRIVAL_RATE)
    }
}

/// Knuth's multiplication method, capped at `MAX_ARRIVALS_PER_PERIOD`.
fn poisson(rng: &mut SimRng, rate: f64) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    let limit = (-rate).exp();
    let mut product: f64 = rng.gen_range(0.0..1.0);
    let mut count = 0;
    while product > limit && count < constants::MAX_ARRIVALS_PER_PERIOD {
        count += 1;
        product *= rng.gen_range(0.0..1.0);
    }
    count
}

impl<S: ProfileSampler> ArrivalProcess for PoissonArrivals<S> {
    fn arrivals(&self, _t: Period, rng: &mut SimRng) -> Vec<Arrival> {
        let count = poisson(rng, self.rate);
        (0..count)
            .map(|_| {
                let (profile, class) = self.profiles.sample(rng);
                Arrival::new(profile, class)
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate < 0.0 || self.rate > MAX_RATE {
            return Err(LiverswapError::config(
                "rate",
                format!("{} is not in [0, {MAX_RATE}]", self.rate),
            ));
        }
        self.profiles.validate()
    }
}

// ---------------------------------------------------------------------------
// Scripted and empty arrivals
// ---------------------------------------------------------------------------

/// A fixed arrival schedule, for hand-built scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedArrivals {
    schedule: BTreeMap<u32, Vec<Arrival>>,
}

impl ScriptedArrivals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `arrival` to period `t`. Arrivals within a period keep insertion
    /// order, which is also their id order.
    #[must_use]
    pub fn at(mut self, t: u32, arrival: Arrival) -> Self {
        self.schedule.entry(t).or_default().push(arrival);
        self
    }

    /// Total number of scheduled arrivals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedule.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArrivalProcess for ScriptedArrivals {
    fn arrivals(&self, t: Period, _rng: &mut SimRng) -> Vec<Arrival> {
        self.schedule.get(&t.0).cloned().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        for arrival in self.schedule.values().flatten() {
            if arrival.sojourn == Some(0) {
                return Err(LiverswapError::config(
                    "sojourn",
                    "pinned sojourn must be at least one period",
                ));
            }
        }
        Ok(())
    }
}

/// Nobody ever arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoArrivals;

impl ArrivalProcess for NoArrivals {
    fn arrivals(&self, _t: Period, _rng: &mut SimRng) -> Vec<Arrival> {
        Vec::new()
    }
}
