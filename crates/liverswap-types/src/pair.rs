//! Patient-donor pairs and their liver compatibility fingerprint.
//!
//! A pair's fingerprint is opaque to the matching core: only the
//! compatibility predicate inspects it. The [`LiverProfile`] carried here
//! is the lobe-threshold model: a patient vector of two blood-type
//! coordinates plus a size coordinate, and per-lobe donor thresholds in the
//! same space. A lobe can serve a patient iff the patient vector is
//! coordinate-wise at most the lobe's thresholds.
//!
//! A pair may also prefer its direct option, the lobe its own donor can
//! give its own patient, over an exchange that yields the same lobe.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{LiverswapError, PairId, Period, Result, constants};

// ---------------------------------------------------------------------------
// PriorityClass
// ---------------------------------------------------------------------------

/// Medical-priority class. Higher is more urgent; 0 is routine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct PriorityClass(pub u8);

impl PriorityClass {
    pub const ROUTINE: Self = Self(0);
    pub const URGENT: Self = Self(constants::MAX_PRIORITY_CLASS);

    /// Whether the class lies in `0..=MAX_PRIORITY_CLASS`.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 <= constants::MAX_PRIORITY_CLASS
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lobe-threshold fingerprint
// ---------------------------------------------------------------------------

/// Two blood-type coordinates and a size coordinate, e.g. `[1.0, 1.0, 0.0]`
/// for a small type-O graft. Coordinates are real so graft size can be
/// graded; coordinate-wise `<=` is the compatibility order.
pub type Trait3 = [f64; 3];

/// Which liver lobe a donor gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Lobe {
    Left,
    Right,
}

impl fmt::Display for Lobe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

/// Compatibility fingerprint of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiverProfile {
    /// The patient's blood-type and size vector.
    pub patient: Trait3,
    /// Largest patient vector the donor's left lobe can serve.
    pub left_lobe: Trait3,
    /// Largest patient vector the donor's right lobe can serve.
    pub right_lobe: Trait3,
    /// Whether the donor agrees to give the (riskier) right lobe.
    pub right_lobe_willing: bool,
    /// The patient takes the direct option over an exchange giving the
    /// same lobe.
    #[serde(default)]
    pub prefers_direct: bool,
}

fn dominated(patient: &Trait3, threshold: &Trait3) -> bool {
    patient.iter().zip(threshold).all(|(p, t)| p <= t)
}

/// Which lobe, if any, `donor`'s donor can transplant into `patient`'s
/// patient.
///
/// The left lobe is preferred whenever it is large enough; the right lobe
/// is reported only when the left one fails. Donor willingness is not
/// considered here; see [`LiverProfile::can_donate_to`].
#[must_use]
pub fn transplant_lobe(donor: &LiverProfile, patient: &LiverProfile) -> Option<Lobe> {
    if dominated(&patient.patient, &donor.left_lobe) {
        Some(Lobe::Left)
    } else if dominated(&patient.patient, &donor.right_lobe) {
        Some(Lobe::Right)
    } else {
        None
    }
}

impl LiverProfile {
    /// The lobe this profile's donor can give `patient` and is willing to
    /// give.
    #[must_use]
    pub fn exchange_lobe(&self, patient: &LiverProfile) -> Option<Lobe> {
        match transplant_lobe(self, patient) {
            Some(Lobe::Right) if !self.right_lobe_willing => None,
            lobe => lobe,
        }
    }

    /// Whether this profile's donor can give `patient` a lobe it is
    /// willing to give.
    #[must_use]
    pub fn can_donate_to(&self, patient: &LiverProfile) -> bool {
        self.exchange_lobe(patient).is_some()
    }

    /// The lobe the pair's own donor can give its own patient.
    #[must_use]
    pub fn direct_lobe(&self) -> Option<Lobe> {
        self.exchange_lobe(self)
    }

    /// Whether the patient takes an exchange graft of `lobe`. A pair that
    /// prefers its direct option declines an exchange of the same lobe.
    #[must_use]
    pub fn accepts_exchange(&self, lobe: Lobe) -> bool {
        !(self.prefers_direct && self.direct_lobe() == Some(lobe))
    }

    /// Whether every coordinate is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [self.patient, self.left_lobe, self.right_lobe]
            .iter()
            .flatten()
            .all(|x| x.is_finite())
    }

    /// A universal donor (type O, both lobes large) paired with a patient
    /// of the given vector.
    #[must_use]
    pub fn universal_donor(patient: Trait3) -> Self {
        Self {
            patient,
            left_lobe: [1.0; 3],
            right_lobe: [1.0; 3],
            right_lobe_willing: true,
            prefers_direct: false,
        }
    }
}

impl Default for LiverProfile {
    fn default() -> Self {
        Self::universal_donor([0.0; 3])
    }
}

// ---------------------------------------------------------------------------
// Pair
// ---------------------------------------------------------------------------

/// An incompatible patient-donor pair in the exchange pool.
///
/// Immutable once created. The pair is available in every period `t` with
/// `arrival <= t < deadline` and is removed unmatched at `deadline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub id: PairId,
    pub profile: LiverProfile,
    pub arrival: Period,
    pub deadline: Period,
    pub class: PriorityClass,
}

impl Pair {
    #[must_use]
    pub fn new(
        id: PairId,
        profile: LiverProfile,
        arrival: Period,
        deadline: Period,
        class: PriorityClass,
    ) -> Self {
        Self {
            id,
            profile,
            arrival,
            deadline,
            class,
        }
    }

    /// Check the record is well formed.
    ///
    /// # Errors
    /// - `InvalidPriorityClass` if the class is above `MAX_PRIORITY_CLASS`
    /// - `InvalidPair` if the deadline is not after the arrival or the
    ///   profile holds a non-finite coordinate
    pub fn validate(&self) -> Result<()> {
        if !self.class.is_valid() {
            return Err(LiverswapError::InvalidPriorityClass {
                pair: self.id,
                class: self.class.0,
                max: constants::MAX_PRIORITY_CLASS,
            });
        }
        if self.deadline <= self.arrival {
            return Err(LiverswapError::InvalidPair {
                pair: self.id,
                reason: format!(
                    "deadline {} is not after arrival {}",
                    self.deadline, self.arrival
                ),
            });
        }
        if !self.profile.is_finite() {
            return Err(LiverswapError::InvalidPair {
                pair: self.id,
                reason: "profile has a non-finite coordinate".into(),
            });
        }
        Ok(())
    }

    /// Whether the pair can still be matched in period `t`.
    #[must_use]
    pub fn is_available_at(&self, t: Period) -> bool {
        self.arrival <= t && t < self.deadline
    }

    /// Periods left before the deadline, counting `t` itself
    /// (1 = `t` is the last period the pair can be matched).
    #[must_use]
    pub fn periods_left(&self, t: Period) -> u32 {
        t.until(self.deadline)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Pair {
    /// A routine pair with a universal profile, present from period 0 with
    /// a far-away deadline.
    pub fn dummy(id: u64) -> Self {
        Self::new(
            PairId(id),
            LiverProfile::default(),
            Period(0),
            Period(1_000),
            PriorityClass::ROUTINE,
        )
    }

    /// A pair with explicit class, arrival and deadline.
    pub fn dummy_timed(id: u64, class: u8, arrival: u32, deadline: u32) -> Self {
        Self::new(
            PairId(id),
            LiverProfile::default(),
            Period(arrival),
            Period(deadline),
            PriorityClass(class),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(patient: Trait3, left: Trait3, right: Trait3, willing: bool) -> LiverProfile {
        LiverProfile {
            patient,
            left_lobe: left,
            right_lobe: right,
            right_lobe_willing: willing,
            prefers_direct: false,
        }
    }

    fn patient(x: Trait3) -> LiverProfile {
        profile(x, [0.0; 3], [0.0; 3], false)
    }

    #[test]
    fn universal_donor_gives_left_lobe() {
        let donor = profile([1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0], true);
        assert_eq!(transplant_lobe(&donor, &patient([0.0, 1.0, 1.0])), Some(Lobe::Left));
    }

    #[test]
    fn small_left_lobe_falls_back_to_right() {
        let donor = profile([0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], true);
        assert_eq!(transplant_lobe(&donor, &patient([0.0, 1.0, 1.0])), Some(Lobe::Right));
    }

    #[test]
    fn blood_type_mismatch_gives_nothing() {
        let donor = profile([0.0; 3], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], true);
        assert_eq!(transplant_lobe(&donor, &patient([1.0, 0.0, 1.0])), None);
    }

    #[test]
    fn graded_size_uses_real_thresholds() {
        let donor = profile([0.0; 3], [1.0, 1.0, 0.4], [1.0, 1.0, 0.8], true);
        assert_eq!(transplant_lobe(&donor, &patient([0.0, 1.0, 0.35])), Some(Lobe::Left));
        assert_eq!(transplant_lobe(&donor, &patient([0.0, 1.0, 0.6])), Some(Lobe::Right));
        assert_eq!(transplant_lobe(&donor, &patient([0.0, 1.0, 0.9])), None);
    }

    #[test]
    fn unwilling_donor_blocks_right_lobe_only() {
        let recipient = patient([0.0, 1.0, 1.0]);
        let right_only = profile([0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], false);
        assert!(!right_only.can_donate_to(&recipient));
        assert_eq!(right_only.exchange_lobe(&recipient), None);

        let left_ok = profile([0.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0], false);
        assert!(left_ok.can_donate_to(&recipient));
    }

    #[test]
    fn direct_preference_declines_same_lobe_only() {
        // Own donor's right lobe fits the patient; the left lobe is too small.
        let mut own = profile([0.0, 1.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], true);
        assert_eq!(own.direct_lobe(), Some(Lobe::Right));
        assert!(own.accepts_exchange(Lobe::Right));

        own.prefers_direct = true;
        assert!(!own.accepts_exchange(Lobe::Right));
        assert!(own.accepts_exchange(Lobe::Left));

        // Without willingness there is no direct option to prefer.
        own.right_lobe_willing = false;
        assert_eq!(own.direct_lobe(), None);
        assert!(own.accepts_exchange(Lobe::Right));
    }

    #[test]
    fn direct_flag_defaults_when_absent() {
        let json = r#"{"patient":[0.0,1.0,0.0],"left_lobe":[1.0,1.0,1.0],
            "right_lobe":[1.0,1.0,1.0],"right_lobe_willing":false}"#;
        let parsed: LiverProfile = serde_json::from_str(json).unwrap();
        assert!(!parsed.prefers_direct);
    }

    #[test]
    fn validate_rejects_non_finite_profile() {
        let mut pair = Pair::dummy(1);
        pair.profile.patient[2] = f64::NAN;
        assert!(matches!(pair.validate(), Err(LiverswapError::InvalidPair { .. })));
    }

    #[test]
    fn priority_class_validity() {
        assert!(PriorityClass::ROUTINE.is_valid());
        assert!(PriorityClass::URGENT.is_valid());
        assert!(!PriorityClass(constants::MAX_PRIORITY_CLASS + 1).is_valid());
    }

    #[test]
    fn validate_rejects_bad_class_and_window() {
        let mut pair = Pair::dummy_timed(1, 9, 0, 4);
        assert!(matches!(
            pair.validate(),
            Err(LiverswapError::InvalidPriorityClass { class: 9, .. })
        ));
        pair.class = PriorityClass(1);
        pair.deadline = Period(0);
        assert!(matches!(
            pair.validate(),
            Err(LiverswapError::InvalidPair { .. })
        ));
        pair.deadline = Period(2);
        assert!(pair.validate().is_ok());
    }

    #[test]
    fn availability_window() {
        let pair = Pair::dummy_timed(1, 0, 2, 5);
        assert!(!pair.is_available_at(Period(1)));
        assert!(pair.is_available_at(Period(2)));
        assert!(pair.is_available_at(Period(4)));
        assert!(!pair.is_available_at(Period(5)));
        assert_eq!(pair.periods_left(Period(4)), 1);
        assert_eq!(pair.periods_left(Period(2)), 3);
    }
}
