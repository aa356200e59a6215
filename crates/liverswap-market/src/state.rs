//! Snapshot of the market at one clock value.

use serde::{Deserialize, Serialize};

use liverswap_types::{Pair, PairId, Period};

/// Active pairs at clock `t`, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    clock: Period,
    active: Vec<Pair>,
}

impl MarketState {
    /// Build a state; `active` is sorted by id.
    #[must_use]
    pub fn new(clock: Period, mut active: Vec<Pair>) -> Self {
        active.sort_by_key(|p| p.id);
        Self { clock, active }
    }

    #[must_use]
    pub fn clock(&self) -> Period {
        self.clock
    }

    #[must_use]
    pub fn active(&self) -> &[Pair] {
        &self.active
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: PairId) -> bool {
        self.active.binary_search_by_key(&id, |p| p.id).is_ok()
    }

    #[must_use]
    pub fn pair(&self, id: PairId) -> Option<&Pair> {
        self.active
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.active[i])
    }

    /// Pairs with at most `threshold` periods left, counting the current one.
    pub fn critical(&self, threshold: u32) -> impl Iterator<Item = &Pair> {
        let t = self.clock;
        self.active
            .iter()
            .filter(move |p| p.periods_left(t) <= threshold)
    }

    pub(crate) fn set_clock(&mut self, clock: Period) {
        self.clock = clock;
    }

    /// Remove and return pairs with `deadline <= clock`.
    pub(crate) fn take_expired(&mut self) -> Vec<Pair> {
        let t = self.clock;
        let (expired, kept) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|p| p.deadline <= t);
        self.active = kept;
        expired
    }

    /// Insert a pair with an id above every active id.
    pub(crate) fn admit(&mut self, pair: Pair) {
        debug_assert!(self.active.last().is_none_or(|last| last.id < pair.id));
        self.active.push(pair);
    }

    /// Remove `id`, returning its record.
    pub(crate) fn remove(&mut self, id: PairId) -> Option<Pair> {
        let i = self.active.binary_search_by_key(&id, |p| p.id).ok()?;
        Some(self.active.remove(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_and_looks_up() {
        let state = MarketState::new(
            Period(2),
            vec![Pair::dummy_timed(5, 0, 0, 9), Pair::dummy_timed(1, 0, 0, 3)],
        );
        assert_eq!(state.active()[0].id, PairId(1));
        assert!(state.contains(PairId(5)));
        assert!(!state.contains(PairId(2)));
        assert_eq!(state.pair(PairId(1)).map(|p| p.deadline), Some(Period(3)));
    }

    #[test]
    fn critical_counts_current_period() {
        let state = MarketState::new(
            Period(2),
            vec![Pair::dummy_timed(1, 0, 0, 3), Pair::dummy_timed(2, 0, 0, 5)],
        );
        let critical: Vec<_> = state.critical(1).map(|p| p.id).collect();
        assert_eq!(critical, vec![PairId(1)]);
        assert_eq!(state.critical(3).count(), 2);
    }

    #[test]
    fn expire_admit_remove() {
        let mut state = MarketState::new(
            Period(3),
            vec![Pair::dummy_timed(0, 0, 0, 3), Pair::dummy_timed(1, 0, 0, 4)],
        );
        let expired = state.take_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, PairId(0));

        state.admit(Pair::dummy_timed(2, 0, 3, 6));
        assert_eq!(state.len(), 2);
        assert_eq!(state.remove(PairId(1)).map(|p| p.id), Some(PairId(1)));
        assert!(state.remove(PairId(1)).is_none());
        assert_eq!(state.len(), 1);
    }
}
