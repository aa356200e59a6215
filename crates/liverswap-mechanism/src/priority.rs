//! Strict total priority order over pairs.
//!
//! Higher medical-priority class first; within a class, earlier arrival
//! first, then smaller [`PairId`]. The ranking is a pure function of the
//! pair records, so repeated calls on the same set always agree.
//!
//! "Adaptive" priority (serving the best *remaining* pair) is the order
//! restricted to a shrinking active set: [`PriorityOrder::highest_among`].

use std::cmp::Ordering;
use std::collections::HashMap;

use liverswap_types::{LiverswapError, Pair, PairId, PriorityClass, Result, constants};

/// A ranked list of pair ids, best first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityOrder {
    ranked: Vec<PairId>,
    position: HashMap<PairId, usize>,
}

impl PriorityOrder {
    /// Rank pairs by class (higher first), then arrival, then id.
    ///
    /// # Errors
    /// - `InvalidPriorityClass` if a class is above `MAX_PRIORITY_CLASS`
    /// - `DuplicatePair` if two pairs share an id
    pub fn rank(pairs: &[Pair]) -> Result<Self> {
        Self::rank_by(pairs, |a, b| a.cmp(&b))
    }

    /// Rank pairs with a caller-supplied class comparator.
    ///
    /// `class_cmp(a, b) == Ordering::Greater` means class `a` is more
    /// urgent than `b`. The comparator must be a total order; ties are
    /// broken by arrival, then id.
    ///
    /// # Errors
    /// Same as [`PriorityOrder::rank`].
    pub fn rank_by<F>(pairs: &[Pair], class_cmp: F) -> Result<Self>
    where
        F: Fn(PriorityClass, PriorityClass) -> Ordering,
    {
        for pair in pairs {
            if !pair.class.is_valid() {
                return Err(LiverswapError::InvalidPriorityClass {
                    pair: pair.id,
                    class: pair.class.0,
                    max: constants::MAX_PRIORITY_CLASS,
                });
            }
        }
        let mut sorted: Vec<&Pair> = pairs.iter().collect();
        sorted.sort_by(|a, b| {
            class_cmp(b.class, a.class)
                .then(a.arrival.cmp(&b.arrival))
                .then(a.id.cmp(&b.id))
        });
        Self::from_ranked(sorted.into_iter().map(|p| p.id).collect())
    }

    /// An explicit order, best first.
    ///
    /// # Errors
    /// Returns `DuplicatePair` if an id appears twice.
    pub fn from_ranked(ranked: Vec<PairId>) -> Result<Self> {
        let mut position = HashMap::with_capacity(ranked.len());
        for (i, id) in ranked.iter().enumerate() {
            if position.insert(*id, i).is_some() {
                return Err(LiverswapError::DuplicatePair(*id));
            }
        }
        Ok(Self { ranked, position })
    }

    /// Rank of `id` (0 = highest priority), if ranked.
    #[must_use]
    pub fn position(&self, id: PairId) -> Option<usize> {
        self.position.get(&id).copied()
    }

    /// `Ordering::Less` when `a` has precedence over `b`. Unranked ids come
    /// after every ranked id, in id order.
    #[must_use]
    pub fn compare(&self, a: PairId, b: PairId) -> Ordering {
        match (self.position(a), self.position(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(&b),
        }
    }

    /// The highest-ranked id for which `is_active` holds.
    pub fn highest_among(&self, mut is_active: impl FnMut(PairId) -> bool) -> Option<PairId> {
        self.ranked.iter().copied().find(|&id| is_active(id))
    }

    /// Ids best first.
    pub fn iter(&self) -> impl Iterator<Item = PairId> + '_ {
        self.ranked.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Verify every id in `ids` is ranked.
    ///
    /// # Errors
    /// Returns `UnknownPair` for the first unranked id.
    pub fn ensure_ranks(&self, ids: impl IntoIterator<Item = PairId>) -> Result<()> {
        for id in ids {
            if !self.position.contains_key(&id) {
                return Err(LiverswapError::UnknownPair(id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(order: &PriorityOrder) -> Vec<u64> {
        order.iter().map(|id| id.0).collect()
    }

    #[test]
    fn higher_class_first_then_arrival_then_id() {
        let pairs = vec![
            Pair::dummy_timed(1, 0, 0, 10),
            Pair::dummy_timed(2, 2, 5, 10),
            Pair::dummy_timed(3, 0, 0, 10),
            Pair::dummy_timed(4, 2, 1, 10),
            Pair::dummy_timed(5, 1, 0, 10),
        ];
        let order = PriorityOrder::rank(&pairs).unwrap();
        assert_eq!(ids(&order), vec![4, 2, 5, 1, 3]);
    }

    #[test]
    fn rank_is_stable_across_calls_and_input_order() {
        let mut pairs: Vec<Pair> = (0..8)
            .map(|i| Pair::dummy_timed(i, (i % 3) as u8, (i % 2) as u32, 20))
            .collect();
        let first = PriorityOrder::rank(&pairs).unwrap();
        pairs.reverse();
        let second = PriorityOrder::rank(&pairs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_class_comparator() {
        let pairs = vec![
            Pair::dummy_timed(1, 0, 0, 10),
            Pair::dummy_timed(2, 3, 0, 10),
        ];
        // Lower class number is more urgent under this comparator.
        let order = PriorityOrder::rank_by(&pairs, |a, b| b.cmp(&a)).unwrap();
        assert_eq!(ids(&order), vec![1, 2]);
    }

    #[test]
    fn malformed_class_rejected() {
        let pairs = vec![Pair::dummy_timed(1, constants::MAX_PRIORITY_CLASS + 1, 0, 10)];
        let err = PriorityOrder::rank(&pairs).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn duplicates_rejected() {
        let err = PriorityOrder::from_ranked(vec![PairId(1), PairId(2), PairId(1)]).unwrap_err();
        assert!(matches!(err, LiverswapError::DuplicatePair(PairId(1))));
        let pairs = vec![Pair::dummy(7), Pair::dummy(7)];
        assert!(PriorityOrder::rank(&pairs).is_err());
    }

    #[test]
    fn compare_and_positions() {
        let order = PriorityOrder::from_ranked(vec![PairId(3), PairId(1), PairId(2)]).unwrap();
        assert_eq!(order.position(PairId(3)), Some(0));
        assert_eq!(order.compare(PairId(3), PairId(2)), Ordering::Less);
        assert_eq!(order.compare(PairId(2), PairId(1)), Ordering::Greater);
        assert_eq!(order.compare(PairId(9), PairId(2)), Ordering::Greater);
        assert_eq!(order.compare(PairId(8), PairId(9)), Ordering::Less);
    }

    #[test]
    fn highest_among_shrinking_set() {
        let order = PriorityOrder::from_ranked(vec![PairId(3), PairId(1), PairId(2)]).unwrap();
        assert_eq!(order.highest_among(|_| true), Some(PairId(3)));
        assert_eq!(order.highest_among(|id| id != PairId(3)), Some(PairId(1)));
        assert_eq!(order.highest_among(|_| false), None);
    }

    #[test]
    fn ensure_ranks_reports_unknown() {
        let order = PriorityOrder::from_ranked(vec![PairId(1)]).unwrap();
        assert!(order.ensure_ranks([PairId(1)]).is_ok());
        assert!(matches!(
            order.ensure_ranks([PairId(1), PairId(5)]),
            Err(LiverswapError::UnknownPair(PairId(5)))
        ));
    }
}
