//! Reproducibility hash over a matching.
//!
//! Running the mechanism twice on the same graph and order must give the
//! same matching; the `matching_root` lets an auditor check that without
//! comparing full payloads. Cycle order and member order both matter.

use liverswap_types::Matching;
use sha2::{Digest, Sha256};

/// SHA-256 over the cycles of `matching`, in selection order.
#[must_use]
pub fn compute_matching_root(matching: &Matching) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"liverswap:matching_root:v1:");
    hasher.update((matching.len() as u64).to_le_bytes());

    for cycle in matching.cycles() {
        hasher.update((cycle.len() as u64).to_le_bytes());
        for id in cycle.members() {
            hasher.update(id.0.to_le_bytes());
        }
    }

    hasher.finalize().into()
}

/// Recompute the root of `matching` and compare it with `expected_root`.
#[must_use]
pub fn verify_matching_root(matching: &Matching, expected_root: &[u8; 32]) -> bool {
    compute_matching_root(matching) == *expected_root
}

#[cfg(test)]
mod tests {
    use liverswap_types::{Cycle, PairId};

    use super::*;

    fn matching(cycles: &[&[u64]]) -> Matching {
        Matching::from_cycles(
            cycles
                .iter()
                .map(|c| Cycle::new(c.iter().copied().map(PairId).collect()).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn empty_matching_is_deterministic() {
        assert_eq!(
            compute_matching_root(&Matching::new()),
            compute_matching_root(&Matching::new())
        );
    }

    #[test]
    fn same_matching_same_root() {
        let a = matching(&[&[1, 2], &[3, 4]]);
        let b = matching(&[&[1, 2], &[3, 4]]);
        assert_eq!(compute_matching_root(&a), compute_matching_root(&b));
    }

    #[test]
    fn order_matters() {
        let a = matching(&[&[1, 2], &[3, 4]]);
        let b = matching(&[&[3, 4], &[1, 2]]);
        let c = matching(&[&[2, 1], &[3, 4]]);
        assert_ne!(compute_matching_root(&a), compute_matching_root(&b));
        assert_ne!(compute_matching_root(&a), compute_matching_root(&c));
    }

    #[test]
    fn cycle_boundaries_matter() {
        let a = matching(&[&[1, 2, 3, 4]]);
        let b = matching(&[&[1, 2], &[3, 4]]);
        assert_ne!(compute_matching_root(&a), compute_matching_root(&b));
    }

    #[test]
    fn verify_detects_tampering() {
        let m = matching(&[&[1, 2]]);
        let root = compute_matching_root(&m);
        assert!(verify_matching_root(&m, &root));
        let mut bad = root;
        bad[0] ^= 0xFF;
        assert!(!verify_matching_root(&m, &bad));
    }
}
