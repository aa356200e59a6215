//! # liverswap-mechanism
//!
//! **Pure deterministic static matching for LiverSwap.**
//!
//! Takes a frozen set of pairs, a compatibility predicate, and a priority
//! order, and produces a set of disjoint exchange cycles. It has:
//!
//! - **Zero side effects**: no clocks, no randomness, no I/O
//! - **Deterministic output**: same graph + order -> same matching and root
//! - **Adaptive priority**: the best remaining pair is always served next
//! - **Maximum preservation**: never trades away a transplant for priority

pub mod cover;
pub mod cycles;
pub mod determinism;
pub mod graph;
pub mod mechanism;
pub mod priority;
pub mod validation;

pub use cover::{MaxCover, max_cover, two_way_cover};
pub use cycles::{cycles_through, has_cycle_through};
pub use determinism::{compute_matching_root, verify_matching_root};
pub use graph::{Compatibility, CompatibilityGraph, LobeCompatibility, check_predicate_consistency};
pub use mechanism::{StaticMechanism, StaticOutcome};
pub use priority::PriorityOrder;
pub use validation::validate_matching;
