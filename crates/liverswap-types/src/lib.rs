//! # liverswap-types
//!
//! Shared types, errors, and configuration for the **LiverSwap** liver
//! paired-donation exchange engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers & time**: [`PairId`], [`Period`]
//! - **Pair model**: [`Pair`], [`PriorityClass`], [`LiverProfile`], [`Lobe`], [`transplant_lobe`]
//! - **Exchange model**: [`Cycle`], [`Matching`]
//! - **Market model**: [`MarketPhase`], [`PeriodReport`]
//! - **Configuration**: [`MechanismConfig`], [`MarketConfig`], [`DeadlineRule`],
//!   [`PriorityWeights`], [`RewardConfig`], [`EvaluationConfig`], [`EmpiricalMdpConfig`]
//! - **Errors**: [`LiverswapError`] with `LS_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod cycle;
pub mod error;
pub mod ids;
pub mod pair;
pub mod period;

// Re-export all primary types at crate root for ergonomic imports:
//   use liverswap_types::{Pair, PairId, Cycle, Matching, ...};

pub use config::*;
pub use cycle::*;
pub use error::*;
pub use ids::*;
pub use pair::*;
pub use period::*;

// Constants are accessed via `liverswap_types::constants::FOO`
// (not re-exported to avoid name collisions).
