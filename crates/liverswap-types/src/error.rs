//! Error types for the LiverSwap exchange engine.
//!
//! All errors use the `LS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Input errors (bad pair data, malformed priority classes)
//! - 2xx: Invariant violations (always fatal; never auto-corrected)
//! - 3xx: Configuration errors
//! - 4xx: Market lifecycle errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{MarketPhase, PairId};

/// Central error enum for all LiverSwap operations.
#[derive(Debug, Error)]
pub enum LiverswapError {
    // =================================================================
    // Input Errors (1xx)
    // =================================================================
    /// Two pairs in the same input share an identity.
    #[error("LS_ERR_100: Duplicate pair identity: {0}")]
    DuplicatePair(PairId),

    /// A pair carries a priority class outside the accepted range.
    #[error("LS_ERR_101: Invalid priority class {class} on {pair} (max {max})")]
    InvalidPriorityClass { pair: PairId, class: u8, max: u8 },

    /// A pair referenced by the caller is not part of the input.
    #[error("LS_ERR_102: Unknown pair: {0}")]
    UnknownPair(PairId),

    /// The compatibility predicate answered differently on repeated calls.
    #[error("LS_ERR_103: Inconsistent compatibility predicate on {from} -> {to}")]
    InconsistentPredicate { from: PairId, to: PairId },

    /// A pair record is malformed (e.g. deadline not after arrival).
    #[error("LS_ERR_104: Invalid pair {pair}: {reason}")]
    InvalidPair { pair: PairId, reason: String },

    // =================================================================
    // Invariant Violations (2xx)
    // =================================================================
    /// A pair appears in more than one cycle of the same matching.
    #[error("LS_ERR_200: Overlapping cycles: {0} is matched twice")]
    OverlappingCycles(PairId),

    /// A matching references a pair that is not active.
    #[error("LS_ERR_201: Matching references inactive pair {0}")]
    InactivePair(PairId),

    /// A cycle uses an edge that is not in the compatibility graph.
    #[error("LS_ERR_202: Cycle uses missing edge {from} -> {to}")]
    MissingEdge { from: PairId, to: PairId },

    /// A cycle is longer than the configured bound.
    #[error("LS_ERR_203: Cycle of length {len} exceeds bound {max}")]
    CycleTooLong { len: usize, max: usize },

    /// A cycle has fewer than two members or repeats a member.
    #[error("LS_ERR_204: Degenerate cycle: {reason}")]
    DegenerateCycle { reason: String },

    /// Pairs were created or lost by a market period.
    #[error("LS_ERR_205: Pair conservation violated at {period}: {reason}")]
    ConservationViolated { period: u32, reason: String },

    // =================================================================
    // Configuration Errors (3xx)
    // =================================================================
    /// A configuration parameter is out of range.
    #[error("LS_ERR_300: Invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    // =================================================================
    // Market Lifecycle Errors (4xx)
    // =================================================================
    /// An operation was attempted in the wrong market phase.
    #[error("LS_ERR_400: Wrong market phase: expected {expected}, got {actual}")]
    WrongPhase {
        expected: MarketPhase,
        actual: MarketPhase,
    },

    /// The market already reached its horizon or was stopped.
    #[error("LS_ERR_401: Market finished")]
    MarketFinished,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("LS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("LS_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl LiverswapError {
    /// Whether this error reports bad caller input (1xx).
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePair(_)
                | Self::InvalidPriorityClass { .. }
                | Self::UnknownPair(_)
                | Self::InconsistentPredicate { .. }
                | Self::InvalidPair { .. }
        )
    }

    /// Whether this error is a broken matching invariant (2xx).
    ///
    /// These indicate a logic bug and must abort the operation.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::OverlappingCycles(_)
                | Self::InactivePair(_)
                | Self::MissingEdge { .. }
                | Self::CycleTooLong { .. }
                | Self::DegenerateCycle { .. }
                | Self::ConservationViolated { .. }
        )
    }

    /// Whether this error is an invalid parameter (3xx).
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Shorthand for [`LiverswapError::InvalidConfig`].
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LiverswapError>;

impl From<serde_json::Error> for LiverswapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
