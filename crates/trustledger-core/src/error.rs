use thiserror::Error;

use crate::contradiction::ContradictionId;

pub type TrustLedgerResult<T> = Result<T, TrustLedgerError>;

/// Which hash chain a failed integrity check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityScope {
    Custody,
    Ledger,
}

impl std::fmt::Display for IntegrityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityScope::Custody => f.write_str("custody chain"),
            IntegrityScope::Ledger => f.write_str("ledger"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrustLedgerError {
    #[error("artifact is minted; custody chain is sealed")]
    ArtifactSealed,

    #[error("custody timestamp precedes the last recorded entry")]
    NonMonotonicTimestamp,

    #[error("{scope} integrity violation at index {index}")]
    IntegrityViolation { scope: IntegrityScope, index: usize },

    #[error("active contradictions block admission: {0:?}")]
    ContradictionActive(Vec<ContradictionId>),

    #[error("admission threshold not met")]
    ThresholdNotMet(Vec<String>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("store failure: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TrustLedgerError {
    /// Soft rejections that may clear once case state changes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrustLedgerError::ContradictionActive(_) | TrustLedgerError::ThresholdNotMet(_)
        )
    }

    /// Stable reason label used by telemetry.
    pub fn reason(&self) -> &'static str {
        match self {
            TrustLedgerError::ArtifactSealed => "artifact_sealed",
            TrustLedgerError::NonMonotonicTimestamp => "non_monotonic_timestamp",
            TrustLedgerError::IntegrityViolation { .. } => "integrity_violation",
            TrustLedgerError::ContradictionActive(_) => "contradiction_active",
            TrustLedgerError::ThresholdNotMet(_) => "threshold_not_met",
            TrustLedgerError::InvalidArgument(_) => "invalid_argument",
            TrustLedgerError::NotFound(_) => "not_found",
            TrustLedgerError::InvalidTransition(_) => "invalid_transition",
            TrustLedgerError::Store(_) => "store",
            TrustLedgerError::Internal(_) => "internal",
        }
    }
}
