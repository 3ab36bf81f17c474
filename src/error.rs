use crate::domain::actor::Role;
use crate::domain::ids::{DriverId, PayoutId};
use crate::domain::payout::PayoutStatus;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = CommissionError> = std::result::Result<T, E>;

/// Error taxonomy of the payout core.
///
/// Validation errors are raised before any state change; conflict errors
/// carry the resource that caused the conflict so callers can recover
/// without polling; upstream errors mark whether a retry makes sense.
#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Invariant: a driver can have at most one payout awaiting approval.
    #[error("driver {driver_id} already has payout {existing} awaiting approval")]
    AlreadyPending {
        driver_id: DriverId,
        existing: PayoutId,
    },

    #[error("no unbound delivered orders for driver {0} in the selected period")]
    NothingToPay(DriverId),

    #[error("payout {payout_id} is {status}, cannot {action}")]
    InvalidTransition {
        payout_id: PayoutId,
        status: PayoutStatus,
        action: &'static str,
    },

    #[error("actor {actor} is not a party to payout {payout_id}")]
    ActorMismatch { payout_id: PayoutId, actor: String },

    #[error("role {role} may not {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("payout {0} not found")]
    PayoutNotFound(PayoutId),

    #[error("driver {0} not found")]
    DriverNotFound(DriverId),

    #[error("receipt for payout {0} has not been generated yet")]
    ReceiptNotReady(PayoutId),

    /// An external collaborator (order ledger, receipt issuer, ...) failed.
    #[error("{upstream} unavailable: {message}")]
    Upstream {
        upstream: &'static str,
        message: String,
        retryable: bool,
    },

    /// Storage adapter internals: serialization, corrupt rows, backend I/O.
    #[error("store error: {0}")]
    Store(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommissionError {
    /// Timeout on a persistence call; surfaced as a retryable upstream error.
    pub fn store_timeout(upstream: &'static str, after: std::time::Duration) -> Self {
        Self::Upstream {
            upstream,
            message: format!("timed out after {}ms", after.as_millis()),
            retryable: true,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures where the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { retryable, .. } => *retryable,
            Self::Store(_) | Self::Io(_) => true,
            _ => false,
        }
    }
}
