//! Maps [`CommissionError`] onto the HTTP surface.
//!
//! Every handler returns `Result<_, CommissionError>`; this impl decides the
//! status code and renders the shared error body. Conflict responses carry
//! the id of the payout that caused the conflict so clients can link to it
//! instead of re-listing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::domain::ids::PayoutId;
use crate::error::CommissionError;

/// Wire shape of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `already_pending`.
    pub error: &'static str,
    /// Human-readable description, not meant for matching.
    pub message: String,
    /// The payout standing in the way, on conflict responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<PayoutId>,
}

impl CommissionError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyPending { .. }
            | Self::InvalidTransition { .. }
            | Self::ActorMismatch { .. }
            | Self::Forbidden { .. } => StatusCode::CONFLICT,
            Self::NothingToPay(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayoutNotFound(_) | Self::DriverNotFound(_) | Self::ReceiptNotReady(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Upstream { .. } | Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            // Csv and Io belong to ledger seeding; a handler returning one
            // is a bug, but the client still gets a well-formed body.
            Self::Csv(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::AlreadyPending { .. } => "already_pending",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ActorMismatch { .. } => "actor_mismatch",
            Self::Forbidden { .. } => "forbidden",
            Self::NothingToPay(_) => "nothing_to_pay",
            Self::PayoutNotFound(_) | Self::DriverNotFound(_) => "not_found",
            Self::ReceiptNotReady(_) => "receipt_not_ready",
            Self::Upstream { .. } => "upstream_unavailable",
            Self::Store(_) => "storage_error",
            Self::Csv(_) | Self::Io(_) => "internal_error",
        }
    }

    fn conflict(&self) -> Option<PayoutId> {
        match self {
            Self::AlreadyPending { existing, .. } => Some(*existing),
            _ => None,
        }
    }
}

impl IntoResponse for CommissionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            conflict: self.conflict(),
        };
        (status, Json(body)).into_response()
    }
}
