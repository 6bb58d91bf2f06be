//! API error types and responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use points_engine::{ErrorKind, LedgerError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient points.
    #[error("insufficient points: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The ledger did not finish in time. Safe to retry.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientFunds { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Timeout(msg) => {
                tracing::warn!(error = %msg, "Request timed out in ledger");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "timeout",
                    "The request timed out, please retry".to_string(),
                    Some(serde_json::json!({ "retryable": true })),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, required } => {
                Self::InsufficientFunds { balance, required }
            }
            LedgerError::AccountNotFound { .. } => Self::NotFound(err.to_string()),
            LedgerError::ReferralCodeNotFound(_) => Self::BadRequest(err.to_string()),
            LedgerError::Timeout(_) => Self::Timeout(err.to_string()),
            err => match err.kind() {
                ErrorKind::Validation | ErrorKind::Business => Self::BadRequest(err.to_string()),
                ErrorKind::Conflict => Self::Conflict(err.to_string()),
                ErrorKind::System => Self::Internal(err.to_string()),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_store::StoreError;
    use std::time::Duration;

    fn status_of(err: LedgerError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn ledger_errors_map_to_status_codes() {
        assert_eq!(
            status_of(LedgerError::MissingField("name")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::SelfTransfer), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(LedgerError::ReferralCodeNotFound("abc123".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LedgerError::InsufficientFunds {
                balance: 1,
                required: 2
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(LedgerError::AccountNotFound {
                user_id: "x".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::DuplicateReferral("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::Timeout(Duration::from_secs(1))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(LedgerError::Storage(StoreError::Database("boom".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
