//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::ledger::LedgerError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication (401)
    #[error("Missing X-API-Key header")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Missing X-Request-Owner header")]
    MissingOwner,

    #[error("Account {0} does not belong to the authenticated owner")]
    AccountNotOwned(i64),

    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    // Validation errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Ledger and store errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl AppError {
    /// Status, machine-readable code and optional details
    fn classify(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 401 Unauthorized
            AppError::MissingApiKey => (StatusCode::UNAUTHORIZED, "missing_api_key", None),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),
            AppError::MissingOwner => (StatusCode::UNAUTHORIZED, "missing_owner", None),

            // 403 Forbidden
            AppError::AccountNotOwned(_) => (StatusCode::FORBIDDEN, "account_not_owned", None),

            // 404 Not Found
            AppError::AccountNotFound(id) => {
                (StatusCode::NOT_FOUND, "account_not_found", Some(id.to_string()))
            }

            AppError::Domain(err) => match err {
                DomainError::UnsupportedCurrency(code) => {
                    (StatusCode::BAD_REQUEST, "unsupported_currency", Some(code.clone()))
                }
                DomainError::CurrencyMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "currency_mismatch", None)
                }
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                }
                DomainError::InvalidPagination(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_pagination", Some(msg.clone()))
                }
            },

            AppError::Ledger(err) => match err {
                LedgerError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, "not_found", Some(what.clone()))
                }
                LedgerError::InvalidArgument(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_argument", Some(msg.clone()))
                }
                LedgerError::InsufficientFunds { .. } => {
                    (StatusCode::BAD_REQUEST, "insufficient_funds", None)
                }
                LedgerError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
                LedgerError::StoreUnavailable(_)
                | LedgerError::TransactionFailure { .. }
                | LedgerError::RollbackFailed { .. } => {
                    tracing::error!("Ledger storage error: {:?}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
                }
            },

            AppError::Store(err) => match err {
                StoreError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, "not_found", Some(what.clone()))
                }
                StoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
                StoreError::Unavailable(e) => {
                    tracing::error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.classify();

        // Server-side failures never echo storage details
        let error = if status.is_server_error() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_statuses() {
        let cases = [
            (AppError::from(LedgerError::NotFound("account 9".to_string())), StatusCode::NOT_FOUND),
            (AppError::from(LedgerError::invalid_argument("bad")), StatusCode::BAD_REQUEST),
            (
                AppError::from(LedgerError::InsufficientFunds { account_id: 1, balance: 0, amount: 5 }),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::from(LedgerError::Conflict("dup".to_string())), StatusCode::CONFLICT),
            (
                AppError::from(LedgerError::StoreUnavailable(StoreError::Unavailable(
                    sqlx::Error::PoolTimedOut,
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_client_error_statuses() {
        for err in [AppError::MissingApiKey, AppError::InvalidApiKey, AppError::MissingOwner] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(AppError::AccountNotOwned(3).into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(DomainError::SameAccountTransfer).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = AppError::from(StoreError::Unavailable(sqlx::Error::Protocol(
            "connection reset by peer at 10.0.0.5".to_string(),
        )));

        let (status, code, details) = err.classify();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "database_error");
        assert!(details.is_none());
    }
}
