//! RFC 7807 problem bodies and the error-to-status mapping.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use ledgerd_core::LedgerError;

pub fn problem(
    status: StatusCode,
    title: &'static str,
    detail: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        Json(json!({
            "type": "about:blank",
            "title": title,
            "status": status.as_u16(),
            "detail": detail.into(),
        })),
    )
        .into_response()
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let detail = err.to_string();
    match err {
        LedgerError::InvalidArg(_) => problem(StatusCode::BAD_REQUEST, "invalid-argument", detail),
        LedgerError::CurrencyMismatch { .. } => {
            problem(StatusCode::BAD_REQUEST, "currency-mismatch", detail)
        }
        LedgerError::Unbalanced { .. } => problem(StatusCode::BAD_REQUEST, "unbalanced", detail),
        LedgerError::TooFewEntries(_) => {
            problem(StatusCode::BAD_REQUEST, "too-few-entries", detail)
        }
        LedgerError::CurrencySetMismatch(_) => {
            problem(StatusCode::BAD_REQUEST, "currency-set-mismatch", detail)
        }
        LedgerError::AccountNotFound(_) => {
            problem(StatusCode::NOT_FOUND, "account-not-found", detail)
        }
        LedgerError::TransactionNotFound(_) => {
            problem(StatusCode::NOT_FOUND, "transaction-not-found", detail)
        }
        LedgerError::AccountNotActive { .. } => {
            problem(StatusCode::CONFLICT, "account-not-active", detail)
        }
        LedgerError::NotReversible { .. } => {
            problem(StatusCode::CONFLICT, "not-reversible", detail)
        }
        LedgerError::DuplicateExternalId(_) => {
            problem(StatusCode::CONFLICT, "duplicate-external-id", detail)
        }
        LedgerError::InvalidAccountStateTransition { .. } => {
            problem(StatusCode::CONFLICT, "invalid-account-state-transition", detail)
        }
        LedgerError::StoreConflict(_) => problem(StatusCode::CONFLICT, "store-conflict", detail),
        LedgerError::DeadlineExceeded => {
            problem(StatusCode::GATEWAY_TIMEOUT, "deadline-exceeded", detail)
        }
        LedgerError::Internal(_) => {
            tracing::error!(%detail, "internal error surfaced to client");
            problem(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-error",
                "internal error",
            )
        }
    }
}
