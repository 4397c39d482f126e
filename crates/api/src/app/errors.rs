use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockmaster_core::{DomainError, MovementId, ProductId};
use stockmaster_infra::{LedgerError, StoreError};

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        LedgerError::InsufficientStock {
            available,
            requested,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!("insufficient stock: available {available}, requested {requested}"),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        LedgerError::TransientStorage(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "transient_storage", msg)
        }
        LedgerError::Persistence(msg) => {
            tracing::error!(error = %msg, "persistence failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure", msg)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        other => ledger_error_to_response(other.into()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

fn invalid_id(err: DomainError) -> axum::response::Response {
    let msg = match err {
        DomainError::InvalidId(msg) => msg,
        other => other.to_string(),
    };
    json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
}

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.parse().map_err(invalid_id)
}

pub fn parse_movement_id(s: &str) -> Result<MovementId, axum::response::Response> {
    s.parse().map_err(invalid_id)
}
