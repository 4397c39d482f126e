use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate};

use stockmaster_inventory::{MovementKind, MovementRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_movement).get(list_recent_movements))
        .route("/stats", get(movement_stats))
        .route("/product/:product_id", get(product_history))
        .route("/:id", get(get_movement))
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let product_id = match errors::parse_product_id(&body.product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind: MovementKind = match body.kind.parse() {
        Ok(k) => k,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    let mut request = MovementRequest::new(product_id, kind, body.quantity);
    request.reason = body.reason;
    request.actor = body.actor.or_else(|| actor.actor().map(str::to_string));

    match services.ledger().submit_movement(request).await {
        Ok(accepted) => {
            let mut json = dto::movement_to_json(&accepted.movement);
            json["quantity_on_hand"] = accepted.quantity_on_hand.into();
            (StatusCode::CREATED, Json(json)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_recent_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::RecentQuery>,
) -> axum::response::Response {
    let ledger = services.ledger();
    let limit = query.limit.unwrap_or(ledger.config().max_recent_limit);
    match ledger.recent_history(limit).await {
        Ok(items) => (StatusCode::OK, Json(dto::movements_to_json(&items))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_movement_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.ledger().movement(id).await {
        Ok(m) => (StatusCode::OK, Json(dto::movement_to_json(&m))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn product_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id = match errors::parse_product_id(&product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.ledger().history(product_id).await {
        Ok(items) => (StatusCode::OK, Json(dto::movements_to_json(&items))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn movement_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StatsQuery>,
) -> axum::response::Response {
    let date = match query.date.as_deref().map(str::trim) {
        None | Some("") => services.ledger().today(),
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "date must be formatted as YYYY-MM-DD",
                );
            }
        },
    };

    let ledger = services.ledger();
    let summary = match ledger.daily_summary(date).await {
        Ok(s) => s,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let month_count = match ledger
        .monthly_movement_count(date.year(), date.month())
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::stats_to_json(&summary, month_count))).into_response()
}
