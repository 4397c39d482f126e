use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockmaster_infra::ProductDirectory;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/low-stock", get(list_low_stock))
        .route("/:id", get(get_product).delete(delete_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.directory().register_product(body.into()).await {
        Ok(p) => {
            tracing::info!(product_id = %p.id, sku = %p.sku, "product registered");
            (StatusCode::CREATED, Json(dto::product_to_json(&p))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match errors::parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.directory().get_product(product_id).await {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match errors::parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.directory().deactivate_product(product_id).await {
        Ok(()) => {
            tracing::info!(%product_id, "product deactivated");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.directory().low_stock_products().await {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "items": items.iter().map(dto::product_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
