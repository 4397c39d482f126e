use axum::Router;

pub mod movements;
pub mod products;
pub mod system;

/// Router for all ledger and directory endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/movements", movements::router())
        .nest("/products", products::router())
}
