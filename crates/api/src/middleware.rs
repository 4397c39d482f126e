use std::time::Instant;

use axum::{http::HeaderMap, middleware::Next, response::Response};

use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor";

/// Attach the caller's [`ActorContext`] and log one line per request.
pub async fn request_context(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let actor = ActorContext::new(extract_actor(req.headers()));
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(actor);

    let started = Instant::now();
    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

fn extract_actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
