//! The query proxy: a hot-store-compatible HTTP facade that tiers every
//! search by time range, fans out across both stores when a window straddles
//! the boundary, and reverse-proxies everything else to the hot store.

pub mod endpoint;
pub mod handler;
pub mod passthrough;
pub mod state;

use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;
use tracing::info_span;

/// Builds the proxy router: health endpoints plus a fallback that carries
/// every other request through interception or passthrough.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route("/_health", get(handler::health))
        .fallback(handler::dispatch)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
