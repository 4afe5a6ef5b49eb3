//! HTTP wiring shared by the server binary and integration tests.

pub mod origin;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::edge::{self, EdgeAuthState};

pub use origin::resolve_source_addr;

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the application router: `/health` plus the authenticated edge API.
pub fn build_router(edge_state: EdgeAuthState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(edge::http::router(edge_state))
        .layer(TraceLayer::new_for_http())
}
