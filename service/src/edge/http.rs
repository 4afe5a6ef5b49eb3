//! Authenticated edge API routes.

use axum::{
    body::Bytes,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::error_response;
use super::middleware::{edge_auth_middleware, EdgeAuthState};
use super::verifier::AuthenticatedEdge;

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub tenant_id: Uuid,
    pub device_id: Uuid,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsAccepted {
    pub accepted: usize,
}

/// Edge routes, all behind [`edge_auth_middleware`].
///
/// The middleware is a route layer so unmatched paths still 404 instead of
/// demanding authentication.
pub fn router(state: EdgeAuthState) -> Router {
    Router::new()
        .route("/api/v1/edge/heartbeat", post(heartbeat))
        .route("/api/v1/edge/events", post(ingest_events))
        .route_layer(middleware::from_fn_with_state(state, edge_auth_middleware))
}

async fn heartbeat(edge: AuthenticatedEdge) -> impl IntoResponse {
    Json(HeartbeatResponse {
        tenant_id: edge.tenant_id,
        device_id: edge.device_id,
        server_time: Utc::now(),
    })
}

/// Accept a single event object or an array of events.
async fn ingest_events(edge: AuthenticatedEdge, body: Bytes) -> Response {
    let accepted = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Array(events)) => events.len(),
        Ok(serde_json::Value::Object(_)) => 1,
        Ok(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                "Expected an event object or an array of events",
            )
        }
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                &format!("Invalid JSON body: {e}"),
            )
        }
    };

    tracing::info!(
        tenant_id = %edge.tenant_id,
        device_id = %edge.device_id,
        accepted,
        "Accepted edge events"
    );

    (StatusCode::ACCEPTED, Json(EventsAccepted { accepted })).into_response()
}
