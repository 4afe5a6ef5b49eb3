//! axum middleware that authenticates edge requests.
//!
//! Buffers the body, runs [`EdgeSignatureVerifier`], and on success stores an
//! [`AuthenticatedEdge`] in the request extensions before handing the request
//! (with its body re-attached) to the handler.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, FromRequestParts, OriginalUri, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use eh_crypto::SecretSealer;
use http_body_util::LengthLimitError;

use super::clock::Clock;
use super::error::{error_response, EdgeAuthError};
use super::repo::EdgeRepo;
use super::verifier::{
    AuthenticatedEdge, EdgeHeaders, EdgeRequest, EdgeSignatureVerifier, VerifierPolicy,
};
use crate::config::EdgeAuthConfig;
use crate::http::resolve_source_addr;

/// Shared state for [`edge_auth_middleware`].
#[derive(Clone)]
pub struct EdgeAuthState {
    verifier: Arc<EdgeSignatureVerifier>,
    repo: Arc<dyn EdgeRepo>,
    clock: Arc<dyn Clock>,
    max_body_bytes: usize,
    trusted_proxies: Arc<Vec<IpAddr>>,
}

impl EdgeAuthState {
    #[must_use]
    pub fn new(
        repo: Arc<dyn EdgeRepo>,
        sealer: Arc<SecretSealer>,
        clock: Arc<dyn Clock>,
        config: &EdgeAuthConfig,
    ) -> Self {
        let verifier = EdgeSignatureVerifier::new(
            repo.clone(),
            sealer,
            clock.clone(),
            VerifierPolicy::from(config),
        );
        Self {
            verifier: Arc::new(verifier),
            repo,
            clock,
            max_body_bytes: config.max_body_bytes,
            trusted_proxies: Arc::new(config.trusted_proxy_addrs()),
        }
    }
}

/// Authenticate an edge request or reject it with the verifier's error.
pub async fn edge_auth_middleware(
    State(state): State<EdgeAuthState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    // Skip buffering when the request cannot authenticate anyway.
    let body = if EdgeHeaders::from_headers(&parts.headers).is_complete() {
        match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let e = e.into_inner();
                if e.is::<LengthLimitError>() {
                    tracing::warn!(
                        limit = state.max_body_bytes,
                        "Edge request body exceeds limit"
                    );
                    return error_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "payload_too_large",
                        "Request body too large",
                    );
                }
                tracing::warn!(error = %e, "Failed to read edge request body");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_body",
                    "Failed to read request body",
                );
            }
        }
    } else {
        Bytes::new()
    };

    let result = {
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |uri| uri.0.path());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let request = EdgeRequest {
            method: parts.method.as_str(),
            path,
            headers: EdgeHeaders::from_headers(&parts.headers),
            body: &body,
            source_addr: resolve_source_addr(peer, &parts.headers, &state.trusted_proxies),
        };
        state.verifier.verify(&request).await
    };

    let identity = match result {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    // Touch last_seen_at (fire-and-forget, don't fail the request)
    let repo = state.repo.clone();
    let device_id = identity.device_id;
    let seen_at = state.clock.now();
    tokio::spawn(async move {
        if let Err(e) = repo.touch_credential(device_id, seen_at).await {
            tracing::warn!(device_id = %device_id, error = %e, "Failed to touch edge credential");
        }
    });

    parts.extensions.insert(identity);
    next.run(Request::from_parts(parts, Body::from(body))).await
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedEdge {
    type Rejection = EdgeAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(EdgeAuthError::AuthenticationRequired)
    }
}
