//! Edge request signature verification
//!
//! Edge devices authenticate each request with a shared-secret HMAC over a
//! canonical message (see [`eh_crypto::signing_string`]):
//!
//! ```text
//! {METHOD}|{PATH}|{TIMESTAMP}|{BODY_SHA256_HEX}
//! ```
//!
//! Required headers:
//! - `X-EDGE-KEY`: public credential identifier
//! - `X-EDGE-TIMESTAMP`: Unix seconds
//! - `X-EDGE-SIGNATURE`: hex HMAC-SHA256 of the canonical message
//! - `X-EDGE-NONCE`: single-use token chosen by the client
//!
//! Checks run in a fixed order and stop at the first failure:
//! headers, credential, timestamp, nonce reservation, secret decryption,
//! signature. The nonce is reserved *before* the signature is checked so two
//! concurrent requests carrying the same nonce can never both pass.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use eh_crypto::{canonical_path, signing_string, verify_signature, SecretSealer};
use serde::Serialize;
use uuid::Uuid;

use super::clock::Clock;
use super::error::EdgeAuthError;
use super::repo::{CredentialRepoError, EdgeRepo, NonceRepoError, NonceReservation};
use crate::config::EdgeAuthConfig;

pub const HEADER_EDGE_KEY: &str = "x-edge-key";
pub const HEADER_EDGE_TIMESTAMP: &str = "x-edge-timestamp";
pub const HEADER_EDGE_SIGNATURE: &str = "x-edge-signature";
pub const HEADER_EDGE_NONCE: &str = "x-edge-nonce";

/// Default freshness window, in seconds.
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Characters of a nonce or signature that may appear in logs.
const LOG_PREFIX_CHARS: usize = 8;

/// The four authentication headers as sent. Empty values count as missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeHeaders<'a> {
    pub key: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub nonce: Option<&'a str>,
}

impl<'a> EdgeHeaders<'a> {
    /// Read the edge headers from a header map (names are case-insensitive).
    #[must_use]
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        Self {
            key: get(HEADER_EDGE_KEY),
            timestamp: get(HEADER_EDGE_TIMESTAMP),
            signature: get(HEADER_EDGE_SIGNATURE),
            nonce: get(HEADER_EDGE_NONCE),
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.key.is_some()
            && self.timestamp.is_some()
            && self.signature.is_some()
            && self.nonce.is_some()
    }

    fn complete(&self) -> Option<CompleteHeaders<'a>> {
        Some(CompleteHeaders {
            key: self.key?,
            timestamp: self.timestamp?,
            signature: self.signature?,
            nonce: self.nonce?,
        })
    }
}

struct CompleteHeaders<'a> {
    key: &'a str,
    timestamp: &'a str,
    signature: &'a str,
    nonce: &'a str,
}

/// Everything the verifier needs from one inbound request.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRequest<'a> {
    pub method: &'a str,
    /// Routed path, without query string.
    pub path: &'a str,
    pub headers: EdgeHeaders<'a>,
    pub body: &'a [u8],
    pub source_addr: Option<IpAddr>,
}

/// Identity attached to a request that passed verification.
///
/// Lives in the request's extensions and is valid for that request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedEdge {
    pub tenant_id: Uuid,
    pub device_id: Uuid,
    pub public_key: String,
}

/// Tunable verification parameters.
#[derive(Debug, Clone, Copy)]
pub struct VerifierPolicy {
    pub timestamp_tolerance_secs: i64,
}

impl Default for VerifierPolicy {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS,
        }
    }
}

impl From<&EdgeAuthConfig> for VerifierPolicy {
    fn from(config: &EdgeAuthConfig) -> Self {
        Self {
            timestamp_tolerance_secs: config.timestamp_tolerance_secs,
        }
    }
}

/// Verifies authenticity, freshness, and single use of edge requests.
pub struct EdgeSignatureVerifier {
    repo: Arc<dyn EdgeRepo>,
    sealer: Arc<SecretSealer>,
    clock: Arc<dyn Clock>,
    policy: VerifierPolicy,
}

impl EdgeSignatureVerifier {
    #[must_use]
    pub fn new(
        repo: Arc<dyn EdgeRepo>,
        sealer: Arc<SecretSealer>,
        clock: Arc<dyn Clock>,
        policy: VerifierPolicy,
    ) -> Self {
        Self {
            repo,
            sealer,
            clock,
            policy,
        }
    }

    /// Verify one request.
    ///
    /// Performs at most one credential lookup and one nonce insert. Nothing
    /// is retried: a storage error rejects the request.
    ///
    /// # Errors
    ///
    /// Returns the [`EdgeAuthError`] for the first check that fails.
    pub async fn verify(
        &self,
        request: &EdgeRequest<'_>,
    ) -> Result<AuthenticatedEdge, EdgeAuthError> {
        let path = canonical_path(request.path);
        let source = request
            .source_addr
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());

        let Some(headers) = request.headers.complete() else {
            tracing::warn!(
                edge_key = request.headers.key.unwrap_or("-"),
                nonce = request.headers.nonce.map_or("-", log_prefix),
                source = %source,
                path = %path,
                "Edge request missing authentication headers"
            );
            return Err(EdgeAuthError::AuthenticationRequired);
        };
        let nonce_prefix = log_prefix(headers.nonce);

        let credential = match self.repo.get_credential_by_public_key(headers.key).await {
            Ok(credential) if credential.enabled => credential,
            Ok(_) => {
                tracing::warn!(
                    edge_key = %headers.key,
                    nonce = %nonce_prefix,
                    source = %source,
                    path = %path,
                    "Edge credential is disabled"
                );
                return Err(EdgeAuthError::InvalidCredentials);
            }
            Err(CredentialRepoError::NotFound) => {
                tracing::warn!(
                    edge_key = %headers.key,
                    nonce = %nonce_prefix,
                    source = %source,
                    path = %path,
                    "Unknown edge key"
                );
                return Err(EdgeAuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(
                    edge_key = %headers.key,
                    nonce = %nonce_prefix,
                    source = %source,
                    path = %path,
                    error = %e,
                    "Edge credential lookup failed"
                );
                return Err(EdgeAuthError::InvalidCredentials);
            }
        };

        let Some(sealed_secret) = credential.configured_secret() else {
            tracing::error!(
                edge_key = %headers.key,
                device_id = %credential.id,
                nonce = %nonce_prefix,
                source = %source,
                path = %path,
                "Edge credential has no secret configured"
            );
            return Err(EdgeAuthError::ConfigurationError);
        };

        let now = self.clock.now();
        let tolerance = self.policy.timestamp_tolerance_secs.unsigned_abs();
        let fresh = headers
            .timestamp
            .parse::<i64>()
            .is_ok_and(|ts| now.timestamp().abs_diff(ts) <= tolerance);
        if !fresh {
            tracing::warn!(
                edge_key = %headers.key,
                nonce = %nonce_prefix,
                timestamp = %log_prefix(headers.timestamp),
                server_time = now.timestamp(),
                source = %source,
                path = %path,
                "Edge request timestamp outside the allowed window"
            );
            return Err(EdgeAuthError::TimestampInvalid);
        }

        let origin = request.source_addr.map(|addr| addr.to_string());
        let reservation = NonceReservation {
            nonce: headers.nonce,
            public_key: headers.key,
            origin_addr: origin.as_deref(),
            reserved_at: now,
        };
        match self.repo.reserve_nonce(&reservation).await {
            Ok(()) => {}
            Err(NonceRepoError::Replay { first_reserved_at }) => {
                tracing::warn!(
                    edge_key = %headers.key,
                    nonce = %nonce_prefix,
                    first_reserved_at = ?first_reserved_at,
                    source = %source,
                    path = %path,
                    "Nonce reuse detected, possible replay attack"
                );
                return Err(EdgeAuthError::NonceReused);
            }
            Err(NonceRepoError::Database(e)) => {
                tracing::error!(
                    edge_key = %headers.key,
                    nonce = %nonce_prefix,
                    source = %source,
                    path = %path,
                    error = %e,
                    "Nonce reservation failed, rejecting request"
                );
                return Err(EdgeAuthError::NonceCheckFailed);
            }
        }

        let secret = self.sealer.open(sealed_secret).map_err(|e| {
            tracing::error!(
                edge_key = %headers.key,
                device_id = %credential.id,
                nonce = %nonce_prefix,
                source = %source,
                path = %path,
                error = %e,
                "Failed to decrypt edge credential secret"
            );
            EdgeAuthError::DecryptionFailed
        })?;

        let canonical = signing_string(request.method, path, headers.timestamp, request.body);
        if !verify_signature(&secret, &canonical, headers.signature).unwrap_or(false) {
            tracing::warn!(
                edge_key = %headers.key,
                nonce = %nonce_prefix,
                signature = %log_prefix(headers.signature),
                source = %source,
                path = %path,
                "Invalid edge request signature"
            );
            return Err(EdgeAuthError::InvalidSignature);
        }

        tracing::debug!(
            edge_key = %headers.key,
            tenant_id = %credential.tenant_id,
            device_id = %credential.id,
            path = %path,
            "Edge request authenticated"
        );

        Ok(AuthenticatedEdge {
            tenant_id: credential.tenant_id,
            device_id: credential.id,
            public_key: credential.public_key,
        })
    }
}

/// First few characters of a token, for logs.
fn log_prefix(value: &str) -> &str {
    value
        .char_indices()
        .nth(LOG_PREFIX_CHARS)
        .map_or(value, |(idx, _)| &value[..idx])
}
