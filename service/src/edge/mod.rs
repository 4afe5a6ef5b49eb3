//! Edge device request authentication.
//!
//! Edge devices (gateways, cameras, sensors) sign each request with a
//! per-device shared secret. [`EdgeSignatureVerifier`] checks the signature,
//! the timestamp window and single use of the nonce; [`edge_auth_middleware`]
//! runs it in front of the edge routes and hands handlers an
//! [`AuthenticatedEdge`].

pub mod clock;
pub mod error;
pub mod http;
pub mod maintenance;
pub mod middleware;
pub mod repo;
pub mod verifier;

pub use clock::{Clock, SystemClock};
pub use error::{EdgeAuthError, EdgeErrorBody};
pub use maintenance::{purge_expired_nonces, spawn_nonce_purge};
pub use middleware::{edge_auth_middleware, EdgeAuthState};
pub use repo::{EdgeRepo, PgEdgeRepo};
pub use verifier::{
    AuthenticatedEdge, EdgeHeaders, EdgeRequest, EdgeSignatureVerifier, VerifierPolicy,
    HEADER_EDGE_KEY, HEADER_EDGE_NONCE, HEADER_EDGE_SIGNATURE, HEADER_EDGE_TIMESTAMP,
};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::FixedClock;
