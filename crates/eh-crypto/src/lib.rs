//! Shared cryptographic utilities for edgehub
//!
//! Used by the API service to verify edge requests, by the `edge-ops` tool to
//! provision credentials, and by edge clients to sign their requests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

mod sealed;
pub use sealed::{SealError, SecretSealer, MASTER_KEY_LEN};

mod signing;
pub use signing::{
    body_sha256_hex, canonical_path, sign, signing_string, verify_signature, SignError,
};

/// Error type for base64url decoding failures
#[derive(Debug, thiserror::Error)]
#[error("invalid base64url encoding: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Encode bytes as base64url (RFC 4648) without padding.
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url-encoded string (RFC 4648) without padding.
///
/// # Errors
/// Returns `DecodeError` if the input is not valid base64url
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(DecodeError::from)
}

/// Generate `len` random bytes from the OS RNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate `len` random bytes, lowercase hex encoded.
///
/// Used for edge public keys and shared secrets at registration time.
#[must_use]
pub fn random_hex(len: usize) -> String {
    random_bytes(len).iter().map(|b| format!("{b:02x}")).collect()
}
