//! Edge request signing.
//!
//! Edge devices sign every request with their shared secret. The signed
//! payload is a canonical string built from request parts:
//!
//! ```text
//! {METHOD}|{PATH}|{TIMESTAMP}|{BODY_SHA256_HEX}
//! ```
//!
//! - `METHOD` is uppercased.
//! - `PATH` is the routed path without query string and without the leading
//!   slash (`/api/v1/events` signs as `api/v1/events`, the root as `/`).
//! - `TIMESTAMP` is the `X-EDGE-TIMESTAMP` header value exactly as sent.
//! - `BODY_SHA256_HEX` is the lowercase hex SHA-256 of the raw body bytes.
//!
//! The signature is the lowercase hex `HMAC-SHA256(secret, canonical)`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Errors from computing a request signature.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("HMAC key rejected")]
    InvalidKey,
}

/// Lowercase hex SHA-256 of a request body. An empty body hashes the empty string.
#[must_use]
pub fn body_sha256_hex(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("{digest:x}")
}

/// Normalize a routed path into its signed form.
#[must_use]
pub fn canonical_path(path: &str) -> &str {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Build the canonical signing string for a request.
#[must_use]
pub fn signing_string(method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    format!(
        "{}|{}|{}|{}",
        method.to_ascii_uppercase(),
        canonical_path(path),
        timestamp,
        body_sha256_hex(body)
    )
}

/// Compute the hex HMAC-SHA256 signature of a canonical signing string.
///
/// # Errors
///
/// Returns [`SignError::InvalidKey`] if the HMAC implementation rejects the key.
pub fn sign(secret: &[u8], signing_string: &str) -> Result<String, SignError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignError::InvalidKey)?;
    mac.update(signing_string.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Check a supplied hex signature against the expected one in constant time.
///
/// The comparison never short-circuits on the first differing byte. Length
/// mismatches are rejected without inspecting content.
///
/// # Errors
///
/// Returns [`SignError::InvalidKey`] if the expected signature cannot be computed.
pub fn verify_signature(
    secret: &[u8],
    signing_string: &str,
    provided_hex: &str,
) -> Result<bool, SignError> {
    let expected = sign(secret, signing_string)?;
    Ok(bool::from(expected.as_bytes().ct_eq(provided_hex.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const BRACES_SHA256: &str = "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

    #[test]
    fn test_body_hash_of_empty_body() {
        assert_eq!(body_sha256_hex(b""), EMPTY_SHA256);
    }

    #[test]
    fn test_body_hash_of_empty_json_object() {
        assert_eq!(body_sha256_hex(b"{}"), BRACES_SHA256);
    }

    #[test]
    fn test_canonical_path_strips_leading_slash() {
        assert_eq!(canonical_path("/api/v1/events"), "api/v1/events");
        assert_eq!(canonical_path("api/v1/events"), "api/v1/events");
        assert_eq!(canonical_path("/"), "/");
        assert_eq!(canonical_path(""), "/");
    }

    #[test]
    fn test_signing_string_scenario() {
        let s = signing_string("post", "/api/v1/events", "1700000000", b"{}");
        assert_eq!(s, format!("POST|api/v1/events|1700000000|{BRACES_SHA256}"));
    }

    #[test]
    fn test_signature_is_lowercase_hex_sha256_length() {
        let sig = sign(b"s3cr3t", "POST|api/v1/events|1700000000|x").expect("sign");
        assert_eq!(sig.len(), 64);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(sig, sig.to_ascii_lowercase());
    }

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let sig = sign(b"Jefe", "what do ya want for nothing?").expect("sign");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_accepts_matching_signature() {
        let canonical = signing_string("POST", "api/v1/events", "1700000000", b"{}");
        let sig = sign(b"s3cr3t", &canonical).expect("sign");
        assert!(verify_signature(b"s3cr3t", &canonical, &sig).expect("verify"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let canonical = signing_string("POST", "api/v1/events", "1700000000", b"{}");
        let sig = sign(b"s3cr3t", &canonical).expect("sign");
        assert!(!verify_signature(b"other", &canonical, &sig).expect("verify"));
    }

    #[test]
    fn test_verify_rejects_truncated_and_empty_signature() {
        let canonical = signing_string("GET", "/", "1", b"");
        let sig = sign(b"k", &canonical).expect("sign");
        assert!(!verify_signature(b"k", &canonical, &sig[..32]).expect("verify"));
        assert!(!verify_signature(b"k", &canonical, "").expect("verify"));
    }

    proptest! {
        #[test]
        fn body_byte_flip_invalidates_signature(
            body in proptest::collection::vec(any::<u8>(), 1..256),
            idx in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let canonical = signing_string("POST", "api/v1/events", "1700000000", &body);
            let sig = sign(b"s3cr3t", &canonical).expect("sign");

            let mut tampered = body.clone();
            let i = idx.index(tampered.len());
            tampered[i] ^= flip;
            let tampered_canonical = signing_string("POST", "api/v1/events", "1700000000", &tampered);

            prop_assert!(!verify_signature(b"s3cr3t", &tampered_canonical, &sig).expect("verify"));
        }

        #[test]
        fn path_change_invalidates_signature(suffix in "[a-z0-9]{1,12}") {
            let canonical = signing_string("POST", "api/v1/events", "1700000000", b"{}");
            let sig = sign(b"s3cr3t", &canonical).expect("sign");
            let moved = signing_string("POST", &format!("api/v1/events/{suffix}"), "1700000000", b"{}");
            prop_assert!(!verify_signature(b"s3cr3t", &moved, &sig).expect("verify"));
        }

        #[test]
        fn timestamp_change_invalidates_signature(ts in 0u64..4_000_000_000, delta in 1u64..1000) {
            let original = ts.to_string();
            let shifted = (ts + delta).to_string();
            let canonical = signing_string("PUT", "api/v1/edge/heartbeat", &original, b"");
            let sig = sign(b"s3cr3t", &canonical).expect("sign");
            let moved = signing_string("PUT", "api/v1/edge/heartbeat", &shifted, b"");
            prop_assert!(!verify_signature(b"s3cr3t", &moved, &sig).expect("verify"));
        }
    }

    #[test]
    fn test_method_change_invalidates_signature() {
        let canonical = signing_string("POST", "api/v1/events", "1700000000", b"{}");
        let sig = sign(b"s3cr3t", &canonical).expect("sign");
        for method in ["GET", "PUT", "PATCH", "DELETE"] {
            let moved = signing_string(method, "api/v1/events", "1700000000", b"{}");
            assert!(!verify_signature(b"s3cr3t", &moved, &sig).expect("verify"));
        }
    }
}
