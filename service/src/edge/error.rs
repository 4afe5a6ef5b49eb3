//! Edge authentication failures and their HTTP mapping.
//!
//! Each variant corresponds to exactly one rejection point in
//! [`EdgeSignatureVerifier::verify`](super::EdgeSignatureVerifier::verify).
//! Bodies carry a machine-readable `error` code and a human `message`;
//! nothing about the credential or its secret is ever included.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Why an edge request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EdgeAuthError {
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Edge credential is not configured")]
    ConfigurationError,
    #[error("Request timestamp is invalid or expired")]
    TimestampInvalid,
    #[error("Nonce has already been used")]
    NonceReused,
    #[error("Unable to verify request nonce")]
    NonceCheckFailed,
    #[error("Unable to decrypt edge credential")]
    DecryptionFailed,
    #[error("Invalid signature")]
    InvalidSignature,
}

impl EdgeAuthError {
    /// Machine-readable code returned in the `error` field.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::InvalidCredentials => "invalid_credentials",
            Self::ConfigurationError => "configuration_error",
            Self::TimestampInvalid => "timestamp_invalid",
            Self::NonceReused => "nonce_reused",
            Self::NonceCheckFailed => "nonce_check_failed",
            Self::DecryptionFailed => "decryption_failed",
            Self::InvalidSignature => "invalid_signature",
        }
    }

    /// 401 for anything the caller got wrong, 500 for server-side faults.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::AuthenticationRequired
            | Self::InvalidCredentials
            | Self::TimestampInvalid
            | Self::NonceReused
            | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::ConfigurationError | Self::NonceCheckFailed | Self::DecryptionFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body returned to edge devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeErrorBody {
    pub message: String,
    pub error: String,
}

/// Build an edge error response from its parts.
pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(EdgeErrorBody {
            message: message.to_string(),
            error: code.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for EdgeAuthError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.code(), &self.to_string())
    }
}
