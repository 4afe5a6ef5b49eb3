//! Signed edge request builder.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request},
};
use eh_crypto::{sign, signing_string};

use super::next_id;

/// Timestamp used by default; tests pin their clock to it.
pub const DEFAULT_TIMESTAMP: i64 = 1_700_000_000;

/// Builder for a request signed the way an edge device signs it.
///
/// Header overrides let tests send deliberately broken requests.
pub struct SignedRequest {
    method: Method,
    uri: String,
    body: Vec<u8>,
    key: String,
    secret: Vec<u8>,
    timestamp: String,
    nonce: String,
    signature: Option<String>,
    peer: Option<SocketAddr>,
    extra_headers: Vec<(&'static str, String)>,
    omit: Vec<&'static str>,
}

impl SignedRequest {
    #[must_use]
    pub fn new(method: Method, uri: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            body: body.into(),
            key: "edge-42".to_string(),
            secret: b"s3cr3t".to_vec(),
            timestamp: DEFAULT_TIMESTAMP.to_string(),
            nonce: format!("nonce-{}", next_id()),
            signature: None,
            peer: Some(SocketAddr::from(([198, 51, 100, 20], 40_000))),
            extra_headers: Vec::new(),
            omit: Vec::new(),
        }
    }

    #[must_use]
    pub fn post(uri: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::POST, uri, body)
    }

    #[must_use]
    pub fn key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    #[must_use]
    pub fn secret(mut self, secret: &str) -> Self {
        self.secret = secret.as_bytes().to_vec();
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: impl ToString) -> Self {
        self.timestamp = timestamp.to_string();
        self
    }

    #[must_use]
    pub fn nonce(mut self, nonce: &str) -> Self {
        self.nonce = nonce.to_string();
        self
    }

    /// Send this signature instead of the computed one.
    #[must_use]
    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// TCP peer reported through `ConnectInfo`; `None` leaves it unset.
    #[must_use]
    pub fn peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.extra_headers.push((name, value.to_string()));
        self
    }

    /// Drop one of the edge headers.
    #[must_use]
    pub fn without(mut self, header: &'static str) -> Self {
        self.omit.push(header);
        self
    }

    /// The signature the request will carry unless overridden.
    #[must_use]
    pub fn computed_signature(&self) -> String {
        let path = self.uri.split('?').next().unwrap_or_default();
        let canonical = signing_string(self.method.as_str(), path, &self.timestamp, &self.body);
        sign(&self.secret, &canonical).expect("sign")
    }

    #[must_use]
    pub fn build(self) -> Request<Body> {
        let signature = self
            .signature
            .clone()
            .unwrap_or_else(|| self.computed_signature());

        let mut builder = Request::builder()
            .method(self.method)
            .uri(&self.uri)
            .header("content-type", "application/json");

        for (name, value) in [
            ("X-EDGE-KEY", &self.key),
            ("X-EDGE-TIMESTAMP", &self.timestamp),
            ("X-EDGE-SIGNATURE", &signature),
            ("X-EDGE-NONCE", &self.nonce),
        ] {
            if !self.omit.contains(&name) {
                builder = builder.header(name, value.as_str());
            }
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value.as_str());
        }

        let mut request = builder.body(Body::from(self.body)).expect("request");
        if let Some(peer) = self.peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }
        request
    }
}
