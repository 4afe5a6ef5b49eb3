//! Request origin resolution.
//!
//! The origin is the TCP peer address. When the peer is a trusted reverse
//! proxy, the left-most `X-Forwarded-For` entry is used instead.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client address for a request.
///
/// Returns `None` only when the peer address is unknown (no `ConnectInfo`).
/// A trusted peer with a missing or malformed `X-Forwarded-For` header
/// resolves to the peer itself.
#[must_use]
pub fn resolve_source_addr(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer_ip = peer?.ip();
    if !trusted_proxies.contains(&peer_ip) {
        return Some(peer_ip);
    }

    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    Some(forwarded.unwrap_or(peer_ip))
}
