//! Per-request snapshot consumed by the access pipeline.

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap, Method};
use std::net::{IpAddr, SocketAddr};

/// Headers consulted for the client address, in priority order.
const CLIENT_IP_HEADERS: &[&str] = &[
    "x-client-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "fastly-client-ip",
    "true-client-ip",
    "x-real-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Read-only view of one request: method, path, peer address and headers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            remote_addr,
            headers,
        }
    }

    /// Snapshot request parts. The peer address comes from axum's `ConnectInfo`
    /// extension when the server was started with connect info.
    pub fn from_parts(parts: &Parts) -> Self {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self::new(
            parts.method.clone(),
            parts.uri.path(),
            remote_addr,
            parts.headers.clone(),
        )
    }

    /// Header value as UTF-8, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Best-effort client address: forwarding headers first, then the peer.
    ///
    /// Forwarding headers are client-controlled; only rely on this behind a
    /// proxy that overwrites them. See [`RequestContext::peer_ip`].
    pub fn client_ip(&self) -> Option<IpAddr> {
        CLIENT_IP_HEADERS
            .iter()
            .find_map(|name| self.header(name).and_then(|v| parse_header_ip(name, v)))
            .map(|ip| ip.to_canonical())
            .or_else(|| self.peer_ip())
    }

    /// Address of the socket peer, ignoring every header.
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip().to_canonical())
    }
}

fn parse_header_ip(name: &str, value: &str) -> Option<IpAddr> {
    match name {
        "forwarded" => value
            .split([',', ';'])
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("for"))
            .find_map(|(_, v)| parse_ip_token(v)),
        _ => value.split(',').find_map(parse_ip_token),
    }
}

/// Parse one address token, tolerating quotes, brackets and a port suffix.
fn parse_ip_token(token: &str) -> Option<IpAddr> {
    let token = token.trim().trim_matches('"');
    if let Ok(ip) = token.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = token.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    let inner = token.strip_prefix('[')?;
    let end = inner.find(']')?;
    inner[..end].parse().ok()
}
