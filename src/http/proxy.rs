//! Upstream forwarding for matched proxy rules.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the rule's target
//! - Adjust `Host` (change origin) and forwarding headers
//! - Stream the upstream response back to the client
//!
//! # Design Decisions
//! - One shared pooled client for every rule (HTTP and HTTPS upstreams)
//! - Hop-by-hop headers stripped in both directions
//! - Upstream failures become `502 Bad Gateway`, never a panic

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode},
    response::IntoResponse,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;

use crate::http::request::request_id;
use crate::routing::ProxyRule;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Pooled HTTP(S) client used to reach upstreams.
#[derive(Clone)]
pub struct ProxyTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl ProxyTransport {
    pub fn new() -> Self {
        let builder = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "Native root certificates unavailable, using bundled roots");
                HttpsConnectorBuilder::new().with_webpki_roots()
            }
        };
        let connector = builder.https_or_http().enable_http1().enable_http2().build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Forward `request` to the rule's target and return the upstream response.
    pub async fn forward(&self, rule: &ProxyRule, request: Request<Body>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();
        let req_id = request_id(&parts.headers).to_string();
        let target = &rule.target;

        let uri = match target.upstream_uri(parts.uri.path(), parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(request_id = %req_id, error = %e, "Invalid upstream URI");
                return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
            }
        };

        strip_hop_by_hop(&mut parts.headers);

        if target.change_origin {
            if let Some(value) = target
                .authority()
                .and_then(|a| HeaderValue::from_str(&a).ok())
            {
                parts.headers.insert(header::HOST, value);
            }
        }

        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, *peer);
        }

        for (name, value) in target.headers() {
            parts.headers.insert(name.clone(), value.clone());
        }

        tracing::debug!(
            request_id = %req_id,
            prefix = %rule.prefix(),
            upstream = %uri,
            "Proxying request"
        );

        parts.uri = uri;
        let request = Request::from_parts(parts, body);

        match self.client.request(request).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(request_id = %req_id, prefix = %rule.prefix(), error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
        }
    }
}

impl Default for ProxyTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_canonical().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
