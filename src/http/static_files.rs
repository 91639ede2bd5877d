//! Static site responder.
//!
//! # Responsibilities
//! - Serve files from the public directory for paths no proxy claimed
//! - Honour the route prefix and clean URLs
//! - Report "not found" as `None` so the dispatcher owns the 404
//!
//! # Design Decisions
//! - File mechanics (ranges, ETags, index.html, redirects) are delegated to
//!   `tower_http::services::ServeDir`
//! - The responder is a trait so callers can swap in their own collaborator

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response, StatusCode, Uri},
};
use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Produces a response for requests not claimed by a proxy rule.
pub trait StaticResponder: Send + Sync {
    /// `None` means nothing was found for the request.
    fn respond(&self, request: Request<Body>) -> BoxFuture<'static, Option<Response<Body>>>;
}

/// [`StaticResponder`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct ServeDirResponder {
    root: PathBuf,
    dir: ServeDir,
    clean_urls: bool,
    route_prefix: Option<String>,
}

impl ServeDirResponder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            dir: ServeDir::new(&root).append_index_html_on_directories(true),
            root,
            clean_urls: false,
            route_prefix: None,
        }
    }

    /// Try `<path>.html` when `<path>` is missing.
    pub fn clean_urls(mut self, on: bool) -> Self {
        self.clean_urls = on;
        self
    }

    /// Mount the site under `prefix`; other paths are not found.
    pub fn route_prefix(mut self, prefix: Option<String>) -> Self {
        self.route_prefix = prefix
            .map(|p| format!("/{}", p.trim_matches('/')))
            .filter(|p| p != "/");
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the mount point, or `None` outside of it.
    fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let Some(prefix) = &self.route_prefix else {
            return Some(path);
        };
        let rest = path.strip_prefix(prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Re-root a redirect issued for the stripped path under the mount point.
    fn remount_redirect(&self, response: &mut Response<Body>) {
        let Some(prefix) = &self.route_prefix else {
            return;
        };
        if !response.status().is_redirection() {
            return;
        }
        let remounted = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|location| location.starts_with('/'))
            .and_then(|location| HeaderValue::from_str(&format!("{prefix}{location}")).ok());
        if let Some(value) = remounted {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path = if path.is_empty() { "/" } else { path };
    let path_and_query = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    path_and_query.parse().ok()
}

fn wants_clean_url(path: &str) -> bool {
    !path.ends_with('/')
        && path
            .rsplit('/')
            .next()
            .is_some_and(|segment| !segment.is_empty() && !segment.contains('.'))
}

impl StaticResponder for ServeDirResponder {
    fn respond(&self, request: Request<Body>) -> BoxFuture<'static, Option<Response<Body>>> {
        let this = self.clone();
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let path = this.strip_prefix(parts.uri.path())?.to_string();
            parts.uri = with_path(&parts.uri, &path)?;

            let retry = (this.clean_urls && wants_clean_url(&path)).then(|| {
                let mut retry = Request::new(Body::empty());
                *retry.method_mut() = parts.method.clone();
                *retry.headers_mut() = parts.headers.clone();
                *retry.uri_mut() = with_path(&parts.uri, &format!("{path}.html"))
                    .unwrap_or_else(|| parts.uri.clone());
                retry
            });

            let response = match this.dir.clone().oneshot(Request::from_parts(parts, body)).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response.status() != StatusCode::NOT_FOUND {
                let mut response = response.map(Body::new);
                this.remount_redirect(&mut response);
                return Some(response);
            }

            let retry = retry?;
            let response = match this.dir.clone().oneshot(retry).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response.status() == StatusCode::NOT_FOUND {
                return None;
            }
            let mut response = response.map(Body::new);
            this.remount_redirect(&mut response);
            Some(response)
        })
    }
}
