//! Proxy route lookup.
//!
//! # Responsibilities
//! - Store compiled proxy rules in configured order
//! - Look up the first rule whose prefix matches a path
//! - Build the upstream URI for a matched request
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical rule counts)
//! - Explicit `None` rather than a silent default

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use indexmap::IndexMap;
use regex::Regex;
use url::Url;

use super::matcher::PathPrefixMatcher;
use crate::config::{ProxyOptions, ProxyTargetConfig};
use crate::observability::{AccessEvent, EventSink};

/// Compiled upstream target.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub url: Url,
    pub change_origin: bool,
    path_rewrite: Vec<(Regex, String)>,
    headers: HeaderMap,
}

impl ProxyTarget {
    /// Compile options; bad rewrite patterns and headers are reported and dropped.
    pub fn compile(options: ProxyOptions, sink: &dyn EventSink) -> Self {
        let path_rewrite = options
            .path_rewrite
            .into_iter()
            .filter_map(|(pattern, replacement)| match Regex::new(&pattern) {
                Ok(re) => Some((re, replacement)),
                Err(e) => {
                    sink.emit(AccessEvent::MalformedRule {
                        kind: "path_rewrite",
                        rule: pattern,
                        error: e.to_string(),
                    });
                    None
                }
            })
            .collect();

        let mut headers = HeaderMap::new();
        for (name, value) in options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => sink.emit(AccessEvent::MalformedRule {
                    kind: "proxy_header",
                    rule: name,
                    error: "invalid header name or value".to_string(),
                }),
            }
        }

        Self {
            url: options.target,
            change_origin: options.change_origin,
            path_rewrite,
            headers,
        }
    }

    /// Extra headers to set on the upstream request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Apply the path rewrites in order.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.path_rewrite
            .iter()
            .fold(path.to_string(), |acc, (re, replacement)| {
                re.replace(&acc, replacement.as_str()).into_owned()
            })
    }

    /// Upstream URI: target origin + target path + rewritten request path + query.
    pub fn upstream_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, axum::http::uri::InvalidUri> {
        let rewritten = self.rewrite_path(path);
        let base_path = self.url.path().trim_end_matches('/');

        let mut full_path = format!("{base_path}{rewritten}");
        if full_path.is_empty() {
            full_path.push('/');
        } else if !full_path.starts_with('/') {
            full_path.insert(0, '/');
        }

        let mut uri = format!("{}{}", self.origin(), full_path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            uri.push('?');
            uri.push_str(q);
        }
        uri.parse()
    }

    /// `scheme://host[:port]` of the target.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// `host[:port]` of the target, used when `change_origin` is set.
    pub fn authority(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

/// A prefix bound to an upstream target.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    matcher: PathPrefixMatcher,
    pub target: ProxyTarget,
}

impl ProxyRule {
    pub fn new(prefix: impl Into<String>, target: ProxyTarget) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            target,
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }
}

/// Ordered proxy rule table.
#[derive(Debug, Clone, Default)]
pub struct ProxyRouter {
    rules: Vec<ProxyRule>,
}

impl ProxyRouter {
    pub fn new(rules: Vec<ProxyRule>) -> Self {
        Self { rules }
    }

    /// Compile the `[proxies]` table, keeping its insertion order.
    pub fn from_config(proxies: &IndexMap<String, ProxyTargetConfig>, sink: &dyn EventSink) -> Self {
        let rules = proxies
            .iter()
            .map(|(prefix, target)| {
                let target = ProxyTarget::compile(target.clone().into_options(), sink);
                sink.emit(AccessEvent::ProxyRegistered {
                    prefix: prefix.clone(),
                    target: target.url.to_string(),
                });
                ProxyRule::new(prefix.clone(), target)
            })
            .collect();
        Self::new(rules)
    }

    /// First rule, in configured order, whose prefix matches `path`.
    pub fn route_for(&self, path: &str) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matcher.matches(path))
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::RecordingSink;

    fn url_target(url: &str) -> ProxyTargetConfig {
        ProxyTargetConfig::Url(url.parse().unwrap())
    }

    #[test]
    fn test_specific_prefix_registered_first_wins() {
        let sink = RecordingSink::new();
        let mut proxies = IndexMap::new();
        proxies.insert("/api".to_string(), url_target("http://a.internal"));
        proxies.insert("/".to_string(), url_target("http://b.internal"));
        let router = ProxyRouter::from_config(&proxies, &sink);

        assert_eq!(router.route_for("/api/x").unwrap().target.url.as_str(), "http://a.internal/");
        assert_eq!(router.route_for("/index.html").unwrap().target.url.as_str(), "http://b.internal/");

        let registered: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                AccessEvent::ProxyRegistered { prefix, .. } => Some(prefix),
                _ => None,
            })
            .collect();
        assert_eq!(registered, vec!["/api", "/"]);
    }

    #[test]
    fn test_first_match_not_best_match() {
        let sink = RecordingSink::new();
        let mut proxies = IndexMap::new();
        proxies.insert("/".to_string(), url_target("http://b.internal"));
        proxies.insert("/api".to_string(), url_target("http://a.internal"));
        let router = ProxyRouter::from_config(&proxies, &sink);

        assert_eq!(router.route_for("/api/x").unwrap().prefix(), "/");
    }

    #[test]
    fn test_no_match() {
        let sink = RecordingSink::new();
        let mut proxies = IndexMap::new();
        proxies.insert("/api".to_string(), url_target("http://a.internal"));
        let router = ProxyRouter::from_config(&proxies, &sink);

        assert!(router.route_for("/static/app.js").is_none());
        assert!(ProxyRouter::default().route_for("/").is_none());
    }

    #[test]
    fn test_shorthand_changes_origin() {
        let sink = RecordingSink::new();
        let target = ProxyTarget::compile(url_target("https://example.com:8443").into_options(), &sink);
        assert!(target.change_origin);
        assert_eq!(target.authority().as_deref(), Some("example.com:8443"));
        assert_eq!(target.origin(), "https://example.com:8443");
    }

    #[test]
    fn test_upstream_uri() {
        let sink = RecordingSink::new();
        let mut rewrite = IndexMap::new();
        rewrite.insert("^/api".to_string(), "".to_string());
        let target = ProxyTarget::compile(
            ProxyOptions {
                target: "http://api.internal:9000/v1/".parse().unwrap(),
                change_origin: false,
                path_rewrite: rewrite,
                headers: IndexMap::new(),
            },
            &sink,
        );

        assert_eq!(
            target.upstream_uri("/api/users", Some("page=2")).unwrap(),
            "http://api.internal:9000/v1/users?page=2"
        );
        assert_eq!(target.upstream_uri("/api", None).unwrap(), "http://api.internal:9000/v1");

        let plain = ProxyTarget::compile(url_target("http://b.internal").into_options(), &sink);
        assert_eq!(plain.upstream_uri("/x/y", None).unwrap(), "http://b.internal/x/y");
    }

    #[test]
    fn test_bad_rewrite_and_header_are_reported() {
        let sink = RecordingSink::new();
        let mut rewrite = IndexMap::new();
        rewrite.insert("(".to_string(), "".to_string());
        let mut headers = IndexMap::new();
        headers.insert("bad header".to_string(), "v".to_string());
        headers.insert("x-ok".to_string(), "1".to_string());

        let target = ProxyTarget::compile(
            ProxyOptions {
                target: "http://a.internal".parse().unwrap(),
                change_origin: false,
                path_rewrite: rewrite,
                headers,
            },
            &sink,
        );

        assert_eq!(target.rewrite_path("/(x"), "/(x");
        assert_eq!(target.headers().len(), 1);
        assert_eq!(sink.count(|e| matches!(e, AccessEvent::MalformedRule { .. })), 2);
    }
}
