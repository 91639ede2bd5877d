//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from TOML or JSON files.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::security::DEFAULT_REALM;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Static site settings.
    pub serve: ServeConfig,

    /// Access pipeline settings.
    pub access: AccessConfig,

    /// Path prefix → upstream. Evaluated in file order, first match wins.
    pub proxies: IndexMap<String, ProxyTargetConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging switches.
    pub logs: LogsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of `bind_address`, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.bind_address = format!("{host}:{port}");
    }
}

/// Static site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Directory served as the site root.
    pub public: PathBuf,

    /// Serve `/about` from `about.html` when `/about` itself is missing.
    pub clean_urls: bool,

    /// URL prefix under which the site is mounted (e.g. "/docs").
    pub route_prefix: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            public: PathBuf::from("dist"),
            clean_urls: true,
            route_prefix: None,
        }
    }
}

/// One username/password pair of the Basic auth allow-set.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A path pattern. A bare string matches literally or as a glob; the table
/// forms pick one interpretation explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathPattern {
    Plain(String),
    Exact { exact: String },
    Glob { glob: String },
    Regex { regex: String },
}

/// Enable switch as written in config: `true`, `false` or `{ paths = [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EnableConfig {
    Switch(bool),
    Paths { paths: Vec<PathPattern> },
}

impl Default for EnableConfig {
    fn default() -> Self {
        EnableConfig::Switch(true)
    }
}

/// Access pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Realm shown in the Basic auth challenge.
    pub realm: String,

    /// Paths exempt from every check.
    pub bypass: Vec<PathPattern>,

    /// IP allow-list. Absent = no IP check; empty = nobody allowed.
    pub valid_ips: Option<Vec<String>>,

    /// When the IP check applies.
    pub ip_enable: EnableConfig,

    /// Resolve the client IP from `X-Forwarded-For` and similar headers
    /// before the socket peer. Any client can set those headers; turn this
    /// off unless a proxy in front of the server overwrites them.
    pub trust_proxy_headers: bool,

    /// Basic auth users. Absent = no credential check; empty = nobody allowed.
    pub users: Option<Vec<Credential>>,

    /// When the credential check applies.
    pub auth_enable: EnableConfig,

    /// Log the username of authenticated requests.
    pub log_user: bool,

    /// Optional header token check.
    pub header_token: Option<HeaderTokenConfig>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            bypass: Vec::new(),
            valid_ips: None,
            ip_enable: EnableConfig::default(),
            trust_proxy_headers: true,
            users: None,
            auth_enable: EnableConfig::default(),
            log_user: false,
            header_token: None,
        }
    }
}

/// Header token check configuration.
#[derive(Clone, Deserialize, Serialize)]
pub struct HeaderTokenConfig {
    /// Header carrying the token.
    #[serde(default = "default_token_header")]
    pub header: String,

    /// Expected token value.
    pub token: String,

    /// When the check applies.
    #[serde(default)]
    pub enable: EnableConfig,
}

fn default_token_header() -> String {
    crate::security::DEFAULT_TOKEN_HEADER.to_string()
}

impl std::fmt::Debug for HeaderTokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderTokenConfig")
            .field("header", &self.header)
            .field("token", &"<redacted>")
            .field("enable", &self.enable)
            .finish()
    }
}

/// A proxy target: a bare URL, or a table of options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProxyTargetConfig {
    Url(Url),
    Options(ProxyOptions),
}

/// Structured proxy target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyOptions {
    /// Upstream base URL.
    pub target: Url,

    /// Rewrite the `Host` header to the target authority.
    #[serde(default)]
    pub change_origin: bool,

    /// Regex → replacement pairs applied in order to the request path.
    #[serde(default)]
    pub path_rewrite: IndexMap<String, String>,

    /// Extra headers added to the upstream request.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl ProxyTargetConfig {
    /// Expand the bare URL shorthand into full options.
    pub fn into_options(self) -> ProxyOptions {
        match self {
            ProxyTargetConfig::Url(target) => ProxyOptions {
                target,
                change_origin: true,
                path_rewrite: IndexMap::new(),
                headers: IndexMap::new(),
            },
            ProxyTargetConfig::Options(options) => options,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log method and path of every request.
    pub url: bool,

    /// Dump the effective configuration at startup.
    pub config: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            url: false,
            config: false,
        }
    }
}
