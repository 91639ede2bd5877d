//! Access decision engine.
//!
//! Orchestrates the bypass evaluator and the configured checks into one
//! ordered pipeline:
//!
//! ```text
//! START → BYPASS_CHECK → IP_CHECK → AUTH_CHECK (basic, token, custom...) → ALLOWED
//!              │             │            │
//!              ▼             ▼            ▼
//!          ALLOWED      DENIED(reason) DENIED(reason)
//! ```
//!
//! Every configured check must pass (logical AND, short-circuit on the first
//! failure). A denial owns exactly one response. Evaluation is a pure function
//! of the engine and the request: no state survives between requests.

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use std::fmt;
use std::sync::Arc;

use super::basic_auth::{BasicAuthCheck, CredentialValidator};
use super::bypass::{BypassEvaluator, PathRules};
use super::context::RequestContext;
use super::enable::Enable;
use super::header_token::{HeaderTokenCheck, TokenMatcher};
use super::ip_filter::{IpFilterCheck, IpMatcher};
use crate::config::{AccessConfig, EnableConfig};
use crate::observability::{AccessEvent, EventSink};

/// Body of every denial. Never reveals which check failed.
pub const DENIAL_BODY: &str = "Access denied";

/// Why the engine reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Every enabled check passed, or none is configured.
    Ok,
    /// The client address could not be determined.
    NoIp,
    /// The client address matched no allow rule.
    IpDenied,
    /// Basic credentials missing or wrong.
    BadCredentials,
    /// The path matched a bypass rule.
    Bypassed,
    /// Header token missing or wrong.
    BadToken,
    /// A caller-supplied check rejected the request.
    Rejected,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::Ok => "ok",
            Reason::NoIp => "no-ip",
            Reason::IpDenied => "ip-denied",
            Reason::BadCredentials => "bad-credentials",
            Reason::Bypassed => "bypassed",
            Reason::BadToken => "bad-token",
            Reason::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Allow/deny outcome for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessVerdict {
    pub allowed: bool,
    pub reason: Reason,
}

/// What the client receives when a check fails.
#[derive(Debug)]
enum DenialResponse {
    Forbidden,
    Unauthorized,
    Challenge(String),
    Custom(Response<Body>),
}

/// A failed check, carrying the single response to send.
#[derive(Debug)]
pub struct Denial {
    reason: Reason,
    response: DenialResponse,
}

impl Denial {
    /// `403 Access denied`.
    pub fn forbidden(reason: Reason) -> Self {
        Self {
            reason,
            response: DenialResponse::Forbidden,
        }
    }

    /// `401 Access denied` without a challenge.
    pub fn unauthorized(reason: Reason) -> Self {
        Self {
            reason,
            response: DenialResponse::Unauthorized,
        }
    }

    /// `401` with `WWW-Authenticate: Basic realm="<realm>"`.
    pub fn challenge(realm: &str) -> Self {
        Self {
            reason: Reason::BadCredentials,
            response: DenialResponse::Challenge(realm.to_string()),
        }
    }

    /// A response prepared by the check itself.
    pub fn with_response(reason: Reason, response: Response<Body>) -> Self {
        Self {
            reason,
            response: DenialResponse::Custom(response),
        }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response<Body> {
        match self.response {
            DenialResponse::Forbidden => (StatusCode::FORBIDDEN, DENIAL_BODY).into_response(),
            DenialResponse::Unauthorized => {
                (StatusCode::UNAUTHORIZED, DENIAL_BODY).into_response()
            }
            DenialResponse::Challenge(realm) => {
                let mut response = (StatusCode::UNAUTHORIZED, DENIAL_BODY).into_response();
                let value = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
                response
            }
            DenialResponse::Custom(response) => response,
        }
    }
}

/// Result of a single check.
#[derive(Debug)]
pub enum CheckOutcome {
    Pass,
    Deny(Denial),
}

/// One stage of the access pipeline.
pub trait AccessCheck: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the check applies to a given request.
    fn enable(&self) -> &Enable;

    /// Evaluate the request. Must not block.
    fn check(&self, ctx: &RequestContext) -> CheckOutcome;
}

/// Adapter turning a closure into a custom [`AccessCheck`].
pub struct FnCheck<F> {
    name: &'static str,
    enable: Enable,
    f: F,
}

impl<F> FnCheck<F>
where
    F: Fn(&RequestContext) -> CheckOutcome + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            enable: Enable::Always,
            f,
        }
    }

    pub fn with_enable(mut self, enable: Enable) -> Self {
        self.enable = enable;
        self
    }
}

impl<F> AccessCheck for FnCheck<F>
where
    F: Fn(&RequestContext) -> CheckOutcome + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn enable(&self) -> &Enable {
        &self.enable
    }

    fn check(&self, ctx: &RequestContext) -> CheckOutcome {
        (self.f)(ctx)
    }
}

/// Final decision for a request.
#[derive(Debug)]
pub enum Decision {
    Allowed(Reason),
    Denied(Denial),
}

impl Decision {
    pub fn verdict(&self) -> AccessVerdict {
        match self {
            Decision::Allowed(reason) => AccessVerdict {
                allowed: true,
                reason: *reason,
            },
            Decision::Denied(denial) => AccessVerdict {
                allowed: false,
                reason: denial.reason(),
            },
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// Ordered access pipeline, immutable once built.
pub struct AccessEngine {
    bypass: BypassEvaluator,
    checks: Vec<Box<dyn AccessCheck>>,
    /// Index of the first caller-supplied check in `checks`.
    first_custom: usize,
    sink: Arc<dyn EventSink>,
}

impl AccessEngine {
    pub fn builder(sink: Arc<dyn EventSink>) -> AccessEngineBuilder {
        AccessEngineBuilder {
            bypass: BypassEvaluator::default(),
            ip_filter: None,
            basic_auth: None,
            header_token: None,
            custom: Vec::new(),
            sink,
        }
    }

    /// Build the engine described by the `[access]` config section.
    pub fn from_config(config: &AccessConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::configure(config, sink).build()
    }

    /// Builder preloaded from config, to which custom checks can be added.
    pub fn configure(config: &AccessConfig, sink: Arc<dyn EventSink>) -> AccessEngineBuilder {
        let mut builder = Self::builder(sink.clone())
            .bypass(BypassEvaluator::from_patterns(&config.bypass, sink.as_ref()));

        if let Some(allow) = &config.valid_ips {
            let enable = enable_from_config(&config.ip_enable, sink.as_ref());
            builder = builder.ip_filter(
                IpFilterCheck::new(IpMatcher::new(allow, sink.as_ref()), enable, sink.clone())
                    .trust_proxy_headers(config.trust_proxy_headers),
            );
        }

        if let Some(users) = &config.users {
            let enable = enable_from_config(&config.auth_enable, sink.as_ref());
            builder = builder.basic_auth(
                BasicAuthCheck::new(
                    CredentialValidator::new(users.clone()),
                    config.realm.clone(),
                    enable,
                    sink.clone(),
                )
                .log_user(config.log_user),
            );
        }

        if let Some(token) = &config.header_token {
            let enable = enable_from_config(&token.enable, sink.as_ref());
            builder = builder.header_token(
                HeaderTokenCheck::new(TokenMatcher::Literal(token.token.clone()), sink.clone())
                    .header(token.header.clone())
                    .with_enable(enable),
            );
        }

        builder
    }

    /// True when no check is configured at all.
    pub fn is_public(&self) -> bool {
        self.checks.is_empty()
    }

    /// Names of the configured checks, in evaluation order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run the pipeline for one request.
    pub fn evaluate(&self, ctx: &RequestContext) -> Decision {
        if self.checks.is_empty() {
            return Decision::Allowed(Reason::Ok);
        }

        if self.bypass.is_bypassed(&ctx.path) {
            self.sink.emit(AccessEvent::Bypassed {
                path: ctx.path.clone(),
            });
            return Decision::Allowed(Reason::Bypassed);
        }

        for (index, check) in self.checks.iter().enumerate() {
            if !check.enable().is_enabled(ctx) {
                self.sink.emit(AccessEvent::CheckSkipped {
                    check: check.name(),
                    path: ctx.path.clone(),
                });
                continue;
            }

            if let CheckOutcome::Deny(denial) = check.check(ctx) {
                // Built-in checks report their own rejections.
                if index >= self.first_custom {
                    self.sink.emit(AccessEvent::CustomRejected {
                        check: check.name(),
                    });
                }
                return Decision::Denied(denial);
            }
        }

        Decision::Allowed(Reason::Ok)
    }
}

impl fmt::Debug for AccessEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEngine")
            .field("bypass", &self.bypass)
            .field("checks", &self.check_names())
            .finish()
    }
}

/// Assembles an [`AccessEngine`] with checks in their fixed order.
pub struct AccessEngineBuilder {
    bypass: BypassEvaluator,
    ip_filter: Option<IpFilterCheck>,
    basic_auth: Option<BasicAuthCheck>,
    header_token: Option<HeaderTokenCheck>,
    custom: Vec<Box<dyn AccessCheck>>,
    sink: Arc<dyn EventSink>,
}

impl AccessEngineBuilder {
    pub fn bypass(mut self, bypass: BypassEvaluator) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn ip_filter(mut self, check: IpFilterCheck) -> Self {
        self.ip_filter = Some(check);
        self
    }

    pub fn basic_auth(mut self, check: BasicAuthCheck) -> Self {
        self.basic_auth = Some(check);
        self
    }

    pub fn header_token(mut self, check: HeaderTokenCheck) -> Self {
        self.header_token = Some(check);
        self
    }

    /// Append a caller-supplied check. Custom checks run last, in the order added.
    pub fn custom(mut self, check: impl AccessCheck + 'static) -> Self {
        self.custom.push(Box::new(check));
        self
    }

    pub fn build(self) -> AccessEngine {
        let mut checks: Vec<Box<dyn AccessCheck>> = Vec::new();
        if let Some(c) = self.ip_filter {
            checks.push(Box::new(c));
        }
        if let Some(c) = self.basic_auth {
            checks.push(Box::new(c));
        }
        if let Some(c) = self.header_token {
            checks.push(Box::new(c));
        }
        let first_custom = checks.len();
        checks.extend(self.custom);

        if checks.is_empty() {
            self.sink.emit(AccessEvent::SitePublic);
        }
        for check in &checks {
            self.sink.emit(AccessEvent::CheckRegistered {
                check: check.name(),
                enable: check.enable().describe().to_string(),
            });
        }

        AccessEngine {
            bypass: self.bypass,
            checks,
            first_custom,
            sink: self.sink,
        }
    }
}

fn enable_from_config(config: &EnableConfig, sink: &dyn EventSink) -> Enable {
    match config {
        EnableConfig::Switch(on) => Enable::from(*on),
        EnableConfig::Paths { paths } => Enable::for_paths(PathRules::compile(paths, sink)),
    }
}
