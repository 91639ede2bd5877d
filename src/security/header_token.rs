//! Header token check (`X-API-KEY` style).

use axum::{body::Body, http::Response};
use std::fmt;
use std::sync::Arc;

use super::access_control::{AccessCheck, CheckOutcome, Denial, Reason};
use super::context::RequestContext;
use super::enable::Enable;
use crate::observability::{AccessEvent, EventSink};

pub const DEFAULT_TOKEN_HEADER: &str = "X-API-KEY";

type TokenPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type InvalidHook = Arc<dyn Fn(&RequestContext) -> Option<Response<Body>> + Send + Sync>;

/// How a supplied token is accepted.
#[derive(Clone)]
pub enum TokenMatcher {
    Literal(String),
    Predicate(TokenPredicate),
}

impl TokenMatcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        TokenMatcher::Predicate(Arc::new(f))
    }

    pub fn accepts(&self, token: &str) -> bool {
        match self {
            TokenMatcher::Literal(expected) => expected == token,
            TokenMatcher::Predicate(f) => f(token),
        }
    }
}

impl fmt::Debug for TokenMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenMatcher::Literal(_) => write!(f, "Literal(<redacted>)"),
            TokenMatcher::Predicate(_) => write!(f, "Predicate(<fn>)"),
        }
    }
}

/// Access check comparing one request header against a token.
pub struct HeaderTokenCheck {
    header: String,
    matcher: TokenMatcher,
    on_invalid: Option<InvalidHook>,
    enable: Enable,
    sink: Arc<dyn EventSink>,
}

impl HeaderTokenCheck {
    pub fn new(matcher: TokenMatcher, sink: Arc<dyn EventSink>) -> Self {
        Self {
            header: DEFAULT_TOKEN_HEADER.to_string(),
            matcher,
            on_invalid: None,
            enable: Enable::Always,
            sink,
        }
    }

    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    pub fn with_enable(mut self, enable: Enable) -> Self {
        self.enable = enable;
        self
    }

    /// Hook run on rejection. A returned response replaces the default 401.
    pub fn on_invalid<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<Response<Body>> + Send + Sync + 'static,
    {
        self.on_invalid = Some(Arc::new(f));
        self
    }
}

impl AccessCheck for HeaderTokenCheck {
    fn name(&self) -> &'static str {
        "header_token"
    }

    fn enable(&self) -> &Enable {
        &self.enable
    }

    fn check(&self, ctx: &RequestContext) -> CheckOutcome {
        let valid = ctx
            .header(&self.header)
            .filter(|token| !token.is_empty())
            .is_some_and(|token| self.matcher.accepts(token));
        if valid {
            return CheckOutcome::Pass;
        }

        self.sink.emit(AccessEvent::TokenRejected {
            header: self.header.clone(),
        });

        let denial = match self.on_invalid.as_ref().and_then(|hook| hook(ctx)) {
            Some(response) => Denial::with_response(Reason::BadToken, response),
            None => Denial::unauthorized(Reason::BadToken),
        };
        CheckOutcome::Deny(denial)
    }
}
