//! Diagnostic events emitted by the access pipeline.
//!
//! # Responsibilities
//! - Define the closed set of diagnostics the pipeline can produce
//! - Route them to `tracing` in production (`TracingSink`)
//! - Capture them for assertions in tests (`RecordingSink`)
//!
//! # Design Decisions
//! - Components receive an `Arc<dyn EventSink>` instead of logging directly
//! - Emitting an event never changes a decision

use std::net::IpAddr;
use std::sync::Mutex;

/// Severity attached to an event when it is forwarded to `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
}

/// A diagnostic produced while building or running the access pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessEvent {
    /// No access check is configured; logged once when the engine is built.
    SitePublic,
    /// A check was registered, with a description of when it applies.
    CheckRegistered { check: &'static str, enable: String },
    /// A configured rule could not be compiled and will never match.
    MalformedRule { kind: &'static str, rule: String, error: String },
    /// The request path matched a bypass rule.
    Bypassed { path: String },
    /// A check's enable predicate turned it off for this request.
    CheckSkipped { check: &'static str, path: String },
    /// No client address could be discovered.
    ClientIpUnresolved { user_agent: Option<String> },
    /// The client address matched an allow rule.
    IpAllowed { ip: IpAddr, rule: String },
    /// The client address matched no allow rule.
    IpRejected { ip: IpAddr, user_agent: Option<String> },
    /// Basic credentials were missing or did not match.
    CredentialsRejected { path: String },
    /// Basic credentials matched a configured user.
    UserAuthenticated { username: String },
    /// The token header was missing or did not match.
    TokenRejected { header: String },
    /// A caller-supplied check denied the request.
    CustomRejected { check: &'static str },
    /// A proxy prefix was bound to an upstream.
    ProxyRegistered { prefix: String, target: String },
}

impl AccessEvent {
    /// Level used when the event is forwarded to `tracing`.
    pub fn level(&self) -> EventLevel {
        match self {
            AccessEvent::SitePublic
            | AccessEvent::MalformedRule { .. }
            | AccessEvent::CheckSkipped { .. }
            | AccessEvent::ClientIpUnresolved { .. }
            | AccessEvent::IpRejected { .. }
            | AccessEvent::CredentialsRejected { .. }
            | AccessEvent::TokenRejected { .. }
            | AccessEvent::CustomRejected { .. } => EventLevel::Warn,
            AccessEvent::CheckRegistered { .. }
            | AccessEvent::UserAuthenticated { .. }
            | AccessEvent::ProxyRegistered { .. } => EventLevel::Info,
            AccessEvent::Bypassed { .. } | AccessEvent::IpAllowed { .. } => EventLevel::Debug,
        }
    }

    /// Log line for the event.
    pub fn message(&self) -> &'static str {
        match self {
            AccessEvent::SitePublic => "No access checks configured, site is public",
            AccessEvent::CheckRegistered { .. } => "Access check registered",
            AccessEvent::MalformedRule { .. } => "Ignoring malformed rule",
            AccessEvent::Bypassed { .. } => "Access checks bypassed",
            AccessEvent::CheckSkipped { .. } => "Access check skipped for route",
            AccessEvent::ClientIpUnresolved { .. } => "Unable to detect client IP address",
            AccessEvent::IpAllowed { .. } => "Valid IP",
            AccessEvent::IpRejected { .. } => "Invalid access from IP",
            AccessEvent::CredentialsRejected { .. } => "Invalid access, credentials rejected",
            AccessEvent::UserAuthenticated { .. } => "User authenticated",
            AccessEvent::TokenRejected { .. } => "Invalid access, token rejected",
            AccessEvent::CustomRejected { .. } => "Invalid access, custom check rejected",
            AccessEvent::ProxyRegistered { .. } => "Proxy rule registered",
        }
    }
}

/// Port through which pipeline components report diagnostics.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AccessEvent);
}

/// Forwards events to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: AccessEvent) {
        let message = event.message();
        match event.level() {
            EventLevel::Debug => tracing::debug!(event = ?event, "{message}"),
            EventLevel::Info => tracing::info!(event = ?event, "{message}"),
            EventLevel::Warn => tracing::warn!(event = ?event, "{message}"),
        }
    }
}

/// Keeps every emitted event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AccessEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far, in emission order.
    pub fn events(&self) -> Vec<AccessEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded events satisfying `pred`.
    pub fn count(&self, pred: impl Fn(&AccessEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AccessEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
