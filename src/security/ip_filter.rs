//! IP allow-listing.
//!
//! # Responsibilities
//! - Compile allow rules (literal addresses and CIDR blocks) at startup
//! - Find the first rule containing a client address
//! - Deny with 403 when the client is unknown or not allowed
//!
//! # Design Decisions
//! - A rule containing `/` is a subnet rule, anything else is literal
//! - Malformed subnets are reported once and never match
//! - IPv4-mapped IPv6 addresses are compared as IPv4

use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::Arc;

use super::access_control::{AccessCheck, CheckOutcome, Denial, Reason};
use super::context::RequestContext;
use super::enable::Enable;
use crate::observability::{AccessEvent, EventSink};

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowRule {
    /// Literal address. `addr` is set when the rule parses as an address.
    Exact { raw: String, addr: Option<IpAddr> },
    /// CIDR block. `net` is `None` when the block failed to parse.
    Subnet { raw: String, net: Option<IpNet> },
}

impl AllowRule {
    /// Parse a configured rule. Returns the parse error alongside a malformed
    /// subnet so the caller can report it.
    pub fn parse(raw: &str) -> (Self, Option<String>) {
        let trimmed = raw.trim();
        if trimmed.contains('/') {
            match trimmed.parse::<IpNet>() {
                Ok(net) => (
                    AllowRule::Subnet {
                        raw: raw.to_string(),
                        net: Some(net),
                    },
                    None,
                ),
                Err(e) => (
                    AllowRule::Subnet {
                        raw: raw.to_string(),
                        net: None,
                    },
                    Some(e.to_string()),
                ),
            }
        } else {
            let addr = trimmed.parse::<IpAddr>().ok().map(|ip| ip.to_canonical());
            (
                AllowRule::Exact {
                    raw: raw.to_string(),
                    addr,
                },
                None,
            )
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            AllowRule::Exact { raw, .. } | AllowRule::Subnet { raw, .. } => raw,
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        match self {
            AllowRule::Exact { raw, addr } => {
                *addr == Some(ip) || raw.trim() == ip.to_string()
            }
            AllowRule::Subnet { net: Some(net), .. } => net.contains(&ip),
            AllowRule::Subnet { net: None, .. } => false,
        }
    }
}

/// Ordered allow-list.
#[derive(Debug, Clone, Default)]
pub struct IpMatcher {
    rules: Vec<AllowRule>,
}

impl IpMatcher {
    /// Compile `rules`, reporting malformed CIDR blocks to `sink`.
    pub fn new<S: AsRef<str>>(rules: &[S], sink: &dyn EventSink) -> Self {
        let rules = rules
            .iter()
            .map(|raw| {
                let (rule, error) = AllowRule::parse(raw.as_ref());
                if let Some(error) = error {
                    sink.emit(AccessEvent::MalformedRule {
                        kind: "cidr",
                        rule: raw.as_ref().to_string(),
                        error,
                    });
                }
                rule
            })
            .collect();
        Self { rules }
    }

    /// First rule, in configured order, that contains `ip`.
    pub fn matches(&self, ip: IpAddr) -> Option<&AllowRule> {
        self.rules.iter().find(|rule| rule.contains(ip))
    }

    pub fn rules(&self) -> &[AllowRule] {
        &self.rules
    }
}

/// Access check wrapping an [`IpMatcher`].
pub struct IpFilterCheck {
    matcher: IpMatcher,
    enable: Enable,
    trust_proxy_headers: bool,
    sink: Arc<dyn EventSink>,
}

impl IpFilterCheck {
    pub fn new(matcher: IpMatcher, enable: Enable, sink: Arc<dyn EventSink>) -> Self {
        Self {
            matcher,
            enable,
            trust_proxy_headers: true,
            sink,
        }
    }

    /// Resolve the client from forwarding headers (`true`) or the socket peer only.
    pub fn trust_proxy_headers(mut self, on: bool) -> Self {
        self.trust_proxy_headers = on;
        self
    }
}

impl AccessCheck for IpFilterCheck {
    fn name(&self) -> &'static str {
        "ip_filter"
    }

    fn enable(&self) -> &Enable {
        &self.enable
    }

    fn check(&self, ctx: &RequestContext) -> CheckOutcome {
        let user_agent = ctx.user_agent().map(str::to_string);

        let resolved = if self.trust_proxy_headers {
            ctx.client_ip()
        } else {
            ctx.peer_ip()
        };
        let Some(ip) = resolved else {
            self.sink.emit(AccessEvent::ClientIpUnresolved { user_agent });
            return CheckOutcome::Deny(Denial::forbidden(Reason::NoIp));
        };

        match self.matcher.matches(ip) {
            Some(rule) => {
                self.sink.emit(AccessEvent::IpAllowed {
                    ip,
                    rule: rule.raw().to_string(),
                });
                CheckOutcome::Pass
            }
            None => {
                self.sink.emit(AccessEvent::IpRejected { ip, user_agent });
                CheckOutcome::Deny(Denial::forbidden(Reason::IpDenied))
            }
        }
    }
}
