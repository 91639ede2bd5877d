//! Security subsystem: the request-authorization pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → context.rs (RequestContext snapshot, client IP resolution)
//!     → access_control.rs (AccessEngine)
//!         → bypass.rs (path exempt from all checks?)
//!         → ip_filter.rs (allow-list, 403)
//!         → basic_auth.rs (credentials, 401 + challenge)
//!         → header_token.rs (token header, 401)
//!         → custom checks (caller supplied)
//!     → ALLOWED: pass to routing / DENIED: one response, stop
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unknown client never passes the IP check
//! - Malformed rules are reported and ignored, never fatal
//! - Rule sets are immutable after startup and shared without locks

pub mod access_control;
pub mod basic_auth;
pub mod bypass;
pub mod context;
pub mod enable;
pub mod header_token;
pub mod ip_filter;

pub use access_control::{
    AccessCheck, AccessEngine, AccessEngineBuilder, AccessVerdict, CheckOutcome, Decision,
    Denial, FnCheck, Reason, DENIAL_BODY,
};
pub use basic_auth::{BasicAuthCheck, CredentialValidator, DEFAULT_REALM};
pub use bypass::{BypassEvaluator, PathRule, PathRules};
pub use context::RequestContext;
pub use enable::Enable;
pub use header_token::{HeaderTokenCheck, TokenMatcher, DEFAULT_TOKEN_HEADER};
pub use ip_filter::{AllowRule, IpFilterCheck, IpMatcher};
