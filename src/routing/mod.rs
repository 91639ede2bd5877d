//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Allowed request (path)
//!     → router.rs (proxy rule lookup, configured order)
//!     → matcher.rs (path prefix test)
//!     → Return: matched ProxyRule or None (static site)
//!
//! Route Compilation (at startup):
//!     [proxies] table (insertion order)
//!     → expand URL shorthand, compile path rewrites
//!     → Freeze as immutable ProxyRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - First match wins, in configured order: list specific prefixes
//!   (`/api`) before general ones (`/`)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{ProxyRouter, ProxyRule, ProxyTarget};
