//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Derive the default filter from config and the `--verbose` flag
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over the configured level
//! - Human-readable `fmt` output; the access pipeline logs through `events.rs`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for the given level.
pub fn default_directive(level: &str) -> String {
    format!("site_serve={level},tower_http={level}")
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
