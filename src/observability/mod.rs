//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Access pipeline components
//!     → events.rs (typed AccessEvent through an injected EventSink)
//!     → TracingSink → logging.rs subscriber (stdout)
//!
//! HTTP layer
//!     → tower_http TraceLayer + x-request-id → logging.rs subscriber
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings
//! - Request ID flows through every request span
//! - Diagnostics are a port so tests can assert on them

pub mod events;
pub mod logging;

pub use events::{AccessEvent, EventLevel, EventSink, RecordingSink, TracingSink};
