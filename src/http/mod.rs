//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → middleware/access_control.rs (AccessEngine verdict or denial)
//!     → dispatch.rs
//!         → proxy.rs (first matching prefix rule → upstream)
//!         → static_files.rs (public directory)
//!         → 404 Not Found
//! ```

pub mod dispatch;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod server;
pub mod static_files;

pub use dispatch::NOT_FOUND_BODY;
pub use proxy::ProxyTransport;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, HttpServerBuilder};
pub use static_files::{ServeDirResponder, StaticResponder};
