//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON) or defaults
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (serve dir, port, --no-auth)
//!     → SiteConfig (immutable)
//!     → AccessEngine / ProxyRouter compiled once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; restart to apply changes
//! - All fields have defaults to allow minimal configs
//! - Shape errors inside individual rules are reported by the subsystem
//!   that compiles them, not rejected here

pub mod loader;
pub mod schema;

pub use loader::{discover_config, load_config, ConfigError, DEFAULT_CONFIG_FILES};
pub use schema::{
    AccessConfig, Credential, EnableConfig, HeaderTokenConfig, ListenerConfig, LogsConfig,
    PathPattern, ProxyOptions, ProxyTargetConfig, ServeConfig, SiteConfig, TimeoutConfig,
};
