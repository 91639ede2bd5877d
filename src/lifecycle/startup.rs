//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the config file (explicit or discovered)
//! - Apply command-line and environment overrides
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides win in order: flag, then `PORT`, then file

use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use crate::config::{discover_config, load_config, ConfigError, SiteConfig};

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("public directory {0} does not exist")]
    ServeDir(PathBuf),
    #[error("invalid PORT value {0:?}")]
    Port(String),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Overrides collected from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub port: Option<u16>,
    /// Raw `PORT` environment value.
    pub env_port: Option<String>,
    pub route_prefix: Option<String>,
    pub verbose: bool,
    pub no_auth: bool,
}

/// Build the effective configuration.
///
/// Without `--config`, default config files in `cwd` are probed and a
/// missing file means defaults.
pub fn resolve_config(options: &StartupOptions, cwd: &Path) -> Result<SiteConfig, StartupError> {
    let mut config = match &options.config {
        Some(path) => load_config(path)?,
        None => match discover_config(cwd)? {
            Some((path, config)) => {
                tracing::debug!(path = %path.display(), "Using discovered config file");
                config
            }
            None => SiteConfig::default(),
        },
    };

    if let Some(dir) = &options.dir {
        if !dir.is_dir() {
            return Err(StartupError::ServeDir(dir.clone()));
        }
        config.serve.public = dir.clone();
    }

    let env_port = options
        .env_port
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| raw.trim().parse::<u16>().map_err(|_| StartupError::Port(raw.to_string())))
        .transpose()?;
    if let Some(port) = options.port.or(env_port) {
        config.listener.set_port(port);
    }

    if options.route_prefix.is_some() {
        config.serve.route_prefix = options.route_prefix.clone();
    }
    if options.verbose {
        config.logs.level = "debug".to_string();
    }
    if options.no_auth {
        config.access.users = None;
        config.access.valid_ips = None;
    }

    Ok(config)
}

/// Bind the configured listener address.
pub async fn bind(config: &SiteConfig) -> Result<TcpListener, StartupError> {
    let address = config.listener.bind_address.clone();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}
