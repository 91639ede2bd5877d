//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::SiteConfig;

/// Config files probed in the working directory when none is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["site-serve.json", "site-serve.toml"];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0} (expected .toml or .json)")]
    UnknownFormat(PathBuf),
}

/// Load configuration from a TOML or JSON file, chosen by extension.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(ConfigError::UnknownFormat(path.to_path_buf())),
    }
}

/// Load the first default config file present in `dir`.
///
/// Returns `Ok(None)` when none exists.
pub fn discover_config(dir: &Path) -> Result<Option<(PathBuf, SiteConfig)>, ConfigError> {
    for name in DEFAULT_CONFIG_FILES {
        let path = dir.join(name);
        tracing::debug!(path = %path.display(), "Probing config file");
        if path.is_file() {
            let config = load_config(&path)?;
            return Ok(Some((path, config)));
        }
    }
    Ok(None)
}
