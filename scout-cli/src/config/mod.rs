//! Configuration management for scout.
//!
//! Provides a configuration system that loads settings from:
//! 1. Default values
//! 2. Config file (`~/.scout/config.toml`, or `--config` / `SCOUT_CONFIG`)
//! 3. Environment variables

mod schema;

pub use schema::{AgentSection, ConfigIssue, IssueLevel, ProviderEntry, RetrySection, ScoutConfig};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// Invalid value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scout")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// The explicit path if given, else the default one.
#[must_use]
pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(config_path)
}

/// Load configuration from a specific path, falling back to defaults.
///
/// Environment overrides are not applied; see [`ScoutConfig::with_env`].
pub async fn load_config_from(path: &Path) -> ConfigResult<ScoutConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(ScoutConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: ScoutConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), providers = config.providers.len(), "loaded config file");

    Ok(config)
}

/// Save configuration to a specific path.
pub async fn save_config_to(config: &ScoutConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = toml::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "saved config file");

    Ok(())
}

/// Writes the default configuration to `path`.
///
/// An existing file is kept unless `force` is set. Returns whether a file
/// was written.
pub async fn init_config_at(path: &Path, force: bool) -> ConfigResult<bool> {
    if path.exists() && !force {
        debug!(path = %path.display(), "config file exists, not overwriting");
        return Ok(false);
    }

    save_config_to(&ScoutConfig::default(), path).await?;
    Ok(true)
}
