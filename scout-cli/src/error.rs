//! Error types for the scout host.

use crate::config::ConfigError;

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors surfaced by the `scout` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Loading or saving configuration failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The configuration has error-level issues.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Building the orchestrator or talking to providers failed.
    #[error(transparent)]
    Scout(#[from] scout::Error),

    /// Terminal IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create an invalid-configuration error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
