//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a complete configuration
//! that points at the two local MCP servers.

use std::collections::BTreeMap;
use std::time::Duration;

use scout::agent::OllamaConfig;
use scout::orchestrator::{DEFAULT_SYSTEM_PROMPT, RetryPolicy};
use scout::registry::{ProviderConfig, ToolProviderRegistry, Transport};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoutConfig {
    /// Reasoning agent settings.
    #[serde(default)]
    pub agent: AgentSection,

    /// Retry budgets.
    #[serde(default)]
    pub retry: RetrySection,

    /// Tool providers by name, registered in name order.
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderEntry>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            retry: RetrySection::default(),
            providers: default_providers(),
        }
    }
}

fn default_providers() -> BTreeMap<String, ProviderEntry> {
    BTreeMap::from([
        (
            "arxiv_mcp".to_string(),
            ProviderEntry::stream("http://localhost:3000/mcp", "python arXiv_Server.py"),
        ),
        (
            "course_mcp".to_string(),
            ProviderEntry::stream("http://localhost:3001/mcp", "python Tavily_server.py"),
        ),
    ])
}

/// Reasoning agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSection {
    /// Ollama model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Ollama API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout towards Ollama.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Model turns per query.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// System instruction bound to every run.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// How long Ollama keeps the model loaded (e.g. "5m").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

fn default_model() -> String {
    OllamaConfig::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    OllamaConfig::DEFAULT_BASE_URL.to_string()
}

const fn default_request_timeout() -> u64 {
    OllamaConfig::DEFAULT_TIMEOUT_SECS
}

const fn default_max_iterations() -> usize {
    OllamaConfig::DEFAULT_MAX_ITERATIONS
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
            keep_alive: None,
        }
    }
}

/// Retry budgets, in attempts and whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySection {
    /// Liveness rounds before reporting providers unreachable.
    #[serde(default = "default_attempts")]
    pub probe_attempts: u32,
    /// Pause between liveness rounds.
    #[serde(default = "default_delay")]
    pub probe_delay_secs: u64,
    /// Timeout of one liveness check.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Connection attempts.
    #[serde(default = "default_attempts")]
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    #[serde(default = "default_delay")]
    pub connect_delay_secs: u64,
}

const fn default_attempts() -> u32 {
    3
}

const fn default_delay() -> u64 {
    2
}

const fn default_probe_timeout() -> u64 {
    5
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            probe_attempts: default_attempts(),
            probe_delay_secs: default_delay(),
            probe_timeout_secs: default_probe_timeout(),
            connect_attempts: default_attempts(),
            connect_delay_secs: default_delay(),
        }
    }
}

/// One tool provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// MCP endpoint.
    pub url: String,
    /// Wire transport.
    #[serde(default)]
    pub transport: Transport,
    /// Command an operator runs to start the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    /// Liveness URL, when it differs from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
}

impl ProviderEntry {
    /// A streamable-HTTP provider with a start command.
    #[must_use]
    pub fn stream(url: impl Into<String>, start_command: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: Transport::Stream,
            start_command: Some(start_command.into()),
            health_url: None,
        }
    }
}

impl ScoutConfig {
    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.agent.model.trim().is_empty() {
            issues.push(ConfigIssue::error("agent.model", "Model name is empty"));
        }
        if Url::parse(&self.agent.base_url).is_err() {
            issues.push(ConfigIssue::error(
                "agent.base_url",
                format!("'{}' is not a valid URL", self.agent.base_url),
            ));
        }
        if self.agent.max_iterations == 0 {
            issues.push(ConfigIssue::error(
                "agent.max_iterations",
                "Max iterations must be at least 1",
            ));
        }
        if self.agent.request_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                "agent.request_timeout_secs",
                "Request timeout is 0, model calls will time out immediately",
            ));
        }

        if self.retry.probe_attempts == 0 {
            issues.push(ConfigIssue::error(
                "retry.probe_attempts",
                "Probe attempts must be at least 1, otherwise every run reports unreachable",
            ));
        }
        if self.retry.connect_attempts == 0 {
            issues.push(ConfigIssue::warning(
                "retry.connect_attempts",
                "Connect attempts is 0, one attempt will be made",
            ));
        }

        if self.providers.is_empty() {
            issues.push(ConfigIssue::warning(
                "providers",
                "No tool providers configured, the agent will run without tools",
            ));
        }
        for (name, entry) in &self.providers {
            if Url::parse(&entry.url).is_err() {
                issues.push(ConfigIssue::error(
                    format!("providers.{name}.url"),
                    format!("'{}' is not a valid URL", entry.url),
                ));
            }
            if let Some(health) = &entry.health_url
                && Url::parse(health).is_err()
            {
                issues.push(ConfigIssue::error(
                    format!("providers.{name}.health_url"),
                    format!("'{health}' is not a valid URL"),
                ));
            }
        }

        issues
    }

    /// Check if the configuration is valid (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.level != IssueLevel::Error)
    }

    /// Merge environment variables into the configuration.
    ///
    /// `OLLAMA_BASE_URL`, `SCOUT_MODEL` and `OLLAMA_KEEP_ALIVE` override the
    /// agent section.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Merge overrides looked up through `var`.
    #[must_use]
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(OllamaConfig::BASE_URL_VAR) {
            self.agent.base_url = url;
        }
        if let Some(model) = var(OllamaConfig::MODEL_VAR) {
            self.agent.model = model;
        }
        if let Some(keep_alive) = var(OllamaConfig::KEEP_ALIVE_VAR) {
            self.agent.keep_alive = Some(keep_alive);
        }
        self
    }

    /// Builds the provider registry.
    ///
    /// # Errors
    ///
    /// Fails on a malformed provider URL.
    pub fn registry(&self) -> ConfigResult<ToolProviderRegistry> {
        let providers = self
            .providers
            .iter()
            .map(|(name, entry)| {
                let endpoint = parse_url(&format!("providers.{name}.url"), &entry.url)?;
                let mut provider = ProviderConfig::new(name.clone(), endpoint);
                provider.transport = entry.transport;
                if let Some(command) = &entry.start_command {
                    provider = provider.with_start_command(command.clone());
                }
                if let Some(health) = &entry.health_url {
                    provider = provider
                        .with_health_url(parse_url(&format!("providers.{name}.health_url"), health)?);
                }
                Ok(provider)
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        ToolProviderRegistry::new(providers).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Retry budgets for the orchestrator.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            probe_attempts: self.retry.probe_attempts,
            probe_delay: Duration::from_secs(self.retry.probe_delay_secs),
            probe_timeout: Duration::from_secs(self.retry.probe_timeout_secs),
            connect_attempts: self.retry.connect_attempts,
            connect_delay: Duration::from_secs(self.retry.connect_delay_secs),
        }
    }

    /// Settings for the Ollama agent.
    #[must_use]
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.agent.base_url.clone(),
            model: self.agent.model.clone(),
            timeout_secs: Some(self.agent.request_timeout_secs),
            keep_alive: self.agent.keep_alive.clone(),
            max_iterations: self.agent.max_iterations,
        }
    }
}

fn parse_url(path: &str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue(format!("{path}: '{value}' ({e})")))
}

/// Configuration validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Issue severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., "providers.arxiv_mcp.url").
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Create an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", prefix, self.path, self.message)
    }
}

/// Severity level for configuration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Error that prevents scout from running correctly.
    Error,
    /// Warning about potential issues.
    Warning,
}
