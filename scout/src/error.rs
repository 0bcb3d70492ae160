//! Unified error types for scout.
//!
//! This module provides the error hierarchy used inside the library:
//! - MCP connection and tool-call errors ([`McpError`])
//! - LLM backend errors ([`LlmError`])
//! - Tool lookup and execution errors ([`ToolError`])
//!
//! None of these escape [`Orchestrator::run`](crate::orchestrator::Orchestrator::run);
//! they are converted into a [`FailureReport`](crate::orchestrator::FailureReport)
//! at that boundary.

pub use crate::mcp::McpError;

/// Result type alias for scout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for scout.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// MCP provider connection or protocol error.
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool lookup or execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Agent runtime error.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The agent kept requesting tools without producing an answer.
    #[error("Maximum iterations ({max_iterations}) reached without final answer")]
    MaxIterations {
        /// The configured iteration budget.
        max_iterations: usize,
    },

    /// Invalid provider registry.
    #[error("Registry error: {0}")]
    Registry(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an agent error with a message.
    #[must_use]
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a registry error with a message.
    #[must_use]
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a max iterations error.
    #[must_use]
    pub const fn max_iterations(max_iterations: usize) -> Self {
        Self::MaxIterations { max_iterations }
    }
}

/// Error type for LLM backend operations.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// Network or connection error.
    #[error("{0}")]
    Network(String),

    /// HTTP status error.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response format error.
    #[error("Expected {expected}, got {got}")]
    ResponseFormat {
        /// Expected format description.
        expected: String,
        /// Actual format received.
        got: String,
    },

    /// Provider-specific error.
    #[error("[{provider}] {message}")]
    Provider {
        /// Provider name.
        provider: String,
        /// Error description.
        message: String,
    },

    /// Internal error.
    #[error("{0}")]
    Internal(String),
}

impl LlmError {
    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ResponseFormat {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {}", error_chain(&err)))
        } else {
            Self::network(error_chain(&err))
        }
    }
}

/// Renders an error followed by each of its sources, separated by `": "`.
///
/// Sources whose text is already part of the rendering are skipped.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Error type for tool lookup and execution failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// No tool with this name in the active tool set.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool ran and reported an error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid arguments provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }
}
