//! Error types for MCP provider connections.

/// Errors raised while talking to an MCP tool provider.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum McpError {
    /// The transport or handshake failed.
    #[error("failed to connect to '{provider}' at {url}: {message}")]
    ConnectionFailed {
        /// Provider name.
        provider: String,
        /// Endpoint URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// The handshake did not finish in time.
    #[error("connection to '{provider}' at {url} timed out after {secs}s")]
    ConnectTimeout {
        /// Provider name.
        provider: String,
        /// Endpoint URL.
        url: String,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// The provider refused to list its tools.
    #[error("failed to list tools of '{provider}': {message}")]
    ListToolsFailed {
        /// Provider name.
        provider: String,
        /// Underlying error text.
        message: String,
    },

    /// A tool call failed at the protocol level.
    #[error("call to tool '{tool}' failed: {message}")]
    CallToolFailed {
        /// Tool name.
        tool: String,
        /// Underlying error text.
        message: String,
    },

    /// The connection was already closed.
    #[error("connection to '{0}' is closed")]
    Closed(String),
}

impl McpError {
    /// Create a connection failure.
    #[must_use]
    pub fn connection_failed(
        provider: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            provider: provider.into(),
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_mentions_timed_out() {
        let err = McpError::ConnectTimeout {
            provider: "arxiv_mcp".into(),
            url: "http://localhost:3000/mcp".into(),
            secs: 10,
        };
        assert!(err.to_string().contains("timed out after 10s"));
    }

    #[test]
    fn closed_names_provider() {
        assert_eq!(
            McpError::Closed("course_mcp".into()).to_string(),
            "connection to 'course_mcp' is closed"
        );
    }
}
