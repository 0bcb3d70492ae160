use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, error_chain};
use crate::message::AgentResponse;
use crate::registry::ProviderConfig;

const UNREACHABLE_MARKERS: &[&str] = &[
    "connection refused",
    "connection failed",
    "connect error",
    "unreachable",
];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline has elapsed"];

/// Category of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One or more providers did not answer.
    Unreachable,
    /// Establishing connections or invoking the agent timed out.
    ConnectTimeout,
    /// Anything else.
    InvocationError,
}

impl FailureKind {
    /// Short label for display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::ConnectTimeout => "connect timeout",
            Self::InvocationError => "invocation error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayable description of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Failure category.
    pub kind: FailureKind,
    /// Text for a human operator.
    pub human_message: String,
}

impl FailureReport {
    /// Creates a report.
    #[must_use]
    pub fn new(kind: FailureKind, human_message: impl Into<String>) -> Self {
        Self {
            kind,
            human_message: human_message.into(),
        }
    }

    /// Report for providers that failed their liveness checks.
    ///
    /// Lists every endpoint together with the command that starts it.
    #[must_use]
    pub fn unreachable<'a>(providers: impl IntoIterator<Item = &'a ProviderConfig>) -> Self {
        let mut message = String::from("Tool providers are not reachable. Start them and retry:");
        push_provider_lines(&mut message, providers);
        Self::new(FailureKind::Unreachable, message)
    }

    /// Classifies an error raised while connecting or invoking.
    ///
    /// The kind comes from the error text alone. The remediation depends on
    /// where the error came from: model backend errors point at the model
    /// server, everything else lists `providers` when the error looks like a
    /// refused connection.
    #[must_use]
    pub fn classify(error: &Error, providers: &[ProviderConfig]) -> Self {
        let text = error_chain(error);
        let kind = classify_error_text(&text);
        let from_model = matches!(error, Error::Llm(_));
        let message = match (kind, from_model) {
            (FailureKind::Unreachable, true) => format!(
                "Could not reach the model backend: {text}\n\
                 Check that the model server is running and its base URL is correct."
            ),
            (FailureKind::Unreachable, false) => {
                let mut message = format!("Could not reach the tool providers: {text}");
                if !providers.is_empty() {
                    message.push_str("\nCheck that these are running:");
                    push_provider_lines(&mut message, providers);
                }
                message
            }
            (FailureKind::ConnectTimeout, true) => {
                format!("Timed out while waiting for the model backend: {text}")
            }
            (FailureKind::ConnectTimeout, false) => {
                format!("Timed out while talking to the tool providers: {text}")
            }
            (FailureKind::InvocationError, _) => format!("The agent failed to answer: {text}"),
        };
        Self::new(kind, message)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_message)
    }
}

fn push_provider_lines<'a>(message: &mut String, providers: impl IntoIterator<Item = &'a ProviderConfig>) {
    for provider in providers {
        message.push_str(&format!(
            "\n  - {} at {}: {}",
            provider.name,
            provider.endpoint,
            provider.start_hint()
        ));
    }
}

/// Maps raw error text to a failure category by case-insensitive substring.
///
/// Refused-connection markers win over timeout markers.
#[must_use]
pub fn classify_error_text(text: &str) -> FailureKind {
    let lower = text.to_lowercase();
    if UNREACHABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::Unreachable
    } else if TIMEOUT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::ConnectTimeout
    } else {
        FailureKind::InvocationError
    }
}

/// Result of one orchestrator run: always displayable.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The agent answered.
    Response(AgentResponse),
    /// The run failed.
    Failure(FailureReport),
}

impl Outcome {
    /// Text to show the user.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Response(response) => response.render(),
            Self::Failure(report) => report.human_message.clone(),
        }
    }

    /// The response, if the run succeeded.
    #[must_use]
    pub const fn response(&self) -> Option<&AgentResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Failure(_) => None,
        }
    }

    /// The failure report, if the run failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureReport> {
        match self {
            Self::Response(_) => None,
            Self::Failure(report) => Some(report),
        }
    }

    /// Whether the run failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl From<AgentResponse> for Outcome {
    fn from(response: AgentResponse) -> Self {
        Self::Response(response)
    }
}

impl From<FailureReport> for Outcome {
    fn from(report: FailureReport) -> Self {
        Self::Failure(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{LlmError, McpError, ToolError};
    use crate::testing::provider;

    #[test]
    fn refused_connection_is_unreachable() {
        assert_eq!(
            classify_error_text("tcp connect error: Connection refused (os error 111)"),
            FailureKind::Unreachable
        );
        assert_eq!(
            classify_error_text("CONNECTION REFUSED"),
            FailureKind::Unreachable
        );
    }

    #[test]
    fn timeout_markers_are_connect_timeout() {
        assert_eq!(
            classify_error_text("unhandled errors in a TaskGroup (1 sub-exception): Timeout"),
            FailureKind::ConnectTimeout
        );
        assert_eq!(
            classify_error_text("deadline has elapsed"),
            FailureKind::ConnectTimeout
        );
    }

    #[test]
    fn unreachable_wins_over_timeout() {
        assert_eq!(
            classify_error_text("timed out after connection refused"),
            FailureKind::Unreachable
        );
    }

    #[test]
    fn other_text_is_invocation_error() {
        assert_eq!(
            classify_error_text("model returned garbage"),
            FailureKind::InvocationError
        );
    }

    #[test]
    fn invocation_error_quotes_raw_text() {
        let err = Error::from(ToolError::execution("quota exceeded for key abc"));
        let report = FailureReport::classify(&err, &[]);
        assert_eq!(report.kind, FailureKind::InvocationError);
        assert!(report.human_message.contains("quota exceeded for key abc"));
    }

    #[test]
    fn classified_unreachable_lists_providers() {
        let providers = [provider("arxiv_mcp", 3000)];
        let err = Error::from(McpError::connection_failed(
            "arxiv_mcp",
            "http://localhost:3000/mcp",
            "Connection refused",
        ));
        let report = FailureReport::classify(&err, &providers);
        assert_eq!(report.kind, FailureKind::Unreachable);
        assert!(report.human_message.contains("http://localhost:3000/mcp"));
    }

    #[test]
    fn unreachable_model_backend_does_not_blame_providers() {
        let providers = [provider("arxiv_mcp", 3000)];
        let err = Error::from(LlmError::network(
            "Connection failed: error sending request for url (http://127.0.0.1:11434/api/chat)",
        ));
        let report = FailureReport::classify(&err, &providers);

        assert_eq!(report.kind, FailureKind::Unreachable);
        assert!(report.human_message.contains("model backend"));
        assert!(report.human_message.contains("/api/chat"));
        assert!(!report.human_message.contains("arxiv_mcp"));
        assert!(!report.human_message.contains("tool providers"));
    }

    #[test]
    fn llm_timeout_is_connect_timeout() {
        let err = Error::from(LlmError::network("Request timed out"));
        assert_eq!(
            FailureReport::classify(&err, &[]).kind,
            FailureKind::ConnectTimeout
        );
    }

    #[test]
    fn unreachable_report_names_url_and_start_command() {
        let arxiv = provider("arxiv_mcp", 3000).with_start_command("python arXiv_Server.py");
        let course = provider("course_mcp", 3001);
        let report = FailureReport::unreachable([&arxiv, &course]);

        assert_eq!(report.kind, FailureKind::Unreachable);
        assert!(report.human_message.contains("http://localhost:3000/mcp"));
        assert!(report.human_message.contains("python arXiv_Server.py"));
        assert!(report.human_message.contains("port 3001"));
    }

    #[test]
    fn outcome_renders_either_side() {
        let failure = Outcome::from(FailureReport::new(FailureKind::InvocationError, "boom"));
        assert!(failure.is_failure());
        assert_eq!(failure.render(), "boom");
        assert!(failure.response().is_none());

        let response = Outcome::from(AgentResponse::default());
        assert_eq!(response.render(), "No content found.");
        assert!(response.failure().is_none());
    }
}
