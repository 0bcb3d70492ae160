//! Ollama-backed tool-calling agent.
//!
//! Runs a ReAct-style loop against `/api/chat`: every tool in the active
//! [`ToolSet`] is advertised as a function; requested calls are executed and
//! their results fed back until the model answers without calling a tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AgentEvent, ReasoningAgent};
use crate::error::{Error, LlmError, Result};
use crate::message::{AgentMessage, Message, Role, ToolCallRecord};
use crate::registry::{ToolDescriptor, ToolSet};

/// Configuration for the Ollama agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model to chat with.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// How long the model stays loaded (e.g. "5m").
    pub keep_alive: Option<String>,
    /// Maximum model turns per invocation.
    pub max_iterations: usize,
}

impl OllamaConfig {
    /// Default Ollama API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3.2:latest";
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
    /// Default iteration budget.
    pub const DEFAULT_MAX_ITERATIONS: usize = 8;
    /// Variable overriding the base URL.
    pub const BASE_URL_VAR: &'static str = "OLLAMA_BASE_URL";
    /// Variable overriding the model.
    pub const MODEL_VAR: &'static str = "SCOUT_MODEL";
    /// Variable setting the keep-alive duration.
    pub const KEEP_ALIVE_VAR: &'static str = "OLLAMA_KEEP_ALIVE";

    /// Creates configuration with a specific model.
    #[must_use]
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads `OLLAMA_BASE_URL`, `SCOUT_MODEL` and `OLLAMA_KEEP_ALIVE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_vars(|name| std::env::var(name).ok())
    }

    /// Applies the overrides `var` finds for the variables read by
    /// [`from_env`](Self::from_env).
    #[must_use]
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(Self::BASE_URL_VAR) {
            self.base_url = url;
        }
        if let Some(model) = var(Self::MODEL_VAR) {
            self.model = model;
        }
        if let Some(keep_alive) = var(Self::KEEP_ALIVE_VAR) {
            self.keep_alive = Some(keep_alive);
        }
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Sets the iteration budget.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            timeout_secs: Some(Self::DEFAULT_TIMEOUT_SECS),
            keep_alive: None,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [OllamaMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [OllamaTool],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }
}

impl From<&Message> for OllamaMessage {
    fn from(message: &Message) -> Self {
        let mut wire = Self::new(
            message.role.as_str(),
            message.content.clone().unwrap_or_default(),
        );
        wire.tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| OllamaToolCall {
                    function: OllamaFunctionCall {
                        name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect()
        });
        wire
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OllamaFunction,
}

impl From<&ToolDescriptor> for OllamaTool {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: OllamaFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

/// Tool-calling agent backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaAgent {
    config: Arc<OllamaConfig>,
    http_client: Client,
}

impl OllamaAgent {
    /// Create a new agent with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let http_client = builder
            .build()
            .map_err(|e| LlmError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// Create an agent from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn parse_error(status: u16, body: &str) -> LlmError {
        serde_json::from_str::<OllamaErrorResponse>(body).map_or_else(
            |_| LlmError::http_status(status, body),
            |parsed| LlmError::provider("ollama", parsed.error),
        )
    }

    async fn chat(
        &self,
        messages: &[OllamaMessage],
        tools: &[OllamaTool],
    ) -> Result<OllamaChatResponse> {
        let body = OllamaChatRequest {
            model: &self.config.model,
            messages,
            tools,
            stream: false,
            keep_alive: self.config.keep_alive.as_deref(),
        };

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &error_text).into());
        }

        let response_text = response.text().await.map_err(LlmError::from)?;
        let parsed = serde_json::from_str(&response_text).map_err(|e| {
            LlmError::response_format(
                "valid Ollama response",
                format!("parse error: {e}, response: {response_text}"),
            )
        })?;
        Ok(parsed)
    }

    async fn run_loop(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
        events: Option<&mpsc::UnboundedSender<AgentEvent>>,
    ) -> Result<Vec<AgentMessage>> {
        let definitions: Vec<OllamaTool> = tools.tools().iter().map(OllamaTool::from).collect();

        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            wire.push(OllamaMessage::new("system", system_prompt));
        }
        wire.extend(messages.iter().map(OllamaMessage::from));

        let mut transcript: Vec<AgentMessage> =
            messages.into_iter().map(AgentMessage::Structured).collect();

        for step in 1..=self.config.max_iterations {
            let reply = self.chat(&wire, &definitions).await?;
            let calls = reply.message.tool_calls.unwrap_or_default();
            debug!(
                step,
                model = %reply.model,
                done_reason = ?reply.done_reason,
                tool_calls = calls.len(),
                "ollama turn finished"
            );

            let records: Vec<ToolCallRecord> = calls
                .iter()
                .map(|call| {
                    ToolCallRecord::new(call.function.name.clone(), call.function.arguments.clone())
                })
                .collect();
            let content =
                (!reply.message.content.is_empty()).then(|| reply.message.content.clone());

            wire.push(OllamaMessage {
                tool_calls: (!calls.is_empty()).then(|| calls.clone()),
                ..OllamaMessage::new(Role::Assistant.as_str(), reply.message.content)
            });
            transcript.push(AgentMessage::Structured(Message::assistant_with_tools(
                content,
                records.clone(),
            )));

            if records.is_empty() {
                return Ok(transcript);
            }

            for record in records {
                if let Some(events) = events {
                    let _ = events.send(AgentEvent::ToolCall(record.clone()));
                }

                let output = match tools.call(&record.tool_name, record.arguments).await {
                    Ok(output) => output,
                    Err(Error::Tool(e)) => {
                        warn!(tool = %record.tool_name, error = %e, "tool failed, reporting back to model");
                        format!("Error: {e}")
                    }
                    Err(e) => return Err(e),
                };

                if let Some(events) = events {
                    let _ = events.send(AgentEvent::ToolResult {
                        tool_name: record.tool_name.clone(),
                        output: output.clone(),
                    });
                }

                wire.push(OllamaMessage {
                    tool_name: Some(record.tool_name),
                    ..OllamaMessage::new(Role::Tool.as_str(), output.clone())
                });
                transcript.push(AgentMessage::Structured(Message::tool(output)));
            }
        }

        Err(Error::max_iterations(self.config.max_iterations))
    }
}

#[async_trait]
impl ReasoningAgent for OllamaAgent {
    async fn invoke(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
    ) -> Result<Vec<AgentMessage>> {
        self.run_loop(system_prompt, tools, messages, None).await
    }

    async fn invoke_with_events(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
        events: &mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<Vec<AgentMessage>> {
        self.run_loop(system_prompt, tools, messages, Some(events))
            .await
    }
}
