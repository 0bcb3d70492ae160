//! Reasoning agents.
//!
//! A [`ReasoningAgent`] receives a system instruction, the active
//! [`ToolSet`] and the conversation, decides which tools to call, and returns
//! its transcript. [`OllamaAgent`] is the bundled implementation;
//! [`SharedAgent`] builds one lazily and shares it across runs.

mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OnceCell, mpsc};

use crate::error::Result;
use crate::message::{AgentMessage, Message, ToolCallRecord};
use crate::registry::ToolSet;

pub use ollama::{OllamaAgent, OllamaConfig};

/// Progress reported while an agent runs.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AgentEvent {
    /// The agent requested a tool.
    ToolCall(ToolCallRecord),
    /// A tool returned.
    ToolResult {
        /// Tool that produced the output.
        tool_name: String,
        /// Tool output (or the error text fed back to the agent).
        output: String,
    },
}

/// An agent that answers a conversation using the tools it is given.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Runs the agent to completion and returns its transcript.
    async fn invoke(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
    ) -> Result<Vec<AgentMessage>>;

    /// Like [`invoke`](Self::invoke), also reporting tool calls on `events`.
    ///
    /// The default reports the calls found in the finished transcript;
    /// implementations that can observe calls as they happen should override it.
    async fn invoke_with_events(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
        events: &mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<Vec<AgentMessage>> {
        let transcript = self.invoke(system_prompt, tools, messages).await?;
        for message in transcript.iter().cloned().map(AgentMessage::normalize) {
            for call in message.tool_calls.into_iter().flatten() {
                let _ = events.send(AgentEvent::ToolCall(call));
            }
        }
        Ok(transcript)
    }
}

type AgentInit = Box<dyn Fn() -> Result<Arc<dyn ReasoningAgent>> + Send + Sync>;

/// A lazily constructed agent shared by every run that uses it.
///
/// The construction function runs on first use; if it fails, the next use
/// tries again.
pub struct SharedAgent {
    cell: OnceCell<Arc<dyn ReasoningAgent>>,
    init: AgentInit,
}

impl std::fmt::Debug for SharedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAgent")
            .field("initialized", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

impl SharedAgent {
    /// Creates a shared agent from a construction function.
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ReasoningAgent>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    /// Wraps an already constructed agent.
    #[must_use]
    pub fn from_agent(agent: Arc<dyn ReasoningAgent>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(agent)),
            init: Box::new(|| {
                Err(crate::Error::agent(
                    "shared agent was created initialized and has no constructor",
                ))
            }),
        }
    }

    /// Returns the agent, constructing it on first use.
    pub async fn get(&self) -> Result<Arc<dyn ReasoningAgent>> {
        self.cell
            .get_or_try_init(|| async { (self.init)() })
            .await
            .cloned()
    }

    /// Whether the agent has been constructed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
