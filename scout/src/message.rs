//! Message types exchanged with the reasoning agent.
//!
//! Agents hand back their transcript as [`AgentMessage`]s, which are either
//! already-structured [`Message`]s or loose JSON mappings. [`AgentMessage::normalize`]
//! is the only place that turns either shape into the canonical [`Message`];
//! nothing downstream inspects raw shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder shown when the final message carries no content.
pub const NO_CONTENT: &str = "No content found.";

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant (model) message.
    Assistant,
    /// Tool result message.
    Tool,
}

impl Role {
    /// Get the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// Parse a role name, accepting the aliases agent frameworks commonly emit.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" | "model" => Some(Self::Assistant),
            "tool" | "function" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A tool invocation requested by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Arguments as sent to the tool.
    pub arguments: Value,
}

impl ToolCallRecord {
    /// Creates a new tool call record.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Canonical conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// Text content, absent for pure tool-call turns of some agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tools the agent asked for in this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message that requests tool calls.
    ///
    /// An empty call list is stored as `None`.
    #[must_use]
    pub fn assistant_with_tools(content: Option<String>, calls: Vec<ToolCallRecord>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: (!calls.is_empty()).then_some(calls),
        }
    }

    /// Create a tool result message.
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Names of the tools requested in this message, in order.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tool_calls
            .iter()
            .flatten()
            .map(|call| call.tool_name.as_str())
    }
}

/// A message as returned by an agent implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Already in canonical form.
    Structured(Message),
    /// A loose mapping (or bare string) from a dynamically-typed agent.
    Raw(Value),
}

impl From<Message> for AgentMessage {
    fn from(message: Message) -> Self {
        Self::Structured(message)
    }
}

impl From<Value> for AgentMessage {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl AgentMessage {
    /// Converts either shape into a canonical [`Message`].
    ///
    /// Raw mappings are read leniently: `role` (or `type`) defaults to
    /// assistant, `content` may be a string or a list of text parts, and
    /// `tool_calls` may be absent, a single call, or a list. Calls may use
    /// `{name, args}`, `{name, arguments}` or `{function: {name, arguments}}`;
    /// string-encoded JSON arguments are decoded. Entries without a name are
    /// skipped.
    #[must_use]
    pub fn normalize(self) -> Message {
        match self {
            Self::Structured(message) => message,
            Self::Raw(value) => normalize_raw(value),
        }
    }
}

fn normalize_raw(value: Value) -> Message {
    match value {
        Value::Object(map) => normalize_mapping(&map),
        Value::String(text) => Message::assistant(text),
        Value::Null => Message {
            role: Role::Assistant,
            content: None,
            tool_calls: None,
        },
        other => Message::assistant(other.to_string()),
    }
}

fn normalize_mapping(map: &Map<String, Value>) -> Message {
    let role = map
        .get("role")
        .or_else(|| map.get("type"))
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .unwrap_or(Role::Assistant);

    let content = map.get("content").and_then(content_text);

    let calls: Vec<ToolCallRecord> = match map.get("tool_calls") {
        Some(Value::Array(items)) => items.iter().filter_map(tool_call_record).collect(),
        Some(single @ Value::Object(_)) => tool_call_record(single).into_iter().collect(),
        _ => Vec::new(),
    };

    Message {
        role,
        content,
        tool_calls: (!calls.is_empty()).then_some(calls),
    }
}

fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect();
            (!texts.is_empty()).then(|| texts.join("\n"))
        }
        _ => None,
    }
}

fn tool_call_record(value: &Value) -> Option<ToolCallRecord> {
    let obj = value.as_object()?;
    let function = obj.get("function").and_then(Value::as_object);

    let name = obj
        .get("name")
        .or_else(|| obj.get("tool_name"))
        .or_else(|| function.and_then(|f| f.get("name")))
        .and_then(Value::as_str)?;

    let arguments = obj
        .get("args")
        .or_else(|| obj.get("arguments"))
        .or_else(|| function.and_then(|f| f.get("arguments")))
        .cloned()
        .unwrap_or(Value::Null);

    let arguments = match arguments {
        Value::String(encoded) => serde_json::from_str(&encoded).unwrap_or(Value::String(encoded)),
        other => other,
    };

    Some(ToolCallRecord::new(name, arguments))
}

/// Normalized result of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Transcript of the invocation, oldest first.
    pub messages: Vec<Message>,
}

impl AgentResponse {
    /// Normalizes an agent transcript.
    #[must_use]
    pub fn from_agent_messages(messages: Vec<AgentMessage>) -> Self {
        Self {
            messages: messages.into_iter().map(AgentMessage::normalize).collect(),
        }
    }

    /// Content of the last message regardless of its role, or [`NO_CONTENT`].
    #[must_use]
    pub fn content(&self) -> &str {
        self.messages
            .last()
            .and_then(|message| message.content.as_deref())
            .unwrap_or(NO_CONTENT)
    }

    /// Every tool name requested across the transcript, in order.
    ///
    /// Repeated calls to the same tool are kept.
    #[must_use]
    pub fn tools_used(&self) -> Vec<&str> {
        self.messages.iter().flat_map(Message::tool_names).collect()
    }

    /// Content followed by a tool usage line when any tool was called.
    #[must_use]
    pub fn render(&self) -> String {
        let tools = self.tools_used();
        if tools.is_empty() {
            self.content().to_owned()
        } else {
            format!("{}\n\nTools used: {}", self.content(), tools.join(", "))
        }
    }
}
