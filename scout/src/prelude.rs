//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use scout::prelude::*;
//! ```

pub use crate::agent::{AgentEvent, OllamaAgent, OllamaConfig, ReasoningAgent, SharedAgent};
pub use crate::error::{Error, LlmError, McpError, Result, ToolError};
pub use crate::mcp::{McpClientConfig, McpConnector};
pub use crate::message::{AgentMessage, AgentResponse, Message, Role, ToolCallRecord};
pub use crate::orchestrator::{
    FailureKind, FailureReport, Orchestrator, OrchestratorBuilder, Outcome, ProviderStatus,
    RetryPolicy,
};
pub use crate::probe::{AvailabilityProbe, HttpProbe, Probe};
pub use crate::registry::{
    Connector, ProviderConfig, ProviderConnection, ToolDescriptor, ToolProviderRegistry, ToolSet,
    ToolSpec, Transport,
};
pub use crate::session::{ChatSession, Turn};

pub use std::sync::Arc;
