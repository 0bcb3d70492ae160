//! Scout - agent orchestration over MCP tool providers
//!
//! This crate connects a tool-calling reasoning agent to one or more remote
//! MCP tool providers and wraps every query in availability checks, bounded
//! connection retries and failure classification, so a chat host always gets
//! something it can display.

pub mod agent;
pub mod error;
pub mod mcp;
pub mod message;
pub mod orchestrator;
pub mod prelude;
pub mod probe;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

pub use error::{Error, LlmError, Result, ToolError};
