//! Model Context Protocol (MCP) client integration.
//!
//! [`McpConnector`] implements [`Connector`](crate::registry::Connector) on top
//! of the `rmcp` streamable-HTTP client, so a
//! [`ToolProviderRegistry`](crate::registry::ToolProviderRegistry) can open
//! real provider connections.
//!
//! ```rust,ignore
//! use scout::mcp::McpConnector;
//! use scout::registry::{ProviderConfig, ToolProviderRegistry};
//!
//! let registry = ToolProviderRegistry::new([
//!     ProviderConfig::stream("arxiv_mcp", "http://localhost:3000/mcp")?,
//! ])?;
//! let tools = registry.connect(&McpConnector::default()).await?;
//! println!("Tools: {:?}", tools.tool_names());
//! tools.close().await;
//! ```

mod client;
mod error;

pub use client::{McpClientConfig, McpConnection, McpConnector};
pub use error::McpError;
