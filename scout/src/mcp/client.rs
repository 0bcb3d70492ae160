use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    RoleClient, ServiceExt,
    model::{
        CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
        RawContent, Tool,
    },
    service::RunningService,
    transport::StreamableHttpClientTransport,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::McpError;
use crate::error::{Result, ToolError, error_chain};
use crate::registry::{Connector, ProviderConfig, ProviderConnection, ToolSpec, Transport};

/// Configuration for MCP client identification and connection setup.
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Client name sent to server during handshake.
    pub name: String,
    /// Client version sent to server during handshake.
    pub version: String,
    /// Upper bound for handshake plus tool listing, per provider.
    pub connect_timeout: Duration,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            name: "scout".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl McpClientConfig {
    fn init_params(&self) -> InitializeRequestParams {
        InitializeRequestParams {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
        }
    }
}

/// Opens `rmcp` client connections to configured providers.
#[derive(Debug, Clone, Default)]
pub struct McpConnector {
    config: McpClientConfig,
}

impl McpConnector {
    /// Creates a connector with custom client configuration.
    #[must_use]
    pub const fn new(config: McpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for McpConnector {
    async fn connect(&self, provider: &ProviderConfig) -> Result<Box<dyn ProviderConnection>> {
        let connecting = match provider.transport {
            Transport::Stream => McpConnection::connect_http(provider, self.config.init_params()),
        };

        match tokio::time::timeout(self.config.connect_timeout, connecting).await {
            Ok(connection) => Ok(Box::new(connection?)),
            Err(_) => Err(McpError::ConnectTimeout {
                provider: provider.name.clone(),
                url: provider.endpoint.to_string(),
                secs: self.config.connect_timeout.as_secs(),
            }
            .into()),
        }
    }
}

/// A live MCP session with one provider.
pub struct McpConnection {
    provider: String,
    service: Option<RunningService<RoleClient, InitializeRequestParams>>,
    tools: Vec<ToolSpec>,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("provider", &self.provider)
            .field("open", &self.service.is_some())
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl McpConnection {
    async fn connect_http(
        provider: &ProviderConfig,
        init: InitializeRequestParams,
    ) -> std::result::Result<Self, McpError> {
        let url = provider.endpoint.as_str();
        let transport = StreamableHttpClientTransport::from_uri(url);

        let service = init.serve(transport).await.map_err(|e| {
            McpError::connection_failed(&provider.name, url, error_chain(&e))
        })?;

        let tools = service
            .peer()
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::ListToolsFailed {
                provider: provider.name.clone(),
                message: error_chain(&e),
            })?
            .tools
            .into_iter()
            .map(tool_spec)
            .collect();

        Ok(Self {
            provider: provider.name.clone(),
            service: Some(service),
            tools,
        })
    }
}

fn tool_spec(tool: Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_owned(),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

#[async_trait]
impl ProviderConnection for McpConnection {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| McpError::Closed(self.provider.clone()))?;

        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ToolError::invalid_args(format!(
                    "expected a JSON object for '{name}', got {other}"
                ))
                .into());
            }
        };

        let result = service
            .peer()
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| McpError::CallToolFailed {
                tool: name.to_owned(),
                message: error_chain(&e),
            })?;

        let text = result
            .content
            .iter()
            .filter_map(|content| match &content.raw {
                RawContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let output = match (text.is_empty(), result.structured_content) {
            (true, Some(structured)) => structured.to_string(),
            _ => text,
        };

        if result.is_error.unwrap_or(false) {
            return Err(ToolError::execution(output).into());
        }
        Ok(output)
    }

    async fn close(&mut self) {
        if let Some(service) = self.service.take() {
            match service.cancel().await {
                Ok(reason) => debug!(provider = %self.provider, ?reason, "MCP session closed"),
                Err(e) => warn!(provider = %self.provider, error = %e, "MCP session did not shut down cleanly"),
            }
        }
    }
}
