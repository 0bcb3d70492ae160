//! Tool provider registry and the scoped [`ToolSet`] it produces.
//!
//! This module provides:
//! - [`ProviderConfig`] - where a provider lives and how to start it
//! - [`Connector`] / [`ProviderConnection`] - the seam to the MCP client
//! - [`ToolProviderRegistry`] - the configured providers, connected all at once
//! - [`ToolSet`] - the aggregated tools of one connection round

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result, ToolError};

/// Transport used to reach a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Streamable HTTP.
    #[default]
    Stream,
}

/// A configured tool provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Unique provider name.
    pub name: String,
    /// MCP endpoint.
    pub endpoint: Url,
    /// Transport spoken at the endpoint.
    pub transport: Transport,
    /// Liveness URL, when it differs from the endpoint.
    pub health_url: Option<Url>,
    /// Command an operator runs to start the provider.
    pub start_command: Option<String>,
}

impl ProviderConfig {
    /// Creates a streamable-HTTP provider.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
            transport: Transport::Stream,
            health_url: None,
            start_command: None,
        }
    }

    /// Creates a streamable-HTTP provider from a URL string.
    pub fn stream(name: impl Into<String>, url: &str) -> Result<Self> {
        let name = name.into();
        let endpoint = Url::parse(url)
            .map_err(|e| Error::registry(format!("invalid URL for provider '{name}': {e}")))?;
        Ok(Self::new(name, endpoint))
    }

    /// Sets the operator start command.
    #[must_use]
    pub fn with_start_command(mut self, command: impl Into<String>) -> Self {
        self.start_command = Some(command.into());
        self
    }

    /// Sets a dedicated liveness URL.
    #[must_use]
    pub fn with_health_url(mut self, url: Url) -> Self {
        self.health_url = Some(url);
        self
    }

    /// URL probed for liveness.
    #[must_use]
    pub fn probe_url(&self) -> &Url {
        self.health_url.as_ref().unwrap_or(&self.endpoint)
    }

    /// Remediation hint for an operator when the provider is down.
    #[must_use]
    pub fn start_hint(&self) -> String {
        match (&self.start_command, self.endpoint.port_or_known_default()) {
            (Some(command), _) => command.clone(),
            (None, Some(port)) => format!("start the '{}' MCP server on port {port}", self.name),
            (None, None) => format!("start the '{}' MCP server", self.name),
        }
    }
}

/// A tool as advertised by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the arguments.
    pub input_schema: Value,
}

/// A live connection to one provider.
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Tools advertised by the provider at connect time.
    fn tools(&self) -> &[ToolSpec];

    /// Invokes a tool and returns its textual result.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;

    /// Releases the connection. Called at most once by [`ToolSet`].
    async fn close(&mut self);
}

/// Opens connections to providers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `provider` and lists its tools.
    async fn connect(&self, provider: &ProviderConfig) -> Result<Box<dyn ProviderConnection>>;
}

/// A tool exposed through an active [`ToolSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the arguments.
    pub input_schema: Value,
    /// Name of the provider serving the tool.
    pub provider: String,
    handle: usize,
}

/// The tools of every provider, bound to their live connections.
///
/// Call [`ToolSet::close`] when done; dropping an unclosed set drops the
/// connections, which tears them down as well.
#[derive(Default)]
pub struct ToolSet {
    connections: Vec<(String, Box<dyn ProviderConnection>)>,
    tools: Vec<ToolDescriptor>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field(
                "providers",
                &self.connections.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("tools", &self.tool_names())
            .finish()
    }
}

impl ToolSet {
    /// Adds a connection, merging its tools into the set.
    ///
    /// A tool whose name is already present replaces the earlier entry in place.
    fn attach(&mut self, provider: &str, connection: Box<dyn ProviderConnection>) {
        let handle = self.connections.len();
        for offered in connection.tools() {
            let descriptor = ToolDescriptor {
                name: offered.name.clone(),
                description: offered.description.clone(),
                input_schema: offered.input_schema.clone(),
                provider: provider.to_owned(),
                handle,
            };
            if let Some(existing) = self.tools.iter_mut().find(|t| t.name == offered.name) {
                debug!(tool = %offered.name, from = %existing.provider, to = %provider, "tool name collision, later provider wins");
                *existing = descriptor;
            } else {
                self.tools.push(descriptor);
            }
        }
        self.connections.push((provider.to_owned(), connection));
    }

    /// All tools, in aggregation order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Tool names, in aggregation order.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Looks a tool up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the set has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of live provider connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Calls a tool on the provider that serves it.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        let descriptor = self.get(name).ok_or_else(|| ToolError::not_found(name))?;
        let (provider, connection) = &self.connections[descriptor.handle];
        debug!(tool = %name, provider = %provider, %arguments, "calling tool");
        connection.call_tool(name, arguments).await
    }

    /// Releases every connection exactly once.
    pub async fn close(mut self) {
        self.close_all().await;
    }

    async fn close_all(&mut self) {
        self.tools.clear();
        for (provider, mut connection) in self.connections.drain(..) {
            connection.close().await;
            debug!(provider = %provider, "closed provider connection");
        }
    }
}

/// The configured tool providers.
///
/// Immutable once built; names are unique.
#[derive(Debug, Clone, Default)]
pub struct ToolProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ToolProviderRegistry {
    /// Builds a registry, rejecting duplicate provider names.
    pub fn new(providers: impl IntoIterator<Item = ProviderConfig>) -> Result<Self> {
        let mut registry = Self::default();
        for provider in providers {
            if registry.get(&provider.name).is_some() {
                return Err(Error::registry(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            registry.providers.push(provider);
        }
        Ok(registry)
    }

    /// All providers.
    #[must_use]
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Looks a provider up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Connects to every provider and aggregates their tools.
    ///
    /// If any provider fails, the connections opened so far are closed before
    /// the error is returned.
    pub async fn connect(&self, connector: &dyn Connector) -> Result<ToolSet> {
        let mut set = ToolSet::default();
        for provider in &self.providers {
            match connector.connect(provider).await {
                Ok(connection) => {
                    debug!(
                        provider = %provider.name,
                        tools = connection.tools().len(),
                        "connected to provider"
                    );
                    set.attach(&provider.name, connection);
                }
                Err(e) => {
                    warn!(provider = %provider.name, endpoint = %provider.endpoint, error = %e, "provider connection failed");
                    set.close_all().await;
                    return Err(e);
                }
            }
        }
        info!(
            providers = set.connection_count(),
            tools = set.len(),
            "tool providers connected"
        );
        Ok(set)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, provider};
    use serde_json::json;

    #[test]
    fn stream_rejects_invalid_url() {
        let err = ProviderConfig::stream("bad", "not a url").unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn start_hint_prefers_command() {
        let p = provider("arxiv_mcp", 3000).with_start_command("python arXiv_Server.py");
        assert_eq!(p.start_hint(), "python arXiv_Server.py");
    }

    #[test]
    fn start_hint_names_port() {
        let p = provider("course_mcp", 3001);
        assert_eq!(
            p.start_hint(),
            "start the 'course_mcp' MCP server on port 3001"
        );
    }

    #[test]
    fn probe_url_defaults_to_endpoint() {
        let p = provider("a", 3000);
        assert_eq!(p.probe_url(), &p.endpoint);

        let health = Url::parse("http://localhost:3000/health").unwrap();
        let p = p.with_health_url(health.clone());
        assert_eq!(p.probe_url(), &health);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = ToolProviderRegistry::new([provider("a", 1), provider("a", 2)]).unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[tokio::test]
    async fn connect_aggregates_in_registration_order() {
        let registry =
            ToolProviderRegistry::new([provider("arxiv", 3000), provider("course", 3001)])
                .unwrap();
        let connector = FakeConnector::new()
            .tools("arxiv", &["search_arxiv", "download_arxiv_paper"])
            .tools("course", &["search_course"]);

        let set = registry.connect(&connector).await.unwrap();
        assert_eq!(
            set.tool_names(),
            ["search_arxiv", "download_arxiv_paper", "search_course"]
        );
        assert_eq!(set.connection_count(), 2);
        set.close().await;
        assert_eq!(connector.closed(), 2);
    }

    #[tokio::test]
    async fn later_provider_wins_name_collision() {
        let registry = ToolProviderRegistry::new([provider("a", 1), provider("b", 2)]).unwrap();
        let connector = FakeConnector::new()
            .tools("a", &["search", "only_a"])
            .tools("b", &["search"]);

        let set = registry.connect(&connector).await.unwrap();
        assert_eq!(set.tool_names(), ["search", "only_a"]);
        assert_eq!(set.get("search").unwrap().provider, "b");

        let output = set.call("search", json!({"q": 1})).await.unwrap();
        assert_eq!(output, "b:search");
        set.close().await;
    }

    #[tokio::test]
    async fn failure_closes_already_opened_connections_once() {
        let registry =
            ToolProviderRegistry::new([provider("a", 1), provider("b", 2), provider("c", 3)])
                .unwrap();
        let connector = FakeConnector::new()
            .tools("a", &["x"])
            .tools("b", &["y"])
            .fail("c", "Connection refused");

        let err = registry.connect(&connector).await.unwrap_err();
        assert!(err.to_string().contains("Connection refused"));
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.closed(), 2);
    }

    #[tokio::test]
    async fn call_unknown_tool_is_not_found() {
        let registry = ToolProviderRegistry::new([provider("a", 1)]).unwrap();
        let connector = FakeConnector::new().tools("a", &["x"]);
        let set = registry.connect(&connector).await.unwrap();

        let err = set.call("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotFound(ref n)) if n == "nope"));
        set.close().await;
    }

    #[tokio::test]
    async fn empty_registry_connects_to_nothing() {
        let registry = ToolProviderRegistry::default();
        let set = registry.connect(&FakeConnector::new()).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.connection_count(), 0);
    }
}
