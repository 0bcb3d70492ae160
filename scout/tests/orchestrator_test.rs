//! Integration tests for the scout orchestrator.

#![allow(clippy::unwrap_used, clippy::panic, clippy::clone_on_ref_ptr)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, routing::get};
use scout::prelude::*;
use serde_json::{Value, json};

/// Serves `echo`, which returns its `message` argument.
#[derive(Debug, Default)]
struct EchoConnector {
    fail_with: Option<String>,
    closed: Arc<AtomicUsize>,
}

struct EchoConnection {
    tools: Vec<ToolSpec>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for EchoConnector {
    async fn connect(&self, provider: &ProviderConfig) -> Result<Box<dyn ProviderConnection>> {
        if let Some(message) = &self.fail_with {
            return Err(McpError::connection_failed(
                &provider.name,
                provider.endpoint.as_str(),
                message,
            )
            .into());
        }
        Ok(Box::new(EchoConnection {
            tools: vec![ToolSpec {
                name: "echo".to_string(),
                description: "Echoes back the input message.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            }],
            closed: self.closed.clone(),
        }))
    }
}

#[async_trait]
impl ProviderConnection for EchoConnection {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn call_tool(&self, _name: &str, arguments: Value) -> Result<String> {
        arguments["message"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ToolError::invalid_args("missing message").into())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Echoes the query through the `echo` tool and answers with the result.
#[derive(Debug)]
struct EchoAgent;

#[async_trait]
impl ReasoningAgent for EchoAgent {
    async fn invoke(
        &self,
        _system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
    ) -> Result<Vec<AgentMessage>> {
        let query = messages
            .last()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();
        let arguments = json!({"message": query});
        let output = tools.call("echo", arguments.clone()).await?;
        Ok(vec![
            Message::assistant_with_tools(None, vec![ToolCallRecord::new("echo", arguments)]).into(),
            Message::tool(output.clone()).into(),
            Message::assistant(format!("You said: {output}")).into(),
        ])
    }
}

/// Fails every invocation with a fixed message.
#[derive(Debug)]
struct FailingAgent(&'static str);

#[async_trait]
impl ReasoningAgent for FailingAgent {
    async fn invoke(
        &self,
        _system_prompt: &str,
        _tools: &ToolSet,
        _messages: Vec<Message>,
    ) -> Result<Vec<AgentMessage>> {
        Err(Error::agent(self.0))
    }
}

async fn live_endpoint() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/mcp", get(|| async { "ok" })))
            .await
            .unwrap();
    });
    addr
}

async fn dead_endpoint() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        probe_attempts: 2,
        probe_delay: Duration::from_millis(10),
        probe_timeout: Duration::from_secs(1),
        connect_attempts: 2,
        connect_delay: Duration::from_millis(10),
    }
}

fn orchestrator(
    addr: SocketAddr,
    connector: Arc<EchoConnector>,
    agent: Arc<dyn ReasoningAgent>,
) -> Orchestrator {
    let provider = ProviderConfig::stream("echo_mcp", &format!("http://{addr}/mcp"))
        .unwrap()
        .with_start_command("python echo_server.py");
    Orchestrator::builder(ToolProviderRegistry::new([provider]).unwrap())
        .connector(connector)
        .agent(Arc::new(SharedAgent::from_agent(agent)))
        .policy(fast_policy())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_end_to_end_with_http_probe() -> anyhow::Result<()> {
    let connector = Arc::new(EchoConnector::default());
    let orchestrator = orchestrator(live_endpoint().await, connector.clone(), Arc::new(EchoAgent));

    let outcome = orchestrator.run("hello").await;
    let response = outcome
        .response()
        .ok_or_else(|| anyhow::anyhow!("run failed: {}", outcome.render()))?;

    assert_eq!(response.tools_used(), ["echo"]);
    assert_eq!(outcome.render(), "You said: hello\n\nTools used: echo");
    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let addr = dead_endpoint().await;
    let connector = Arc::new(EchoConnector::default());
    let orchestrator = orchestrator(addr, connector.clone(), Arc::new(EchoAgent));

    let outcome = orchestrator.run("hello").await;
    let report = outcome.failure().unwrap();

    assert_eq!(report.kind, FailureKind::Unreachable);
    assert!(report.human_message.contains(&addr.to_string()));
    assert!(report.human_message.contains("python echo_server.py"));
    assert_eq!(connector.closed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_faults_always_become_reports() {
    let cases: [(Option<&str>, &'static str, FailureKind); 4] = [
        (Some("Connection refused"), "unused", FailureKind::Unreachable),
        (Some("Timeout"), "unused", FailureKind::ConnectTimeout),
        (Some("protocol mismatch"), "unused", FailureKind::InvocationError),
        (None, "rate limited by provider", FailureKind::InvocationError),
    ];

    let addr = live_endpoint().await;
    for (connect_error, agent_error, expected) in cases {
        let connector = Arc::new(EchoConnector {
            fail_with: connect_error.map(str::to_string),
            ..EchoConnector::default()
        });
        let orchestrator = orchestrator(addr, connector, Arc::new(FailingAgent(agent_error)));

        let outcome = orchestrator.run("hello").await;
        let report = outcome.failure().unwrap();
        assert_eq!(report.kind, expected, "{connect_error:?} / {agent_error}");
        if expected == FailureKind::InvocationError {
            let raw = connect_error.unwrap_or(agent_error);
            assert!(report.human_message.contains(raw));
        }
    }
}

#[test]
fn test_tool_usage_preserves_order() {
    let response = AgentResponse::from_agent_messages(vec![
        Message::assistant_with_tools(
            None,
            vec![
                ToolCallRecord::new("A", Value::Null),
                ToolCallRecord::new("B", Value::Null),
            ],
        )
        .into(),
        json!({"type": "ai", "content": "", "tool_calls": [{"name": "C", "args": {}}]}).into(),
        Message::assistant("final").into(),
    ]);

    assert_eq!(response.tools_used(), ["A", "B", "C"]);
    assert_eq!(response.render(), "final\n\nTools used: A, B, C");
}

#[test]
fn test_empty_transcript_uses_placeholder() {
    let response = AgentResponse::from_agent_messages(Vec::new());
    assert_eq!(response.content(), "No content found.");
    assert_eq!(response.render(), "No content found.");
}
