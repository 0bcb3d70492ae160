//! In-memory doubles for probes, connectors and agents.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::agent::ReasoningAgent;
use crate::error::{Error, McpError, Result};
use crate::message::{AgentMessage, Message, ToolCallRecord};
use crate::probe::Probe;
use crate::registry::{Connector, ProviderConfig, ProviderConnection, ToolSet, ToolSpec};

/// A streamable-HTTP provider at `http://localhost:{port}/mcp`.
pub(crate) fn provider(name: &str, port: u16) -> ProviderConfig {
    ProviderConfig::stream(name, &format!("http://localhost:{port}/mcp")).unwrap()
}

/// Probe answering from a per-URL script. Unknown URLs are down.
///
/// A script's last answer repeats once the script is exhausted.
#[derive(Debug, Default)]
pub(crate) struct ScriptedProbe {
    scripts: Mutex<HashMap<String, VecDeque<bool>>>,
    calls: Mutex<Vec<Url>>,
    panics: bool,
}

impl ScriptedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn up(self, provider: &ProviderConfig) -> Self {
        self.sequence(provider, &[true])
    }

    pub(crate) fn down(self, provider: &ProviderConfig) -> Self {
        self.sequence(provider, &[false])
    }

    pub(crate) fn sequence(self, provider: &ProviderConfig, answers: &[bool]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(provider.probe_url().to_string(), answers.iter().copied().collect());
        self
    }

    pub(crate) fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, endpoint: &Url, _timeout: Duration) -> bool {
        assert!(!self.panics, "probe exploded");
        self.calls.lock().unwrap().push(endpoint.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(endpoint.as_str()) else {
            return false;
        };
        if script.len() > 1 {
            script.pop_front().unwrap_or(false)
        } else {
            script.front().copied().unwrap_or(false)
        }
    }
}

/// Connector serving canned tools per provider name.
///
/// Tool calls answer `"{provider}:{tool}"`.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    tools: HashMap<String, Vec<String>>,
    failures: HashMap<String, String>,
    fail_first: Option<(usize, String)>,
    attempts: AtomicUsize,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tools(mut self, provider: &str, names: &[&str]) -> Self {
        self.tools.insert(
            provider.to_owned(),
            names.iter().map(|n| (*n).to_owned()).collect(),
        );
        self
    }

    /// Every connection to `provider` fails with `message`.
    pub(crate) fn fail(mut self, provider: &str, message: &str) -> Self {
        self.failures.insert(provider.to_owned(), message.to_owned());
        self
    }

    /// The first `count` connect calls fail with `message`, whatever the provider.
    pub(crate) fn fail_first(mut self, count: usize, message: &str) -> Self {
        self.fail_first = Some((count, message.to_owned()));
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, provider: &ProviderConfig) -> Result<Box<dyn ProviderConnection>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let failure = match &self.fail_first {
            Some((count, message)) if attempt < *count => Some(message),
            _ => self.failures.get(&provider.name),
        };
        if let Some(message) = failure {
            return Err(McpError::connection_failed(
                &provider.name,
                provider.endpoint.as_str(),
                message,
            )
            .into());
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let tools = self
            .tools
            .get(&provider.name)
            .into_iter()
            .flatten()
            .map(|name| ToolSpec {
                name: name.clone(),
                description: format!("{name} from {}", provider.name),
                input_schema: json!({"type": "object"}),
            })
            .collect();
        Ok(Box::new(FakeConnection {
            provider: provider.name.clone(),
            tools,
            closed: self.closed.clone(),
            is_closed: false,
        }))
    }
}

struct FakeConnection {
    provider: String,
    tools: Vec<ToolSpec>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

#[async_trait]
impl ProviderConnection for FakeConnection {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<String> {
        Ok(format!("{}:{name}", self.provider))
    }

    async fn close(&mut self) {
        assert!(!self.is_closed, "connection '{}' closed twice", self.provider);
        self.is_closed = true;
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Script {
    Transcript(Vec<AgentMessage>),
    CallTools(Vec<String>, String),
    Fail(String),
    Panic,
}

/// Agent replaying a fixed behaviour and recording what it was given.
#[derive(Debug)]
pub(crate) struct ScriptedAgent {
    script: Script,
    invocations: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<String>, Vec<Message>)>>,
}

impl ScriptedAgent {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            invocations: AtomicUsize::new(0),
            seen: Mutex::default(),
        }
    }

    /// Answers with one assistant message.
    pub(crate) fn answer(content: &str) -> Self {
        Self::transcript(vec![Message::assistant(content).into()])
    }

    /// Answers with a fixed transcript.
    pub(crate) fn transcript(messages: Vec<AgentMessage>) -> Self {
        Self::with_script(Script::Transcript(messages))
    }

    /// Calls each tool in order through the tool set, then answers.
    pub(crate) fn calling(tools: &[&str], answer: &str) -> Self {
        Self::with_script(Script::CallTools(
            tools.iter().map(|t| (*t).to_owned()).collect(),
            answer.to_owned(),
        ))
    }

    /// Fails with an agent error carrying `message`.
    pub(crate) fn fail(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_owned()))
    }

    pub(crate) fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    pub(crate) fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// `(system prompt, tool names, messages)` per invocation.
    pub(crate) fn seen(&self) -> Vec<(String, Vec<String>, Vec<Message>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningAgent for ScriptedAgent {
    async fn invoke(
        &self,
        system_prompt: &str,
        tools: &ToolSet,
        messages: Vec<Message>,
    ) -> Result<Vec<AgentMessage>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            system_prompt.to_owned(),
            tools.tool_names().into_iter().map(str::to_owned).collect(),
            messages,
        ));

        match &self.script {
            Script::Transcript(messages) => Ok(messages.clone()),
            Script::Fail(message) => Err(Error::agent(message.clone())),
            Script::Panic => panic!("agent exploded"),
            Script::CallTools(names, answer) => {
                let calls: Vec<ToolCallRecord> = names
                    .iter()
                    .map(|name| ToolCallRecord::new(name.clone(), json!({})))
                    .collect();
                let mut transcript =
                    vec![Message::assistant_with_tools(None, calls.clone()).into()];
                for call in calls {
                    let output = tools.call(&call.tool_name, call.arguments).await?;
                    transcript.push(Message::tool(output).into());
                }
                transcript.push(Message::assistant(answer.clone()).into());
                Ok(transcript)
            }
        }
    }
}

