//! The agent orchestration loop.
//!
//! [`Orchestrator::run`] takes one user query through
//! `Idle → ProbingAvailability → Connecting → Invoking → Done` and always
//! produces an [`Outcome`]: either the agent's answer or a [`FailureReport`]
//! a person can act on. Errors and panics from probing, connecting or
//! invoking never escape.
//!
//! # Example
//!
//! ```rust,ignore
//! use scout::prelude::*;
//!
//! let registry = ToolProviderRegistry::new([
//!     ProviderConfig::stream("arxiv_mcp", "http://localhost:3000/mcp")?,
//! ])?;
//! let agent = SharedAgent::new(|| {
//!     let agent: Arc<dyn ReasoningAgent> = Arc::new(OllamaAgent::from_env()?);
//!     Ok(agent)
//! });
//! let orchestrator = Orchestrator::builder(registry).agent(Arc::new(agent)).build()?;
//!
//! println!("{}", orchestrator.run("recent papers on RAG").await.render());
//! ```

mod report;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use report::{FailureKind, FailureReport, Outcome, classify_error_text};

use crate::agent::{AgentEvent, SharedAgent};
use crate::error::{Error, Result};
use crate::mcp::McpConnector;
use crate::message::{AgentMessage, AgentResponse, Message};
use crate::probe::{AvailabilityProbe, DEFAULT_CHECK_TIMEOUT, HttpProbe, Probe};
use crate::registry::{Connector, ProviderConfig, ToolDescriptor, ToolProviderRegistry, ToolSet};

/// System instruction bound to the agent on every run.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant for Tool Calling.\n\n\
Before you help a user, you need to work with tools to interact with MCP tools";

/// Retry budgets for probing and connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Liveness rounds before giving up.
    pub probe_attempts: u32,
    /// Pause between liveness rounds.
    pub probe_delay: Duration,
    /// Timeout of a single liveness check.
    pub probe_timeout: Duration,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    pub connect_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            probe_attempts: 3,
            probe_delay: Duration::from_secs(2),
            probe_timeout: DEFAULT_CHECK_TIMEOUT,
            connect_attempts: 3,
            connect_delay: Duration::from_secs(2),
        }
    }
}

/// Phases of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Not started.
    Idle,
    /// Waiting for providers to answer liveness checks.
    ProbingAvailability,
    /// Opening provider connections.
    Connecting,
    /// The agent is working.
    Invoking,
    /// An outcome has been produced.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::ProbingAvailability => "probing",
            Self::Connecting => "connecting",
            Self::Invoking => "invoking",
            Self::Done => "done",
        })
    }
}

/// Liveness of one provider, as reported by [`Orchestrator::probe_providers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    /// The provider.
    pub provider: ProviderConfig,
    /// Whether it answered its liveness check.
    pub reachable: bool,
}

/// Drives one query from availability checks to a displayable outcome.
pub struct Orchestrator {
    registry: Arc<ToolProviderRegistry>,
    probe: AvailabilityProbe,
    connector: Arc<dyn Connector>,
    agent: Arc<SharedAgent>,
    policy: RetryPolicy,
    system_prompt: String,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("agent", &self.agent)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Starts building an orchestrator over `registry`.
    #[must_use]
    pub fn builder(registry: impl Into<Arc<ToolProviderRegistry>>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(registry.into())
    }

    /// The configured providers.
    #[must_use]
    pub fn registry(&self) -> &ToolProviderRegistry {
        &self.registry
    }

    /// The retry budgets.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The system instruction given to the agent.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answers `query`, or explains why it could not.
    pub async fn run(&self, query: &str) -> Outcome {
        self.run_guarded(query, None).await
    }

    /// Like [`run`](Self::run), forwarding agent progress on `events`.
    pub async fn run_with_events(
        &self,
        query: &str,
        events: &mpsc::UnboundedSender<AgentEvent>,
    ) -> Outcome {
        self.run_guarded(query, Some(events)).await
    }

    /// Checks every provider once.
    pub async fn probe_providers(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.registry.len());
        for provider in self.registry.providers() {
            statuses.push(ProviderStatus {
                provider: provider.clone(),
                reachable: self.probe.check(provider).await,
            });
        }
        statuses
    }

    /// Connects to every provider, lists their tools and disconnects.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let tools = self.connect_with_retry().await?;
        let descriptors = tools.tools().to_vec();
        tools.close().await;
        Ok(descriptors)
    }

    async fn run_guarded(
        &self,
        query: &str,
        events: Option<&mpsc::UnboundedSender<AgentEvent>>,
    ) -> Outcome {
        match AssertUnwindSafe(self.execute(query, events))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(panic = %message, "run panicked");
                FailureReport::new(
                    FailureKind::InvocationError,
                    format!("The agent failed to answer: {message}"),
                )
                .into()
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        events: Option<&mpsc::UnboundedSender<AgentEvent>>,
    ) -> Outcome {
        let providers = self.registry.providers();
        let mut state = RunState::Idle;

        advance(&mut state, RunState::ProbingAvailability);
        let available = self
            .probe
            .wait_for_all(
                providers,
                self.policy.probe_attempts,
                self.policy.probe_delay,
            )
            .await;
        if !available {
            let down = self.probe.unreachable(providers).await;
            let report = if down.is_empty() {
                FailureReport::unreachable(providers)
            } else {
                FailureReport::unreachable(down)
            };
            return finish(&mut state, report.into());
        }

        advance(&mut state, RunState::Connecting);
        let tools = match self.connect_with_retry().await {
            Ok(tools) => tools,
            Err(e) => return finish(&mut state, FailureReport::classify(&e, providers).into()),
        };

        advance(&mut state, RunState::Invoking);
        let result = AssertUnwindSafe(self.invoke(query, &tools, events))
            .catch_unwind()
            .await;
        tools.close().await;

        let outcome = match result {
            Ok(Ok(transcript)) => AgentResponse::from_agent_messages(transcript).into(),
            Ok(Err(e)) => FailureReport::classify(&e, providers).into(),
            Err(panic) => FailureReport::new(
                FailureKind::InvocationError,
                format!(
                    "The agent failed to answer: {}",
                    panic_message(panic.as_ref())
                ),
            )
            .into(),
        };
        finish(&mut state, outcome)
    }

    async fn connect_with_retry(&self) -> Result<ToolSet> {
        let attempts = self.policy.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.registry.connect(self.connector.as_ref()).await {
                Ok(tools) => return Ok(tools),
                Err(e) if attempt < attempts => {
                    warn!(attempt, attempts, error = %e, "connecting to providers failed, retrying");
                    tokio::time::sleep(self.policy.connect_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "connecting to providers failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    async fn invoke(
        &self,
        query: &str,
        tools: &ToolSet,
        events: Option<&mpsc::UnboundedSender<AgentEvent>>,
    ) -> Result<Vec<AgentMessage>> {
        let agent = self.agent.get().await?;
        let messages = vec![Message::user(query)];
        match events {
            Some(events) => {
                agent
                    .invoke_with_events(&self.system_prompt, tools, messages, events)
                    .await
            }
            None => agent.invoke(&self.system_prompt, tools, messages).await,
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    info!(from = %state, to = %next, "orchestrator transition");
    *state = next;
}

fn finish(state: &mut RunState, outcome: Outcome) -> Outcome {
    match &outcome {
        Outcome::Response(response) => {
            debug!(messages = response.messages.len(), "run answered");
        }
        Outcome::Failure(report) => {
            warn!(kind = %report.kind, at = %state, "run failed");
        }
    }
    advance(state, RunState::Done);
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with a non-string payload".to_owned())
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    registry: Arc<ToolProviderRegistry>,
    probe: Option<Arc<dyn Probe>>,
    connector: Option<Arc<dyn Connector>>,
    agent: Option<Arc<SharedAgent>>,
    policy: RetryPolicy,
    system_prompt: String,
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OrchestratorBuilder {
    fn new(registry: Arc<ToolProviderRegistry>) -> Self {
        Self {
            registry,
            probe: None,
            connector: None,
            agent: None,
            policy: RetryPolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Liveness probe. Defaults to [`HttpProbe`].
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Connection factory. Defaults to [`McpConnector`].
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// The reasoning agent. Required.
    #[must_use]
    pub fn agent(mut self, agent: Arc<SharedAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Retry budgets.
    #[must_use]
    pub const fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the system instruction.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Fails if no agent was given or the default HTTP probe cannot be created.
    pub fn build(self) -> Result<Orchestrator> {
        let agent = self
            .agent
            .ok_or_else(|| Error::agent("no reasoning agent configured"))?;
        let probe = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new()?),
        };
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(McpConnector::default()));

        Ok(Orchestrator {
            registry: self.registry,
            probe: AvailabilityProbe::new(probe, self.policy.probe_timeout),
            connector,
            agent,
            policy: self.policy,
            system_prompt: self.system_prompt,
        })
    }
}
