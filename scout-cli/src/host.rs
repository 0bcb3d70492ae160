//! Wiring between the configuration and the scout library.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use scout::agent::{AgentEvent, OllamaAgent, ReasoningAgent, SharedAgent};
use scout::orchestrator::{Orchestrator, ProviderStatus};
use scout::registry::ToolDescriptor;
use tracing::{info, warn};

use crate::config::{IssueLevel, ScoutConfig, load_config_from, resolve_path};
use crate::error::{CliError, Result};

/// Loads the configuration at `explicit` (or the default path), merges
/// environment overrides and rejects it if validation finds errors.
pub async fn load(explicit: Option<PathBuf>) -> Result<(PathBuf, ScoutConfig)> {
    let path = resolve_path(explicit);
    let config = load_config_from(&path).await?.with_env();

    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.level == IssueLevel::Warning) {
        warn!("{issue}");
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.level == IssueLevel::Error)
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        return Err(CliError::invalid(errors.join("; ")));
    }

    Ok((path, config))
}

/// Builds an orchestrator whose Ollama agent is created on first use.
pub fn build_orchestrator(config: &ScoutConfig) -> Result<Orchestrator> {
    let ollama = config.ollama_config();
    info!(model = %ollama.model, base_url = %ollama.base_url, providers = config.providers.len(), "building orchestrator");

    let agent = SharedAgent::new(move || {
        let agent: Arc<dyn ReasoningAgent> = Arc::new(OllamaAgent::new(ollama.clone())?);
        Ok(agent)
    });

    let orchestrator = Orchestrator::builder(config.registry()?)
        .agent(Arc::new(agent))
        .policy(config.retry_policy())
        .system_prompt(config.agent.system_prompt.clone())
        .build()?;
    Ok(orchestrator)
}

/// One line per provider: name, endpoint, liveness and how to start it when down.
#[must_use]
pub fn render_probe(statuses: &[ProviderStatus]) -> String {
    let width = statuses
        .iter()
        .map(|s| s.provider.name.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for status in statuses {
        let provider = &status.provider;
        let _ = write!(
            out,
            "{:width$}  {}  {}",
            provider.name,
            provider.probe_url(),
            if status.reachable { "up" } else { "down" },
        );
        if !status.reachable {
            let _ = write!(out, "  (start: {})", provider.start_hint());
        }
        out.push('\n');
    }
    out
}

/// Tools grouped under their provider, in aggregation order.
#[must_use]
pub fn render_tools(tools: &[ToolDescriptor]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for tool in tools {
        if current != Some(tool.provider.as_str()) {
            let _ = writeln!(out, "{}:", tool.provider);
            current = Some(&tool.provider);
        }
        let description = tool.description.lines().next().unwrap_or_default();
        if description.is_empty() {
            let _ = writeln!(out, "  {}", tool.name);
        } else {
            let _ = writeln!(out, "  {} - {description}", tool.name);
        }
    }
    out
}

/// Progress line for an agent event.
#[must_use]
pub fn render_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::ToolCall(call) => format!("-> {}({})", call.tool_name, call.arguments),
        AgentEvent::ToolResult { tool_name, output } => {
            let first = output.lines().next().unwrap_or_default();
            format!("<- {tool_name}: {first}")
        }
        _ => String::new(),
    }
}
