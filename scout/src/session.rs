//! Conversation state kept by a chat host.

use serde::{Deserialize, Serialize};

use crate::message::Role;
use crate::orchestrator::{Orchestrator, Outcome};

/// First assistant turn of a new session.
pub const DEFAULT_GREETING: &str = "Hi! I'm Arxiv Agent. Ask me anything.";

/// One displayed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was shown.
    pub text: String,
}

/// A chat transcript owned by the host.
///
/// Each [`submit`](Self::submit) runs the orchestrator on the new text only;
/// earlier turns are for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    turns: Vec<Turn>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::with_greeting(DEFAULT_GREETING)
    }
}

impl ChatSession {
    /// Creates a session seeded with the default greeting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session seeded with `greeting`.
    #[must_use]
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::Assistant,
                text: greeting.into(),
            }],
        }
    }

    /// All turns so far, greeting first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Records `text`, asks the orchestrator, and records the rendered reply.
    pub async fn submit(&mut self, orchestrator: &Orchestrator, text: &str) -> Outcome {
        self.push(Role::User, text);
        let outcome = orchestrator.run(text).await;
        self.push(Role::Assistant, outcome.render());
        outcome
    }

    /// Drops everything but a fresh greeting.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::agent::SharedAgent;
    use crate::registry::ToolProviderRegistry;
    use crate::testing::{FakeConnector, ScriptedAgent, ScriptedProbe, provider};
    use std::sync::Arc;

    fn orchestrator(probe: ScriptedProbe) -> Orchestrator {
        let arxiv = provider("arxiv_mcp", 3000);
        Orchestrator::builder(ToolProviderRegistry::new([arxiv]).unwrap())
            .probe(Arc::new(probe))
            .connector(Arc::new(FakeConnector::new().tools("arxiv_mcp", &["search_arxiv"])))
            .agent(Arc::new(SharedAgent::from_agent(Arc::new(
                ScriptedAgent::answer("5 results found"),
            ))))
            .build()
            .unwrap()
    }

    #[test]
    fn starts_with_greeting() {
        let session = ChatSession::new();
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.last().unwrap().role, Role::Assistant);
        assert_eq!(session.last().unwrap().text, DEFAULT_GREETING);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_appends_both_turns() {
        let orchestrator = orchestrator(ScriptedProbe::new().up(&provider("arxiv_mcp", 3000)));
        let mut session = ChatSession::new();

        let outcome = session.submit(&orchestrator, "papers on RAG").await;
        assert!(!outcome.is_failure());

        let turns = session.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].text, "papers on RAG");
        assert_eq!(turns[2].text, "5 results found");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shown_as_replies() {
        let orchestrator = orchestrator(ScriptedProbe::new());
        let mut session = ChatSession::new();

        let outcome = session.submit(&orchestrator, "q").await;
        assert!(outcome.is_failure());
        assert!(session.last().unwrap().text.contains("localhost:3000"));

        session.reset();
        assert_eq!(session.turns().len(), 1);
    }
}
