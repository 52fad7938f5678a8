//! Agent identity, roster entries and per-round tasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Identifier of one configured agent (e.g. `"claude"`, `"gemini"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an AgentId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One roster entry: how to launch a given agent.
///
/// Resolved by the configuration collaborator. Credentials arrive already
/// valid through `env`; `required_env` names the variables that must be
/// non-empty for the agent to be launched at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent_id: AgentId,
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub env: BTreeMap<String, String>,
    pub required_env: Vec<String>,
}

impl AgentSpec {
    /// Default per-agent timeout (10 minutes).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(agent_id: impl Into<AgentId>, command: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            command: command.into(),
            args: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            env: BTreeMap::new(),
            required_env: Vec::new(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_required_env(mut self, name: impl Into<String>) -> Self {
        self.required_env.push(name.into());
        self
    }
}

/// One agent's assignment within a round.
///
/// Built by the round orchestrator from an [`AgentSpec`] at round start and
/// discarded at settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub agent_id: AgentId,
    pub milestone_id: String,
    pub stage: String,
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub env: BTreeMap<String, String>,
    pub required_env: Vec<String>,
    /// Prompt text piped to the agent's stdin, if any
    pub input: Option<String>,
}

impl AgentTask {
    pub fn from_spec(
        spec: &AgentSpec,
        milestone_id: impl Into<String>,
        stage: impl Into<String>,
        input: Option<String>,
    ) -> Self {
        Self {
            agent_id: spec.agent_id.clone(),
            milestone_id: milestone_id.into(),
            stage: stage.into(),
            command: spec.command.clone(),
            args: spec.args.clone(),
            timeout: spec.timeout,
            env: spec.env.clone(),
            required_env: spec.required_env.clone(),
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_display_and_conversions() {
        let id: AgentId = "claude".into();
        assert_eq!(id.as_str(), "claude");
        assert_eq!(id.to_string(), "claude");
        assert_eq!(AgentId::from(String::from("claude")), id);
    }

    #[test]
    fn test_agent_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AgentId::new("gemini")).unwrap();
        assert_eq!(json, "\"gemini\"");
    }

    #[test]
    fn test_spec_builder() {
        let spec = AgentSpec::new("claude", "claude")
            .with_args(["-p", "-"])
            .with_timeout(Duration::from_secs(30))
            .with_env("ANTHROPIC_API_KEY", "sk-test")
            .with_required_env("ANTHROPIC_API_KEY");

        assert_eq!(spec.args, vec!["-p".to_string(), "-".to_string()]);
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert_eq!(spec.env.get("ANTHROPIC_API_KEY").map(String::as_str), Some("sk-test"));
        assert_eq!(spec.required_env, vec!["ANTHROPIC_API_KEY".to_string()]);
    }

    #[test]
    fn test_task_from_spec_copies_launch_parameters() {
        let spec = AgentSpec::new("codex", "codex")
            .with_args(["exec"])
            .with_timeout(Duration::from_secs(5));
        let task = AgentTask::from_spec(&spec, "SPEC-42", "plan", Some("review this".into()));

        assert_eq!(task.agent_id, spec.agent_id);
        assert_eq!(task.milestone_id, "SPEC-42");
        assert_eq!(task.stage, "plan");
        assert_eq!(task.command, "codex");
        assert_eq!(task.args, vec!["exec".to_string()]);
        assert_eq!(task.timeout, Duration::from_secs(5));
        assert_eq!(task.input.as_deref(), Some("review this"));
    }
}
