//! Agent roster entries from TOML (`[agents.<id>]` tables)

use quorum_gate_domain::AgentSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How to launch one agent
///
/// ```toml
/// [agents.claude]
/// command = "claude"
/// args = ["--print", "--output-format", "text"]
/// timeout_secs = 900
/// required_env = ["ANTHROPIC_API_KEY"]
///
/// [agents.claude.env]
/// CLAUDE_CODE_MAX_OUTPUT_TOKENS = "32000"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Falls back to `[supervisor] default_timeout_secs`
    pub timeout_secs: Option<u64>,
    pub env: BTreeMap<String, String>,
    pub required_env: Vec<String>,
}

impl FileAgentConfig {
    pub fn to_spec(&self, agent_id: &str, default_timeout: Duration) -> AgentSpec {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default_timeout);

        let mut spec = AgentSpec::new(agent_id, self.command.clone())
            .with_args(self.args.iter().cloned())
            .with_timeout(timeout);
        spec.env = self.env.clone();
        spec.required_env = self.required_env.clone();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_table_deserialize() {
        let toml_str = r#"
[agents.gemini]
command = "gemini"
args = ["-p"]
required_env = ["GEMINI_API_KEY"]

[agents.gemini.env]
GEMINI_MODEL = "gemini-2.5-pro"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let agent = &config.agents["gemini"];
        assert_eq!(agent.command, "gemini");
        assert_eq!(agent.args, vec!["-p"]);
        assert_eq!(agent.timeout_secs, None);
        assert_eq!(agent.env["GEMINI_MODEL"], "gemini-2.5-pro");

        let spec = agent.to_spec("gemini", Duration::from_secs(42));
        assert_eq!(spec.agent_id.as_str(), "gemini");
        assert_eq!(spec.timeout, Duration::from_secs(42));
        assert_eq!(spec.required_env, vec!["GEMINI_API_KEY"]);
    }

    #[test]
    fn test_own_timeout_wins() {
        let agent = FileAgentConfig {
            command: "codex".into(),
            timeout_secs: Some(30),
            ..FileAgentConfig::default()
        };
        let spec = agent.to_spec("codex", Duration::from_secs(600));
        assert_eq!(spec.timeout, Duration::from_secs(30));
    }
}
