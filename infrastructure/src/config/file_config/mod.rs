//! Raw TOML configuration data types
//!
//! These structs mirror the config file one-to-one and convert into the
//! domain and adapter types the binary wires together.

mod agent;
mod quorum;
mod retry;
mod store;
mod supervisor;

pub use agent::FileAgentConfig;
pub use quorum::FileQuorumConfig;
pub use retry::FileRetryConfig;
pub use store::FileStoreConfig;
pub use supervisor::FileSupervisorConfig;

use super::validation::{ConfigError, ConfigIssue, ConfigIssueCode};
use quorum_gate_application::RoundConfig;
use quorum_gate_domain::AgentSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Complete file configuration (raw TOML structure)
///
/// ```toml
/// [quorum]
/// rule = "majority"
///
/// [agents.claude]
/// command = "claude"
/// args = ["--print"]
///
/// [agents.gemini]
/// command = "gemini"
///
/// [stages]
/// plan = ["claude", "gemini"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub retry: FileRetryConfig,
    pub quorum: FileQuorumConfig,
    pub supervisor: FileSupervisorConfig,
    pub store: FileStoreConfig,
    /// Agent definitions keyed by agent id
    pub agents: BTreeMap<String, FileAgentConfig>,
    /// Stage name to ordered roster of agent ids
    pub stages: BTreeMap<String, Vec<String>>,
}

impl FileConfig {
    /// Validate the entire configuration, returning every detected issue.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if let Err(e) = self.retry.to_policy().validate() {
            issues.push(ConfigIssue::error(ConfigIssueCode::InvalidRetry, format!("retry: {e}")));
        }

        let rule = match self.quorum.parse_rule() {
            Ok(rule) => Some(rule),
            Err(e) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidQuorumRule {
                        value: self.quorum.rule.clone(),
                    },
                    format!("quorum.rule: {e}"),
                ));
                None
            }
        };

        for (field, value) in [
            ("supervisor.default_timeout_secs", self.supervisor.default_timeout_secs),
            ("supervisor.max_output_bytes", self.supervisor.max_output_bytes as u64),
            ("store.pool_size", u64::from(self.store.pool_size)),
            ("store.maintenance_interval_hours", self.store.maintenance_interval_hours),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroValue {
                        field: field.to_string(),
                    },
                    format!("{field} cannot be 0"),
                ));
            }
        }

        for (agent_id, agent) in &self.agents {
            if agent.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyCommand {
                        agent: agent_id.clone(),
                    },
                    format!("agents.{agent_id}.command cannot be empty"),
                ));
            }
            if agent.timeout_secs == Some(0) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroValue {
                        field: format!("agents.{agent_id}.timeout_secs"),
                    },
                    format!("agents.{agent_id}.timeout_secs cannot be 0"),
                ));
            }
        }

        for (stage, roster) in &self.stages {
            issues.extend(self.validate_stage(stage, roster));
            if let Some(rule) = &rule
                && !roster.is_empty()
                && rule.check_reachable(roster.len()).is_err()
            {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnreachableQuorum {
                        stage: stage.clone(),
                        roster_size: roster.len(),
                        required: rule.required_successes(roster.len()),
                    },
                    format!(
                        "stage '{stage}': rule '{rule}' needs {} successes but only {} agents are listed",
                        rule.required_successes(roster.len()),
                        roster.len()
                    ),
                ));
            }
        }

        let used: BTreeSet<&String> = self.stages.values().flatten().collect();
        for agent_id in self.agents.keys().filter(|id| !used.contains(id)) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::UnusedAgent {
                    agent: agent_id.clone(),
                },
                format!("agent '{agent_id}' is not used by any stage"),
            ));
        }

        issues
    }

    fn validate_stage(&self, stage: &str, roster: &[String]) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if roster.is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyRoster {
                    stage: stage.to_string(),
                },
                format!("stage '{stage}' has no agents"),
            ));
        }

        let mut seen = BTreeSet::new();
        for agent_id in roster {
            if !self.agents.contains_key(agent_id) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownAgent {
                        stage: stage.to_string(),
                        agent: agent_id.clone(),
                    },
                    format!("stage '{stage}' lists unknown agent '{agent_id}'"),
                ));
            }
            if !seen.insert(agent_id) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateAgent {
                        stage: stage.to_string(),
                        agent: agent_id.clone(),
                    },
                    format!("stage '{stage}' lists agent '{agent_id}' more than once"),
                ));
            }
        }

        issues
    }

    /// Fail if any issue is an error; warnings are returned for logging.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigIssue>, ConfigError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            self.validate().into_iter().partition(ConfigIssue::is_error);
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Resolve a stage's roster into launchable agent specs, in roster order.
    pub fn roster_for(&self, stage: &str) -> Result<Vec<AgentSpec>, ConfigError> {
        let roster = self
            .stages
            .get(stage)
            .ok_or_else(|| ConfigError::UnknownStage(stage.to_string()))?;
        let default_timeout = self.supervisor.default_timeout();

        roster
            .iter()
            .map(|agent_id| {
                self.agents
                    .get(agent_id)
                    .map(|agent| agent.to_spec(agent_id, default_timeout))
                    .ok_or_else(|| ConfigError::UnknownAgent(agent_id.clone()))
            })
            .collect()
    }

    /// Orchestrator configuration from `[quorum]` and `[retry]`.
    pub fn round_config(&self) -> Result<RoundConfig, ConfigError> {
        let rule = self.quorum.parse_rule().map_err(|e| {
            ConfigError::Invalid(vec![ConfigIssue::error(
                ConfigIssueCode::InvalidQuorumRule {
                    value: self.quorum.rule.clone(),
                },
                format!("quorum.rule: {e}"),
            )])
        })?;
        Ok(RoundConfig::new(rule, self.retry.to_policy(), self.quorum.synthesis))
    }
}
