//! Supervisor configuration from TOML (`[supervisor]` section)

use crate::process::SupervisorConfig;
use quorum_gate_domain::AgentSpec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw supervisor configuration
///
/// ```toml
/// [supervisor]
/// default_timeout_secs = 600  # agents without their own timeout
/// grace_period_secs = 5       # SIGTERM to SIGKILL window
/// max_output_bytes = 4194304
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSupervisorConfig {
    pub default_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for FileSupervisorConfig {
    fn default() -> Self {
        let supervisor = SupervisorConfig::default();
        Self {
            default_timeout_secs: AgentSpec::DEFAULT_TIMEOUT.as_secs(),
            grace_period_secs: supervisor.grace_period.as_secs(),
            max_output_bytes: supervisor.max_output_bytes,
        }
    }
}

impl FileSupervisorConfig {
    pub fn to_supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            grace_period: Duration::from_secs(self.grace_period_secs),
            max_output_bytes: self.max_output_bytes,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}
