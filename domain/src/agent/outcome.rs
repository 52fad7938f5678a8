//! Terminal result of running one agent task.

use super::error_kind::{ErrorClass, ErrorKind};
use super::task::AgentId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of an [`AgentOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Success,
    RetryableFailure,
    PermanentFailure,
    TimedOut,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 4] = [
        AgentStatus::Success,
        AgentStatus::RetryableFailure,
        AgentStatus::PermanentFailure,
        AgentStatus::TimedOut,
    ];

    pub fn is_success(self) -> bool {
        matches!(self, AgentStatus::Success)
    }

    /// Stable storage/display identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Success => "success",
            AgentStatus::RetryableFailure => "retryable_failure",
            AgentStatus::PermanentFailure => "permanent_failure",
            AgentStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = crate::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::DomainError::UnknownValue {
                kind: "agent status",
                value: s.to_string(),
            })
    }
}

/// Result of executing one agent task (last attempt only).
///
/// `output_text` is present iff `status` is [`AgentStatus::Success`], and
/// `error_kind` is present iff it is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub output_text: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub attempt_count: u32,
    pub elapsed: Duration,
    /// Process exit code, when the process exited on its own
    pub exit_code: Option<i32>,
    /// Operator-facing detail: stderr tail or partial output
    pub diagnostic: Option<String>,
}

impl AgentOutcome {
    /// A successful single attempt.
    pub fn success(agent_id: AgentId, output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            agent_id,
            status: AgentStatus::Success,
            output_text: Some(output.into()),
            error_kind: None,
            attempt_count: 1,
            elapsed,
            exit_code: Some(0),
            diagnostic: None,
        }
    }

    /// A failed single attempt; the status follows the kind's classification.
    ///
    /// [`ErrorKind::Timeout`] always yields [`AgentStatus::TimedOut`].
    pub fn failure(agent_id: AgentId, kind: ErrorKind, elapsed: Duration) -> Self {
        let status = match (kind, kind.classify()) {
            (ErrorKind::Timeout, _) => AgentStatus::TimedOut,
            (_, ErrorClass::Retryable) => AgentStatus::RetryableFailure,
            (_, ErrorClass::Permanent) => AgentStatus::PermanentFailure,
        };
        Self {
            agent_id,
            status,
            output_text: None,
            error_kind: Some(kind),
            attempt_count: 1,
            elapsed,
            exit_code: None,
            diagnostic: None,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_attempts(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        self.diagnostic = (!diagnostic.is_empty()).then_some(diagnostic);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Retries are exhausted: a retryable failure becomes permanent for this round.
    ///
    /// The original `error_kind` is kept for diagnostics.
    pub fn exhausted(mut self) -> Self {
        if self.status == AgentStatus::RetryableFailure {
            self.status = AgentStatus::PermanentFailure;
        }
        self
    }

    // ==================== Queries ====================

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_retryable(&self) -> bool {
        self.status == AgentStatus::RetryableFailure
    }

    /// Output text, or empty for failures.
    pub fn content(&self) -> &str {
        self.output_text.as_deref().unwrap_or("")
    }
}
