//! Configuration issues and errors

use std::fmt;
use thiserror::Error;

/// How serious a configuration issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The affected stage or setting cannot be used
    Error,
    /// Suspicious but usable
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Machine-readable classification of a configuration issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A stage lists an agent with no `[agents.<id>]` entry
    UnknownAgent { stage: String, agent: String },
    /// A stage lists no agents
    EmptyRoster { stage: String },
    /// A stage lists the same agent twice
    DuplicateAgent { stage: String, agent: String },
    /// The quorum rule demands more successes than the stage has agents
    UnreachableQuorum {
        stage: String,
        roster_size: usize,
        required: usize,
    },
    /// `[quorum] rule` could not be parsed
    InvalidQuorumRule { value: String },
    /// `[retry]` values the backoff math cannot honor
    InvalidRetry,
    /// An agent has an empty `command`
    EmptyCommand { agent: String },
    /// A timeout, pool size or interval of zero
    ZeroValue { field: String },
    /// An agent defined but never used by any stage
    UnusedAgent { agent: String },
}

/// A single detected configuration issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Errors surfaced while loading or resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration:\n{}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    #[error("Stage '{0}' is not configured")]
    UnknownStage(String),

    #[error("Agent '{0}' is not configured")]
    UnknownAgent(String),

    #[error("No data directory available; set [store] path explicitly")]
    NoDataDir,
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
