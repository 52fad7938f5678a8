//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Roster is empty")]
    EmptyRoster,

    #[error("Agent '{0}' appears more than once in the roster")]
    DuplicateAgent(String),

    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    #[error("Invalid quorum rule: {0}")]
    InvalidQuorumRule(String),

    #[error("Invalid retry configuration: {0}")]
    InvalidRetryConfig(String),

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
