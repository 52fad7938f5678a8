//! Round configuration: how a settled round is judged and how failures retry.

use quorum_gate_domain::{DomainError, QuorumRule, RetryPolicy, SynthesisKind};

/// Static per-run configuration of the round orchestrator.
///
/// | Field | Used by |
/// |-------|---------|
/// | `rule` | Consensus Resolver |
/// | `retry` | agent retries and busy-commit retries |
/// | `synthesis` | Consensus Resolver |
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundConfig {
    pub rule: QuorumRule,
    pub retry: RetryPolicy,
    pub synthesis: SynthesisKind,
}

impl RoundConfig {
    pub fn new(rule: QuorumRule, retry: RetryPolicy, synthesis: SynthesisKind) -> Self {
        Self {
            rule,
            retry,
            synthesis,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_rule(mut self, rule: QuorumRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisKind) -> Self {
        self.synthesis = synthesis;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_majority_most_detailed() {
        let config = RoundConfig::default();
        assert_eq!(config.rule, QuorumRule::Majority);
        assert_eq!(config.synthesis, SynthesisKind::MostDetailed);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_delegates_to_retry_policy() {
        let config = RoundConfig::default().with_retry(RetryPolicy::default().with_max_attempts(0));
        assert!(matches!(config.validate(), Err(DomainError::InvalidRetryConfig(_))));
    }
}
