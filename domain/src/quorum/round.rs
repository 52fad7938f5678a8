//! Round records: the durable shape of a settled consensus round.

use super::resolver::Resolution;
use crate::DomainError;
use crate::agent::error_kind::ErrorKind;
use crate::agent::outcome::{AgentOutcome, AgentStatus};
use crate::agent::task::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a consensus round (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    /// Creates a RoundId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random RoundId.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final verdict of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Quorum met
    Accepted,
    /// Some successes, but fewer than the rule requires
    Degraded,
    /// No successful output at all
    Failed,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Accepted, Verdict::Degraded, Verdict::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Degraded => "degraded",
            Verdict::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verdict::ALL
            .into_iter()
            .find(|verdict| verdict.as_str() == s)
            .ok_or_else(|| DomainError::UnknownValue {
                kind: "verdict",
                value: s.to_string(),
            })
    }
}

/// Settled round, as persisted in `consensus_rounds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub round_id: RoundId,
    pub milestone_id: String,
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
    pub verdict: Verdict,
    /// Absent when the verdict is `Failed`
    pub synthesized_content: Option<String>,
    pub quorum_met: bool,
    pub roster_size: usize,
    pub success_count: usize,
    pub required_successes: usize,
}

impl ConsensusRound {
    /// Build the round record from a resolution.
    pub fn settle(
        round_id: RoundId,
        milestone_id: impl Into<String>,
        stage: impl Into<String>,
        started_at: DateTime<Utc>,
        settled_at: DateTime<Utc>,
        roster_size: usize,
        resolution: Resolution,
    ) -> Self {
        Self {
            round_id,
            milestone_id: milestone_id.into(),
            stage: stage.into(),
            started_at,
            settled_at,
            verdict: resolution.verdict,
            synthesized_content: resolution.synthesized_content,
            quorum_met: resolution.quorum_met,
            roster_size,
            success_count: resolution.success_count,
            required_successes: resolution.required_successes,
        }
    }
}

/// One agent's row in `agent_output_records`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutputRecord {
    pub round_id: RoundId,
    pub agent_id: AgentId,
    /// Empty unless `final_status` is `Success`
    pub content: String,
    pub attempt_count: u32,
    pub final_status: AgentStatus,
    pub error_kind: Option<ErrorKind>,
    pub elapsed_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl AgentOutputRecord {
    pub fn from_outcome(round_id: &RoundId, outcome: &AgentOutcome, recorded_at: DateTime<Utc>) -> Self {
        Self {
            round_id: round_id.clone(),
            agent_id: outcome.agent_id.clone(),
            content: outcome.content().to_string(),
            attempt_count: outcome.attempt_count,
            final_status: outcome.status,
            error_kind: outcome.error_kind,
            elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            recorded_at,
        }
    }
}

/// A round together with all of its output records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRound {
    pub round: ConsensusRound,
    pub outputs: Vec<AgentOutputRecord>,
}

/// Selection criteria for listing rounds (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RoundFilter {
    pub milestone_id: Option<String>,
    pub stage: Option<String>,
    pub limit: Option<usize>,
}

impl RoundFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_milestone(mut self, milestone_id: impl Into<String>) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_round_ids_are_unique_uuids() {
        let a = RoundId::generate();
        let b = RoundId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_verdict_parse() {
        for verdict in Verdict::ALL {
            assert_eq!(verdict.as_str().parse::<Verdict>().ok(), Some(verdict));
        }
        assert!("passed".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_output_record_from_failure_has_empty_content() {
        let round_id = RoundId::new("r-1");
        let outcome = AgentOutcome::failure(
            AgentId::new("gemini"),
            ErrorKind::RateLimited,
            Duration::from_millis(1_500),
        )
        .with_attempts(3)
        .exhausted();

        let record = AgentOutputRecord::from_outcome(&round_id, &outcome, Utc::now());
        assert_eq!(record.content, "");
        assert_eq!(record.final_status, AgentStatus::PermanentFailure);
        assert_eq!(record.error_kind, Some(ErrorKind::RateLimited));
        assert_eq!(record.attempt_count, 3);
        assert_eq!(record.elapsed_ms, 1_500);
    }

    #[test]
    fn test_filter_builder() {
        let filter = RoundFilter::new().with_milestone("SPEC-1").with_limit(5);
        assert_eq!(filter.milestone_id.as_deref(), Some("SPEC-1"));
        assert_eq!(filter.stage, None);
        assert_eq!(filter.limit, Some(5));
    }
}
