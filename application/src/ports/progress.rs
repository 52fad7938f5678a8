//! Progress notification port
//!
//! Defines the interface for reporting progress while a round runs.

use quorum_gate_domain::{AgentId, AgentOutcome, ConsensusRound, ErrorKind};
use std::time::Duration;

/// Callback for progress updates during a consensus round
///
/// Implementations live in the binary and can display progress in various
/// ways. Calls arrive from concurrent agent tasks, in no particular order
/// across agents.
pub trait RoundProgressNotifier: Send + Sync {
    /// Called once before any agent is spawned
    fn on_round_start(&self, milestone_id: &str, stage: &str, roster_size: usize);

    /// Called when an agent reaches its terminal outcome
    fn on_agent_complete(&self, outcome: &AgentOutcome);

    /// Called after the round is durably committed
    fn on_round_settled(&self, round: &ConsensusRound);

    // ==================== Attempt Callbacks ====================

    /// Called before each attempt of an agent
    fn on_attempt_start(&self, _agent_id: &AgentId, _attempt: u32) {}

    /// Called for each stdout chunk of a running agent
    fn on_agent_output(&self, _agent_id: &AgentId, _chunk: &str) {}

    /// Called when a retryable failure is about to be retried
    fn on_retry_scheduled(
        &self,
        _agent_id: &AgentId,
        _attempt: u32,
        _kind: ErrorKind,
        _delay: Duration,
    ) {
    }
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl RoundProgressNotifier for NoProgress {
    fn on_round_start(&self, _milestone_id: &str, _stage: &str, _roster_size: usize) {}
    fn on_agent_complete(&self, _outcome: &AgentOutcome) {}
    fn on_round_settled(&self, _round: &ConsensusRound) {}
}
