//! Agent runner port
//!
//! Defines how the orchestrator executes one attempt of one agent task.

use async_trait::async_trait;
use quorum_gate_domain::{AgentId, AgentOutcome, AgentTask};
use tokio_util::sync::CancellationToken;

/// Receives stdout chunks while an agent is still running.
///
/// Partial output is observable this way even when the attempt later times
/// out or is cancelled.
pub trait OutputObserver: Send + Sync {
    fn on_chunk(&self, agent_id: &AgentId, chunk: &str);
}

/// Observer that discards every chunk.
pub struct NoOutputObserver;

impl OutputObserver for NoOutputObserver {
    fn on_chunk(&self, _agent_id: &AgentId, _chunk: &str) {}
}

/// Executes a single attempt of an agent task
///
/// Implementations (adapters) live in the infrastructure layer. A runner never
/// fails with an error: every failure mode (spawn error, non-zero exit,
/// timeout, cancellation) is normalized into the returned [`AgentOutcome`],
/// whose `attempt_count` is always 1. Retrying is the caller's decision.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        task: &AgentTask,
        cancel: &CancellationToken,
        observer: &dyn OutputObserver,
    ) -> AgentOutcome;
}
