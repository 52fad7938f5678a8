//! Run Round use case
//!
//! Orchestrates one consensus round for a milestone/stage pair:
//!
//! 1. Spawn one task per roster entry (all concurrently, one `JoinSet`)
//! 2. Retry retryable failures with jittered backoff, per agent
//! 3. Resolve the settled outcomes with the quorum rule
//! 4. Commit the round and every output record atomically

use crate::config::RoundConfig;
use crate::ports::agent_runner::{AgentRunner, OutputObserver};
use crate::ports::consensus_store::{ConsensusRepository, StoreError};
use crate::ports::progress::{NoProgress, RoundProgressNotifier};
use chrono::Utc;
use quorum_gate_domain::{
    AgentId, AgentOutcome, AgentOutputRecord, AgentSpec, AgentTask, ConsensusRound, ErrorKind,
    RetryPolicy, RoundId, Verdict, resolve,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that can occur while running a round
#[derive(Error, Debug)]
pub enum RunRoundError {
    #[error("Roster is empty")]
    EmptyRoster,

    #[error("Agent '{0}' appears more than once in the roster")]
    DuplicateAgent(AgentId),

    #[error("Failed to persist round: {0}")]
    Persist(#[source] StoreError),
}

/// Input for the RunRound use case
#[derive(Debug, Clone)]
pub struct RunRoundInput {
    pub milestone_id: String,
    pub stage: String,
    /// Ordered roster; outcome order follows it
    pub roster: Vec<AgentSpec>,
    /// Prompt text piped to every agent's stdin
    pub input: Option<String>,
}

impl RunRoundInput {
    pub fn new(
        milestone_id: impl Into<String>,
        stage: impl Into<String>,
        roster: Vec<AgentSpec>,
    ) -> Self {
        Self {
            milestone_id: milestone_id.into(),
            stage: stage.into(),
            roster,
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// A settled and committed round
#[derive(Debug, Clone)]
pub struct RoundResult {
    pub round: ConsensusRound,
    /// Final outcome per agent, in roster order
    pub outcomes: Vec<AgentOutcome>,
    /// External cancellation fired while the round was running
    pub cancelled: bool,
}

impl RoundResult {
    pub fn verdict(&self) -> Verdict {
        self.round.verdict
    }

    pub fn round_id(&self) -> &RoundId {
        &self.round.round_id
    }
}

/// Use case for running one consensus round
pub struct RunRoundUseCase<A: AgentRunner + 'static, R: ConsensusRepository + 'static> {
    runner: Arc<A>,
    repository: Arc<R>,
    config: RoundConfig,
    cancellation_token: Option<CancellationToken>,
    progress: Arc<dyn RoundProgressNotifier>,
}

impl<A: AgentRunner + 'static, R: ConsensusRepository + 'static> RunRoundUseCase<A, R> {
    pub fn new(runner: Arc<A>, repository: Arc<R>, config: RoundConfig) -> Self {
        Self {
            runner,
            repository,
            config,
            cancellation_token: None,
            progress: Arc::new(NoProgress),
        }
    }

    /// Set a cancellation token; firing it terminates every running agent
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Set a progress notifier
    pub fn with_progress(mut self, progress: Arc<dyn RoundProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Run a round without stdin input
    pub async fn run_round(
        &self,
        milestone_id: impl Into<String>,
        stage: impl Into<String>,
        roster: Vec<AgentSpec>,
    ) -> Result<RoundResult, RunRoundError> {
        self.execute(RunRoundInput::new(milestone_id, stage, roster))
            .await
    }

    /// Execute the use case
    pub async fn execute(&self, input: RunRoundInput) -> Result<RoundResult, RunRoundError> {
        check_roster(&input.roster)?;

        let cancel = self.cancellation_token.clone().unwrap_or_default();
        let roster_size = input.roster.len();
        let started_at = Utc::now();

        info!(
            "Starting round for {}/{} with {} agents",
            input.milestone_id, input.stage, roster_size
        );
        self.progress
            .on_round_start(&input.milestone_id, &input.stage, roster_size);

        let outcomes = self.run_agents(&input, &cancel).await;
        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(
                "Round for {}/{} was cancelled; committing partial outcomes",
                input.milestone_id, input.stage
            );
        }

        let resolution = resolve(&outcomes, self.config.rule, self.config.synthesis.strategy());
        let round = ConsensusRound::settle(
            RoundId::generate(),
            input.milestone_id,
            input.stage,
            started_at,
            Utc::now(),
            roster_size,
            resolution,
        );
        let records: Vec<AgentOutputRecord> = outcomes
            .iter()
            .map(|outcome| AgentOutputRecord::from_outcome(&round.round_id, outcome, round.settled_at))
            .collect();

        self.commit_with_retry(&round, &records)
            .await
            .map_err(RunRoundError::Persist)?;

        info!(
            "Round {} settled: {} ({}/{} successes, {} required)",
            round.round_id,
            round.verdict,
            round.success_count,
            round.roster_size,
            round.required_successes
        );
        self.progress.on_round_settled(&round);

        Ok(RoundResult {
            round,
            outcomes,
            cancelled,
        })
    }

    /// Run every roster entry concurrently; outcomes come back in roster order.
    async fn run_agents(
        &self,
        input: &RunRoundInput,
        cancel: &CancellationToken,
    ) -> Vec<AgentOutcome> {
        let mut join_set = JoinSet::new();
        let mut task_slots = HashMap::new();

        for (index, spec) in input.roster.iter().enumerate() {
            let task = AgentTask::from_spec(
                spec,
                &input.milestone_id,
                &input.stage,
                input.input.clone(),
            );
            let runner = Arc::clone(&self.runner);
            let policy = self.config.retry.clone();
            let cancel = cancel.clone();
            let progress = Arc::clone(&self.progress);

            let handle = join_set.spawn(async move {
                let outcome =
                    run_with_retry(runner.as_ref(), &task, &policy, &cancel, progress.as_ref())
                        .await;
                (index, outcome)
            });
            task_slots.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<AgentOutcome>> = vec![None; input.roster.len()];

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((index, outcome)) => {
                    if outcome.is_success() {
                        info!(
                            "Agent {} succeeded after {} attempt(s)",
                            outcome.agent_id, outcome.attempt_count
                        );
                    } else {
                        warn!(
                            "Agent {} finished as {} ({}) after {} attempt(s)",
                            outcome.agent_id,
                            outcome.status,
                            outcome.error_kind.map_or("none", |k| k.as_str()),
                            outcome.attempt_count
                        );
                    }
                    self.progress.on_agent_complete(&outcome);
                    slots[index] = Some(outcome);
                }
                Err(e) => {
                    let Some(&index) = task_slots.get(&e.id()) else {
                        error!("Join error from an unknown agent task: {}", e);
                        continue;
                    };
                    let agent_id = input.roster[index].agent_id.clone();
                    let outcome = if e.is_panic() {
                        error!("Agent {} task panicked: {}", agent_id, e);
                        AgentOutcome::failure(agent_id, ErrorKind::Unknown, Duration::ZERO)
                            .exhausted()
                            .with_diagnostic("agent task panicked")
                    } else {
                        warn!("Agent {} task was aborted: {}", agent_id, e);
                        AgentOutcome::failure(agent_id, ErrorKind::Cancelled, Duration::ZERO)
                            .with_diagnostic("agent task was aborted")
                    };
                    self.progress.on_agent_complete(&outcome);
                    slots[index] = Some(outcome);
                }
            }
        }

        // Every spawned task reports once, so each slot is filled by now
        slots
            .into_iter()
            .zip(&input.roster)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    AgentOutcome::failure(spec.agent_id.clone(), ErrorKind::Unknown, Duration::ZERO)
                        .exhausted()
                        .with_diagnostic("agent task produced no outcome")
                })
            })
            .collect()
    }

    /// Commit the round, retrying busy storage under the round's retry policy.
    async fn commit_with_retry(
        &self,
        round: &ConsensusRound,
        records: &[AgentOutputRecord],
    ) -> Result<RoundId, StoreError> {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.repository.commit_round(round, records).await {
                Ok(round_id) => {
                    debug!("Committed round {} on attempt {}", round_id, attempt);
                    return Ok(round_id);
                }
                Err(e) if e.is_retryable() && policy.should_retry(e.error_kind(), attempt) => {
                    let delay = policy.next_delay(attempt);
                    warn!(
                        "Commit of round {} failed (attempt {}), retrying in {:?}: {}",
                        round.round_id, attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Giving up on round {} after {} commit attempt(s): {}",
                        round.round_id, attempt, e
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn check_roster(roster: &[AgentSpec]) -> Result<(), RunRoundError> {
    if roster.is_empty() {
        return Err(RunRoundError::EmptyRoster);
    }
    let mut seen = HashSet::new();
    for spec in roster {
        if !seen.insert(&spec.agent_id) {
            return Err(RunRoundError::DuplicateAgent(spec.agent_id.clone()));
        }
    }
    Ok(())
}

/// Forwards runner output chunks to the progress notifier.
struct ProgressObserver<'a> {
    progress: &'a dyn RoundProgressNotifier,
}

impl OutputObserver for ProgressObserver<'_> {
    fn on_chunk(&self, agent_id: &AgentId, chunk: &str) {
        self.progress.on_agent_output(agent_id, chunk);
    }
}

/// Drive one agent to a terminal outcome.
///
/// The returned outcome carries the total attempt count and the elapsed time
/// across all attempts and backoff sleeps.
async fn run_with_retry<A: AgentRunner + ?Sized>(
    runner: &A,
    task: &AgentTask,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    progress: &dyn RoundProgressNotifier,
) -> AgentOutcome {
    let started = Instant::now();
    let observer = ProgressObserver { progress };
    let cancelled = |attempt: u32| {
        AgentOutcome::failure(task.agent_id.clone(), ErrorKind::Cancelled, started.elapsed())
            .with_attempts(attempt)
    };

    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return cancelled(attempt);
        }

        debug!("Agent {} attempt {} starting", task.agent_id, attempt);
        progress.on_attempt_start(&task.agent_id, attempt);

        let outcome = runner
            .run(task, cancel, &observer)
            .await
            .with_attempts(attempt)
            .with_elapsed(started.elapsed());

        let kind = match outcome.error_kind {
            Some(kind) if outcome.is_retryable() => kind,
            _ => return outcome,
        };

        if !policy.should_retry(kind, attempt) {
            return outcome.exhausted();
        }

        let delay = policy.next_delay(attempt);
        warn!(
            "Agent {} failed with {} (attempt {}/{}), retrying in {:?}",
            task.agent_id, kind, attempt, policy.max_attempts, delay
        );
        progress.on_retry_scheduled(&task.agent_id, attempt, kind, delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(attempt),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
