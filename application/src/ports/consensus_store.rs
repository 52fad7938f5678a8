//! Consensus repository port
//!
//! Durable storage of settled rounds. A round and all of its output records
//! become visible together or not at all.

use async_trait::async_trait;
use quorum_gate_domain::{
    AgentOutputRecord, ConsensusRound, ErrorKind, RoundFilter, RoundId, StoredRound,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a consensus repository
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock contention or pool exhaustion; the write may be retried
    #[error("Storage busy: {0}")]
    Busy(String),

    #[error("Round not found: {0}")]
    NotFound(String),

    /// Disk full, corruption, constraint violation, schema mismatch
    #[error("Storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }

    /// The normalized kind used by the retry policy.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            StoreError::Busy(_) => ErrorKind::StorageBusy,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Fatal(_) => ErrorKind::Unknown,
        }
    }
}

/// How old a round may get before the maintenance pass deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    /// Free pages reclaimed per `incremental_vacuum` call
    pub vacuum_pages: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(180 * 24 * 60 * 60),
            vacuum_pages: 20,
        }
    }
}

/// Result of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub rounds_deleted: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl MaintenanceReport {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Repository for settled consensus rounds
#[async_trait]
pub trait ConsensusRepository: Send + Sync {
    /// Persist a round and every output record atomically.
    async fn commit_round(
        &self,
        round: &ConsensusRound,
        outputs: &[AgentOutputRecord],
    ) -> Result<RoundId, StoreError>;

    /// Read a round with its output records (in commit order).
    async fn read_round(&self, round_id: &RoundId) -> Result<StoredRound, StoreError>;

    /// List rounds matching the filter, newest first.
    async fn list_rounds(&self, filter: &RoundFilter) -> Result<Vec<ConsensusRound>, StoreError>;

    /// Delete rounds past retention and reclaim free pages.
    async fn run_maintenance(
        &self,
        retention: &RetentionPolicy,
    ) -> Result<MaintenanceReport, StoreError>;
}
