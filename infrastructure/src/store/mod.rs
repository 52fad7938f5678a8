//! SQLite-backed consensus store
//!
//! Implements [`ConsensusRepository`] on a pooled SQLite database in WAL
//! mode. Every write runs in a `BEGIN IMMEDIATE` transaction so a round and
//! its output rows become visible together, and lock contention surfaces at
//! the start of the transaction as a retryable [`StoreError::Busy`].

pub mod connection;
pub mod error;
pub mod maintenance;
pub mod migrations;
pub mod queries;
pub mod transactions;

pub use connection::{DbPool, PoolOptions, initialize_pool, with_connection};
pub use error::{DbError, Result};
pub use maintenance::{run_maintenance, spawn_maintenance_daemon};

use async_trait::async_trait;
use quorum_gate_application::ports::consensus_store::{
    ConsensusRepository, MaintenanceReport, RetentionPolicy, StoreError,
};
use quorum_gate_domain::{AgentOutputRecord, ConsensusRound, RoundFilter, RoundId, StoredRound};
use rusqlite::TransactionBehavior;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use transactions::execute_in_transaction;

/// Consensus repository on a local SQLite file
pub struct SqliteConsensusStore {
    pool: DbPool,
    path: PathBuf,
}

impl SqliteConsensusStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>, options: &PoolOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pool = initialize_pool(&path, options)?;
        {
            let mut conn = pool
                .get()
                .map_err(|e| DbError::Pool(format!("Failed to get migration connection: {e}")))?;
            let version = migrations::migrate_to_latest(&mut conn)?;
            debug!("Consensus store at schema v{}", version);
        }

        info!("Opened consensus store at {}", path.display());
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl std::fmt::Debug for SqliteConsensusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConsensusStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConsensusRepository for SqliteConsensusStore {
    async fn commit_round(
        &self,
        round: &ConsensusRound,
        outputs: &[AgentOutputRecord],
    ) -> std::result::Result<RoundId, StoreError> {
        let round = round.clone();
        let outputs = outputs.to_vec();

        let round_id = with_connection(&self.pool, move |conn| {
            execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
                queries::insert_round(tx, &round)?;
                for record in &outputs {
                    queries::insert_output(tx, record)?;
                }
                Ok(round.round_id.clone())
            })
        })
        .await?;

        debug!("Committed round {}", round_id);
        Ok(round_id)
    }

    async fn read_round(&self, round_id: &RoundId) -> std::result::Result<StoredRound, StoreError> {
        let round_id = round_id.clone();
        Ok(with_connection(&self.pool, move |conn| {
            queries::select_stored_round(conn, &round_id)
        })
        .await?)
    }

    async fn list_rounds(
        &self,
        filter: &RoundFilter,
    ) -> std::result::Result<Vec<ConsensusRound>, StoreError> {
        let filter = filter.clone();
        Ok(with_connection(&self.pool, move |conn| queries::select_rounds(conn, &filter)).await?)
    }

    async fn run_maintenance(
        &self,
        retention: &RetentionPolicy,
    ) -> std::result::Result<MaintenanceReport, StoreError> {
        let retention = retention.clone();
        Ok(with_connection(&self.pool, move |conn| {
            maintenance::run_maintenance(conn, &retention, chrono::Utc::now())
        })
        .await?)
    }
}
