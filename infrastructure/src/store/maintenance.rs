//! Retention and space reclamation
//!
//! A maintenance pass deletes rounds settled longer ago than the retention
//! window (output rows go with them through the foreign-key cascade), then
//! runs `incremental_vacuum` so freed pages are returned to the filesystem.

use super::Result;
use super::queries::delete_rounds_settled_before;
use super::transactions::execute_in_transaction;
use chrono::{DateTime, Utc};
use quorum_gate_application::ports::consensus_store::{
    ConsensusRepository, MaintenanceReport, RetentionPolicy,
};
use quorum_gate_domain::core::time::format_timestamp;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One retention and vacuum pass relative to `now`.
pub fn run_maintenance(
    conn: &mut Connection,
    retention: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<MaintenanceReport> {
    let bytes_before = database_size(conn)?;

    let max_age = chrono::Duration::from_std(retention.max_age).unwrap_or(chrono::Duration::MAX);
    let cutoff = now
        .checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let cutoff = format_timestamp(cutoff);

    let rounds_deleted = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        delete_rounds_settled_before(tx, &cutoff)
    })?;

    // incremental_vacuum(0) frees the whole freelist; keep passes bounded
    let pages = retention.vacuum_pages.max(1);
    conn.execute_batch(&format!("PRAGMA incremental_vacuum({pages})"))?;

    let bytes_after = database_size(conn)?;

    debug!(
        "Maintenance cutoff {}: {} rounds deleted",
        cutoff, rounds_deleted
    );

    Ok(MaintenanceReport {
        rounds_deleted,
        bytes_before,
        bytes_after,
    })
}

fn database_size(conn: &Connection) -> Result<u64> {
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    Ok(u64::try_from(page_count.saturating_mul(page_size)).unwrap_or(0))
}

/// Run maintenance on `repository` every `every` until `cancel` fires.
///
/// The first pass runs one full interval after spawning. Failures are
/// logged and the daemon keeps going.
pub fn spawn_maintenance_daemon<R>(
    repository: Arc<R>,
    retention: RetentionPolicy,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: ConsensusRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Maintenance daemon stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match repository.run_maintenance(&retention).await {
                        Ok(report) => info!(
                            "Maintenance pass: {} rounds deleted, reclaimed {}KB",
                            report.rounds_deleted,
                            report.bytes_reclaimed() / 1024
                        ),
                        Err(e) => error!("Maintenance pass failed: {}", e),
                    }
                }
            }
        }
    })
}
