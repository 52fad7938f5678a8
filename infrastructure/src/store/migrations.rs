//! Schema migrations
//!
//! The schema version lives in `PRAGMA user_version`. Migrations are
//! forward-only; each one runs in its own transaction together with the
//! version bump, so a crash never leaves a half-applied step behind.

use super::transactions::execute_in_transaction;
use super::{DbError, Result};
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

/// Ordered migrations; entry `i` upgrades the schema to version `i + 1`.
const MIGRATIONS: &[&str] = &[
    // v1: rounds and per-agent outputs
    "CREATE TABLE consensus_rounds (
         round_id            TEXT PRIMARY KEY,
         milestone_id        TEXT NOT NULL,
         stage               TEXT NOT NULL,
         started_at          TEXT NOT NULL,
         settled_at          TEXT NOT NULL,
         verdict             TEXT NOT NULL CHECK (verdict IN ('accepted', 'degraded', 'failed')),
         synthesized_content TEXT,
         quorum_met          INTEGER NOT NULL,
         roster_size         INTEGER NOT NULL,
         success_count       INTEGER NOT NULL,
         required_successes  INTEGER NOT NULL
     );
     CREATE TABLE agent_output_records (
         round_id      TEXT NOT NULL REFERENCES consensus_rounds(round_id) ON DELETE CASCADE,
         agent_id      TEXT NOT NULL,
         content       TEXT NOT NULL,
         attempt_count INTEGER NOT NULL,
         final_status  TEXT NOT NULL,
         error_kind    TEXT,
         elapsed_ms    INTEGER NOT NULL,
         recorded_at   TEXT NOT NULL,
         PRIMARY KEY (round_id, agent_id)
     );",
    // v2: lookup and retention indexes
    "CREATE INDEX idx_rounds_milestone_stage
         ON consensus_rounds (milestone_id, stage, started_at DESC);
     CREATE INDEX idx_rounds_settled_at ON consensus_rounds (settled_at);",
];

/// Schema version this binary writes
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Apply every pending migration; returns the resulting version.
///
/// Refuses a database whose version is newer than [`SCHEMA_VERSION`].
pub fn migrate_to_latest(conn: &mut Connection) -> Result<i32> {
    let current = schema_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        let version = index as i32 + 1;
        execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
            tx.execute_batch(sql)?;
            tx.execute_batch(&format!("PRAGMA user_version = {version}"))?;
            Ok(())
        })
        .map_err(|e| DbError::Migration(format!("migration to v{version} failed: {e}")))?;
        info!("Applied schema migration v{}", version);
    }

    Ok(SCHEMA_VERSION.max(current))
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
