//! Connection pooling and pragma configuration

use super::{DbError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Pooled SQLite connections
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pool sizing and lock-wait settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub max_size: u32,
    /// How long SQLite waits on a locked database before reporting BUSY
    pub busy_timeout: Duration,
    /// How long a caller waits for a free pooled connection
    pub checkout_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            busy_timeout: Duration::from_millis(5_000),
            checkout_timeout: Duration::from_secs(30),
        }
    }
}

/// Initialize a connection pool with the store's pragmas
///
/// Pragmas applied to every connection:
/// - `journal_mode = WAL`: concurrent readers alongside one writer
/// - `synchronous = NORMAL`: safe with WAL, fewer fsyncs
/// - `foreign_keys = ON`: output rows cascade with their round
/// - `cache_size = -32000`: 32MB page cache
/// - `temp_store = MEMORY`
/// - `auto_vacuum = INCREMENTAL`: lets maintenance reclaim pages
/// - `busy_timeout`: from [`PoolOptions`]
pub fn initialize_pool(db_path: &Path, options: &PoolOptions) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path);

    let pool = Pool::builder()
        .max_size(options.max_size)
        .min_idle(Some(options.max_size.min(2)))
        .connection_timeout(options.checkout_timeout)
        .connection_customizer(Box::new(ConnectionCustomizer {
            busy_timeout_ms: options.busy_timeout.as_millis(),
        }))
        .test_on_check_out(true)
        .build(manager)
        .map_err(|e| DbError::Pool(format!("Failed to create connection pool: {e}")))?;

    let conn = pool
        .get()
        .map_err(|e| DbError::Pool(format!("Failed to get initial connection: {e}")))?;
    verify_pragmas(&conn)?;

    Ok(pool)
}

/// Apply pragmas to each new connection
#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout_ms: u128,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        // busy_timeout first so concurrent pool fills wait instead of failing;
        // auto_vacuum must precede journal_mode to take effect on a new file
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};
             PRAGMA auto_vacuum = INCREMENTAL;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -32000;
             PRAGMA temp_store = MEMORY;",
            self.busy_timeout_ms
        ))
    }
}

/// Verify WAL and foreign keys, which correctness depends on
fn verify_pragmas(conn: &Connection) -> Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if journal_mode != "wal" {
        return Err(DbError::Pool(format!(
            "WAL mode not enabled (got: {journal_mode})"
        )));
    }

    let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(DbError::Pool(
            "Foreign key enforcement not enabled".to_string(),
        ));
    }

    Ok(())
}

/// Run blocking SQLite work on the blocking thread pool.
pub async fn with_connection<F, T>(pool: &DbPool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DbError::PoolExhausted(e.to_string()))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| DbError::Join(e.to_string()))?
}
