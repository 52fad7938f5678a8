//! Transaction helpers

use super::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Run `operation` inside a transaction.
///
/// Commits when the operation returns `Ok`; any error (including a failed
/// commit) rolls everything back, since dropping an uncommitted
/// [`Transaction`] rolls it back.
pub fn execute_in_transaction<F, T>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    operation: F,
) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let value = operation(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DbError;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let mut conn = setup();
        execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
            tx.execute("INSERT INTO items (name) VALUES ('a')", [])?;
            tx.execute("INSERT INTO items (name) VALUES ('b')", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&conn), 2);
    }

    #[test]
    fn test_rollback_on_error_midway() {
        let mut conn = setup();
        let result: Result<()> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO items (name) VALUES ('a')", [])?;
                Err(DbError::Corrupt("abort after first insert".into()))
            });
        assert!(result.is_err());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_rollback_on_constraint_violation() {
        let mut conn = setup();
        let result: Result<()> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO items (id, name) VALUES (1, 'a')", [])?;
                tx.execute("INSERT INTO items (id, name) VALUES (1, 'dup')", [])?;
                Ok(())
            });
        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(count(&conn), 0);
    }
}
