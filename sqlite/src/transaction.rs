//! Single-level, caller-driven transactions.
//!
//! Mirrors the begin / mark successful / end protocol: writes issued
//! between [`begin`](TransactionManager::begin) and
//! [`end`](TransactionManager::end) are committed only if the transaction
//! was marked successful, and rolled back otherwise. Nesting is rejected.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Tracks the one open transaction of a connection.
#[derive(Debug, Default)]
pub struct TransactionManager {
    active: bool,
    successful: bool,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` between `begin` and `end`.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Issues `BEGIN`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionError`] if a transaction is already
    /// open.
    pub fn begin(&mut self, conn: &Connection) -> Result<()> {
        if self.active {
            return Err(StoreError::TransactionError(
                "nested transactions are not supported".to_string(),
            ));
        }
        conn.execute_batch("BEGIN")?;
        debug!("Transaction started");
        self.active = true;
        self.successful = false;
        Ok(())
    }

    /// Marks the open transaction for commit.
    pub fn set_successful(&mut self) -> Result<()> {
        if !self.active {
            return Err(StoreError::TransactionError(
                "no transaction in progress".to_string(),
            ));
        }
        self.successful = true;
        Ok(())
    }

    /// Issues `COMMIT` if the transaction was marked successful, `ROLLBACK`
    /// otherwise. Returns `true` when committed.
    ///
    /// The transaction is closed even if the statement fails.
    pub fn end(&mut self, conn: &Connection) -> Result<bool> {
        if !self.active {
            return Err(StoreError::TransactionError(
                "no transaction in progress".to_string(),
            ));
        }
        let commit = self.successful;
        self.active = false;
        self.successful = false;

        if commit {
            if let Err(err) = conn.execute_batch("COMMIT") {
                warn!(error = %err, "Commit failed; rolling back");
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                return Err(err.into());
            }
            debug!("Transaction committed");
        } else {
            conn.execute_batch("ROLLBACK")?;
            debug!("Transaction rolled back");
        }
        Ok(commit)
    }

    /// Forgets the open transaction without touching the connection.
    pub(crate) fn reset(&mut self) {
        self.active = false;
        self.successful = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        conn
    }

    fn rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_commit_when_successful() {
        let conn = setup();
        let mut tx = TransactionManager::new();
        tx.begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        tx.set_successful().unwrap();
        assert!(tx.end(&conn).unwrap());
        assert_eq!(rows(&conn), 1);
        assert!(!tx.is_active());
    }

    #[test]
    fn test_rollback_when_not_marked() {
        let conn = setup();
        let mut tx = TransactionManager::new();
        tx.begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        assert!(!tx.end(&conn).unwrap());
        assert_eq!(rows(&conn), 0);
    }

    #[test]
    fn test_nested_begin_rejected() {
        let conn = setup();
        let mut tx = TransactionManager::new();
        tx.begin(&conn).unwrap();
        assert!(matches!(tx.begin(&conn), Err(StoreError::TransactionError(_))));
        tx.end(&conn).unwrap();
    }

    #[test]
    fn test_end_without_begin_rejected() {
        let conn = setup();
        let mut tx = TransactionManager::new();
        assert!(tx.set_successful().is_err());
        assert!(tx.end(&conn).is_err());
    }
}
