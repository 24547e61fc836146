//! Table-existence cache.
//!
//! Remembers which tables are known to exist on the attached connection so
//! write paths only query `sqlite_master` (and issue DDL) the first time a
//! table is touched. Read paths use [`TableCache::lookup`], which never
//! creates anything.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::TABLE_EXISTS_SQL;

/// Set of table names known to exist.
#[derive(Debug, Default)]
pub struct TableCache {
    present: HashSet<String>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `table` exists, creating it with the DDL from `ddl` if
    /// needed.
    ///
    /// A cached table returns immediately without touching the engine. An
    /// existing table is cached after the check. Otherwise the DDL runs and
    /// the table is cached only if it succeeded.
    pub fn ensure<F>(&mut self, conn: &Connection, table: &str, ddl: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        if self.present.contains(table) {
            debug!(table, "Table cache hit");
            return Ok(());
        }

        if table_exists(conn, table)? {
            debug!(table, "Table found in database");
            self.present.insert(table.to_string());
            return Ok(());
        }

        let sql = ddl()?;
        debug!(table, sql = %sql, "Creating table");
        conn.execute_batch(&sql)?;
        info!(table, "Created table");
        self.present.insert(table.to_string());
        Ok(())
    }

    /// Returns `true` if `table` exists, caching a positive answer.
    ///
    /// Never issues DDL; a missing table is not remembered, so a later
    /// write still creates it.
    pub fn lookup(&mut self, conn: &Connection, table: &str) -> Result<bool> {
        if self.present.contains(table) {
            return Ok(true);
        }
        let exists = table_exists(conn, table)?;
        if exists {
            self.present.insert(table.to_string());
        }
        Ok(exists)
    }

    /// Returns `true` if `table` is cached as present.
    pub fn contains(&self, table: &str) -> bool {
        self.present.contains(table)
    }

    /// Forgets `table`, e.g. after it was dropped.
    pub fn remove(&mut self, table: &str) -> bool {
        self.present.remove(table)
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Forgets every table.
    pub fn clear(&mut self) {
        self.present.clear();
    }
}

/// Asks `sqlite_master` whether `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(TABLE_EXISTS_SQL, [table], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    const DDL: &str = "CREATE TABLE IF NOT EXISTS Note (id INTEGER PRIMARY KEY, body TEXT);";

    #[test]
    fn test_creates_once_then_hits_cache() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cache = TableCache::new();
        let mut calls = 0;

        cache
            .ensure(&conn, "Note", || {
                calls += 1;
                Ok(DDL.to_string())
            })
            .unwrap();
        assert!(cache.contains("Note"));
        assert!(table_exists(&conn, "Note").unwrap());

        cache
            .ensure(&conn, "Note", || {
                calls += 1;
                Ok(DDL.to_string())
            })
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_existing_table_is_cached_without_ddl() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(DDL).unwrap();

        let mut cache = TableCache::new();
        cache
            .ensure(&conn, "Note", || panic!("DDL must not be requested"))
            .unwrap();
        assert!(cache.contains("Note"));
    }

    #[test]
    fn test_failed_ddl_is_not_cached() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cache = TableCache::new();

        let result = cache.ensure(&conn, "Broken", || Ok("CREATE TABLE Broken (".to_string()));
        assert!(matches!(result, Err(StoreError::DatabaseError(_))));
        assert!(!cache.contains("Broken"));
    }

    #[test]
    fn test_remove_forces_recheck() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cache = TableCache::new();
        cache.ensure(&conn, "Note", || Ok(DDL.to_string())).unwrap();

        conn.execute_batch("DROP TABLE Note;").unwrap();
        assert!(cache.remove("Note"));
        assert!(cache.is_empty());

        cache.ensure(&conn, "Note", || Ok(DDL.to_string())).unwrap();
        assert!(table_exists(&conn, "Note").unwrap());
    }

    #[test]
    fn test_lookup_never_creates() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cache = TableCache::new();

        assert!(!cache.lookup(&conn, "Note").unwrap());
        assert!(!table_exists(&conn, "Note").unwrap());
        assert!(cache.is_empty());

        conn.execute_batch(DDL).unwrap();
        assert!(cache.lookup(&conn, "Note").unwrap());
        assert!(cache.contains("Note"));
    }
}
