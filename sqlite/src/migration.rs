//! Schema version lifecycle.
//!
//! [`EntityStore::open`] opens the database described by a
//! [`StoreConfig`], compares the stored `PRAGMA user_version` with the
//! configured version, and lets a [`DatabaseListener`] create or upgrade the
//! schema before the store is handed out.
//!
//! | Stored version       | Action                                 |
//! |----------------------|----------------------------------------|
//! | `0` (fresh database) | [`on_created`](DatabaseListener::on_created) |
//! | lower than config    | [`on_upgrade`](DatabaseListener::on_upgrade) |
//! | equal                | nothing                                |
//! | higher than config   | [`StoreError::MigrationError`]         |
//!
//! The callback and the version bump run in one transaction: a failing
//! listener leaves the database at its old version.
//!
//! # Example
//!
//! ```no_run
//! use rowmap_config::StoreConfig;
//! use rowmap_sqlite::{DatabaseListener, EntityStore, Result};
//!
//! struct Schema;
//!
//! impl DatabaseListener for Schema {
//!     fn on_upgrade(&mut self, store: &mut EntityStore, old: u32, _new: u32) -> Result<()> {
//!         if old < 2 {
//!             store.exec_sql("ALTER TABLE Student ADD COLUMN email TEXT")?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let config = StoreConfig::load("store.yml").unwrap();
//! let store = EntityStore::open(&config, &mut Schema).unwrap();
//! ```

use rowmap_config::StoreConfig;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::EntityStore;

/// Callbacks for the database version lifecycle.
///
/// Every method has a no-op default.
pub trait DatabaseListener {
    /// Called once for a database that has never been versioned.
    fn on_created(&mut self, store: &mut EntityStore) -> Result<()> {
        let _ = store;
        Ok(())
    }

    /// Called when the stored version is older than the configured one.
    fn on_upgrade(&mut self, store: &mut EntityStore, old_version: u32, new_version: u32) -> Result<()> {
        let _ = (store, old_version, new_version);
        Ok(())
    }

    /// Called after the version check, outside the migration transaction.
    fn on_load_complete(&mut self, store: &mut EntityStore) {
        let _ = store;
    }
}

/// Listener that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl DatabaseListener for NoopListener {}

impl EntityStore {
    /// Opens the database described by `config` and runs the version
    /// lifecycle through `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] for an invalid configuration,
    /// [`StoreError::MigrationError`] when the database is newer than
    /// `config.version`, or whatever the listener returned.
    pub fn open(config: &StoreConfig, listener: &mut dyn DatabaseListener) -> Result<Self> {
        config.validate()?;

        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        apply_pragmas(&conn, config)?;

        let mut store = Self::detached();
        store.attach(conn, config.foreign_keys)?;
        debug!(path = %config.path.display(), "Opened store");

        store.migrate(config.version, listener)?;
        listener.on_load_complete(&mut store);
        Ok(store)
    }

    /// Reads `PRAGMA user_version`.
    pub fn user_version(&self) -> Result<u32> {
        let version: i64 = self
            .connection()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(u32::try_from(version).unwrap_or_default())
    }

    fn set_user_version(&self, version: u32) -> Result<()> {
        self.connection()?
            .execute_batch(&format!("PRAGMA user_version = {version};"))?;
        Ok(())
    }

    fn migrate(&mut self, target: u32, listener: &mut dyn DatabaseListener) -> Result<()> {
        let current = self.user_version()?;
        if current == target {
            debug!(version = current, "Schema version up to date");
            return Ok(());
        }
        if current > target {
            return Err(StoreError::MigrationError(format!(
                "database version {current} is newer than configured version {target}"
            )));
        }

        self.in_transaction(|store| {
            if current == 0 {
                info!(version = target, "Creating schema");
                listener.on_created(store)?;
            } else {
                info!(from = current, to = target, "Upgrading schema");
                listener.on_upgrade(store, current, target)?;
            }
            store.set_user_version(target)
        })
    }
}

fn apply_pragmas(conn: &Connection, config: &StoreConfig) -> Result<()> {
    if let Some(ms) = config.busy_timeout_ms {
        conn.busy_timeout(std::time::Duration::from_millis(ms))?;
    }
    if let Some(mode) = &config.journal_mode {
        let applied: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", mode.to_ascii_lowercase()),
            [],
            |row| row.get(0),
        )?;
        debug!(requested = %mode, applied = %applied, "Set journal mode");
    }
    Ok(())
}
