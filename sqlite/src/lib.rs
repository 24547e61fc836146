//! SQLite entity store for rowmap entities.
//!
//! This crate maps [`Entity`](rowmap_core::Entity) types onto SQLite
//! tables: it derives `CREATE TABLE` statements from entity descriptors,
//! converts field values to and from columns, builds the SQL for queries and
//! writes, and enforces the entity lifecycle through [`EntityStore`].
//!
//! # Architecture
//!
//! - **`convert`**: Value codec between entity fields and SQLite columns
//! - **`schema`**: DDL derivation and caching per entity type
//! - **`query`**: Pure SQL builders for select/count/sum/update/delete
//! - **`table_cache`**: Table-existence cache consulted by write paths
//! - **`transaction`**: Single-level begin/mark/end transactions
//! - **`migration`**: Schema version lifecycle driven by `PRAGMA user_version`
//! - **`store`**: The [`EntityStore`] façade composing all of the above
//!
//! # Quick start
//!
//! ```no_run
//! use rowmap_config::StoreConfig;
//! use rowmap_sqlite::{EntityStore, NoopListener};
//!
//! let config = StoreConfig::new("app.db", 1);
//! let mut store = EntityStore::open(&config, &mut NoopListener).unwrap();
//!
//! for table in store.table_names().unwrap() {
//!     println!("{table}: {} rows", store.query_count_in(&table, None).unwrap());
//! }
//!
//! let rows = store.raw_query("SELECT name FROM sqlite_master").unwrap();
//! println!("{} schema objects", rows.len());
//! ```
//!
//! # Conditions
//!
//! Condition-taking operations accept a [`Condition`](rowmap_core::Condition).
//! `Condition::raw` fragments are inserted verbatim and must never carry
//! untrusted input; the structured constructors bind every value as a
//! parameter.

mod convert;
mod error;
mod migration;
pub mod query;
mod schema;
mod store;
mod table_cache;
mod transaction;

pub use convert::{
    Affinity, ColumnValues, RowSet, column_affinity, decode, decode_ref, encode, from_sql_ref,
    normalize, to_sql_value,
};
pub use error::{Result, StoreError};
pub use migration::{DatabaseListener, NoopListener};
pub use query::Statement;
pub use schema::{DEFAULT_COMPOSITE_KEY, SchemaBuilder, drop_table_sql};
pub use store::EntityStore;
pub use table_cache::TableCache;
pub use transaction::TransactionManager;
