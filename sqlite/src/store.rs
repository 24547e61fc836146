//! The entity store façade.
//!
//! [`EntityStore`] owns one SQLite connection together with the metadata
//! registry, schema cache, table cache, and transaction state, and exposes
//! the full operation surface: table management, raw SQL, aggregates, entity
//! queries, removal, and insert/replace/update.
//!
//! # Lifecycle rules
//!
//! | Operation     | Allowed from        | Resulting state |
//! |---------------|---------------------|-----------------|
//! | `insert_new`  | `New`               | `Stored`        |
//! | `replace`     | `New`, `Stored`     | `Stored`        |
//! | `update`      | `New`, `Stored`     | `Stored`        |
//! | `remove`      | `New`, `Stored`     | `Removed`       |
//!
//! A rejected call returns [`StoreError::InvalidState`] and leaves the
//! entity untouched. `update` marks the entity `Stored` whenever the
//! statement executes, even if no row matched; the returned `bool` tells
//! whether any row changed.
//!
//! # Missing tables
//!
//! Writes (`insert_new`, `replace`, `update`) create the entity's table on
//! demand, together with the tables its foreign keys reference. Every other
//! typed operation treats a missing table as empty and issues no DDL, so a
//! dropped table stays dropped until the next write.
//!
//! # Closed stores
//!
//! Every operation on a store without a connection (after
//! [`close`](EntityStore::close), or a [`detached`](EntityStore::detached)
//! store) fails with [`StoreError::Closed`] before touching anything.
//!
//! # Example
//!
//! ```
//! use rowmap_core::*;
//! use rowmap_sqlite::EntityStore;
//!
//! #[derive(Debug, Default)]
//! struct Student {
//!     id: String,
//!     age: i32,
//!     state: EntityState,
//! }
//!
//! impl Entity for Student {
//!     fn describe() -> EntityDescriptor {
//!         EntityDescriptor::of::<Self>()
//!             .field(FieldDescriptor::new("id", FieldType::Text).primary_key())
//!             .field(FieldDescriptor::new("age", FieldType::I32))
//!     }
//!     fn state(&self) -> EntityState { self.state }
//!     fn set_state(&mut self, state: EntityState) { self.state = state; }
//!     fn value(&self, field: &str) -> Option<Value> {
//!         match field {
//!             "id" => Some(self.id.as_str().into()),
//!             "age" => Some(self.age.into()),
//!             _ => None,
//!         }
//!     }
//!     fn set_value(&mut self, field: &str, value: Value) {
//!         match field {
//!             "id" => self.id = value.into_text().unwrap_or_default(),
//!             "age" => self.age = value.as_i64().unwrap_or_default() as i32,
//!             _ => {}
//!         }
//!     }
//! }
//!
//! let mut store = EntityStore::open_in_memory().unwrap();
//! let mut ann = Student { id: "s1".into(), age: 20, ..Default::default() };
//! store.insert_new(&mut ann).unwrap();
//! assert_eq!(ann.state, EntityState::Stored);
//!
//! let loaded: Option<Student> = store.query_by_primary("s1").unwrap();
//! assert_eq!(loaded.unwrap().age, 20);
//! assert_eq!(store.query_count::<Student>(Some(&Condition::gt("age", 18))).unwrap(), 1);
//! ```

use rowmap_core::{
    Condition, Entity, EntityState, EntityType, FieldDescriptor, FieldType, INVALID_ID,
    MetadataRegistry, ValidationError, Value, WriteOutcome, is_valid_identifier,
};
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info, warn};

use crate::convert::{self, RowSet, to_sql_value};
use crate::error::{Result, StoreError};
use crate::query::{self, Statement};
use crate::schema::{LIST_TABLES_SQL, SchemaBuilder, drop_table_sql};
use crate::table_cache::{self, TableCache};
use crate::transaction::TransactionManager;

/// Logs a failure caught at an operation boundary.
fn log_failure(operation: &'static str, err: &StoreError) {
    match err {
        StoreError::DatabaseError(source) => {
            warn!(operation, error = %source, "Database operation failed");
        }
        other => debug!(operation, error = %other, "Operation rejected"),
    }
}

fn check_table_name(table: &str) -> Result<()> {
    if is_valid_identifier(table) {
        Ok(())
    } else {
        Err(StoreError::InvalidDescriptor {
            table: table.to_string(),
            errors: vec![ValidationError::InvalidTableName(table.to_string())],
        })
    }
}

/// Entity mapper over a single SQLite connection.
///
/// Not internally synchronized; share it across threads only behind a lock.
#[derive(Debug, Default)]
pub struct EntityStore {
    conn: Option<Connection>,
    registry: MetadataRegistry,
    schema: SchemaBuilder,
    tables: TableCache,
    tx: TransactionManager,
}

impl EntityStore {
    /// Wraps an open connection, enabling foreign-key enforcement.
    pub fn new(conn: Connection) -> Result<Self> {
        let mut store = Self::detached();
        store.attach(conn, true)?;
        Ok(store)
    }

    /// Store over a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Store with no connection. Every operation fails with
    /// [`StoreError::Closed`] until [`attach_database`](Self::attach_database).
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attaches `conn`, replacing (and closing) any current connection.
    ///
    /// Enables `PRAGMA foreign_keys` and forgets cached table existence and
    /// transaction state, which belonged to the previous connection.
    pub fn attach_database(&mut self, conn: Connection) -> Result<()> {
        self.attach(conn, true)
    }

    pub(crate) fn attach(&mut self, conn: Connection, foreign_keys: bool) -> Result<()> {
        let pragma = if foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        };
        conn.execute_batch(pragma)?;

        self.tables.clear();
        self.tx.reset();
        self.conn = Some(conn);
        debug!(foreign_keys, "Attached database");
        Ok(())
    }

    /// Returns `true` when no connection is attached.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Closes the connection. Closing a closed store is a no-op.
    ///
    /// An open transaction is rolled back by SQLite.
    pub fn close(&mut self) -> Result<()> {
        self.tables.clear();
        self.tx.reset();
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| {
                let err = StoreError::from(err);
                log_failure("close", &err);
                err
            }),
            None => Ok(()),
        }
    }

    /// The attached connection.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MetadataRegistry {
        &mut self.registry
    }

    /// Clears the metadata, schema, and table caches.
    pub fn reset_caches(&mut self) {
        self.registry.clear();
        self.schema.clear();
        self.tables.clear();
    }

    // Transactions

    /// Starts a transaction. Nesting is rejected.
    pub fn begin_transaction(&mut self) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(StoreError::Closed)?;
        self.tx
            .begin(conn)
            .inspect_err(|err| log_failure("begin_transaction", err))
    }

    /// Marks the open transaction for commit.
    pub fn set_transaction_successful(&mut self) -> Result<()> {
        self.connection()?;
        self.tx.set_successful()
    }

    /// Commits if marked successful, rolls back otherwise. Returns `true`
    /// when committed.
    pub fn end_transaction(&mut self) -> Result<bool> {
        let conn = self.conn.as_ref().ok_or(StoreError::Closed)?;
        let committed = self
            .tx
            .end(conn)
            .inspect_err(|err| log_failure("end_transaction", err));
        if !matches!(committed, Ok(true)) {
            // Tables created inside the rolled-back transaction are gone.
            self.tables.clear();
        }
        committed
    }

    /// Runs `body` inside a transaction, committing on `Ok` and rolling back
    /// on `Err`.
    pub fn in_transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin_transaction()?;
        match body(self) {
            Ok(value) => {
                self.set_transaction_successful()?;
                self.end_transaction()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(end_err) = self.end_transaction() {
                    warn!(error = %end_err, "Rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    // Tables

    /// Ensures the table of `ty` exists and returns its name.
    fn ensure_table(&mut self, ty: &EntityType) -> Result<String> {
        let Self {
            conn,
            registry,
            schema,
            tables,
            ..
        } = self;
        let conn = conn.as_ref().ok_or(StoreError::Closed)?;
        let table = registry.table_name_of(ty);
        tables.ensure(conn, &table, || {
            schema
                .create_statement(registry, ty)
                .map(|ddl| ddl.to_string())
        })?;
        Ok(table)
    }

    /// Name of the table of `ty` if it exists. Never issues DDL.
    fn existing_table(&mut self, ty: &EntityType) -> Result<Option<String>> {
        let Self {
            conn,
            registry,
            tables,
            ..
        } = self;
        let conn = conn.as_ref().ok_or(StoreError::Closed)?;
        let table = registry.table_name_of(ty);
        Ok(tables.lookup(conn, &table)?.then_some(table))
    }

    /// Ensures the table of `ty` and the tables its foreign keys point at.
    fn ensure_write_tables(&mut self, ty: &EntityType) -> Result<String> {
        let targets: Vec<EntityType> = self
            .registry
            .fields_of(ty)
            .iter()
            .filter_map(|field| field.foreign_target().copied())
            .filter(|target| target.id() != ty.id())
            .collect();
        for target in &targets {
            self.ensure_table(target)?;
        }
        self.ensure_table(ty)
    }

    /// Creates the table of `E` if it does not exist.
    ///
    /// Repeated calls hit the table cache and issue no DDL.
    pub fn create_table<E: Entity>(&mut self) -> Result<()> {
        self.ensure_table(&EntityType::of::<E>())
            .map(drop)
            .inspect_err(|err| log_failure("create_table", err))
    }

    /// Creates the table of `entity`'s type.
    pub fn create_table_for<E: Entity>(&mut self, _entity: &E) -> Result<()> {
        self.create_table::<E>()
    }

    /// Drops the table of `E`.
    pub fn drop_table<E: Entity>(&mut self) -> Result<()> {
        self.connection()?;
        let table = self.registry.table_name_of(&EntityType::of::<E>());
        self.drop_table_named(&table)
    }

    /// Drops `table` and evicts it from the table cache, so the next write
    /// recreates it.
    pub fn drop_table_named(&mut self, table: &str) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(StoreError::Closed)?;
        check_table_name(table)?;
        conn.execute_batch(&drop_table_sql(table))
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure("drop_table", err))?;
        self.tables.remove(table);
        info!(table, "Dropped table");
        Ok(())
    }

    /// Returns `true` if `table` exists in the attached database.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        table_cache::table_exists(self.connection()?, table)
    }

    /// Names of all user tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(LIST_TABLES_SQL)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    // Raw SQL

    /// Executes one or more statements with no parameters. Blank input is a
    /// no-op.
    pub fn exec_sql(&self, sql: &str) -> Result<()> {
        let conn = self.connection()?;
        if sql.trim().is_empty() {
            return Ok(());
        }
        debug!(sql, "Executing SQL");
        conn.execute_batch(sql)
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure("exec_sql", err))
    }

    /// Executes a single statement with bound arguments and returns the
    /// number of changed rows.
    pub fn exec_sql_with(&self, sql: &str, args: &[Value]) -> Result<usize> {
        let conn = self.connection()?;
        debug!(sql, args = args.len(), "Executing SQL");
        conn.execute(sql, params_from_iter(args.iter().map(to_sql_value)))
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure("exec_sql", err))
    }

    /// Runs a query and materializes every row.
    pub fn raw_query(&self, sql: &str) -> Result<RowSet> {
        self.raw_query_with(sql, &[])
    }

    /// Runs a query with bound arguments and materializes every row.
    pub fn raw_query_with(&self, sql: &str, args: &[Value]) -> Result<RowSet> {
        let conn = self.connection()?;
        debug!(sql, args = args.len(), "Raw query");
        let run = || -> Result<RowSet> {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = columns.len();
            let rows = stmt
                .query_map(params_from_iter(args.iter().map(to_sql_value)), |row| {
                    (0..width)
                        .map(|i| row.get_ref(i).map(convert::from_sql_ref))
                        .collect::<rusqlite::Result<Vec<Value>>>()
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(RowSet { columns, rows })
        };
        run().inspect_err(|err| log_failure("raw_query", err))
    }

    // Aggregates

    /// Sum of `field` over the rows of `E` matching `condition`; `0.0` when
    /// nothing matches.
    pub fn query_sum<E: Entity>(&mut self, field: &str, condition: Option<&Condition>) -> Result<f64> {
        match self.existing_table(&EntityType::of::<E>())? {
            Some(table) => self.query_sum_in(&table, field, condition),
            None => Ok(0.0),
        }
    }

    /// Sum of `field` over the rows of `table` matching `condition`. A
    /// missing table is an engine error.
    pub fn query_sum_in(&self, table: &str, field: &str, condition: Option<&Condition>) -> Result<f64> {
        let conn = self.connection()?;
        check_table_name(table)?;
        let stmt = query::sum(table, field, condition);
        debug!(sql = %stmt.sql, "Sum query");
        let sum = conn
            .query_row(&stmt.sql, bind(&stmt), |row| {
                Ok(convert::decode(row, 0, FieldType::F64)?.as_f64())
            })
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure("query_sum", err))?;
        Ok(sum.unwrap_or(0.0))
    }

    /// Number of rows of `E` matching `condition`.
    pub fn query_count<E: Entity>(&mut self, condition: Option<&Condition>) -> Result<usize> {
        match self.existing_table(&EntityType::of::<E>())? {
            Some(table) => self.query_count_in(&table, condition),
            None => Ok(0),
        }
    }

    /// Number of rows of `table` matching `condition`.
    pub fn query_count_in(&self, table: &str, condition: Option<&Condition>) -> Result<usize> {
        let conn = self.connection()?;
        check_table_name(table)?;
        let stmt = query::count(table, condition);
        debug!(sql = %stmt.sql, "Count query");
        let count: i64 = conn
            .query_row(&stmt.sql, bind(&stmt), |row| row.get(0))
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure("query_count", err))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Runs `UPDATE <table of E> SET <set_clause>` and returns the number of
    /// changed rows.
    pub fn update_fields<E: Entity>(&mut self, set_clause: &str) -> Result<usize> {
        match self.existing_table(&EntityType::of::<E>())? {
            Some(table) => self.update_fields_in(&table, set_clause),
            None => Ok(0),
        }
    }

    /// Runs `UPDATE <table> SET <set_clause>`.
    pub fn update_fields_in(&self, table: &str, set_clause: &str) -> Result<usize> {
        let conn = self.connection()?;
        check_table_name(table)?;
        let stmt = query::update_fields(table, set_clause);
        self.execute(conn, &stmt, "update_fields")
    }

    // Queries

    fn load<E: Entity>(&self, stmt: &Statement, fields: &[FieldDescriptor]) -> Result<Vec<E>> {
        let conn = self.connection()?;
        debug!(sql = %stmt.sql, "Entity query");
        let mut prepared = conn.prepare(&stmt.sql)?;
        let columns: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mapping = convert::column_mapping(&columns, fields);
        let entities = prepared
            .query_map(bind(stmt), |row| convert::read_entity::<E>(row, &mapping))?
            .collect::<rusqlite::Result<Vec<E>>>()?;
        Ok(entities)
    }

    fn load_typed<E: Entity>(
        &mut self,
        operation: &'static str,
        build: impl FnOnce(&str) -> Statement,
    ) -> Result<Vec<E>> {
        let ty = EntityType::of::<E>();
        let run = |store: &mut Self| -> Result<Vec<E>> {
            let Some(table) = store.existing_table(&ty)? else {
                return Ok(Vec::new());
            };
            let fields = store.registry.fields_of(&ty);
            store.load(&build(&table), &fields)
        };
        run(self).inspect_err(|err| log_failure(operation, err))
    }

    fn load_in<E: Entity>(&mut self, table: &str, operation: &'static str, stmt: Statement) -> Result<Vec<E>> {
        let run = |store: &mut Self| -> Result<Vec<E>> {
            store.connection()?;
            check_table_name(table)?;
            let fields = store.registry.fields_of(&EntityType::of::<E>());
            store.load(&stmt, &fields)
        };
        run(self).inspect_err(|err| log_failure(operation, err))
    }

    /// Every row of `E`, in table order.
    pub fn query_all<E: Entity>(&mut self) -> Result<Vec<E>> {
        self.load_typed("query_all", |table| query::select_all(table, None, None))
    }

    /// Every row of `table`, read as `E`.
    pub fn query_all_in<E: Entity>(&mut self, table: &str) -> Result<Vec<E>> {
        self.load_in(table, "query_all", query::select_all(table, None, None))
    }

    /// Up to `count` rows of `E` starting at `offset`.
    ///
    /// A `count` of zero returns an empty list without querying.
    pub fn query_page<E: Entity>(&mut self, offset: usize, count: usize) -> Result<Vec<E>> {
        self.connection()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.load_typed("query_page", |table| query::select_page(table, offset, count))
    }

    /// Up to `count` rows of `table` starting at `offset`, read as `E`.
    pub fn query_page_in<E: Entity>(&mut self, table: &str, offset: usize, count: usize) -> Result<Vec<E>> {
        self.connection()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.load_in(table, "query_page", query::select_page(table, offset, count))
    }

    /// The row of `E` at `position` in table order.
    pub fn query_by_position<E: Entity>(&mut self, position: usize) -> Result<Option<E>> {
        let rows = self.load_typed("query_by_position", |table| query::select_at(table, position))?;
        Ok(rows.into_iter().next())
    }

    /// The row of `table` at `position`, read as `E`.
    pub fn query_by_position_in<E: Entity>(&mut self, table: &str, position: usize) -> Result<Option<E>> {
        let rows = self.load_in(table, "query_by_position", query::select_at(table, position))?;
        Ok(rows.into_iter().next())
    }

    /// The row of `E` whose primary key equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingPrimaryKey`] if `E` declares no primary
    /// key.
    pub fn query_by_primary<E: Entity>(&mut self, key: impl Into<Value>) -> Result<Option<E>> {
        self.connection()?;
        let ty = EntityType::of::<E>();
        let key_field = self.primary_key(&ty)?;
        let key = key.into();
        let rows = self.load_typed("query_by_primary", |table| {
            query::select_by_primary(table, key_field.name, key)
        })?;
        Ok(rows.into_iter().next())
    }

    /// The row of `table` whose `E` primary-key column equals `key`.
    pub fn query_by_primary_in<E: Entity>(
        &mut self,
        table: &str,
        key: impl Into<Value>,
    ) -> Result<Option<E>> {
        self.connection()?;
        let key_field = self.primary_key(&EntityType::of::<E>())?;
        let stmt = query::select_by_primary(table, key_field.name, key.into());
        let rows = self.load_in(table, "query_by_primary", stmt)?;
        Ok(rows.into_iter().next())
    }

    /// Rows of `E` matching `condition`, with `constraint` appended verbatim
    /// (e.g. `ORDER BY age DESC LIMIT 10`).
    pub fn query_by_condition<E: Entity>(
        &mut self,
        condition: Option<&Condition>,
        constraint: Option<&str>,
    ) -> Result<Vec<E>> {
        self.load_typed("query_by_condition", |table| {
            query::select_all(table, condition, constraint)
        })
    }

    /// Like [`query_by_condition`](Self::query_by_condition) but reads rows
    /// of `E` from `table`.
    pub fn query_by_condition_in<E: Entity>(
        &mut self,
        table: &str,
        condition: Option<&Condition>,
        constraint: Option<&str>,
    ) -> Result<Vec<E>> {
        let stmt = query::select_all(table, condition, constraint);
        self.load_in(table, "query_by_condition", stmt)
    }

    /// Distinct primary-key values of `E`, decoded with the key's type.
    pub fn query_primary_keys<E: Entity>(
        &mut self,
        condition: Option<&Condition>,
        constraint: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.connection()?;
        let ty = EntityType::of::<E>();
        let key_field = self.primary_key(&ty)?;
        let Some(table) = self.existing_table(&ty)? else {
            return Ok(Vec::new());
        };
        let stmt = query::select_distinct_primary(&table, key_field.name, condition, constraint);
        debug!(sql = %stmt.sql, "Primary key query");

        let conn = self.connection()?;
        let run = || -> Result<Vec<Value>> {
            let mut prepared = conn.prepare(&stmt.sql)?;
            let keys = prepared
                .query_map(bind(&stmt), |row| convert::decode(row, 0, key_field.field_type))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        };
        run().inspect_err(|err| log_failure("query_primary_keys", err))
    }

    // Removal

    /// Deletes the row of `entity` by primary key and marks it `Removed`.
    ///
    /// Returns `Ok(false)` if no row had that key; the state is then left
    /// unchanged.
    pub fn remove<E: Entity>(&mut self, entity: &mut E) -> Result<bool> {
        self.connection()?;
        let state = entity.state();
        if state == EntityState::Removed {
            return Err(StoreError::InvalidState {
                operation: "remove",
                state,
            });
        }

        let ty = EntityType::of::<E>();
        let key = self.primary_key_value(&ty, entity)?;
        let removed = self.remove_by_primary_key::<E>(key)?;
        if removed {
            entity.set_state(EntityState::Removed);
        }
        Ok(removed)
    }

    /// Deletes rows of `E` matching `condition`; all rows when absent.
    pub fn remove_where<E: Entity>(&mut self, condition: Option<&Condition>) -> Result<usize> {
        match self.existing_table(&EntityType::of::<E>())? {
            Some(table) => self.remove_where_in(&table, condition),
            None => Ok(0),
        }
    }

    /// Deletes rows of `table` matching `condition`.
    pub fn remove_where_in(&self, table: &str, condition: Option<&Condition>) -> Result<usize> {
        let conn = self.connection()?;
        check_table_name(table)?;
        let stmt = query::delete_where(table, condition);
        self.execute(conn, &stmt, "remove")
    }

    /// Deletes every row of `E`.
    pub fn remove_all<E: Entity>(&mut self) -> Result<usize> {
        self.remove_where::<E>(None)
    }

    /// Deletes every row of `table`.
    pub fn remove_all_in(&self, table: &str) -> Result<usize> {
        self.remove_where_in(table, None)
    }

    /// Deletes the row of `E` whose primary key equals `key`. Returns
    /// `true` if a row was deleted.
    pub fn remove_by_primary_key<E: Entity>(&mut self, key: impl Into<Value>) -> Result<bool> {
        self.connection()?;
        let ty = EntityType::of::<E>();
        let key_field = self.primary_key(&ty)?;
        let Some(table) = self.existing_table(&ty)? else {
            return Ok(false);
        };
        let stmt = query::delete_by_primary(&table, key_field.name, key.into());
        let conn = self.connection()?;
        Ok(self.execute(conn, &stmt, "remove_by_primary_key")? > 0)
    }

    // Writes

    /// Inserts `entity` as a new row and returns its row id.
    ///
    /// Only `New` entities can be inserted; a duplicate key fails with the
    /// engine's constraint error. An auto-increment key still holding
    /// [`INVALID_ID`] receives the generated id.
    pub fn insert_new<E: Entity>(&mut self, entity: &mut E) -> Result<i64> {
        self.write(entity, false)
            .inspect_err(|err| log_failure("insert_new", err))
    }

    /// Inserts `entity`, overwriting any row with the same key, and returns
    /// its row id. Allowed for `New` and `Stored` entities.
    pub fn replace<E: Entity>(&mut self, entity: &mut E) -> Result<i64> {
        self.write(entity, true)
            .inspect_err(|err| log_failure("replace", err))
    }

    fn write<E: Entity>(&mut self, entity: &mut E, replace: bool) -> Result<i64> {
        let operation = if replace { "replace" } else { "insert" };
        self.connection()?;

        let state = entity.state();
        let allowed = match state {
            EntityState::New => true,
            EntityState::Stored => replace,
            EntityState::Removed => false,
        };
        if !allowed {
            return Err(StoreError::InvalidState { operation, state });
        }

        let ty = EntityType::of::<E>();
        let table = self.ensure_write_tables(&ty)?;
        let fields = self.registry.fields_of(&ty);

        entity.on_before_write();
        let values = convert::encode(entity, &fields);
        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        let sql = query::insert(&table, &columns, replace);
        debug!(sql = %sql, "Writing entity");

        let conn = self.connection()?;
        conn.execute(&sql, params_from_iter(values.iter().map(|(_, value)| value)))?;
        let row_id = conn.last_insert_rowid();

        if let Some(key) = fields.iter().find(|f| f.is_generated_key()) {
            let unset = entity
                .value(key.name)
                .is_none_or(|v| v.is_null() || v.as_i64() == Some(INVALID_ID));
            if unset {
                entity.set_value(key.name, Value::Integer(row_id));
            }
        }

        entity.on_after_write(WriteOutcome::Committed { row_id });
        entity.set_state(EntityState::Stored);
        Ok(row_id)
    }

    /// Updates the row of `entity` identified by its primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingPrimaryKey`] if `E` has no primary key
    /// or the entity reports no key value.
    pub fn update<E: Entity>(&mut self, entity: &mut E) -> Result<bool> {
        self.connection()?;
        let ty = EntityType::of::<E>();
        let key_field = self.primary_key(&ty)?;
        let key = self.primary_key_value(&ty, entity)?;
        let condition = Condition::eq(key_field.name, key);
        self.update_where(entity, Some(&condition))
    }

    /// Writes `entity`'s fields to every row matching `condition` (every row
    /// when absent). Returns `true` if any row changed.
    ///
    /// The entity is marked `Stored` whenever the statement runs, including
    /// when nothing matched.
    pub fn update_where<E: Entity>(
        &mut self,
        entity: &mut E,
        condition: Option<&Condition>,
    ) -> Result<bool> {
        self.update_rows(entity, condition)
            .map(|rows| rows > 0)
            .inspect_err(|err| log_failure("update", err))
    }

    fn update_rows<E: Entity>(&mut self, entity: &mut E, condition: Option<&Condition>) -> Result<usize> {
        self.connection()?;
        let state = entity.state();
        if state == EntityState::Removed {
            return Err(StoreError::InvalidState {
                operation: "update",
                state,
            });
        }

        let ty = EntityType::of::<E>();
        let table = self.ensure_write_tables(&ty)?;
        let fields = self.registry.fields_of(&ty);

        entity.on_before_write();
        let values = convert::encode(entity, &fields);
        if values.is_empty() {
            return Err(StoreError::InvalidDescriptor {
                errors: vec![ValidationError::NoColumns(table.clone())],
                table,
            });
        }

        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        let stmt = query::update(&table, &columns, condition);
        debug!(sql = %stmt.sql, "Updating entity");

        let params = values
            .into_iter()
            .map(|(_, value)| value)
            .chain(stmt.params.iter().map(to_sql_value));
        let rows = self.connection()?.execute(&stmt.sql, params_from_iter(params))?;

        entity.on_after_write(WriteOutcome::Updated { rows });
        entity.set_state(EntityState::Stored);
        Ok(rows)
    }

    // Helpers

    fn primary_key(&mut self, ty: &EntityType) -> Result<FieldDescriptor> {
        match self.registry.primary_key_of(ty) {
            Some(key) => Ok(key),
            None => Err(StoreError::MissingPrimaryKey(self.registry.table_name_of(ty))),
        }
    }

    fn primary_key_value<E: Entity>(&mut self, ty: &EntityType, entity: &E) -> Result<Value> {
        let key_field = self.primary_key(ty)?;
        match entity.value(key_field.name) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(StoreError::MissingPrimaryKey(self.registry.table_name_of(ty))),
        }
    }

    fn execute(&self, conn: &Connection, stmt: &Statement, operation: &'static str) -> Result<usize> {
        debug!(sql = %stmt.sql, "Executing statement");
        conn.execute(&stmt.sql, bind(stmt))
            .map_err(StoreError::from)
            .inspect_err(|err| log_failure(operation, err))
    }
}

/// Bound parameters of `stmt` in placeholder order.
fn bind(stmt: &Statement) -> rusqlite::ParamsFromIter<impl Iterator<Item = rusqlite::types::Value> + '_> {
    params_from_iter(stmt.params.iter().map(to_sql_value))
}
