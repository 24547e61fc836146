//! `CREATE TABLE` generation from entity descriptors.
//!
//! [`SchemaBuilder`] turns the column fields resolved by a
//! [`MetadataRegistry`] into a single `CREATE TABLE IF NOT EXISTS`
//! statement and caches it per entity type. The statement has the shape:
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS <table> (<col> <AFFINITY>[ PRIMARY KEY[ AUTOINCREMENT]][ UNIQUE][ NOT NULL| DEFAULT <v>], ...
//!     [, CONSTRAINT <name> PRIMARY KEY (<cols>)][, UNIQUE(<cols>)][, FOREIGN KEY(<col>) REFERENCES <table>(<col>)]);
//! ```
//!
//! # Keys
//!
//! A composite key (any field tagged `CompositePrimaryKey`) suppresses the
//! inline `PRIMARY KEY` on every column. The constraint takes the last
//! explicit group name seen, or `composite_key` when none is given. Only one
//! foreign key is rendered per table; the last tagged field wins.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use rowmap_core::{EntityType, FieldDescriptor, MetadataRegistry, validate_descriptor};
use tracing::debug;

use crate::convert::column_affinity;
use crate::error::{Result, StoreError};

/// Constraint name used for a composite key without an explicit group.
pub const DEFAULT_COMPOSITE_KEY: &str = "composite_key";

/// Lists the user tables of the attached database.
pub const LIST_TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Checks whether a table exists; bind the table name as `?1`.
pub const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// Generates `DROP TABLE IF EXISTS` for `table`.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table};")
}

/// Derives and caches DDL per entity type.
///
/// # Examples
///
/// ```
/// use rowmap_core::*;
/// use rowmap_sqlite::SchemaBuilder;
///
/// #[derive(Default)]
/// struct Enrollment {
///     state: EntityState,
/// }
///
/// impl Entity for Enrollment {
///     fn describe() -> EntityDescriptor {
///         EntityDescriptor::of::<Self>()
///             .field(FieldDescriptor::new("student", FieldType::Text).composite_key("pk"))
///             .field(FieldDescriptor::new("course", FieldType::Text).composite_key("pk"))
///             .field(FieldDescriptor::new("grade", FieldType::F32).default_value("0"))
///     }
///     fn state(&self) -> EntityState { self.state }
///     fn set_state(&mut self, state: EntityState) { self.state = state; }
///     fn value(&self, _field: &str) -> Option<Value> { None }
///     fn set_value(&mut self, _field: &str, _value: Value) {}
/// }
///
/// let mut registry = MetadataRegistry::new();
/// let mut schema = SchemaBuilder::new();
/// let ddl = schema
///     .create_statement(&mut registry, &EntityType::of::<Enrollment>())
///     .unwrap();
/// assert_eq!(
///     &*ddl,
///     "CREATE TABLE IF NOT EXISTS Enrollment (student TEXT, course TEXT, grade REAL DEFAULT 0, \
///      CONSTRAINT pk PRIMARY KEY (student, course));"
/// );
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    statements: HashMap<TypeId, Arc<str>>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `CREATE TABLE IF NOT EXISTS` statement for `ty`.
    ///
    /// Derivation is deterministic; repeated calls return the cached string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDescriptor`] if the table or column
    /// names are not valid identifiers (or the descriptor is otherwise
    /// unusable), and [`StoreError::UnresolvedForeignKey`] if the
    /// foreign-key target has no primary key.
    pub fn create_statement(
        &mut self,
        registry: &mut MetadataRegistry,
        ty: &EntityType,
    ) -> Result<Arc<str>> {
        if let Some(ddl) = self.statements.get(&ty.id()) {
            return Ok(Arc::clone(ddl));
        }

        let ddl: Arc<str> = build_create_statement(registry, ty)?.into();
        debug!(entity = ty.name(), sql = %ddl, "Derived table schema");
        self.statements.insert(ty.id(), Arc::clone(&ddl));
        Ok(ddl)
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns `true` if no statement has been derived yet.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Drops every cached statement.
    pub fn clear(&mut self) {
        self.statements.clear();
    }
}

fn build_create_statement(registry: &mut MetadataRegistry, ty: &EntityType) -> Result<String> {
    let table = registry.table_name_of(ty);
    let fields = registry.fields_of(ty);

    let errors = validate_descriptor(&table, &fields);
    if !errors.is_empty() {
        return Err(StoreError::InvalidDescriptor { table, errors });
    }

    let mapped: Vec<&FieldDescriptor> = fields
        .iter()
        .filter(|f| column_affinity(f.field_type).is_some())
        .collect();

    let composite_keys: Vec<&str> = mapped
        .iter()
        .filter(|f| f.composite_group().is_some())
        .map(|f| f.name)
        .collect();
    let composite_name = mapped
        .iter()
        .filter_map(|f| f.composite_group().flatten())
        .last()
        .unwrap_or(DEFAULT_COMPOSITE_KEY);
    let has_composite_key = !composite_keys.is_empty();

    let mut columns = Vec::with_capacity(mapped.len());
    let mut unique_group = Vec::new();
    let mut foreign_key = None;

    for field in &mapped {
        let Some(affinity) = column_affinity(field.field_type) else {
            continue;
        };
        let mut column = format!("{} {}", field.name, affinity.as_sql());

        if !has_composite_key && field.is_primary_key() {
            column.push_str(" PRIMARY KEY");
            if field.is_auto_increment() {
                column.push_str(" AUTOINCREMENT");
            }
        }

        if let Some(target) = field.foreign_target() {
            foreign_key = Some((field.name, *target));
        }

        if field.is_unique() {
            column.push_str(" UNIQUE");
        }

        if field.is_not_null() {
            column.push_str(" NOT NULL");
        } else if let Some(default) = field.default_literal() {
            column.push_str(" DEFAULT ");
            column.push_str(default);
        }

        if field.is_unique_group() {
            unique_group.push(field.name);
        }

        columns.push(column);
    }

    let mut sql = format!("CREATE TABLE IF NOT EXISTS {table} ({}", columns.join(", "));

    if has_composite_key {
        sql.push_str(&format!(
            ", CONSTRAINT {composite_name} PRIMARY KEY ({})",
            composite_keys.join(", ")
        ));
    }

    if !unique_group.is_empty() {
        sql.push_str(&format!(", UNIQUE({})", unique_group.join(", ")));
    }

    if let Some((column, target)) = foreign_key {
        let Some(target_key) = registry.primary_key_of(&target) else {
            return Err(StoreError::UnresolvedForeignKey {
                table,
                column: column.to_string(),
                target: target.name().to_string(),
            });
        };
        let target_table = registry.table_name_of(&target);
        sql.push_str(&format!(
            ", FOREIGN KEY({column}) REFERENCES {target_table}({})",
            target_key.name
        ));
    }

    sql.push_str(");");
    Ok(sql)
}
