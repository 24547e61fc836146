//! Entity descriptor definitions.
//!
//! Entities declare their persisted shape once through an
//! [`EntityDescriptor`]: an ordered list of [`FieldDescriptor`]s, each with a
//! semantic [`FieldType`] and a set of [`Constraint`] tags. Descriptors are
//! plain data built at registration time; nothing is discovered by
//! introspection.

use std::any::TypeId;
use std::fmt;

use crate::entity::Entity;

/// Semantic type of an entity field.
///
/// # Examples
///
/// ```
/// use rowmap_core::FieldType;
///
/// assert!(FieldType::I16.is_integer());
/// assert!(FieldType::F32.is_float());
/// assert!(!FieldType::Unsupported("Uuid").is_supported());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// Boolean.
    Bool,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 text.
    Text,
    /// Binary blob.
    Blob,
    /// A type with no column mapping. Such fields are left out of the table
    /// and skipped on both read and write.
    Unsupported(&'static str),
}

impl FieldType {
    /// Returns `true` for the signed integer family (not booleans).
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` for both float widths.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns `false` only for [`FieldType::Unsupported`].
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

/// A constraint tag attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Single-column primary key.
    PrimaryKey,
    /// Engine-assigned key; only meaningful together with `PrimaryKey`.
    AutoIncrement,
    /// Column-level `UNIQUE`.
    Unique,
    /// Member of the table-level `UNIQUE(..)` group.
    UniqueGroup,
    /// Column-level `NOT NULL`.
    NotNull,
    /// Column-level `DEFAULT <literal>`. Ignored when `NotNull` is present.
    DefaultValue(&'static str),
    /// References the primary key of another entity type.
    ForeignKey(EntityType),
    /// Member of a composite primary key, optionally naming the constraint.
    CompositePrimaryKey(Option<&'static str>),
    /// Declared on the entity but never persisted.
    NotColumnField,
}

/// Descriptor of a single entity field.
///
/// Built with chained constraint methods:
///
/// ```
/// use rowmap_core::{FieldDescriptor, FieldType};
///
/// let id = FieldDescriptor::new("id", FieldType::I64)
///     .primary_key()
///     .auto_increment();
/// assert!(id.is_primary_key());
/// assert!(id.is_auto_increment());
/// assert!(!id.is_not_null());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, also used verbatim as the column name.
    pub name: &'static str,
    /// Semantic type.
    pub field_type: FieldType,
    /// Constraint tags in declaration order.
    pub constraints: Vec<Constraint>,
}

impl FieldDescriptor {
    /// Creates an unconstrained field.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            constraints: Vec::new(),
        }
    }

    /// Adds an arbitrary constraint tag.
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Tags the field as the primary key.
    pub fn primary_key(self) -> Self {
        self.with(Constraint::PrimaryKey)
    }

    /// Tags the field as auto-increment.
    pub fn auto_increment(self) -> Self {
        self.with(Constraint::AutoIncrement)
    }

    /// Tags the field as column-level unique.
    pub fn unique(self) -> Self {
        self.with(Constraint::Unique)
    }

    /// Adds the field to the table-level unique group.
    pub fn unique_group(self) -> Self {
        self.with(Constraint::UniqueGroup)
    }

    /// Tags the field as `NOT NULL`.
    pub fn not_null(self) -> Self {
        self.with(Constraint::NotNull)
    }

    /// Sets a `DEFAULT` literal, e.g. `"0"` or `"'none'"`.
    pub fn default_value(self, literal: &'static str) -> Self {
        self.with(Constraint::DefaultValue(literal))
    }

    /// References the primary key of `T`.
    pub fn foreign_key<T: Entity>(self) -> Self {
        self.with(Constraint::ForeignKey(EntityType::of::<T>()))
    }

    /// Adds the field to the composite primary key. An empty group name
    /// leaves the constraint unnamed.
    pub fn composite_key(self, group: &'static str) -> Self {
        let group = (!group.is_empty()).then_some(group);
        self.with(Constraint::CompositePrimaryKey(group))
    }

    /// Excludes the field from persistence.
    pub fn not_column(self) -> Self {
        self.with(Constraint::NotColumnField)
    }

    /// Returns `true` if the field carries `constraint`.
    pub fn has(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }

    pub fn is_primary_key(&self) -> bool {
        self.has(&Constraint::PrimaryKey)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.has(&Constraint::AutoIncrement)
    }

    pub fn is_unique(&self) -> bool {
        self.has(&Constraint::Unique)
    }

    pub fn is_unique_group(&self) -> bool {
        self.has(&Constraint::UniqueGroup)
    }

    pub fn is_not_null(&self) -> bool {
        self.has(&Constraint::NotNull)
    }

    pub fn is_column(&self) -> bool {
        !self.has(&Constraint::NotColumnField)
    }

    /// First `DEFAULT` literal, if any.
    pub fn default_literal(&self) -> Option<&'static str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::DefaultValue(v) => Some(*v),
            _ => None,
        })
    }

    /// Foreign-key target, if any.
    pub fn foreign_target(&self) -> Option<&EntityType> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::ForeignKey(target) => Some(target),
            _ => None,
        })
    }

    /// `Some(group)` when the field belongs to a composite key; the inner
    /// option is the constraint name, if one was given.
    pub fn composite_group(&self) -> Option<Option<&'static str>> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::CompositePrimaryKey(group) => Some(*group),
            _ => None,
        })
    }

    /// `true` when this is an auto-increment primary key.
    pub fn is_generated_key(&self) -> bool {
        self.is_primary_key() && self.is_auto_increment()
    }
}

/// Declared shape of an entity type.
///
/// # Examples
///
/// ```
/// use rowmap_core::{EntityDescriptor, FieldDescriptor, FieldType};
///
/// struct Student;
///
/// let desc = EntityDescriptor::of::<Student>()
///     .field(FieldDescriptor::new("id", FieldType::Text).primary_key())
///     .field(FieldDescriptor::new("name", FieldType::Text));
/// assert_eq!(desc.table_name, "Student");
/// assert_eq!(desc.fields.len(), 2);
///
/// let renamed = EntityDescriptor::of::<Student>().table("students");
/// assert_eq!(renamed.table_name, "students");
/// ```
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Table name; defaults to the type's simple name.
    pub table_name: String,
    /// Declared fields in order.
    pub fields: Vec<FieldDescriptor>,
    /// When set, field discovery uses this type's fields instead.
    pub parent_fields: Option<EntityType>,
}

impl EntityDescriptor {
    /// Starts a descriptor named after `T`'s simple type name.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(simple_type_name(std::any::type_name::<T>()))
    }

    /// Starts a descriptor with an explicit table name.
    pub fn named(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            fields: Vec::new(),
            parent_fields: None,
        }
    }

    /// Overrides the table name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Appends a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Redirects field discovery to `P`.
    pub fn use_parent_fields<P: Entity>(mut self) -> Self {
        self.parent_fields = Some(EntityType::of::<P>());
        self
    }
}

/// Handle to an entity type usable without generics.
///
/// Carries the type's identity plus function pointers to its descriptor and
/// table name, so registries and foreign-key constraints can resolve a type
/// they only know by reference.
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
    describe: fn() -> EntityDescriptor,
    table_name: fn() -> String,
}

impl EntityType {
    /// Handle for `E`.
    pub fn of<E: Entity>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
            describe: E::describe,
            table_name: E::table_name,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Builds the type's descriptor.
    pub fn describe(&self) -> EntityDescriptor {
        (self.describe)()
    }

    /// Resolves the type's table name.
    pub fn table_name(&self) -> String {
        (self.table_name)()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityType").field(&self.name).finish()
    }
}

/// Lifecycle state of an entity instance.
///
/// `New → Stored → Removed`; `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityState {
    /// Constructed but never written or loaded.
    #[default]
    New,
    /// Mirrors a stored row.
    Stored,
    /// Its row was deleted.
    Removed,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Stored => "stored",
            Self::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// What the engine reported for a completed write, passed to
/// [`Entity::on_after_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Row inserted (or replaced) with this row id.
    Committed { row_id: i64 },
    /// `UPDATE` executed, touching this many rows.
    Updated { rows: usize },
}

/// Strips the module path and generic arguments from a type name.
pub(crate) fn simple_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("app::data::Student"), "Student");
        assert_eq!(simple_type_name("Student"), "Student");
        assert_eq!(simple_type_name("app::Wrapper<app::Inner>"), "Wrapper");
    }

    #[test]
    fn test_composite_key_empty_group_is_unnamed() {
        let f = FieldDescriptor::new("a", FieldType::I32).composite_key("");
        assert_eq!(f.composite_group(), Some(None));

        let g = FieldDescriptor::new("b", FieldType::I32).composite_key("pk");
        assert_eq!(g.composite_group(), Some(Some("pk")));

        let h = FieldDescriptor::new("c", FieldType::I32);
        assert_eq!(h.composite_group(), None);
    }

    #[test]
    fn test_default_literal_and_generated_key() {
        let f = FieldDescriptor::new("n", FieldType::I32).default_value("0");
        assert_eq!(f.default_literal(), Some("0"));
        assert!(!f.is_generated_key());

        let id = FieldDescriptor::new("id", FieldType::I64)
            .primary_key()
            .auto_increment();
        assert!(id.is_generated_key());
    }

    #[test]
    fn test_not_column() {
        let f = FieldDescriptor::new("cache", FieldType::Text).not_column();
        assert!(!f.is_column());
    }

    #[test]
    fn test_entity_state_default_is_new() {
        assert_eq!(EntityState::default(), EntityState::New);
        assert_eq!(EntityState::Removed.to_string(), "removed");
    }
}
