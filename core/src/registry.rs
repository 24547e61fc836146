//! Per-type metadata cache.
//!
//! [`MetadataRegistry`] resolves and memoizes, per entity type, the column
//! field list, the primary-key field, and the table name. Entries are filled
//! lazily on first use and stay valid until [`clear`](MetadataRegistry::clear).
//!
//! The registry is an explicit value owned by whoever needs it (usually a
//! store). It is not internally synchronized.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::{EntityDescriptor, EntityType, FieldDescriptor};

/// Cache of resolved entity metadata keyed by entity type.
///
/// # Examples
///
/// ```
/// use rowmap_core::*;
///
/// #[derive(Default)]
/// struct Tag {
///     state: EntityState,
/// }
///
/// impl Entity for Tag {
///     fn describe() -> EntityDescriptor {
///         EntityDescriptor::of::<Self>()
///             .table("tags")
///             .field(FieldDescriptor::new("id", FieldType::I64).primary_key())
///             .field(FieldDescriptor::new("label", FieldType::Text))
///             .field(FieldDescriptor::new("scratch", FieldType::Text).not_column())
///     }
///     fn state(&self) -> EntityState { self.state }
///     fn set_state(&mut self, state: EntityState) { self.state = state; }
///     fn value(&self, _field: &str) -> Option<Value> { None }
///     fn set_value(&mut self, _field: &str, _value: Value) {}
/// }
///
/// let mut registry = MetadataRegistry::new();
/// let ty = EntityType::of::<Tag>();
/// assert_eq!(registry.table_name_of(&ty), "tags");
/// assert_eq!(registry.fields_of(&ty).len(), 2);
/// assert_eq!(registry.primary_key_of(&ty).unwrap().name, "id");
/// ```
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    fields: HashMap<TypeId, Arc<[FieldDescriptor]>>,
    primary_keys: HashMap<TypeId, Option<FieldDescriptor>>,
    table_names: HashMap<TypeId, String>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered column fields of `ty`.
    ///
    /// Fields tagged `NotColumnField` are dropped. When the descriptor
    /// delegates to a parent via `use_parent_fields`, the chain is followed
    /// to the first type that does not delegate; the result is cached under
    /// `ty` itself.
    pub fn fields_of(&mut self, ty: &EntityType) -> Arc<[FieldDescriptor]> {
        if let Some(fields) = self.fields.get(&ty.id()) {
            return Arc::clone(fields);
        }

        let source = resolve_field_source(ty);
        let fields: Arc<[FieldDescriptor]> = source
            .fields
            .into_iter()
            .filter(FieldDescriptor::is_column)
            .collect();

        debug!(entity = ty.name(), fields = fields.len(), "Resolved entity fields");
        self.fields.insert(ty.id(), Arc::clone(&fields));
        fields
    }

    /// First field tagged `PrimaryKey`, or `None` if the type has no single
    /// primary key.
    pub fn primary_key_of(&mut self, ty: &EntityType) -> Option<FieldDescriptor> {
        if let Some(key) = self.primary_keys.get(&ty.id()) {
            return key.clone();
        }

        let key = self
            .fields_of(ty)
            .iter()
            .find(|f| f.is_primary_key())
            .cloned();
        self.primary_keys.insert(ty.id(), key.clone());
        key
    }

    /// Table name of `ty`.
    pub fn table_name_of(&mut self, ty: &EntityType) -> String {
        self.table_names
            .entry(ty.id())
            .or_insert_with(|| ty.table_name())
            .clone()
    }

    /// Number of types with cached field lists.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.primary_keys.is_empty() && self.table_names.is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.primary_keys.clear();
        self.table_names.clear();
    }
}

/// Follows `use_parent_fields` links to the descriptor that owns the fields.
fn resolve_field_source(ty: &EntityType) -> EntityDescriptor {
    let mut visited = HashSet::from([ty.id()]);
    let mut descriptor = ty.describe();

    while let Some(parent) = descriptor.parent_fields {
        if !visited.insert(parent.id()) {
            warn!(
                entity = ty.name(),
                parent = parent.name(),
                "Cyclic use_parent_fields chain; entity has no fields"
            );
            return EntityDescriptor::named(descriptor.table_name);
        }
        descriptor = parent.describe();
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::types::{EntityState, FieldType};
    use crate::value::Value;

    macro_rules! stub_entity {
        ($name:ident, $describe:expr) => {
            #[derive(Default)]
            struct $name {
                state: EntityState,
            }

            impl Entity for $name {
                fn describe() -> EntityDescriptor {
                    $describe
                }
                fn state(&self) -> EntityState {
                    self.state
                }
                fn set_state(&mut self, state: EntityState) {
                    self.state = state;
                }
                fn value(&self, _field: &str) -> Option<Value> {
                    None
                }
                fn set_value(&mut self, _field: &str, _value: Value) {}
            }
        };
    }

    stub_entity!(
        Base,
        EntityDescriptor::of::<Base>()
            .field(FieldDescriptor::new("id", FieldType::I64).primary_key())
            .field(FieldDescriptor::new("title", FieldType::Text))
    );

    stub_entity!(
        Child,
        EntityDescriptor::of::<Child>()
            .use_parent_fields::<Base>()
            .field(FieldDescriptor::new("ignored", FieldType::Text))
    );

    stub_entity!(
        GrandChild,
        EntityDescriptor::of::<GrandChild>().use_parent_fields::<Child>()
    );

    stub_entity!(
        Keyless,
        EntityDescriptor::of::<Keyless>().field(FieldDescriptor::new("note", FieldType::Text))
    );

    stub_entity!(
        LoopA,
        EntityDescriptor::of::<LoopA>().use_parent_fields::<LoopB>()
    );

    stub_entity!(
        LoopB,
        EntityDescriptor::of::<LoopB>().use_parent_fields::<LoopA>()
    );

    fn names(fields: &[FieldDescriptor]) -> Vec<&'static str> {
        fields.iter().map(|f| f.name).collect()
    }

    #[test]
    fn test_parent_fields_resolved_transitively() {
        let mut registry = MetadataRegistry::new();
        let child = registry.fields_of(&EntityType::of::<Child>());
        assert_eq!(names(&child), vec!["id", "title"]);

        let grand = registry.fields_of(&EntityType::of::<GrandChild>());
        assert_eq!(names(&grand), vec!["id", "title"]);
    }

    #[test]
    fn test_table_name_stays_with_original_type() {
        let mut registry = MetadataRegistry::new();
        assert_eq!(registry.table_name_of(&EntityType::of::<Child>()), "Child");
        assert_eq!(registry.table_name_of(&EntityType::of::<Base>()), "Base");
    }

    #[test]
    fn test_fields_cached_by_reference() {
        let mut registry = MetadataRegistry::new();
        let ty = EntityType::of::<Base>();
        let first = registry.fields_of(&ty);
        let second = registry.fields_of(&ty);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_absent_primary_key() {
        let mut registry = MetadataRegistry::new();
        assert!(registry.primary_key_of(&EntityType::of::<Keyless>()).is_none());
        assert_eq!(
            registry
                .primary_key_of(&EntityType::of::<Child>())
                .map(|f| f.name),
            Some("id")
        );
    }

    #[test]
    fn test_cyclic_parent_chain_yields_no_fields() {
        let mut registry = MetadataRegistry::new();
        assert!(registry.fields_of(&EntityType::of::<LoopA>()).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut registry = MetadataRegistry::new();
        registry.fields_of(&EntityType::of::<Base>());
        registry.table_name_of(&EntityType::of::<Base>());
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
