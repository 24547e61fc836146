//! The entity capability trait.
//!
//! Concrete record types implement [`Entity`] to expose their descriptor,
//! field accessors, lifecycle state, and optional load/write hooks. The
//! storage layer only ever talks to records through this trait.

use crate::types::{EntityDescriptor, EntityState, WriteOutcome};
use crate::value::Value;

/// A record type that can be mapped to a table.
///
/// Implementors hold their own [`EntityState`] and translate between their
/// fields and [`Value`]s by field name. Unknown names are ignored on write
/// and yield `None` on read.
///
/// # Examples
///
/// ```
/// use rowmap_core::*;
///
/// #[derive(Debug, Default)]
/// struct Student {
///     id: String,
///     age: i32,
///     state: EntityState,
/// }
///
/// impl Entity for Student {
///     fn describe() -> EntityDescriptor {
///         EntityDescriptor::of::<Self>()
///             .field(FieldDescriptor::new("id", FieldType::Text).primary_key().not_null())
///             .field(FieldDescriptor::new("age", FieldType::I32))
///     }
///
///     fn state(&self) -> EntityState {
///         self.state
///     }
///
///     fn set_state(&mut self, state: EntityState) {
///         self.state = state;
///     }
///
///     fn value(&self, field: &str) -> Option<Value> {
///         match field {
///             "id" => Some(self.id.as_str().into()),
///             "age" => Some(self.age.into()),
///             _ => None,
///         }
///     }
///
///     fn set_value(&mut self, field: &str, value: Value) {
///         match field {
///             "id" => self.id = value.into_text().unwrap_or_default(),
///             "age" => self.age = value.as_i64().unwrap_or_default() as i32,
///             _ => {}
///         }
///     }
/// }
///
/// assert_eq!(Student::table_name(), "Student");
/// assert_eq!(Student::default().state(), EntityState::New);
/// ```
pub trait Entity: Default + 'static {
    /// Declares the persisted shape of the type.
    fn describe() -> EntityDescriptor;

    /// Table the type maps to. Defaults to the descriptor's table name.
    fn table_name() -> String {
        Self::describe().table_name
    }

    /// Current lifecycle state.
    fn state(&self) -> EntityState;

    /// Replaces the lifecycle state.
    fn set_state(&mut self, state: EntityState);

    /// Reads a field as a [`Value`].
    fn value(&self, field: &str) -> Option<Value>;

    /// Writes a decoded column value into a field.
    fn set_value(&mut self, field: &str, value: Value);

    /// Called on a fresh default instance before columns are decoded into it.
    fn on_before_load(&mut self) {}

    /// Called after all columns are decoded and the state is `Stored`.
    fn on_after_load(&mut self) {}

    /// Called before the entity's values are encoded for a write.
    fn on_before_write(&mut self) {}

    /// Called after the engine accepted a write.
    fn on_after_write(&mut self, _outcome: WriteOutcome) {}

    /// Returns a `Stored` entity to `New` so the instance can be written
    /// again as a fresh row. `Removed` is terminal and stays unchanged.
    fn reset(&mut self) {
        if self.state() != EntityState::Removed {
            self.set_state(EntityState::New);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDescriptor, FieldType};

    #[derive(Debug, Default)]
    struct Tag {
        label: String,
        state: EntityState,
    }

    impl Entity for Tag {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Tag>().field(FieldDescriptor::new("label", FieldType::Text))
        }

        fn state(&self) -> EntityState {
            self.state
        }

        fn set_state(&mut self, state: EntityState) {
            self.state = state;
        }

        fn value(&self, field: &str) -> Option<Value> {
            (field == "label").then(|| self.label.as_str().into())
        }

        fn set_value(&mut self, field: &str, value: Value) {
            if field == "label" {
                self.label = value.into_text().unwrap_or_default();
            }
        }
    }

    #[test]
    fn test_reset_returns_stored_to_new() {
        let mut tag = Tag {
            state: EntityState::Stored,
            ..Default::default()
        };
        tag.reset();
        assert_eq!(tag.state(), EntityState::New);
    }

    #[test]
    fn test_reset_keeps_removed() {
        let mut tag = Tag {
            state: EntityState::Removed,
            ..Default::default()
        };
        tag.reset();
        assert_eq!(tag.state(), EntityState::Removed);
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(Tag::table_name(), "Tag");
    }
}
