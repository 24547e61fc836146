//! Entity model for the rowmap entity mapper.
//!
//! This crate describes typed records without touching a database:
//!
//! - [`Entity`]: the capability trait a record type implements (descriptor,
//!   field accessors, lifecycle state, load/write hooks).
//! - [`EntityDescriptor`] / [`FieldDescriptor`]: the statically declared
//!   field table: names, [`FieldType`]s, and [`Constraint`] tags.
//! - [`Value`]: the tagged value exchanged between records and storage.
//! - [`MetadataRegistry`]: per-type cache of field lists, primary keys, and
//!   table names.
//! - [`Condition`]: `WHERE` fragments, raw or parameterized.
//!
//! Validation ([`validate_descriptor`]) rejects descriptors that would render
//! invalid DDL.
//!
//! # Example
//!
//! ```
//! use rowmap_core::*;
//!
//! #[derive(Debug, Default)]
//! struct Note {
//!     id: i64,
//!     body: String,
//!     state: EntityState,
//! }
//!
//! impl Entity for Note {
//!     fn describe() -> EntityDescriptor {
//!         EntityDescriptor::of::<Self>()
//!             .field(FieldDescriptor::new("id", FieldType::I64).primary_key().auto_increment())
//!             .field(FieldDescriptor::new("body", FieldType::Text).not_null())
//!     }
//!     fn state(&self) -> EntityState { self.state }
//!     fn set_state(&mut self, state: EntityState) { self.state = state; }
//!     fn value(&self, field: &str) -> Option<Value> {
//!         match field {
//!             "id" => Some(self.id.into()),
//!             "body" => Some(self.body.as_str().into()),
//!             _ => None,
//!         }
//!     }
//!     fn set_value(&mut self, field: &str, value: Value) {
//!         match field {
//!             "id" => self.id = value.as_i64().unwrap_or(INVALID_ID),
//!             "body" => self.body = value.into_text().unwrap_or_default(),
//!             _ => {}
//!         }
//!     }
//! }
//!
//! let mut registry = MetadataRegistry::new();
//! let ty = EntityType::of::<Note>();
//! let fields = registry.fields_of(&ty);
//! assert!(validate_descriptor(&registry.table_name_of(&ty), &fields).is_empty());
//! ```

mod condition;
mod entity;
mod registry;
mod types;
mod validate;
mod value;

pub use condition::{CompareOp, Condition, and, between, in_list, not, or};
pub use entity::Entity;
pub use registry::MetadataRegistry;
pub use types::*;
pub use validate::{ValidationError, is_valid_identifier, validate_descriptor};
pub use value::{INVALID_ID, Value};
