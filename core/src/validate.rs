//! Descriptor validation.
//!
//! Catches descriptors that would render invalid DDL: malformed identifiers,
//! duplicate columns, tables without persisted columns, and auto-increment
//! keys the engine would reject.
//!
//! # Examples
//!
//! ```
//! use rowmap_core::*;
//!
//! let fields = vec![FieldDescriptor::new("id", FieldType::I64).primary_key()];
//! assert!(validate_descriptor("Student", &fields).is_empty());
//!
//! let bad = vec![FieldDescriptor::new("drop;--", FieldType::Text)];
//! assert!(!validate_descriptor("Student", &bad).is_empty());
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::types::FieldDescriptor;

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex must compile")
});

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Table name is not a plain SQL identifier.
    #[error("invalid table name: {0}")]
    InvalidTableName(String),
    /// Column name is not a plain SQL identifier.
    #[error("invalid column name: {0}")]
    InvalidColumnName(String),
    /// Two persisted fields share a column name.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// No field maps to a column.
    #[error("table {0} has no persisted columns")]
    NoColumns(String),
    /// `AutoIncrement` on a field that is not an integer primary key.
    #[error("auto-increment requires an integer primary key: {0}")]
    InvalidAutoIncrement(String),
    /// Composite key group names must also be identifiers.
    #[error("invalid composite key name: {0}")]
    InvalidConstraintName(String),
}

/// Returns `true` if `name` can be used unquoted as a table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validates a resolved field list for `table_name`.
///
/// `fields` should be the column fields as returned by
/// [`MetadataRegistry::fields_of`](crate::MetadataRegistry::fields_of).
/// Fields with an unsupported type are ignored, matching how schema
/// derivation treats them.
pub fn validate_descriptor(table_name: &str, fields: &[FieldDescriptor]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !is_valid_identifier(table_name) {
        errors.push(ValidationError::InvalidTableName(table_name.to_string()));
    }

    let mut seen = HashSet::new();
    let mut persisted = 0usize;
    for field in fields.iter().filter(|f| f.field_type.is_supported()) {
        persisted += 1;

        if !is_valid_identifier(field.name) {
            errors.push(ValidationError::InvalidColumnName(field.name.to_string()));
        }
        if !seen.insert(field.name) {
            errors.push(ValidationError::DuplicateColumn(field.name.to_string()));
        }
        if field.is_auto_increment()
            && !(field.is_primary_key() && field.field_type.is_integer())
        {
            errors.push(ValidationError::InvalidAutoIncrement(field.name.to_string()));
        }
        if let Some(Some(group)) = field.composite_group() {
            if !is_valid_identifier(group) {
                errors.push(ValidationError::InvalidConstraintName(group.to_string()));
            }
        }
    }

    if persisted == 0 {
        errors.push(ValidationError::NoColumns(table_name.to_string()));
    }

    errors
}
