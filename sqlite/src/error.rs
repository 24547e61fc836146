//! Error types for entity store operations.
//!
//! Every public [`EntityStore`](crate::EntityStore) operation reports
//! failure through [`StoreError`]. The variants follow four families: the
//! store being closed, the engine rejecting a statement, entity metadata
//! that cannot be mapped, and lifecycle rules being violated.

use rowmap_core::{EntityState, ValidationError};
use thiserror::Error;

/// Errors that can occur during entity store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite rejected or failed a statement.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The store has no attached connection.
    #[error("store is closed")]
    Closed,

    /// The entity's lifecycle state does not allow the operation.
    #[error("cannot {operation} an entity in state '{state}'")]
    InvalidState {
        operation: &'static str,
        state: EntityState,
    },

    /// The operation needs a primary key but the entity type has none, or
    /// the entity did not supply a key value.
    #[error("entity table '{0}' has no usable primary key")]
    MissingPrimaryKey(String),

    /// A foreign key references a type without a primary key.
    #[error("foreign key '{column}' on '{table}' references '{target}', which has no primary key")]
    UnresolvedForeignKey {
        table: String,
        column: String,
        target: String,
    },

    /// The entity descriptor would render invalid DDL.
    #[error("invalid descriptor for '{table}': {}", format_errors(.errors))]
    InvalidDescriptor {
        table: String,
        errors: Vec<ValidationError>,
    },

    /// Transaction primitive used out of order.
    #[error("transaction error: {0}")]
    TransactionError(String),

    /// Schema version lifecycle failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    ConfigError(#[from] rowmap_config::ConfigError),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
