//! Error types for store configuration.

use thiserror::Error;

/// Errors that can occur while loading, saving, or validating a
/// [`StoreConfig`](crate::StoreConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A setting holds a value the store cannot use.
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
