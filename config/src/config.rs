//! Connection settings for an entity store.
//!
//! Defines the YAML-serializable configuration that says where the database
//! lives, which schema version the application expects, and which pragmas to
//! apply when the connection is attached.
//!
//! # Example YAML
//!
//! ```yaml
//! path: app.db
//! version: 2
//! foreign_keys: true
//! busy_timeout_ms: 5000
//! journal_mode: wal
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

const JOURNAL_MODES: &[&str] = &["delete", "truncate", "persist", "memory", "wal", "off"];

fn default_foreign_keys() -> bool {
    true
}

/// Store connection configuration.
///
/// # Examples
///
/// ```
/// use rowmap_config::StoreConfig;
///
/// let config: StoreConfig = serde_yaml::from_str("path: app.db\nversion: 3\n").unwrap();
/// assert_eq!(config.version, 3);
/// assert!(config.foreign_keys);
/// assert!(config.validate().is_ok());
///
/// assert!(StoreConfig::in_memory(1).is_in_memory());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Schema version the application expects (≥ 1). Compared against the
    /// database's `user_version` when the store is opened.
    pub version: u32,
    /// Enables `PRAGMA foreign_keys` on attach.
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
    /// Busy timeout applied to the connection, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
    /// `PRAGMA journal_mode` value, e.g. `wal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_mode: Option<String>,
}

impl StoreConfig {
    /// File-backed configuration with default pragmas.
    pub fn new(path: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            path: path.into(),
            version,
            foreign_keys: default_foreign_keys(),
            busy_timeout_ms: None,
            journal_mode: None,
        }
    }

    /// In-memory configuration with default pragmas.
    pub fn in_memory(version: u32) -> Self {
        Self::new(IN_MEMORY_PATH, version)
    }

    /// Returns `true` when [`path`](Self::path) selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Loads configuration from a YAML file and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// [`YamlError`](ConfigError::YamlError) if parsing fails, or
    /// [`InvalidSetting`](ConfigError::InvalidSetting) if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSetting`](ConfigError::InvalidSetting) for a zero
    /// version, an empty path, or an unknown journal mode.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "version",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting {
                field: "path",
                reason: "cannot be empty".to_string(),
            });
        }
        if let Some(mode) = &self.journal_mode {
            if !JOURNAL_MODES.contains(&mode.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::InvalidSetting {
                    field: "journal_mode",
                    reason: format!("unknown mode '{mode}'"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
path: data/app.db
version: 4
foreign_keys: false
busy_timeout_ms: 2500
journal_mode: WAL
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.path, PathBuf::from("data/app.db"));
        assert_eq!(config.version, 4);
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(2500));
        assert_eq!(config.journal_mode.as_deref(), Some("WAL"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: StoreConfig = serde_yaml::from_str("path: a.db\nversion: 1\n").unwrap();
        assert!(config.foreign_keys);
        assert!(config.busy_timeout_ms.is_none());
        assert!(config.journal_mode.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_version() {
        let config = StoreConfig::new("a.db", 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { field: "version", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_journal_mode() {
        let mut config = StoreConfig::in_memory(1);
        config.journal_mode = Some("fast".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { field: "journal_mode", .. })
        ));
    }

    #[test]
    fn test_in_memory() {
        assert!(StoreConfig::in_memory(1).is_in_memory());
        assert!(!StoreConfig::new("x.db", 1).is_in_memory());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");

        let original: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");
        std::fs::write(&path, "path: a.db\nversion: 0\n").unwrap();
        assert!(StoreConfig::load(&path).is_err());
    }
}
