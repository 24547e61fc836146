//! Store configuration for the rowmap entity mapper.
//!
//! [`StoreConfig`] captures where a store's database lives, the schema
//! version the application expects, and the connection pragmas to apply. It
//! round-trips through YAML so deployments can keep it next to the binary.
//!
//! # Quick start
//!
//! ```no_run
//! use rowmap_config::StoreConfig;
//!
//! let config = StoreConfig::load("store.yml").unwrap();
//! println!("opening {} at version {}", config.path.display(), config.version);
//!
//! let mut config = StoreConfig::new("app.db", 2);
//! config.journal_mode = Some("wal".into());
//! config.save("store.yml").unwrap();
//! ```

mod config;
mod error;

pub use config::{IN_MEMORY_PATH, StoreConfig};
pub use error::{ConfigError, Result};
