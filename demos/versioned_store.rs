//! Schema versioning example.
//!
//! Writes a store configuration to a temporary directory, opens the store
//! twice with increasing schema versions, and lets a listener create and
//! upgrade the tables.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p rowmap-demos --example versioned_store
//! ```

use rowmap_config::StoreConfig;
use rowmap_sqlite::{DatabaseListener, EntityStore, Result};

struct Library;

impl DatabaseListener for Library {
    fn on_created(&mut self, store: &mut EntityStore) -> Result<()> {
        println!("  on_created: creating Book");
        store.exec_sql("CREATE TABLE Book (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT);")?;
        store.exec_sql("INSERT INTO Book (title) VALUES ('Dune'), ('Emma');")
    }

    fn on_upgrade(&mut self, store: &mut EntityStore, old: u32, new: u32) -> Result<()> {
        println!("  on_upgrade: {old} -> {new}");
        if old < 2 {
            store.exec_sql("ALTER TABLE Book ADD COLUMN pages INTEGER DEFAULT 0;")?;
        }
        Ok(())
    }

    fn on_load_complete(&mut self, store: &mut EntityStore) {
        if let Ok(version) = store.user_version() {
            println!("  loaded at version {version}");
        }
    }
}

fn main() {
    let dir = std::env::temp_dir().join("rowmap_versioned_store");
    std::fs::create_dir_all(&dir).unwrap();
    let db_path = dir.join("library.db");
    let config_path = dir.join("store.yml");
    let _ = std::fs::remove_file(&db_path);

    // === Step 1: Version 1 ===
    println!("=== Version 1 ===");
    let mut config = StoreConfig::new(&db_path, 1);
    config.journal_mode = Some("wal".to_string());
    config.save(&config_path).unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    let store = EntityStore::open(&config, &mut Library).unwrap();
    println!("Tables: {:?}", store.table_names().unwrap());
    drop(store);

    // === Step 2: Version 2 ===
    println!("\n=== Version 2 ===");
    let config = StoreConfig::new(&db_path, 2);
    let mut store = EntityStore::open(&config, &mut Library).unwrap();
    store.update_fields_in("Book", "pages = 300").unwrap();
    let pages = store.query_sum_in("Book", "pages", None).unwrap();
    println!("Total pages: {pages}");
    store.close().unwrap();

    // === Step 3: Cleanup ===
    std::fs::remove_dir_all(&dir).unwrap();
    println!("\nCleaned up {}", dir.display());
}
