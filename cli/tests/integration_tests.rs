use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_rowmap");

/// Creates a database with a small `Student` table.
fn seeded_db(dir: &Path) -> PathBuf {
    let path = dir.join("school.db");
    let conn = rusqlite::Connection::open(&path).expect("failed to open test db");
    conn.execute_batch(
        "CREATE TABLE Student (id TEXT PRIMARY KEY, name TEXT, age INTEGER, score REAL);
         INSERT INTO Student VALUES ('s1', 'Ann', 20, 3.5);
         INSERT INTO Student VALUES ('s2', 'Bob', 17, 2.0);
         INSERT INTO Student VALUES ('s3', 'Cid', 22, 4.0);",
    )
    .expect("failed to seed test db");
    path
}

fn rowmap(db: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .arg("--db")
        .arg(db)
        .args(args)
        .output()
        .expect("failed to run rowmap")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

#[test]
fn status_lists_tables_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["status"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Schema version: 0"), "stdout: {text}");
    assert!(text.contains("Student: 3 rows"), "stdout: {text}");
}

#[test]
fn status_skips_unaddressable_table_names() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(r#"CREATE TABLE "odd name" (v INTEGER);"#).unwrap();
    drop(conn);

    let out = rowmap(&db, &["status"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Tables: 2"), "stdout: {text}");
    assert!(text.contains("Student: 3 rows"), "stdout: {text}");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("warning: skipping row count of 'odd name'"), "stderr: {stderr}");
}

#[test]
fn tables_lists_names() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["tables"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "Student");
}

#[test]
fn count_with_condition() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    assert_eq!(stdout(&rowmap(&db, &["count", "Student"])), "3");
    assert_eq!(
        stdout(&rowmap(&db, &["count", "Student", "--where", "age > 18"])),
        "2"
    );
}

#[test]
fn sum_returns_zero_for_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    assert_eq!(stdout(&rowmap(&db, &["sum", "Student", "age"])), "59");
    assert_eq!(
        stdout(&rowmap(&db, &["sum", "Student", "age", "--where", "age > 100"])),
        "0"
    );
}

#[test]
fn query_prints_json_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["query", "SELECT id, age FROM Student ORDER BY id"]);
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["columns"], serde_json::json!(["id", "age"]));
    assert_eq!(json["rows"][1], serde_json::json!(["s2", 17]));
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

#[test]
fn update_fields_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["update-fields", "Student", "age = age + 1"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Updated 3 rows"));

    let out = rowmap(&db, &["remove", "Student", "--where", "age < 20"]);
    assert!(stdout(&out).contains("Removed 1 rows"));

    let out = rowmap(&db, &["remove", "Student", "--all"]);
    assert!(stdout(&out).contains("Removed 2 rows"));
    assert_eq!(stdout(&rowmap(&db, &["count", "Student"])), "0");
}

#[test]
fn remove_requires_condition_or_all() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["remove", "Student"]);
    assert!(!out.status.success());
}

#[test]
fn exec_and_drop() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["exec", "CREATE TABLE Note (body TEXT);"]);
    assert!(out.status.success());
    assert_eq!(stdout(&rowmap(&db, &["tables"])), "Note\nStudent");

    let out = rowmap(&db, &["drop", "Note"]);
    assert!(out.status.success());
    assert_eq!(stdout(&rowmap(&db, &["tables"])), "Student");
}

#[test]
fn invalid_sql_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["exec", "NOT SQL"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error: Exec failed"), "stderr: {stderr}");
}

#[test]
fn invalid_table_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(dir.path());

    let out = rowmap(&db, &["count", "Student; DROP TABLE Student"]);
    assert!(!out.status.success());
    assert_eq!(stdout(&rowmap(&db, &["count", "Student"])), "3");
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn init_config_then_open_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("app.db");
    let config = dir.path().join("store.yml");

    let out = Command::new(BIN)
        .arg("init-config")
        .arg(&config)
        .arg("--path")
        .arg(&db)
        .args(["--schema-version", "3", "--journal-mode", "wal"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let yaml = std::fs::read_to_string(&config).unwrap();
    assert!(yaml.contains("version: 3"));
    assert!(yaml.contains("journal_mode: wal"));

    let out = Command::new(BIN)
        .arg("--config")
        .arg(&config)
        .arg("status")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(stdout(&out).contains("Schema version: 3"));
}

#[test]
fn init_config_rejects_bad_journal_mode() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(BIN)
        .arg("init-config")
        .arg(dir.path().join("store.yml"))
        .args(["--path", "app.db", "--journal-mode", "turbo"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn missing_database_argument_fails() {
    let out = Command::new(BIN).arg("tables").output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--db or --config"));
}
