use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rowmap_config::StoreConfig;
use rowmap_core::{Condition, is_valid_identifier};
use rowmap_sqlite::{EntityStore, NoopListener};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rowmap")]
#[command(version, about = "Inspect and administer rowmap SQLite stores")]
struct Cli {
    /// Database file path.
    #[arg(long, global = true, conflicts_with = "config")]
    db: Option<PathBuf>,
    /// Store configuration YAML; opening runs the schema version check.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show schema version and row counts of every table.
    Status,
    /// List user tables.
    Tables,
    /// Count rows of a table.
    Count(CountArgs),
    /// Sum a column of a table.
    Sum(SumArgs),
    /// Run a query and print the rows as JSON.
    Query(QueryArgs),
    /// Execute SQL statements.
    Exec(ExecArgs),
    /// Run `UPDATE <table> SET <clause>`.
    UpdateFields(UpdateFieldsArgs),
    /// Delete rows from a table.
    Remove(RemoveArgs),
    /// Drop a table.
    Drop(DropArgs),
    /// Write a store configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct CountArgs {
    /// Table name.
    table: String,
    /// Raw SQL condition, e.g. "age > 18".
    #[arg(long = "where")]
    condition: Option<String>,
}

#[derive(Debug, Args)]
struct SumArgs {
    /// Table name.
    table: String,
    /// Column to sum.
    column: String,
    /// Raw SQL condition.
    #[arg(long = "where")]
    condition: Option<String>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// SQL query.
    sql: String,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// SQL to execute.
    sql: String,
}

#[derive(Debug, Args)]
struct UpdateFieldsArgs {
    /// Table name.
    table: String,
    /// SET clause, e.g. "score = 0".
    set_clause: String,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Table name.
    table: String,
    /// Raw SQL condition selecting the rows to delete.
    #[arg(long = "where", required_unless_present = "all", conflicts_with = "all")]
    condition: Option<String>,
    /// Delete every row.
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct DropArgs {
    /// Table name.
    table: String,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output YAML path.
    output: PathBuf,
    /// Database path recorded in the configuration.
    #[arg(long)]
    path: PathBuf,
    /// Schema version.
    #[arg(long = "schema-version", default_value_t = 1)]
    schema_version: u32,
    /// Journal mode (delete, truncate, persist, memory, wal, off).
    #[arg(long)]
    journal_mode: Option<String>,
    /// Busy timeout in milliseconds.
    #[arg(long)]
    busy_timeout_ms: Option<u64>,
    /// Leave foreign-key enforcement off.
    #[arg(long)]
    no_foreign_keys: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::InitConfig(args) => run_init_config(args),
        command => open_store(cli.db, cli.config).and_then(|mut store| run(&mut store, command)),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<EntityStore, String> {
    match (db, config) {
        (Some(db), _) => {
            let conn = rusqlite::Connection::open(&db)
                .map_err(|e| format!("Failed to open database '{}': {e}", db.display()))?;
            EntityStore::new(conn).map_err(|e| format!("Failed to attach database: {e}"))
        }
        (None, Some(path)) => {
            let config = StoreConfig::load(&path)
                .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?;
            EntityStore::open(&config, &mut NoopListener)
                .map_err(|e| format!("Failed to open store '{}': {e}", config.path.display()))
        }
        (None, None) => Err("either --db or --config is required".to_string()),
    }
}

fn run(store: &mut EntityStore, command: Command) -> Result<(), String> {
    match command {
        Command::Status => run_status(store),
        Command::Tables => run_tables(store),
        Command::Count(args) => run_count(store, args),
        Command::Sum(args) => run_sum(store, args),
        Command::Query(args) => run_query(store, args),
        Command::Exec(args) => run_exec(store, args),
        Command::UpdateFields(args) => run_update_fields(store, args),
        Command::Remove(args) => run_remove(store, args),
        Command::Drop(args) => run_drop(store, args),
        Command::InitConfig(args) => run_init_config(args),
    }
}

fn condition(raw: Option<String>) -> Option<Condition> {
    raw.map(Condition::raw)
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

fn run_status(store: &mut EntityStore) -> Result<(), String> {
    let version = store
        .user_version()
        .map_err(|e| format!("Failed to read schema version: {e}"))?;
    let tables = store
        .table_names()
        .map_err(|e| format!("Failed to list tables: {e}"))?;

    println!("Store Status:");
    println!("  Schema version: {version}");
    println!("  Tables: {}", tables.len());
    for table in &tables {
        if !is_valid_identifier(table) {
            eprintln!("warning: skipping row count of '{table}' (not a plain identifier)");
            continue;
        }
        let rows = store
            .query_count_in(table, None)
            .map_err(|e| format!("Failed to count rows of '{table}': {e}"))?;
        println!("    {table}: {rows} rows");
    }
    Ok(())
}

fn run_tables(store: &mut EntityStore) -> Result<(), String> {
    let tables = store
        .table_names()
        .map_err(|e| format!("Failed to list tables: {e}"))?;
    for table in tables {
        println!("{table}");
    }
    Ok(())
}

fn run_count(store: &mut EntityStore, args: CountArgs) -> Result<(), String> {
    let condition = condition(args.condition);
    let count = store
        .query_count_in(&args.table, condition.as_ref())
        .map_err(|e| format!("Count failed: {e}"))?;
    println!("{count}");
    Ok(())
}

fn run_sum(store: &mut EntityStore, args: SumArgs) -> Result<(), String> {
    let condition = condition(args.condition);
    let sum = store
        .query_sum_in(&args.table, &args.column, condition.as_ref())
        .map_err(|e| format!("Sum failed: {e}"))?;
    println!("{sum}");
    Ok(())
}

fn run_query(store: &mut EntityStore, args: QueryArgs) -> Result<(), String> {
    let rows = store
        .raw_query(&args.sql)
        .map_err(|e| format!("Query failed: {e}"))?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&rows)
    } else {
        serde_json::to_string(&rows)
    }
    .map_err(|e| format!("Failed to serialize rows: {e}"))?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

fn run_exec(store: &mut EntityStore, args: ExecArgs) -> Result<(), String> {
    store
        .exec_sql(&args.sql)
        .map_err(|e| format!("Exec failed: {e}"))?;
    println!("OK");
    Ok(())
}

fn run_update_fields(store: &mut EntityStore, args: UpdateFieldsArgs) -> Result<(), String> {
    let rows = store
        .update_fields_in(&args.table, &args.set_clause)
        .map_err(|e| format!("Update failed: {e}"))?;
    println!("Updated {rows} rows in '{}'.", args.table);
    Ok(())
}

fn run_remove(store: &mut EntityStore, args: RemoveArgs) -> Result<(), String> {
    let rows = if args.all {
        store.remove_all_in(&args.table)
    } else {
        let condition = condition(args.condition);
        store.remove_where_in(&args.table, condition.as_ref())
    }
    .map_err(|e| format!("Remove failed: {e}"))?;
    println!("Removed {rows} rows from '{}'.", args.table);
    Ok(())
}

fn run_drop(store: &mut EntityStore, args: DropArgs) -> Result<(), String> {
    store
        .drop_table_named(&args.table)
        .map_err(|e| format!("Drop failed: {e}"))?;
    println!("Dropped table '{}'.", args.table);
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    let mut config = StoreConfig::new(args.path, args.schema_version);
    config.journal_mode = args.journal_mode;
    config.busy_timeout_ms = args.busy_timeout_ms;
    config.foreign_keys = !args.no_foreign_keys;
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    config
        .save(&args.output)
        .map_err(|e| format!("Failed to write '{}': {e}", args.output.display()))?;
    println!("Wrote configuration to '{}'.", args.output.display());
    Ok(())
}
