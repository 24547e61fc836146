//! SQL text construction for entity queries.
//!
//! Every builder here is a pure function: it takes a table name plus
//! optional filter pieces and returns a [`Statement`] holding the SQL and the
//! values to bind. Nothing touches a connection.
//!
//! # Trust boundary
//!
//! A [`Condition::Raw`] fragment is placed after `WHERE` verbatim and a
//! constraint suffix (ORDER BY, LIMIT, ...) is appended verbatim. Neither is
//! escaped or validated. Use the structured [`Condition`] constructors for
//! untrusted input; their values are always bound as parameters.

use rowmap_core::{Condition, Value};

/// SQL text plus the values bound to its `?N` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

/// Renders ` WHERE <condition>`, or nothing for an absent or blank one.
fn where_clause(condition: Option<&Condition>, params: &mut Vec<Value>) -> String {
    match condition {
        Some(condition) if !condition.is_empty() => {
            format!(" WHERE {}", condition.render(params))
        }
        _ => String::new(),
    }
}

fn suffix(constraint: Option<&str>) -> String {
    match constraint.map(str::trim) {
        Some(constraint) if !constraint.is_empty() => format!(" {constraint}"),
        _ => String::new(),
    }
}

/// `SELECT * FROM <table>[ WHERE ..][ <constraint>]`.
///
/// # Examples
///
/// ```
/// use rowmap_core::Condition;
/// use rowmap_sqlite::query;
///
/// let stmt = query::select_all("Student", Some(&Condition::gt("age", 18)), Some("ORDER BY name"));
/// assert_eq!(stmt.sql, "SELECT * FROM Student WHERE age > ?1 ORDER BY name");
/// assert_eq!(stmt.params.len(), 1);
/// ```
pub fn select_all(table: &str, condition: Option<&Condition>, constraint: Option<&str>) -> Statement {
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params);
    Statement::new(
        format!("SELECT * FROM {table}{filter}{}", suffix(constraint)),
        params,
    )
}

/// Paginated select: `SELECT * FROM <table> LIMIT <offset>, <count>`.
pub fn select_page(table: &str, offset: usize, count: usize) -> Statement {
    Statement::new(format!("SELECT * FROM {table} LIMIT {offset}, {count}"), Vec::new())
}

/// Single row at `position`: `SELECT * FROM <table> LIMIT <position>, 1`.
pub fn select_at(table: &str, position: usize) -> Statement {
    Statement::new(format!("SELECT * FROM {table} LIMIT {position}, 1"), Vec::new())
}

/// Primary-key lookup with the key bound as `?1`.
pub fn select_by_primary(table: &str, key_column: &str, key: Value) -> Statement {
    Statement::new(
        format!("SELECT * FROM {table} WHERE {key_column} = ?1"),
        vec![key],
    )
}

/// `SELECT DISTINCT <key> FROM <table>[ WHERE ..][ <constraint>]`.
pub fn select_distinct_primary(
    table: &str,
    key_column: &str,
    condition: Option<&Condition>,
    constraint: Option<&str>,
) -> Statement {
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params);
    Statement::new(
        format!(
            "SELECT DISTINCT {key_column} FROM {table}{filter}{}",
            suffix(constraint)
        ),
        params,
    )
}

/// `SELECT COUNT(*) FROM <table>[ WHERE ..]`.
pub fn count(table: &str, condition: Option<&Condition>) -> Statement {
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params);
    Statement::new(format!("SELECT COUNT(*) FROM {table}{filter}"), params)
}

/// `SELECT SUM(<column>) FROM <table>[ WHERE ..]`.
///
/// SQLite yields `NULL` when nothing matches; callers read that as zero.
pub fn sum(table: &str, column: &str, condition: Option<&Condition>) -> Statement {
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params);
    Statement::new(format!("SELECT SUM({column}) FROM {table}{filter}"), params)
}

/// `DELETE FROM <table>[ WHERE ..]`.
pub fn delete_where(table: &str, condition: Option<&Condition>) -> Statement {
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params);
    Statement::new(format!("DELETE FROM {table}{filter}"), params)
}

/// Deletes the row whose primary key equals `key`.
pub fn delete_by_primary(table: &str, key_column: &str, key: Value) -> Statement {
    Statement::new(
        format!("DELETE FROM {table} WHERE {key_column} = ?1"),
        vec![key],
    )
}

/// `UPDATE <table> SET <set_clause>` with a caller-written SET list.
pub fn update_fields(table: &str, set_clause: &str) -> Statement {
    Statement::new(format!("UPDATE {table} SET {set_clause}"), Vec::new())
}

/// `INSERT[ OR REPLACE] INTO <table> (<cols>) VALUES (?1, ..)`.
///
/// With no columns the row is inserted with `DEFAULT VALUES`. Column values
/// are bound by the caller in the order given.
pub fn insert(table: &str, columns: &[&str], replace: bool) -> String {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    if columns.is_empty() {
        return format!("{verb} INTO {table} DEFAULT VALUES");
    }

    let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "{verb} INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        slots.join(", ")
    )
}

/// `UPDATE <table> SET a = ?1, b = ?2[ WHERE ..]`.
///
/// The SET values occupy `?1..?n`; condition placeholders continue from
/// `?n+1`, and only the condition's values are returned in `params`.
///
/// # Examples
///
/// ```
/// use rowmap_core::Condition;
/// use rowmap_sqlite::query;
///
/// let stmt = query::update("Student", &["name", "age"], Some(&Condition::eq("id", "s1")));
/// assert_eq!(stmt.sql, "UPDATE Student SET name = ?1, age = ?2 WHERE id = ?3");
/// assert_eq!(stmt.params.len(), 1);
/// ```
pub fn update(table: &str, columns: &[&str], condition: Option<&Condition>) -> Statement {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();

    // Reserve the SET slots so condition numbering starts after them.
    let mut params = vec![Value::Null; columns.len()];
    let filter = where_clause(condition, &mut params);
    params.drain(..columns.len());

    Statement::new(
        format!("UPDATE {table} SET {}{filter}", assignments.join(", ")),
        params,
    )
}
