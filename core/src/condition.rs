//! `WHERE` clause fragments.
//!
//! Two flavors are offered. The free functions ([`and`], [`or`], [`not`],
//! [`between`], [`in_list`]) compose raw SQL text and perform no escaping:
//! whatever the caller passes ends up in the statement verbatim.
//!
//! [`Condition`] is a small expression tree that renders to SQL with `?N`
//! placeholders and collects the bound values separately, so column values
//! never need escaping. [`Condition::Raw`] keeps the verbatim escape hatch
//! and composes with the bound forms.
//!
//! # Examples
//!
//! ```
//! use rowmap_core::{Condition, Value};
//!
//! let cond = Condition::gt("age", 18).and(Condition::eq("name", "Ann"));
//! let mut params = Vec::new();
//! assert_eq!(cond.render(&mut params), "(age > ?1) AND (name = ?2)");
//! assert_eq!(params, vec![Value::Integer(18), Value::from("Ann")]);
//! ```

use std::fmt;

use crate::value::Value;

/// `(left) AND (right)`.
pub fn and(left: &str, right: &str) -> String {
    format!("({left}) AND ({right})")
}

/// `(left) OR (right)`.
pub fn or(left: &str, right: &str) -> String {
    format!("({left}) OR ({right})")
}

/// `NOT (condition)`.
pub fn not(condition: &str) -> String {
    format!("NOT ({condition})")
}

/// `BETWEEN low AND high`, meant to follow a column name.
pub fn between(low: &str, high: &str) -> String {
    format!("BETWEEN {low} AND {high}")
}

/// `IN (a, b, ...)` with values rendered as SQL literals. Returns `None` for
/// an empty list since `IN ()` is not valid SQL.
///
/// ```
/// use rowmap_core::{in_list, Value};
///
/// assert_eq!(
///     in_list(&[Value::from(1), Value::from("x")]).as_deref(),
///     Some("IN (1, 'x')")
/// );
/// assert!(in_list(&[]).is_none());
/// ```
pub fn in_list(values: &[Value]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let items: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
    Some(format!("IN ({})", items.join(", ")))
}

/// Comparison operators for [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// A `WHERE` clause expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Verbatim SQL. Not escaped or validated.
    Raw(String),
    /// `column <op> ?`.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// `column IS NULL` or `column IS NOT NULL`.
    IsNull { column: String, negated: bool },
    /// `column BETWEEN ? AND ?`.
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    /// `column IN (?, ...)`. An empty list renders as a false predicate.
    In { column: String, values: Vec<Value> },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Verbatim SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Generic comparison.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, pattern.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `(self) AND (other)`.
    pub fn and(self, other: Condition) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// `(self) OR (other)`.
    pub fn or(self, other: Condition) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// `NOT (self)`. Named to avoid clashing with [`std::ops::Not`].
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Returns `true` for a blank raw fragment, which callers treat as "no
    /// condition".
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Raw(sql) if sql.trim().is_empty())
    }

    /// Renders the expression, appending bound values to `params`.
    ///
    /// Placeholders are numbered continuing from `params.len()`, so a
    /// condition can follow parameters already bound by the statement.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::Raw(sql) => sql.clone(),
            Self::Compare { column, op, value } => {
                let slot = bind(params, value.clone());
                format!("{column} {} {slot}", op.as_sql())
            }
            Self::IsNull { column, negated } => {
                if *negated {
                    format!("{column} IS NOT NULL")
                } else {
                    format!("{column} IS NULL")
                }
            }
            Self::Between { column, low, high } => {
                let low = bind(params, low.clone());
                let high = bind(params, high.clone());
                format!("{column} BETWEEN {low} AND {high}")
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    return "0".to_string();
                }
                let slots: Vec<String> = values.iter().map(|v| bind(params, v.clone())).collect();
                format!("{column} IN ({})", slots.join(", "))
            }
            Self::And(l, r) => {
                let l = l.render(params);
                let r = r.render(params);
                and(&l, &r)
            }
            Self::Or(l, r) => {
                let l = l.render(params);
                let r = r.render(params);
                or(&l, &r)
            }
            Self::Not(inner) => not(&inner.render(params)),
        }
    }
}

fn bind(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("?{}", params.len())
}

impl From<&str> for Condition {
    fn from(sql: &str) -> Self {
        Self::Raw(sql.to_string())
    }
}

impl From<String> for Condition {
    fn from(sql: String) -> Self {
        Self::Raw(sql)
    }
}

impl fmt::Display for Condition {
    /// Renders with literals inlined; for logs only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        let inlined = params
            .iter()
            .enumerate()
            .rev()
            .fold(sql, |acc, (i, v)| acc.replace(&format!("?{}", i + 1), &v.to_sql_literal()));
        f.write_str(&inlined)
    }
}
