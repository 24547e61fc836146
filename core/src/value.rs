//! Dynamically-typed field values.
//!
//! [`Value`] is the single currency exchanged between entities and the
//! storage layer. Entities hand out a `Value` per field on the write path
//! and receive one per column on the read path; the storage backend decides
//! how each variant is bound to a statement.

use serde::{Deserialize, Serialize};

/// Reserved row identifier meaning "not assigned yet".
///
/// An auto-increment primary key holding this value is left out of insert
/// statements so the engine assigns the key.
pub const INVALID_ID: i64 = -1;

/// A single field or column value.
///
/// Integers of every width share the [`Integer`](Value::Integer) variant and
/// both float widths share [`Real`](Value::Real); the declared
/// [`FieldType`](crate::FieldType) restores the width when needed.
///
/// # Examples
///
/// ```
/// use rowmap_core::Value;
///
/// let age = Value::from(20_i32);
/// assert_eq!(age.as_i64(), Some(20));
///
/// let name = Value::from("Ann");
/// assert_eq!(name.as_str(), Some("Ann"));
///
/// assert!(Value::from(None::<String>).is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Boolean, stored as `0`/`1`.
    Bool(bool),
    /// Signed integer of any width.
    Integer(i64),
    /// Floating-point number of either width.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. Booleans map to `0`/`1` and reals are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Real(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Float view. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(v) => Some(*v as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Boolean view using a nonzero test for numbers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(v) => Some(*v != 0),
            Value::Real(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Borrows the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the blob payload.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Takes the text payload.
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Takes the blob payload.
    pub fn into_blob(self) -> Option<Vec<u8>> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Renders the value as an SQL literal.
    ///
    /// Text is single-quoted with embedded quotes doubled and blobs use the
    /// `X'..'` hex form. Used for diagnostics and for the string condition
    /// helpers; bound parameters never go through this path.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => i64::from(*b).to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_share_variant() {
        assert_eq!(Value::from(7_i8), Value::Integer(7));
        assert_eq!(Value::from(-7_i16), Value::Integer(-7));
        assert_eq!(Value::from(i64::MAX), Value::Integer(i64::MAX));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Integer(0).as_bool(), Some(false));
        assert_eq!(Value::Integer(-3).as_bool(), Some(true));
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(Value::from("O'Hara").to_sql_literal(), "'O''Hara'");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::Blob(vec![0x0a, 0xff]).to_sql_literal(), "X'0AFF'");
        assert_eq!(Value::Bool(true).to_sql_literal(), "1");
    }

    #[test]
    fn test_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::Integer(3),
            Value::Text("a".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,"a"]"#);
    }
}
