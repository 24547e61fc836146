//! Bidirectional conversion between entity values and SQLite columns.
//!
//! Handles the column affinity of each [`FieldType`], encoding an entity
//! into bound column values for insert/replace/update, and decoding result
//! rows back into fresh entities.
//!
//! # Best-effort policy
//!
//! Fields whose type is [`FieldType::Unsupported`] have no column: they are
//! skipped on encode and left at their default on decode. Stored values of
//! an unexpected storage class are coerced the way SQLite's own accessors
//! would (text parsed as a number, numbers rendered as text) rather than
//! failing the whole row.

use rowmap_core::{Entity, EntityState, FieldDescriptor, FieldType, INVALID_ID, Value};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// SQLite column affinity used in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
}

impl Affinity {
    /// Type name as written in `CREATE TABLE`.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

/// Maps a semantic field type to its column affinity.
///
/// Every integer width and booleans map to `INTEGER`, both float widths to
/// `REAL`. Unsupported types have no affinity and no column.
pub fn column_affinity(field_type: FieldType) -> Option<Affinity> {
    match field_type {
        FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 | FieldType::Bool => {
            Some(Affinity::Integer)
        }
        FieldType::F32 | FieldType::F64 => Some(Affinity::Real),
        FieldType::Text => Some(Affinity::Text),
        FieldType::Blob => Some(Affinity::Blob),
        FieldType::Unsupported(_) => None,
    }
}

/// Column values ready to bind, in field declaration order.
pub type ColumnValues = Vec<(&'static str, SqlValue)>;

/// Converts a [`Value`] into the value bound to a statement.
///
/// Booleans are written as `0`/`1`.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Converts a column of unknown type, preserving its storage class.
pub fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Coerces a value to the width and representation of `field_type`.
///
/// Integers are truncated to the declared width, booleans become `0`/`1`,
/// and `F32` values are rounded to single precision. Values that do not
/// fit the numeric family pass through unchanged.
pub fn normalize(value: Value, field_type: FieldType) -> Value {
    if value.is_null() {
        return value;
    }
    match field_type {
        FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 => match value.as_i64() {
            Some(v) => Value::Integer(narrow(v, field_type)),
            None => value,
        },
        FieldType::Bool => match value.as_bool() {
            Some(b) => Value::Integer(i64::from(b)),
            None => value,
        },
        FieldType::F32 => match value.as_f64() {
            Some(f) => Value::Real(f64::from(f as f32)),
            None => value,
        },
        FieldType::F64 => match value.as_f64() {
            Some(f) => Value::Real(f),
            None => value,
        },
        FieldType::Text | FieldType::Blob | FieldType::Unsupported(_) => value,
    }
}

fn narrow(v: i64, field_type: FieldType) -> i64 {
    match field_type {
        FieldType::I8 => i64::from(v as i8),
        FieldType::I16 => i64::from(v as i16),
        FieldType::I32 => i64::from(v as i32),
        _ => v,
    }
}

fn parse_text<T: std::str::FromStr + Default>(bytes: &[u8]) -> T {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}

/// Decodes a column into the value expected by `field_type`.
///
/// `NULL` always decodes to [`Value::Null`].
pub fn decode_ref(value: ValueRef<'_>, field_type: FieldType) -> Value {
    if matches!(value, ValueRef::Null) {
        return Value::Null;
    }

    let as_i64 = || match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => parse_text(t),
        ValueRef::Null | ValueRef::Blob(_) => 0,
    };
    let as_f64 = || match value {
        ValueRef::Integer(i) => i as f64,
        ValueRef::Real(f) => f,
        ValueRef::Text(t) => parse_text(t),
        ValueRef::Null | ValueRef::Blob(_) => 0.0,
    };

    match field_type {
        FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 => {
            Value::Integer(narrow(as_i64(), field_type))
        }
        FieldType::Bool => Value::Bool(as_i64() != 0),
        FieldType::F32 => Value::Real(f64::from(as_f64() as f32)),
        FieldType::F64 => Value::Real(as_f64()),
        FieldType::Text => match value {
            ValueRef::Integer(i) => Value::Text(i.to_string()),
            ValueRef::Real(f) => Value::Text(f.to_string()),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
            ValueRef::Null => Value::Null,
        },
        FieldType::Blob => match value {
            ValueRef::Blob(b) | ValueRef::Text(b) => Value::Blob(b.to_vec()),
            ValueRef::Integer(i) => Value::Blob(i.to_string().into_bytes()),
            ValueRef::Real(f) => Value::Blob(f.to_string().into_bytes()),
            ValueRef::Null => Value::Null,
        },
        FieldType::Unsupported(_) => Value::Null,
    }
}

/// Decodes column `index` of `row` as `field_type`.
pub fn decode(row: &Row<'_>, index: usize, field_type: FieldType) -> rusqlite::Result<Value> {
    Ok(decode_ref(row.get_ref(index)?, field_type))
}

/// Encodes an entity's persisted fields.
///
/// Skips unsupported fields, fields the entity reports no value for, and an
/// auto-increment primary key still holding [`INVALID_ID`] (or `NULL`) so
/// the engine assigns it.
pub fn encode<E: Entity>(entity: &E, fields: &[FieldDescriptor]) -> ColumnValues {
    let mut values = Vec::with_capacity(fields.len());

    for field in fields {
        if column_affinity(field.field_type).is_none() {
            debug!(field = field.name, "Skipping field without column mapping");
            continue;
        }

        let Some(value) = entity.value(field.name) else {
            debug!(field = field.name, "Entity reported no value; skipping");
            continue;
        };

        if field.is_generated_key() && (value.is_null() || value.as_i64() == Some(INVALID_ID)) {
            continue;
        }

        values.push((field.name, to_sql_value(&normalize(value, field.field_type))));
    }

    values
}

/// Pairs each decodable field with the index of its column in a result set.
///
/// Fields without a column in `columns` (or without an affinity) are left
/// out and keep their default value on load.
pub fn column_mapping<'f>(
    columns: &[String],
    fields: &'f [FieldDescriptor],
) -> Vec<(&'f FieldDescriptor, usize)> {
    fields
        .iter()
        .filter(|f| column_affinity(f.field_type).is_some())
        .filter_map(|f| {
            columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(f.name))
                .map(|index| (f, index))
        })
        .collect()
}

/// Builds a fresh entity from one result row.
///
/// Runs the load hooks around decoding and marks the entity `Stored`.
pub fn read_entity<E: Entity>(
    row: &Row<'_>,
    mapping: &[(&FieldDescriptor, usize)],
) -> rusqlite::Result<E> {
    let mut entity = E::default();
    entity.on_before_load();

    for (field, index) in mapping {
        let value = decode(row, *index, field.field_type)?;
        entity.set_value(field.name, value);
    }

    entity.set_state(EntityState::Stored);
    entity.on_after_load();
    Ok(entity)
}

/// Materialized result of a raw query.
///
/// Values keep the storage class SQLite reported for each cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Rows in result order.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the query produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of `column`, compared case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Cell at `row`, `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::{EntityDescriptor, EntityType, MetadataRegistry};
    use rusqlite::Connection;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        id: i64,
        tiny: i8,
        small: i16,
        flag: bool,
        ratio: f32,
        score: f64,
        label: String,
        payload: Vec<u8>,
        extra: String,
        state: EntityState,
    }

    impl Entity for Sample {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .field(FieldDescriptor::new("id", FieldType::I64).primary_key().auto_increment())
                .field(FieldDescriptor::new("tiny", FieldType::I8))
                .field(FieldDescriptor::new("small", FieldType::I16))
                .field(FieldDescriptor::new("flag", FieldType::Bool))
                .field(FieldDescriptor::new("ratio", FieldType::F32))
                .field(FieldDescriptor::new("score", FieldType::F64))
                .field(FieldDescriptor::new("label", FieldType::Text))
                .field(FieldDescriptor::new("payload", FieldType::Blob))
                .field(FieldDescriptor::new("extra", FieldType::Unsupported("Uuid")))
        }

        fn state(&self) -> EntityState {
            self.state
        }

        fn set_state(&mut self, state: EntityState) {
            self.state = state;
        }

        fn value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(self.id.into()),
                "tiny" => Some(self.tiny.into()),
                "small" => Some(self.small.into()),
                "flag" => Some(self.flag.into()),
                "ratio" => Some(self.ratio.into()),
                "score" => Some(self.score.into()),
                "label" => Some(self.label.as_str().into()),
                "payload" => Some(self.payload.clone().into()),
                "extra" => Some(self.extra.as_str().into()),
                _ => None,
            }
        }

        fn set_value(&mut self, field: &str, value: Value) {
            match field {
                "id" => self.id = value.as_i64().unwrap_or(INVALID_ID),
                "tiny" => self.tiny = value.as_i64().unwrap_or_default() as i8,
                "small" => self.small = value.as_i64().unwrap_or_default() as i16,
                "flag" => self.flag = value.as_bool().unwrap_or_default(),
                "ratio" => self.ratio = value.as_f64().unwrap_or_default() as f32,
                "score" => self.score = value.as_f64().unwrap_or_default(),
                "label" => self.label = value.into_text().unwrap_or_default(),
                "payload" => self.payload = value.into_blob().unwrap_or_default(),
                "extra" => self.extra = value.into_text().unwrap_or_default(),
                _ => {}
            }
        }
    }

    fn sample() -> Sample {
        Sample {
            id: INVALID_ID,
            tiny: -8,
            small: 1234,
            flag: true,
            ratio: 0.1,
            score: 3.5,
            label: "hello".into(),
            payload: vec![0, 1, 254, 255],
            extra: "not stored".into(),
            state: EntityState::New,
        }
    }

    fn fields() -> std::sync::Arc<[FieldDescriptor]> {
        MetadataRegistry::new().fields_of(&EntityType::of::<Sample>())
    }

    #[test]
    fn test_affinity_mapping() {
        assert_eq!(column_affinity(FieldType::I8), Some(Affinity::Integer));
        assert_eq!(column_affinity(FieldType::Bool), Some(Affinity::Integer));
        assert_eq!(column_affinity(FieldType::F32), Some(Affinity::Real));
        assert_eq!(column_affinity(FieldType::Text), Some(Affinity::Text));
        assert_eq!(column_affinity(FieldType::Blob), Some(Affinity::Blob));
        assert_eq!(column_affinity(FieldType::Unsupported("Uuid")), None);
    }

    #[test]
    fn test_encode_skips_unset_generated_key_and_unsupported() {
        let values = encode(&sample(), &fields());
        let names: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["tiny", "small", "flag", "ratio", "score", "label", "payload"]
        );
        assert_eq!(values[2].1, SqlValue::Integer(1));
    }

    #[test]
    fn test_encode_keeps_assigned_generated_key() {
        let mut entity = sample();
        entity.id = 42;
        let values = encode(&entity, &fields());
        assert_eq!(values[0], ("id", SqlValue::Integer(42)));
    }

    #[test]
    fn test_normalize_narrows_widths() {
        assert_eq!(normalize(Value::Integer(300), FieldType::I8), Value::Integer(44));
        assert_eq!(normalize(Value::Bool(false), FieldType::Bool), Value::Integer(0));
        assert_eq!(normalize(Value::Integer(5), FieldType::F64), Value::Real(5.0));
        assert_eq!(normalize(Value::Null, FieldType::I32), Value::Null);
    }

    #[test]
    fn test_decode_coerces_storage_class() {
        assert_eq!(decode_ref(ValueRef::Text(b" 12 "), FieldType::I32), Value::Integer(12));
        assert_eq!(decode_ref(ValueRef::Integer(2), FieldType::Bool), Value::Bool(true));
        assert_eq!(decode_ref(ValueRef::Integer(7), FieldType::Text), Value::Text("7".into()));
        assert_eq!(decode_ref(ValueRef::Real(2.9), FieldType::I64), Value::Integer(2));
        assert_eq!(decode_ref(ValueRef::Null, FieldType::I64), Value::Null);
        assert_eq!(decode_ref(ValueRef::Text(b"abc"), FieldType::I64), Value::Integer(0));
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Sample (id INTEGER PRIMARY KEY AUTOINCREMENT, tiny INTEGER, \
             small INTEGER, flag INTEGER, ratio REAL, score REAL, label TEXT, payload BLOB);",
        )
        .unwrap();

        let fields = fields();
        let original = sample();
        let values = encode(&original, &fields);
        let columns: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
        let slots: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        conn.execute(
            &format!(
                "INSERT INTO Sample ({}) VALUES ({})",
                columns.join(", "),
                slots.join(", ")
            ),
            rusqlite::params_from_iter(values.iter().map(|(_, v)| v)),
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT * FROM Sample").unwrap();
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mapping = column_mapping(&names, &fields);
        let loaded: Sample = stmt
            .query_row([], |row| read_entity(row, &mapping))
            .unwrap();

        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.tiny, original.tiny);
        assert_eq!(loaded.small, original.small);
        assert_eq!(loaded.flag, original.flag);
        assert_eq!(loaded.ratio, original.ratio);
        assert_eq!(loaded.score, original.score);
        assert_eq!(loaded.label, original.label);
        assert_eq!(loaded.payload, original.payload);
        assert_eq!(loaded.extra, "");
        assert_eq!(loaded.state, EntityState::Stored);
    }

    #[test]
    fn test_row_set_lookup() {
        let rows = RowSet {
            columns: vec!["id".into(), "Name".into()],
            rows: vec![vec![Value::Integer(1), Value::from("Ann")]],
        };
        assert_eq!(rows.get(0, "name"), Some(&Value::from("Ann")));
        assert_eq!(rows.get(1, "name"), None);
        assert_eq!(rows.len(), 1);
    }
}
