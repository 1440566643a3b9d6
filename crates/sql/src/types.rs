//! Driver value model and result types shared by every backend.

use anyhow::Result;
use base64ct::{Base64, Encoding};
use serde_json::Value;

/// A single SQL value as sent to, or read back from, a backend.
///
/// `None` payloads represent SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// Boolean value.
    Boolean(Option<bool>),
    /// 32-bit signed integer.
    Int32(Option<i32>),
    /// 64-bit signed integer.
    Int64(Option<i64>),
    /// 32-bit unsigned integer.
    Uint32(Option<u32>),
    /// 64-bit unsigned integer.
    Uint64(Option<u64>),
    /// 32-bit float.
    Float(Option<f32>),
    /// 64-bit float.
    Double(Option<f64>),
    /// Text.
    Str(Option<String>),
    /// Raw bytes.
    Binary(Option<Vec<u8>>),
    /// Date formatted as `%Y-%m-%d`.
    Date(Option<String>),
    /// Time of day formatted as `%H:%M:%S`.
    Time(Option<String>),
    /// Timestamp formatted as `%Y-%m-%d %H:%M:%S`.
    Timestamp(Option<String>),
}

impl DataType {
    /// Whether the value is SQL `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Boolean(None)
                | Self::Int32(None)
                | Self::Int64(None)
                | Self::Uint32(None)
                | Self::Uint64(None)
                | Self::Float(None)
                | Self::Double(None)
                | Self::Str(None)
                | Self::Binary(None)
                | Self::Date(None)
                | Self::Time(None)
                | Self::Timestamp(None)
        )
    }

    /// Project the value into JSON. Binary values are base64 encoded.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int32(Some(v)) => Value::Number((*v).into()),
            Self::Int64(Some(v)) => Value::Number((*v).into()),
            Self::Uint32(Some(v)) => Value::Number((*v).into()),
            Self::Uint64(Some(v)) => Value::Number((*v).into()),
            Self::Float(Some(v)) => {
                serde_json::Number::from_f64(f64::from(*v)).map_or(Value::Null, Value::Number)
            }
            Self::Double(Some(v)) => {
                serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number)
            }
            Self::Boolean(Some(v)) => Value::Bool(*v),
            Self::Str(Some(v))
            | Self::Date(Some(v))
            | Self::Time(Some(v))
            | Self::Timestamp(Some(v)) => Value::String(v.clone()),
            Self::Binary(Some(v)) => Value::String(Base64::encode_string(v)),
            Self::Int32(None)
            | Self::Int64(None)
            | Self::Uint32(None)
            | Self::Uint64(None)
            | Self::Float(None)
            | Self::Double(None)
            | Self::Str(None)
            | Self::Boolean(None)
            | Self::Date(None)
            | Self::Time(None)
            | Self::Timestamp(None)
            | Self::Binary(None) => Value::Null,
        }
    }
}

/// Column descriptor reported by a row cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    /// Column name as reported by the backend.
    pub name: String,

    /// Declared column type, when the backend knows it.
    pub decl_type: Option<String>,
}

impl Column {
    /// Create a column descriptor without a declared type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl_type: None,
        }
    }
}

/// A named cell in a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name.
    pub name: String,

    /// Cell value.
    pub value: DataType,
}

/// A single result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Zero-based position of the row in its result set.
    pub index: usize,

    /// Cells in column order.
    pub fields: Vec<Field>,
}

impl Row {
    /// Value of the first cell named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.value)
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows inserted, updated or deleted.
    pub rows_affected: u64,

    /// Identifier generated by the most recent insert, if any.
    pub last_insert_id: Option<i64>,
}

/// A sequential cursor over the rows returned by a query.
///
/// Only one row is current at a time. The cursor closes itself once the
/// last row has been passed and never yields rows after that.
#[derive(Debug, Default)]
pub struct Rows {
    columns: Vec<Column>,
    pending: std::vec::IntoIter<Row>,
    current: Option<Row>,
    closed: bool,
}

impl Rows {
    /// Create a cursor positioned before the first row.
    #[must_use]
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            pending: rows.into_iter(),
            current: None,
            closed: false,
        }
    }

    /// Columns reported for the result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Move to the next row, returning `false` once the rows are exhausted.
    pub fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.pending.next();
        if self.current.is_none() {
            self.close();
        }
        self.current.is_some()
    }

    /// The row the cursor is positioned on.
    #[must_use]
    pub const fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Release the cursor. Remaining rows are discarded.
    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.pending = Vec::new().into_iter();
    }

    /// Whether the cursor has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Helper function to create JSON output from rows returned by a query.
///
/// # Errors
///
/// Currently infallible; the signature leaves room for backends whose
/// values need fallible conversion.
pub fn into_json(rows: Vec<Row>) -> Result<Value> {
    let json_rows: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let mut map = serde_json::Map::new();
            for field in row.fields {
                map.insert(field.name, field.value.to_json());
            }
            Value::Object(map)
        })
        .collect();

    Ok(Value::Array(json_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, id: i64) -> Row {
        Row {
            index,
            fields: vec![Field {
                name: "id".to_string(),
                value: DataType::Int64(Some(id)),
            }],
        }
    }

    #[test]
    fn cursor_closes_when_exhausted() {
        let mut rows = Rows::new(vec![Column::new("id")], vec![row(0, 1), row(1, 2)]);
        assert!(rows.current().is_none());

        assert!(rows.advance());
        assert_eq!(rows.current().unwrap().get("id"), Some(&DataType::Int64(Some(1))));
        assert!(rows.advance());
        assert!(!rows.advance());
        assert!(rows.is_closed());
        assert!(!rows.advance());
        assert_eq!(rows.columns()[0].name, "id");
    }

    #[test]
    fn explicit_close_discards_rows() {
        let mut rows = Rows::new(vec![], vec![row(0, 1)]);
        rows.close();
        assert!(!rows.advance());
    }

    #[test]
    fn null_detection() {
        assert!(DataType::Str(None).is_null());
        assert!(DataType::Timestamp(None).is_null());
        assert!(!DataType::Int64(Some(0)).is_null());
    }

    #[test]
    fn json_projection() {
        let json = into_json(vec![Row {
            index: 0,
            fields: vec![
                Field {
                    name: "name".to_string(),
                    value: DataType::Str(Some("alice".to_string())),
                },
                Field {
                    name: "blob".to_string(),
                    value: DataType::Binary(Some(b"hi".to_vec())),
                },
                Field {
                    name: "missing".to_string(),
                    value: DataType::Int32(None),
                },
            ],
        }])
        .unwrap();

        assert_eq!(json, serde_json::json!([{"name": "alice", "blob": "aGk=", "missing": null}]));
    }
}
