//! Value model and the coercions that build it from native Rust values.
//!
//! Three coercions are used by the condition and query builders:
//!
//! - [`Operand`] (left side): strings become [`Value::Ident`], so bare column
//!   names need no wrapping. Everything else is coerced as a right-side value.
//! - [`From`] / [`Into<Value>`] (right side): strings become string literals,
//!   numbers, booleans and timestamps become literals, `None` becomes `NULL`,
//!   and query builders and raw fragments pass through.
//! - [`IntoList`] (`IN` operands): sequences become [`Value::List`] and a
//!   query builder becomes a subquery.
//!
//! Types with no coercion do not compile. Custom types opt in by implementing
//! `From<T> for Value`; types that only have a textual form can use
//! [`Value::display`].

use std::fmt::Display;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use strata_sql::DataType;

use crate::error::{Error, Result};
use crate::query::QueryBuilder;

/// Format used for timestamp literals.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A literal or reference in the query AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unquoted SQL name (column, table, `*`, `table.column`).
    Ident(String),
    /// String literal.
    String(String),
    /// Signed integer literal.
    Int(i64),
    /// Unsigned integer literal wider than `i64` allows.
    UInt(u64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// Timestamp literal.
    Timestamp(NaiveDateTime),
    /// Binary literal, bound unchanged.
    Bytes(Vec<u8>),
    /// SQL `NULL`.
    Null,
    /// Comma separated list of values.
    List(Vec<Value>),
    /// Raw SQL text with its own positional arguments.
    Raw(Raw),
    /// Nested query, aliased with the builder's alias when set.
    Subquery(Box<QueryBuilder>),
}

/// Raw SQL text passed through verbatim, with positional arguments for any
/// placeholders it contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raw {
    /// SQL text.
    pub sql: String,

    /// Arguments bound to placeholders in `sql`.
    pub args: Vec<Value>,
}

impl Raw {
    /// Bind an argument to the next placeholder in the fragment.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Create a raw SQL fragment.
#[must_use]
pub fn raw(sql: impl Into<String>) -> Raw {
    Raw {
        sql: sql.into(),
        args: Vec::new(),
    }
}

/// Create an identifier value.
#[must_use]
pub fn ident(name: impl Into<String>) -> Value {
    Value::Ident(name.into())
}

/// Create a `table.field` identifier.
#[must_use]
pub fn table_field(table: &str, field: &str) -> Value {
    Value::Ident(format!("{table}.{field}"))
}

impl Value {
    /// String literal from any type with a textual form.
    #[must_use]
    pub fn display(value: &impl Display) -> Self {
        Self::String(value.to_string())
    }

    /// Check the value's construction invariants.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty identifier or raw fragment, including
    /// inside lists.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Ident(name) if name.is_empty() => Err(Error::EmptyIdentifier),
            Self::Raw(raw) if raw.sql.trim().is_empty() => Err(Error::EmptyRaw),
            Self::List(items) => items.iter().try_for_each(Self::validate),
            _ => Ok(()),
        }
    }

    /// Whether the value is `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Int)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::UInt(value), Self::Int)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::UInt(value as u64), Self::Int)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::String(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Timestamp(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(value: DateTime<Tz>) -> Self {
        Self::Timestamp(value.naive_utc())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<QueryBuilder> for Value {
    fn from(value: QueryBuilder) -> Self {
        Self::Subquery(Box::new(value))
    }
}

impl From<Raw> for Value {
    fn from(value: Raw) -> Self {
        Self::Raw(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(s) => Self::String(s),
            other => Self::String(other.to_string()),
        }
    }
}

impl From<DataType> for Value {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Boolean(Some(v)) => Self::Bool(v),
            DataType::Int32(Some(v)) => Self::Int(i64::from(v)),
            DataType::Int64(Some(v)) => Self::Int(v),
            DataType::Uint32(Some(v)) => Self::Int(i64::from(v)),
            DataType::Uint64(Some(v)) => Self::from(v),
            DataType::Float(Some(v)) => Self::Float(f64::from(v)),
            DataType::Double(Some(v)) => Self::Float(v),
            DataType::Str(Some(v))
            | DataType::Date(Some(v))
            | DataType::Time(Some(v))
            | DataType::Timestamp(Some(v)) => Self::String(v),
            DataType::Binary(Some(v)) => Self::from(v),
            _ => Self::Null,
        }
    }
}

/// Left-side coercion: strings name columns, everything else is a literal.
pub trait Operand {
    /// Convert into a left-hand value.
    fn into_left(self) -> Value;
}

impl Operand for &str {
    fn into_left(self) -> Value {
        Value::Ident(self.to_string())
    }
}

impl Operand for String {
    fn into_left(self) -> Value {
        Value::Ident(self)
    }
}

impl Operand for &String {
    fn into_left(self) -> Value {
        Value::Ident(self.clone())
    }
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(
            impl Operand for $t {
                fn into_left(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

literal_operand!(
    Value, Raw, QueryBuilder, DataType, bool, char, f32, f64, i8, i16, i32, i64, isize, u8, u16,
    u32, u64, usize, NaiveDate, NaiveDateTime
);

impl<Tz: TimeZone> Operand for DateTime<Tz> {
    fn into_left(self) -> Value {
        Value::from(self)
    }
}

impl<T: Into<Value>> Operand for Option<T> {
    fn into_left(self) -> Value {
        Value::from(self)
    }
}

/// Coercion for the right-hand side of `IN`.
pub trait IntoList {
    /// Convert into a list or subquery value.
    fn into_list(self) -> Value;
}

impl<T: Into<Value>> IntoList for Vec<T> {
    fn into_list(self) -> Value {
        Value::List(self.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> IntoList for [T; N] {
    fn into_list(self) -> Value {
        Value::List(self.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> IntoList for &[T] {
    fn into_list(self) -> Value {
        Value::List(self.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> IntoList for &Vec<T> {
    fn into_list(self) -> Value {
        self.as_slice().into_list()
    }
}

impl IntoList for QueryBuilder {
    fn into_list(self) -> Value {
        Value::Subquery(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn left_side_strings_are_identifiers() {
        assert_eq!("age".into_left(), Value::Ident("age".to_string()));
        assert_eq!(String::from("users.id").into_left(), Value::Ident("users.id".to_string()));
        assert_eq!(18_i32.into_left(), Value::Int(18));
    }

    #[test]
    fn right_side_literals() {
        assert_eq!(Value::from("x"), Value::String("x".to_string()));
        assert_eq!(Value::from(7_u8), Value::Int(7));
        assert_eq!(Value::from(u64::MAX), Value::UInt(u64::MAX));
        assert_eq!(Value::from(3_u64), Value::Int(3));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(2.5_f32)), Value::Float(2.5));
        assert_eq!(Value::from(vec![0xff_u8, 0x00]), Value::Bytes(vec![0xff, 0x00]));
        assert_eq!(Value::display(&42), Value::String("42".to_string()));
    }

    #[test]
    fn timestamps_normalize_to_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let Value::Timestamp(naive) = Value::from(ts) else {
            panic!("expected timestamp");
        };
        assert_eq!(naive.format(TIMESTAMP_FORMAT).to_string(), "2024-03-01 12:30:00");
    }

    #[test]
    fn list_coercion() {
        assert_eq!(
            vec!["A", "B"].into_list(),
            Value::List(vec![Value::String("A".to_string()), Value::String("B".to_string())])
        );
        assert_eq!([1, 2].into_list(), Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert!(matches!(QueryBuilder::new().into_list(), Value::Subquery(_)));
    }

    #[test]
    fn validation() {
        ident("").validate().unwrap_err();
        Value::Raw(raw("  ")).validate().unwrap_err();
        Value::List(vec![ident("a"), ident("")]).validate().unwrap_err();
        ident("a").validate().unwrap();
        Value::Raw(raw("NOW()")).validate().unwrap();
    }

    #[test]
    fn driver_values_resolve() {
        assert_eq!(Value::from(DataType::Int32(Some(4))), Value::Int(4));
        assert_eq!(Value::from(DataType::Str(None)), Value::Null);
        assert_eq!(
            Value::from(serde_json::json!({"a": 1})),
            Value::String(r#"{"a":1}"#.to_string())
        );
    }
}
