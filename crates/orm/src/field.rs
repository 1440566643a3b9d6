//! Per-field conversion between driver values, query values and JSON.
//!
//! Every mapped entity field implements [`FieldValue`]. Implementations are
//! provided for the standard scalar types, `chrono` timestamps, JSON values,
//! [`Option`] (nullable columns) and [`Json`] (JSON-encoded columns).
//! Driver conversions are lenient: `SQLite` reports booleans and integers as
//! `Int64` and timestamps as text, so numeric and textual forms are accepted
//! wherever they parse.
//!
//! A SQL `NULL` scanned into a non-nullable field resets it to its default
//! value.

use anyhow::{Context, Result, anyhow, bail};
use base64ct::{Base64, Encoding};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use strata_sql::DataType;

use crate::value::{TIMESTAMP_FORMAT, Value};

/// Conversion capability of a mapped entity field.
pub trait FieldValue: Send + Sync {
    /// Assign from a driver value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to the field type.
    fn scan(&mut self, value: &DataType) -> Result<()>;

    /// Assign from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to the field type.
    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()>;

    /// Assign `column` somewhere inside a nested entity.
    ///
    /// Returns `Ok(false)` if no nested field maps `column`. Scalars never
    /// nest.
    ///
    /// # Errors
    ///
    /// Returns an error if a matching nested field rejects the value.
    fn assign_nested(&mut self, _column: &str, _value: &DataType) -> Result<bool> {
        Ok(false)
    }

    /// JSON counterpart of [`FieldValue::assign_nested`].
    ///
    /// # Errors
    ///
    /// Returns an error if a matching nested field rejects the value.
    fn assign_nested_json(&mut self, _column: &str, _value: &serde_json::Value) -> Result<bool> {
        Ok(false)
    }

    /// The value written to the column.
    fn to_value(&self) -> Value;

    /// Plain JSON projection, with encoded fields unserialized.
    fn to_json(&self) -> serde_json::Value;

    /// Whether the field holds its type's zero value.
    fn is_zero(&self) -> bool;

    /// Whether the field is an absent nullable value.
    fn is_null(&self) -> bool {
        false
    }

    /// Whether the field stores an encoded document, so sequence values are
    /// assigned whole rather than by first element.
    fn is_encoded(&self) -> bool {
        false
    }
}

pub(crate) fn text(value: &DataType) -> Option<String> {
    match value {
        DataType::Str(v) | DataType::Date(v) | DataType::Time(v) | DataType::Timestamp(v) => {
            v.clone()
        }
        DataType::Binary(v) => v.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        DataType::Boolean(v) => v.map(|b| b.to_string()),
        DataType::Int32(v) => v.map(|n| n.to_string()),
        DataType::Int64(v) => v.map(|n| n.to_string()),
        DataType::Uint32(v) => v.map(|n| n.to_string()),
        DataType::Uint64(v) => v.map(|n| n.to_string()),
        DataType::Float(v) => v.map(|n| n.to_string()),
        DataType::Double(v) => v.map(|n| n.to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &DataType) -> Result<Option<i128>> {
    Ok(match value {
        DataType::Boolean(v) => v.map(i128::from),
        DataType::Int32(v) => v.map(i128::from),
        DataType::Int64(v) => v.map(i128::from),
        DataType::Uint32(v) => v.map(i128::from),
        DataType::Uint64(v) => v.map(i128::from),
        DataType::Float(Some(v)) if v.fract() == 0.0 => Some(*v as i128),
        DataType::Double(Some(v)) if v.fract() == 0.0 => Some(*v as i128),
        DataType::Float(None) | DataType::Double(None) => None,
        DataType::Float(Some(v)) => bail!("expected integer data type, got {v}"),
        DataType::Double(Some(v)) => bail!("expected integer data type, got {v}"),
        other => match text(other) {
            Some(raw) => Some(
                raw.trim().parse::<i128>().with_context(|| format!("unsupported integer: {raw}"))?,
            ),
            None => None,
        },
    })
}

#[allow(clippy::cast_precision_loss)]
fn as_float(value: &DataType) -> Result<Option<f64>> {
    Ok(match value {
        DataType::Float(v) => v.map(f64::from),
        DataType::Double(v) => *v,
        DataType::Int32(v) => v.map(f64::from),
        DataType::Int64(v) => v.map(|n| n as f64),
        DataType::Uint32(v) => v.map(f64::from),
        DataType::Uint64(v) => v.map(|n| n as f64),
        other => match text(other) {
            Some(raw) => {
                Some(raw.trim().parse::<f64>().with_context(|| format!("unsupported float: {raw}"))?)
            }
            None => None,
        },
    })
}

fn as_bool(value: &DataType) -> Result<Option<bool>> {
    match value {
        DataType::Boolean(v) => Ok(*v),
        DataType::Str(Some(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Some(true)),
            "false" | "f" | "0" => Ok(Some(false)),
            _ => bail!("unsupported boolean: {raw}"),
        },
        other => Ok(as_integer(other).context("expected boolean data type")?.map(|n| n != 0)),
    }
}

fn parse_naive(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(parsed);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed);
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(parsed.and_time(chrono::NaiveTime::MIN));
    }
    bail!("unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format")
}

fn as_timestamp(value: &DataType) -> Result<Option<NaiveDateTime>> {
    match value {
        DataType::Int32(_) | DataType::Int64(_) | DataType::Uint32(_) | DataType::Uint64(_) => {
            let Some(secs) = as_integer(value)? else {
                return Ok(None);
            };
            let secs = i64::try_from(secs).context("timestamp out of range")?;
            DateTime::from_timestamp(secs, 0)
                .map(|dt| Some(dt.naive_utc()))
                .ok_or_else(|| anyhow!("timestamp out of range: {secs}"))
        }
        other => text(other).map(|raw| parse_naive(&raw)).transpose(),
    }
}

/// Convert a JSON scalar into the driver value model. Arrays and objects
/// become their JSON text.
pub(crate) fn json_to_data(value: &serde_json::Value) -> DataType {
    match value {
        serde_json::Value::Null => DataType::Str(None),
        serde_json::Value::Bool(b) => DataType::Boolean(Some(*b)),
        serde_json::Value::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_u64().map_or_else(
                    || DataType::Double(n.as_f64()),
                    |u| DataType::Uint64(Some(u)),
                )
            },
            |i| DataType::Int64(Some(i)),
        ),
        serde_json::Value::String(s) => DataType::Str(Some(s.clone())),
        other => DataType::Str(Some(other.to_string())),
    }
}

macro_rules! integer_field {
    ($($t:ty),*) => {
        $(
            impl FieldValue for $t {
                fn scan(&mut self, value: &DataType) -> Result<()> {
                    *self = match as_integer(value)? {
                        Some(n) => <$t>::try_from(n)
                            .with_context(|| format!("{n} out of range for {}", stringify!($t)))?,
                        None => 0,
                    };
                    Ok(())
                }

                fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
                    self.scan(&json_to_data(value))
                }

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn to_json(&self) -> serde_json::Value {
                    serde_json::Value::from(*self)
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

integer_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_float(value)?.unwrap_or_default();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(*self)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl FieldValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_float(value)?.unwrap_or_default() as Self;
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(*self)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl FieldValue for bool {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_bool(value)?.unwrap_or_default();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Bool(*self)
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl FieldValue for String {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = text(value).unwrap_or_default();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        *self = match value {
            serde_json::Value::Null => Self::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(())
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.clone())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl FieldValue for Vec<u8> {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = match value {
            DataType::Binary(v) => v.clone().unwrap_or_default(),
            other => text(other).map(String::into_bytes).unwrap_or_default(),
        };
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        *self = match value {
            serde_json::Value::Null => Self::new(),
            serde_json::Value::String(s) => {
                Base64::decode_vec(s).unwrap_or_else(|_| s.as_bytes().to_vec())
            }
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| anyhow!("expected byte, got {item}"))
                })
                .collect::<Result<_>>()?,
            other => bail!("expected binary data, got {other}"),
        };
        Ok(())
    }

    fn to_value(&self) -> Value {
        Value::from(self.as_slice())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(Base64::encode_string(self))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn is_encoded(&self) -> bool {
        true
    }
}

impl FieldValue for NaiveDateTime {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_timestamp(value)?.unwrap_or_default();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.format(TIMESTAMP_FORMAT).to_string())
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for DateTime<Utc> {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_timestamp(value)?.unwrap_or_default().and_utc();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(self.naive_utc())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.to_rfc3339())
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for NaiveDate {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = as_timestamp(value)?.map(|ts| ts.date()).unwrap_or_default();
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.scan(&json_to_data(value))
    }

    fn to_value(&self) -> Value {
        Value::String(self.format("%Y-%m-%d").to_string())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.format("%Y-%m-%d").to_string())
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for serde_json::Value {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        *self = match value {
            DataType::Str(Some(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Self::String(raw.clone()))
            }
            DataType::Binary(Some(bytes)) => serde_json::from_slice(bytes)?,
            other => other.to_json(),
        };
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.clone_from(value);
        Ok(())
    }

    fn to_value(&self) -> Value {
        if self.is_null() { Value::Null } else { Value::String(self.to_string()) }
    }

    fn to_json(&self) -> serde_json::Value {
        self.clone()
    }

    fn is_zero(&self) -> bool {
        Self::is_null(self)
    }

    fn is_encoded(&self) -> bool {
        true
    }
}

impl<T: FieldValue + Default> FieldValue for Option<T> {
    fn scan(&mut self, value: &DataType) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan(value)?;
        *self = Some(inner);
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan_json(value)?;
        *self = Some(inner);
        Ok(())
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn to_json(&self) -> serde_json::Value {
        self.as_ref().map_or(serde_json::Value::Null, FieldValue::to_json)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }

    // decided by the type, so an unset field still takes a whole document
    fn is_encoded(&self) -> bool {
        T::default().is_encoded()
    }
}

/// A column holding a JSON document, decoded into `T`.
///
/// The column value is the serialized document; the JSON projection is the
/// decoded value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwrap the decoded document.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> FieldValue for Json<T>
where
    T: Serialize + DeserializeOwned + Default + PartialEq + Send + Sync,
{
    fn scan(&mut self, value: &DataType) -> Result<()> {
        self.0 = match value {
            DataType::Str(Some(raw)) => {
                serde_json::from_str(raw).context("invalid JSON document")?
            }
            DataType::Binary(Some(bytes)) => {
                serde_json::from_slice(bytes).context("invalid JSON document")?
            }
            other if other.is_null() => T::default(),
            other => serde_json::from_value(other.to_json()).context("invalid JSON document")?,
        };
        Ok(())
    }

    fn scan_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.0 = match serde_json::from_value(value.clone()) {
            Ok(decoded) => decoded,
            Err(err) => match value {
                serde_json::Value::String(raw) => {
                    serde_json::from_str(raw).context("invalid JSON document")?
                }
                _ => return Err(err).context("invalid JSON document"),
            },
        };
        Ok(())
    }

    fn to_value(&self) -> Value {
        serde_json::to_string(&self.0).map_or(Value::Null, Value::String)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }

    fn is_zero(&self) -> bool {
        self.0 == T::default()
    }

    fn is_encoded(&self) -> bool {
        true
    }
}
