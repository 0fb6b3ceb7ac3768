//! Field values and rows
//!
//! Backend-neutral representations of column values. Every backend hands
//! rows back as [`Row`]; typed models decode from it once.

use crate::database::schema::ScalarType;
use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use std::fmt;

/// A single column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// SQL NULL
    Null,
    /// BOOLEAN
    Bool(bool),
    /// BIGINT (smaller integer columns widen into this)
    BigInt(i64),
    /// TEXT / VARCHAR
    Text(String),
    /// TIMESTAMPTZ
    Timestamp(DateTime<Utc>),
    /// One-dimensional array of scalars
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Scalar type of this value, if it is a non-null scalar
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            FieldValue::Bool(_) => Some(ScalarType::Boolean),
            FieldValue::BigInt(_) => Some(ScalarType::BigInt),
            FieldValue::Text(_) => Some(ScalarType::Text),
            FieldValue::Timestamp(_) => Some(ScalarType::Timestamp),
            FieldValue::Null | FieldValue::Array(_) => None,
        }
    }

    /// Human readable type name, used in validation messages
    pub fn type_name(&self) -> String {
        match self {
            FieldValue::Null => "NULL".to_string(),
            FieldValue::Array(items) => {
                let elem = items
                    .iter()
                    .find(|v| !v.is_null())
                    .map(|v| v.type_name())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                format!("{}[]", elem)
            }
            scalar => scalar
                .scalar_type()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }
    }

    /// Whether this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Borrow as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow as str
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow as array
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::BigInt(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::BigInt(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::BigInt(i64::from(v))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion out of a [`FieldValue`], used when decoding rows into models
pub trait FromField: Sized {
    /// Name of the expected type, for decode errors
    const EXPECTED: &'static str;

    /// Convert, returning None on a type mismatch
    fn from_field(value: &FieldValue) -> Option<Self>;
}

impl FromField for bool {
    const EXPECTED: &'static str = "BOOLEAN";

    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromField for i64 {
    const EXPECTED: &'static str = "BIGINT";

    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromField for String {
    const EXPECTED: &'static str = "TEXT";

    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromField for DateTime<Utc> {
    const EXPECTED: &'static str = "TIMESTAMPTZ";

    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: FromField> FromField for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_field(value: &FieldValue) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_field(value).map(Some)
        }
    }
}

impl<T: FromField> FromField for Vec<T> {
    const EXPECTED: &'static str = "ARRAY";

    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            // A NULL array column reads as empty
            FieldValue::Null => Some(Vec::new()),
            FieldValue::Array(items) => items.iter().map(T::from_field).collect(),
            _ => None,
        }
    }
}

/// One row as returned by a backend, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, FieldValue)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing an existing value in place
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Decode a column into a typed value
    pub fn decode<T: FromField>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DatabaseError::new(format!("row has no column '{}'", column)))?;
        T::from_field(value)
            .ok_or_else(|| DatabaseError::decode(column, T::EXPECTED, value.type_name()).into())
    }

    /// First column value, used by `fetchval`
    pub fn first(&self) -> Option<&FieldValue> {
        self.columns.first().map(|(_, value)| value)
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over (column, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
