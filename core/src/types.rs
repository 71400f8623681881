//! Value and type definitions for schema-synchronizing writes.
//!
//! [`ColumnValue`] is the closed set of scalars a caller may write,
//! [`StorageType`] is the closed set of column types the write path can
//! create, and [`Value`]/[`Row`] describe what the read path hands back.
//! Values are constructed once at the transport boundary (for example from
//! JSON via [`ColumnValue::from`]) so the core never inspects an open-ended
//! dynamic type.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Column type inferred from a written value.
///
/// [`Invalid`](StorageType::Invalid) is a sentinel for values that have no
/// corresponding engine type. It is never persisted: statement builders
/// reject it before any DDL is generated.
///
/// # Examples
///
/// ```
/// use autotable_core::{ColumnValue, StorageType};
///
/// assert_eq!(ColumnValue::from(1.5).storage_type(), StorageType::Float64);
/// assert_eq!(ColumnValue::from("1.5").storage_type(), StorageType::Text);
/// assert!(!ColumnValue::Null.storage_type().is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageType {
    /// No corresponding engine type (the default).
    #[default]
    Invalid,
    /// UTF-8 text.
    Text,
    /// 64-bit floating point.
    Float64,
    /// Signed integer.
    Integer,
    /// Boolean.
    Boolean,
}

impl StorageType {
    /// Returns `true` unless this is [`StorageType::Invalid`].
    pub fn is_valid(self) -> bool {
        self != StorageType::Invalid
    }

    /// Lower-case name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            StorageType::Invalid => "invalid",
            StorageType::Text => "text",
            StorageType::Float64 => "float64",
            StorageType::Integer => "integer",
            StorageType::Boolean => "boolean",
        }
    }
}

/// A scalar supplied by a caller for one column of an insert.
///
/// Each variant maps to exactly one [`StorageType`] (see [`infer_type`]).
/// There is no coercion between families: `Text("42")` is text, never a
/// number.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// 32- or 64-bit float, widened to `f64`.
    Float(f64),
    /// Any signed integer width, widened to `i64`.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Explicit null. Binds as SQL `NULL` but cannot define a column type.
    Null,
    /// A value with no scalar representation (array, object, out-of-range
    /// number). The payload names what was supplied.
    Unsupported(&'static str),
}

impl ColumnValue {
    /// Infers the storage type of this value. Shorthand for [`infer_type`].
    pub fn storage_type(&self) -> StorageType {
        infer_type(self)
    }

    /// Short description of the value's family, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ColumnValue::Float(_) => "float",
            ColumnValue::Integer(_) => "integer",
            ColumnValue::Text(_) => "text",
            ColumnValue::Boolean(_) => "boolean",
            ColumnValue::Null => "null",
            ColumnValue::Unsupported(kind) => *kind,
        }
    }
}

/// Maps a value to its storage type.
///
/// Pure and total: floats map to [`StorageType::Float64`], integers to
/// [`StorageType::Integer`], text to [`StorageType::Text`], booleans to
/// [`StorageType::Boolean`], and everything else to
/// [`StorageType::Invalid`].
pub fn infer_type(value: &ColumnValue) -> StorageType {
    match value {
        ColumnValue::Float(_) => StorageType::Float64,
        ColumnValue::Integer(_) => StorageType::Integer,
        ColumnValue::Text(_) => StorageType::Text,
        ColumnValue::Boolean(_) => StorageType::Boolean,
        ColumnValue::Null | ColumnValue::Unsupported(_) => StorageType::Invalid,
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Float(value)
    }
}

impl From<f32> for ColumnValue {
    fn from(value: f32) -> Self {
        ColumnValue::Float(f64::from(value))
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<i16> for ColumnValue {
    fn from(value: i16) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<i8> for ColumnValue {
    fn from(value: i8) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Boolean(value)
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl<T> From<Option<T>> for ColumnValue
where
    T: Into<ColumnValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ColumnValue::Null,
        }
    }
}

/// Converts a decoded JSON value at the transport boundary.
///
/// Integral numbers that fit in `i64` become [`ColumnValue::Integer`], all
/// other finite numbers become [`ColumnValue::Float`]. Unsigned integers
/// above `i64::MAX`, arrays and objects become
/// [`ColumnValue::Unsupported`].
impl From<&serde_json::Value> for ColumnValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => ColumnValue::Null,
            Json::Bool(b) => ColumnValue::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ColumnValue::Integer(i)
                } else if n.is_u64() {
                    ColumnValue::Unsupported("unsigned integer out of range")
                } else {
                    match n.as_f64() {
                        Some(f) => ColumnValue::Float(f),
                        None => ColumnValue::Unsupported("number"),
                    }
                }
            }
            Json::String(s) => ColumnValue::Text(s.clone()),
            Json::Array(_) => ColumnValue::Unsupported("array"),
            Json::Object(_) => ColumnValue::Unsupported("object"),
        }
    }
}

/// A scalar read back from the engine.
///
/// The variant is chosen by the engine's column metadata at read time; the
/// core applies no further coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

/// One result row: column name to value, in the order the query produced
/// the columns.
///
/// Serializes as a JSON object with keys in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Creates a row from `(column, value)` pairs in query order.
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Looks up a value by column name.
    ///
    /// When a query yields duplicate column names the first one wins.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in query order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
