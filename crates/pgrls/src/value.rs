//! Literal values carried by conditions.

use chrono::{DateTime, Utc};

use crate::condition::Condition;

/// A value on the right-hand side of a comparison or inside a membership list.
///
/// Values are rendered through [`crate::escape::escape_value`], which is the
/// only place external data becomes SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value, rendered as a quoted literal.
    String(String),
    /// Timestamp, rendered as an ISO-8601 literal cast to `TIMESTAMP`.
    Timestamp(DateTime<Utc>),
    /// Array of values, rendered as `ARRAY[...]`.
    Array(Vec<Value>),
    /// Raw SQL emitted verbatim. The author is responsible for its safety.
    Raw(String),
    /// A nested condition or context expression, rendered via its own text.
    Condition(Box<Condition>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the nested condition.
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Value::Condition(c) => Some(c),
            _ => None,
        }
    }

    /// Get a description of the value type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Raw(_) => "raw",
            Value::Condition(_) => "condition",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Condition> for Value {
    fn from(v: Condition) -> Self {
        Value::Condition(Box::new(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Raw SQL escape hatch.
///
/// The text is emitted verbatim wherever the value is rendered.
pub fn raw(sql: impl Into<String>) -> Value {
    Value::Raw(sql.into())
}
