use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically typed field value.
///
/// Records hold their attribute data as `Value`s keyed by field name. The
/// variants mirror the field kinds the schema layer supports. `None` is a
/// first-class variant rather than an `Option` wrapper because an
/// explicitly-none field must be distinguishable from a field that was
/// never loaded at all (absence from the record's data map).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit absence. Encodes as a hash-field deletion, never as text.
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Structured data, stored as a self-describing JSON blob.
    Json(serde_json::Value),
    /// A timestamp, always normalized to UTC.
    Time(DateTime<Utc>),
}

impl Value {
    /// Returns `true` for the explicit-none variant.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Human-readable name of the variant, used in validation errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
            Self::Time(_) => "time",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Json(v) => write!(f, "Json({v})"),
            Self::Time(t) => write!(f, "Time({})", t.to_rfc3339()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::None,
        }
    }
}
