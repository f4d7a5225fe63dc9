use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The value that forms the unique key suffix for a record instance.
///
/// A record's composite store key is `"{prefix}:{identity}"`; the identity
/// is whatever was stored in the record's identity field, narrowed to the
/// kinds that make sense as a key suffix. Zero and other "falsy" values are
/// valid identities; only a none value or empty text is treated as missing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identity {
    Int(i64),
    Text(String),
}

impl Identity {
    /// Extract an identity from a field value.
    ///
    /// Returns `None` when the value cannot serve as a key suffix: an
    /// explicit none, empty text, or a non-scalar kind.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(Self::Int(*n)),
            Value::Text(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// The identity as a field value, for storing back onto a record.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::Int(*n),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl From<i64> for Identity {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Identity {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
