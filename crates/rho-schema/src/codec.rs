//! Per-kind wire codecs.
//!
//! The store holds hash field values as native strings; these functions map
//! between those strings and [`Value`]s according to the wire rules:
//! integers and floats as decimal text, booleans as `"1"`/`"0"`, text
//! passthrough, structured values as self-describing JSON, timestamps as
//! UTC-normalized RFC 3339. None values never reach a codec -- encoding
//! none means deleting the hash field, and a never-stored field is never
//! decoded.

use chrono::{DateTime, SecondsFormat, Utc};
use rho_types::Value;

use crate::field::FieldKind;

/// A codec-level failure, wrapped with field context by [`crate::Field`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("expected a {expected} value, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("malformed wire value: {0}")]
    Malformed(String),
}

/// Encode a non-none, validated value to its wire string.
pub fn encode(kind: FieldKind, value: &Value) -> Result<String, CodecError> {
    match (kind, value) {
        (FieldKind::Int, Value::Int(n)) => Ok(n.to_string()),
        (FieldKind::Float, Value::Float(x)) => Ok(x.to_string()),
        (FieldKind::Bool, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
        (FieldKind::Text, Value::Text(s)) => Ok(s.clone()),
        (FieldKind::Json, Value::Json(v)) => {
            serde_json::to_string(v).map_err(|e| CodecError::Malformed(e.to_string()))
        }
        (FieldKind::Time, Value::Time(t)) => {
            // Normalize to UTC and keep exactly the precision present.
            Ok(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        (kind, value) => Err(CodecError::TypeMismatch {
            expected: kind.name(),
            got: value.kind_name(),
        }),
    }
}

/// Decode a wire string back to a native value.
pub fn decode(kind: FieldKind, raw: &str) -> Result<Value, CodecError> {
    match kind {
        FieldKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| CodecError::Malformed(e.to_string())),
        FieldKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| CodecError::Malformed(e.to_string())),
        FieldKind::Bool => raw
            .parse::<i64>()
            .map(|n| Value::Bool(n != 0))
            .map_err(|e| CodecError::Malformed(e.to_string())),
        FieldKind::Text => Ok(Value::Text(raw.to_string())),
        FieldKind::Json => serde_json::from_str(raw)
            .map(Value::Json)
            .map_err(|e| CodecError::Malformed(e.to_string())),
        FieldKind::Time => DateTime::parse_from_rfc3339(raw)
            .map(|t| Value::Time(t.with_timezone(&Utc)))
            .map_err(|e| CodecError::Malformed(e.to_string())),
    }
}
