//! Field descriptors.
//!
//! A [`FieldDef`] is what callers declare on a schema builder; a [`Field`]
//! is the frozen, named descriptor the built [`crate::Schema`] hands out.
//! Each field owns its typed validate/normalize/encode/decode logic, which
//! the record layer invokes uniformly through generic attribute dispatch.

use std::fmt;

use rho_types::Value;

use crate::codec::{self, CodecError};
use crate::error::{SchemaError, SchemaResult};

/// The wire/type kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    Text,
    Json,
    Time,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Text => "text",
            Self::Json => "json",
            Self::Time => "time",
        }
    }
}

/// Default-value policy for a field.
///
/// `Producer` holds a zero-argument function so defaults like "now" are
/// evaluated at construction time, not at declaration time. A declared
/// default of a falsy value (`0`, `""`, `false`) is still a default.
#[derive(Clone)]
pub enum FieldDefault {
    None,
    Value(Value),
    Producer(fn() -> Value),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Producer(_) => write!(f, "Producer(..)"),
        }
    }
}

/// A declared field, before it is named and frozen into a schema.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub(crate) kind: FieldKind,
    pub(crate) is_identity: bool,
    pub(crate) required: bool,
    pub(crate) allow_none: bool,
    pub(crate) default: FieldDefault,
}

impl FieldDef {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            is_identity: false,
            required: false,
            allow_none: true,
            default: FieldDefault::None,
        }
    }

    pub fn int() -> Self {
        Self::new(FieldKind::Int)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Bool)
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn json() -> Self {
        Self::new(FieldKind::Json)
    }

    pub fn time() -> Self {
        Self::new(FieldKind::Time)
    }

    /// Mark this field as the record type's identity.
    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    /// A required field fails validation when its value is none.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reject none values outright.
    pub fn deny_none(mut self) -> Self {
        self.allow_none = false;
        self
    }

    /// Static default, applied at instance construction when the field is
    /// absent.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Computed default: the producer runs once per construction that
    /// needs it.
    pub fn default_with(mut self, producer: fn() -> Value) -> Self {
        self.default = FieldDefault::Producer(producer);
        self
    }
}

/// A named, frozen field belonging to exactly one record type.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    def: FieldDef,
}

impl Field {
    pub(crate) fn new(name: impl Into<String>, def: FieldDef) -> Self {
        Self {
            name: name.into(),
            def,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.def.kind
    }

    pub fn is_identity(&self) -> bool {
        self.def.is_identity
    }

    pub fn required(&self) -> bool {
        self.def.required
    }

    pub fn allow_none(&self) -> bool {
        self.def.allow_none
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.def.default, FieldDefault::None)
    }

    /// Evaluate the field's default, if any.
    pub fn default(&self) -> Option<Value> {
        match &self.def.default {
            FieldDefault::None => None,
            FieldDefault::Value(v) => Some(v.clone()),
            FieldDefault::Producer(f) => Some(f()),
        }
    }

    /// Check a value against the field's allowed-type set and none policy.
    pub fn validate(&self, value: &Value) -> SchemaResult<()> {
        if value.is_none() {
            if self.def.required || !self.def.allow_none {
                return Err(SchemaError::Validation {
                    field: self.name.clone(),
                    reason: "none is not allowed".to_string(),
                });
            }
            return Ok(());
        }
        let ok = match self.def.kind {
            FieldKind::Int => matches!(value, Value::Int(_)),
            // Floats accept integer values; `normalize` converts them.
            FieldKind::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::Text => matches!(value, Value::Text(_)),
            FieldKind::Json => matches!(value, Value::Json(_)),
            FieldKind::Time => matches!(value, Value::Time(_)),
        };
        if ok {
            Ok(())
        } else {
            Err(SchemaError::Validation {
                field: self.name.clone(),
                reason: format!(
                    "{} is not in the allowed types for a {} field",
                    value.kind_name(),
                    self.def.kind.name()
                ),
            })
        }
    }

    /// Canonicalize a validated value so the codec round-trip law holds on
    /// what is actually stored (an integer assigned to a float field
    /// becomes a float before storage).
    pub fn normalize(&self, value: Value) -> Value {
        match (self.def.kind, value) {
            (FieldKind::Float, Value::Int(n)) => Value::Float(n as f64),
            (_, value) => value,
        }
    }

    /// Encode a value to its wire form. None encodes to `None` ("absent"),
    /// which the save engine turns into a hash-field deletion.
    pub fn encode(&self, value: &Value) -> SchemaResult<Option<String>> {
        if value.is_none() {
            return Ok(None);
        }
        codec::encode(self.def.kind, value)
            .map(Some)
            .map_err(|e| self.wrap_codec_error(e, true))
    }

    /// Decode a wire string into a native value.
    pub fn decode(&self, raw: &str) -> SchemaResult<Value> {
        codec::decode(self.def.kind, raw).map_err(|e| self.wrap_codec_error(e, false))
    }

    fn wrap_codec_error(&self, err: CodecError, encoding: bool) -> SchemaError {
        let reason = err.to_string();
        if encoding {
            SchemaError::Encode {
                field: self.name.clone(),
                reason,
            }
        } else {
            SchemaError::Decode {
                field: self.name.clone(),
                reason,
            }
        }
    }
}
