/// Errors from schema definition, validation, and field codecs.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A record type was declared with an unusable name.
    #[error("invalid record type name: {0:?}")]
    InvalidName(String),

    /// Two declared (or synthesized) fields share a name.
    #[error("duplicate field {field} on record type {record_type}")]
    DuplicateField { record_type: String, field: String },

    /// More than one field was marked as the identity.
    #[error("record type {0} declares more than one identity field")]
    MultipleIdentityFields(String),

    /// No identity field was declared and the implicit name `id` is
    /// already taken by a non-identity field.
    #[error("record type {0} declares no identity field and the name 'id' is already taken")]
    IdentityUnresolvable(String),

    /// A value failed a field's allowed-type or none-policy check.
    #[error("validation failed for field {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A value could not be encoded to its wire representation.
    #[error("cannot encode field {field}: {reason}")]
    Encode { field: String, reason: String },

    /// A wire value could not be decoded back to a native value.
    #[error("cannot decode field {field}: {reason}")]
    Decode { field: String, reason: String },

    /// A field name was used that the record type does not declare.
    #[error("unknown field {field} on record type {record_type}")]
    UnknownField { record_type: String, field: String },

    /// A record type name could not be resolved in the registry.
    #[error("unknown record type: {0}")]
    UnknownType(String),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
