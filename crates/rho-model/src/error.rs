use rho_schema::SchemaError;
use rho_store::StoreError;

/// Errors from the mapping engine.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The requested identity is absent and the call's missing-policy says
    /// that is an error.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// A create-time collision: the key already exists, detected either
    /// pre-flight or via an optimistic-transaction conflict.
    #[error("record already exists: {key}")]
    AlreadyExists { key: String },

    /// Save, delete, or key derivation was attempted with no identity set.
    #[error("record type {0} has no identity value set")]
    MissingIdentity(String),

    /// Validation, codec, or type-resolution failure from the schema layer.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Failure from the backing store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for mapping-engine operations.
pub type ModelResult<T> = Result<T, ModelError>;
