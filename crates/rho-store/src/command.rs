//! The command/reply vocabulary of the store boundary.
//!
//! A record maps to one hash entry; every operation the mapping engine
//! needs is expressible as one of these commands. Batches of commands are
//! executed as a single pipelined round trip, and the same vocabulary is
//! queued inside optimistic transactions.

use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};

/// One store operation against a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read every field of the hash at `key`.
    HashGetAll { key: String },
    /// Read a subset of fields from the hash at `key`.
    HashGet { key: String, fields: Vec<String> },
    /// Set (create or overwrite) multiple fields of the hash at `key`.
    HashSet {
        key: String,
        entries: Vec<(String, String)>,
    },
    /// Delete multiple fields from the hash at `key`.
    HashDel { key: String, fields: Vec<String> },
    /// Delete the whole key.
    Delete { key: String },
    /// Check whether `key` exists.
    Exists { key: String },
    /// Set a time-to-live on `key`, in seconds. A TTL of zero deletes the
    /// key immediately.
    Expire { key: String, ttl_secs: u64 },
}

impl Command {
    /// The key this command addresses.
    pub fn key(&self) -> &str {
        match self {
            Self::HashGetAll { key }
            | Self::HashGet { key, .. }
            | Self::HashSet { key, .. }
            | Self::HashDel { key, .. }
            | Self::Delete { key }
            | Self::Exists { key }
            | Self::Expire { key, .. } => key,
        }
    }

    /// Short wire-style name, used for instrumentation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HashGetAll { .. } => "hgetall",
            Self::HashGet { .. } => "hget",
            Self::HashSet { .. } => "hset",
            Self::HashDel { .. } => "hdel",
            Self::Delete { .. } => "del",
            Self::Exists { .. } => "exists",
            Self::Expire { .. } => "expire",
        }
    }

    /// Returns `true` if executing this command can modify the key.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::HashSet { .. } | Self::HashDel { .. } | Self::Delete { .. } | Self::Expire { .. }
        )
    }
}

/// The per-command result of a pipelined batch or committed transaction.
///
/// Reply slots correspond positionally to the commands that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Whole-hash read. `None` when the key is absent.
    Hash(Option<HashMap<String, String>>),
    /// Field-subset read. The outer `None` means the whole key is absent,
    /// which is distinguishable from a present key whose requested fields
    /// are individually absent (`Some` of per-field `None`s).
    Fields(Option<Vec<Option<String>>>),
    /// Existence check or whole-key delete result.
    Bool(bool),
    /// Number of hash fields removed by a `HashDel`.
    Count(u64),
    /// Acknowledgement for writes with no meaningful payload.
    Unit,
}

impl Reply {
    fn variant_name(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Fields(_) => "fields",
            Self::Bool(_) => "bool",
            Self::Count(_) => "count",
            Self::Unit => "unit",
        }
    }

    /// Unwrap a whole-hash read reply.
    pub fn into_hash(self) -> StoreResult<Option<HashMap<String, String>>> {
        match self {
            Self::Hash(h) => Ok(h),
            other => Err(unexpected("hash", &other)),
        }
    }

    /// Unwrap a field-subset read reply.
    pub fn into_fields(self) -> StoreResult<Option<Vec<Option<String>>>> {
        match self {
            Self::Fields(f) => Ok(f),
            other => Err(unexpected("fields", &other)),
        }
    }

    /// Unwrap an existence/delete reply.
    pub fn into_bool(self) -> StoreResult<bool> {
        match self {
            Self::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }
}

fn unexpected(expected: &'static str, got: &Reply) -> StoreError {
    StoreError::UnexpectedReply {
        expected,
        got: got.variant_name(),
    }
}
