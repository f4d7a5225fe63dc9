//! The fetch engine: batched, optionally partial record loads.
//!
//! Any number of identities is served by exactly one pipelined round trip,
//! one read command per identity, with reply slots mapped back to their
//! identities positionally. Missing identities are handled per the call's
//! policy: an error, a silent `None` slot, or a substitute record built by
//! the registered creation hook.

use rho_store::Command;
use rho_types::{Identity, Value};

use crate::client::Model;
use crate::error::{ModelError, ModelResult};
use crate::record::Record;

/// Per-call fetch options.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    fields: Option<Vec<String>>,
    allow_create: bool,
    raise_missing: Option<bool>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load only the named fields (plus the identity, always). The record
    /// materializes partially loaded; unrequested fields lazy-load on
    /// first access.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Run the registered creation hook for missing identities instead of
    /// reporting them missing.
    pub fn allow_create(mut self) -> Self {
        self.allow_create = true;
        self
    }

    /// Override the missing-identity policy: `true` turns a miss into a
    /// `NotFound` error, `false` into a `None` slot. The default is `true`
    /// for single-record fetches and `false` for batches.
    pub fn raise_missing(mut self, on: bool) -> Self {
        self.raise_missing = Some(on);
        self
    }
}

impl Model {
    /// Fetch one record by identity. A missing identity is an error.
    pub fn get(&self, id: impl Into<Identity>) -> ModelResult<Record> {
        let id = id.into();
        let mut records = self.fetch(&[id.clone()], &GetOptions::new(), true)?;
        // The single-fetch policy raised on a miss; a hook-degraded slot is
        // the only way to land here without a record.
        records
            .pop()
            .flatten()
            .ok_or_else(|| ModelError::NotFound {
                key: self.schema.key_for(&id),
            })
    }

    /// Fetch one record by identity with explicit options.
    pub fn get_with(
        &self,
        id: impl Into<Identity>,
        options: &GetOptions,
    ) -> ModelResult<Option<Record>> {
        let mut records = self.fetch(&[id.into()], options, true)?;
        Ok(records.pop().flatten())
    }

    /// Fetch a batch of records in one round trip. The result has one slot
    /// per requested identity, in request order; missing identities yield
    /// `None` unless the options raise.
    pub fn get_many(
        &self,
        ids: &[Identity],
        options: &GetOptions,
    ) -> ModelResult<Vec<Option<Record>>> {
        self.fetch(ids, options, false)
    }

    fn fetch(
        &self,
        ids: &[Identity],
        options: &GetOptions,
        single: bool,
    ) -> ModelResult<Vec<Option<Record>>> {
        let raise_missing = options.raise_missing.unwrap_or(single);

        // Validate the requested subset up front and force the identity
        // field into it.
        let requested: Option<Vec<String>> = match &options.fields {
            Some(names) => {
                let mut requested = Vec::with_capacity(names.len() + 1);
                for name in names {
                    self.schema.require_field(name)?;
                    requested.push(name.clone());
                }
                let identity_field = self.schema.identity_field();
                if !requested.iter().any(|n| n == identity_field) {
                    requested.push(identity_field.to_string());
                }
                Some(requested)
            }
            None => None,
        };

        let commands: Vec<Command> = ids
            .iter()
            .map(|id| {
                let key = self.schema.key_for(id);
                match &requested {
                    Some(fields) => Command::HashGet {
                        key,
                        fields: fields.clone(),
                    },
                    None => Command::HashGetAll { key },
                }
            })
            .collect();
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let replies = self.ctx.store.pipeline(&commands)?;

        let mut records = Vec::with_capacity(ids.len());
        for (id, reply) in ids.iter().zip(replies) {
            let values = match &requested {
                Some(fields) => reply.into_fields()?.map(|raws| {
                    self.decode_subset(id, fields, raws)
                }),
                None => reply
                    .into_hash()?
                    .filter(|hash| !hash.is_empty())
                    .map(|hash| self.decode_hash(id, hash)),
            };
            let record = match values {
                Some(values) => Some(Record::build(
                    std::sync::Arc::clone(&self.ctx),
                    std::sync::Arc::clone(&self.schema),
                    values?,
                    false,
                    requested.is_some(),
                )?),
                None if options.allow_create => self.run_create_hook(id)?,
                None if raise_missing => {
                    return Err(ModelError::NotFound {
                        key: self.schema.key_for(id),
                    });
                }
                None => None,
            };
            records.push(record);
        }
        Ok(records)
    }

    /// Decode a whole-hash read. Hash fields with no schema counterpart are
    /// ignored rather than failing the load.
    pub(crate) fn decode_hash(
        &self,
        id: &Identity,
        hash: std::collections::HashMap<String, String>,
    ) -> ModelResult<Vec<(String, Value)>> {
        let mut values = vec![(self.schema.identity_field().to_string(), id.to_value())];
        for (name, raw) in hash {
            let Some(field) = self.schema.field(&name) else {
                continue;
            };
            values.push((name, field.decode(&raw)?));
        }
        Ok(values)
    }

    /// Decode a subset read: requested-but-absent fields load as explicit
    /// none, so they count as loaded and are not re-fetched.
    fn decode_subset(
        &self,
        id: &Identity,
        fields: &[String],
        raws: Vec<Option<String>>,
    ) -> ModelResult<Vec<(String, Value)>> {
        let mut values = vec![(self.schema.identity_field().to_string(), id.to_value())];
        for (name, raw) in fields.iter().zip(raws) {
            let value = match raw {
                Some(raw) => self.schema.require_field(name)?.decode(&raw)?,
                None => Value::None,
            };
            values.push((name.clone(), value));
        }
        Ok(values)
    }

    /// A missing identity under `allow_create`: build a substitute through
    /// the registered creation hook. No hook, or a hook failure, degrades
    /// the slot to a logged miss rather than an error.
    fn run_create_hook(&self, id: &Identity) -> ModelResult<Option<Record>> {
        match self.ctx.create_hook(self.schema.name()) {
            Some(hook) => match hook(self, id) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    tracing::warn!(
                        record_type = self.schema.name(),
                        identity = %id,
                        error = %err,
                        "creation hook failed; treating identity as missing"
                    );
                    Ok(None)
                }
            },
            None => {
                tracing::warn!(
                    record_type = self.schema.name(),
                    identity = %id,
                    "no creation hook registered; treating identity as missing"
                );
                Ok(None)
            }
        }
    }
}
