//! The engine's boundary surface: [`Client`] and per-type [`Model`] handles.
//!
//! A `Client` bundles the injected store handle and type registry (plus any
//! registered hooks) into the shared context every record carries, so that
//! attribute access can perform its own round trips. A `Model` is the
//! per-record-type view of that context -- the equivalent of a model class:
//! construction, fetching, and blind writes hang off it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rho_schema::{Registry, Schema};
use rho_store::{HashStore, Transaction};
use rho_types::Identity;

use crate::error::ModelResult;
use crate::record::Record;

/// Creation hook: builds a substitute record for a missing identity during
/// an `allow_create` fetch. A failure degrades that slot to a logged miss.
pub type CreateHook = Arc<dyn Fn(&Model, &Identity) -> ModelResult<Record> + Send + Sync>;

/// Save hook: queues caller side effects into the record's write
/// transaction so they commit atomically with it.
pub type SaveHook = Arc<dyn Fn(&Record, &mut dyn Transaction) -> ModelResult<()> + Send + Sync>;

/// Delete hook: like [`SaveHook`], but runs inside the delete transaction.
pub type DeleteHook = Arc<dyn Fn(&Record, &mut dyn Transaction) -> ModelResult<()> + Send + Sync>;

pub(crate) struct Context {
    pub(crate) store: Arc<dyn HashStore>,
    pub(crate) registry: Arc<Registry>,
    create_hooks: RwLock<HashMap<String, CreateHook>>,
    save_hooks: RwLock<HashMap<String, SaveHook>>,
    delete_hooks: RwLock<HashMap<String, DeleteHook>>,
}

pub(crate) type SharedContext = Arc<Context>;

impl Context {
    pub(crate) fn create_hook(&self, record_type: &str) -> Option<CreateHook> {
        self.create_hooks
            .read()
            .expect("lock poisoned")
            .get(record_type)
            .cloned()
    }

    pub(crate) fn has_create_hook(&self, record_type: &str) -> bool {
        self.create_hooks
            .read()
            .expect("lock poisoned")
            .contains_key(record_type)
    }

    pub(crate) fn save_hook(&self, record_type: &str) -> Option<SaveHook> {
        self.save_hooks
            .read()
            .expect("lock poisoned")
            .get(record_type)
            .cloned()
    }

    pub(crate) fn delete_hook(&self, record_type: &str) -> Option<DeleteHook> {
        self.delete_hooks
            .read()
            .expect("lock poisoned")
            .get(record_type)
            .cloned()
    }
}

/// Entry point for the mapping engine.
///
/// Cheap to clone; all clones share the same store handle, registry, and
/// hook tables.
#[derive(Clone)]
pub struct Client {
    pub(crate) ctx: SharedContext,
}

impl Client {
    /// Create a client over an injected store handle and type registry.
    pub fn new(store: Arc<dyn HashStore>, registry: Arc<Registry>) -> Self {
        Self {
            ctx: Arc::new(Context {
                store,
                registry,
                create_hooks: RwLock::new(HashMap::new()),
                save_hooks: RwLock::new(HashMap::new()),
                delete_hooks: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The type registry this client resolves record types against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.ctx.registry
    }

    /// The backing store handle.
    pub fn store(&self) -> Arc<dyn HashStore> {
        Arc::clone(&self.ctx.store)
    }

    /// The per-type handle for a registered record type.
    pub fn model(&self, record_type: &str) -> ModelResult<Model> {
        let schema = self.ctx.registry.resolve(record_type)?;
        Ok(Model {
            ctx: Arc::clone(&self.ctx),
            schema,
        })
    }

    /// Begin a store transaction for callers that want several record
    /// saves to commit together (see [`Record::save_in`]).
    pub fn transaction(&self) -> Box<dyn Transaction + '_> {
        self.ctx.store.transaction()
    }

    /// Register the creation hook invoked for missing identities when a
    /// fetch allows creation.
    pub fn on_missing<F>(&self, record_type: &str, hook: F)
    where
        F: Fn(&Model, &Identity) -> ModelResult<Record> + Send + Sync + 'static,
    {
        self.ctx
            .create_hooks
            .write()
            .expect("lock poisoned")
            .insert(record_type.to_string(), Arc::new(hook));
    }

    /// Register a save hook for a record type. It runs inside every save
    /// transaction for that type, before commit.
    pub fn on_save<F>(&self, record_type: &str, hook: F)
    where
        F: Fn(&Record, &mut dyn Transaction) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.ctx
            .save_hooks
            .write()
            .expect("lock poisoned")
            .insert(record_type.to_string(), Arc::new(hook));
    }

    /// Register a delete hook for a record type. It runs inside every
    /// delete transaction for that type, before commit.
    pub fn on_delete<F>(&self, record_type: &str, hook: F)
    where
        F: Fn(&Record, &mut dyn Transaction) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.ctx
            .delete_hooks
            .write()
            .expect("lock poisoned")
            .insert(record_type.to_string(), Arc::new(hook));
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("types", &self.ctx.registry.names())
            .finish()
    }
}

/// The per-type boundary surface: construct, fetch, and blind-write
/// records of one registered type.
#[derive(Clone)]
pub struct Model {
    pub(crate) ctx: SharedContext,
    pub(crate) schema: Arc<Schema>,
}

impl Model {
    pub(crate) fn with_schema(ctx: SharedContext, schema: Arc<Schema>) -> Self {
        Self { ctx, schema }
    }

    /// The frozen schema of this record type.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The record type name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Construct a fresh (never persisted) instance from explicit field
    /// values. Unset fields take their declared defaults, or an explicit
    /// none when the field allows it.
    pub fn create(&self, values: &[(&str, rho_types::Value)]) -> ModelResult<Record> {
        let values: Vec<(String, rho_types::Value)> = values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Record::build(
            Arc::clone(&self.ctx),
            Arc::clone(&self.schema),
            values,
            true,
            false,
        )
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("record_type", &self.schema.name())
            .finish()
    }
}
