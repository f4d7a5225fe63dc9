//! The process-scoped record type registry.
//!
//! Relations name their target type rather than referencing it directly,
//! so a type can point at one declared later. The registry is the lookup
//! that makes this work: populated as each type is declared, resolved at
//! relation-access time, cleared as a single atomic operation between
//! test or process phases. It is an explicit, injected object -- shared via
//! `Arc` -- not ambient global state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{SchemaError, SchemaResult};
use crate::schema::Schema;

/// Registry of declared record types, keyed by type name.
pub struct Registry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Register a schema under its type name. Re-registering a name
    /// replaces the previous schema (last wins); instances already holding
    /// the old `Arc` keep it.
    pub fn register(&self, schema: Arc<Schema>) -> Arc<Schema> {
        self.schemas
            .write()
            .expect("lock poisoned")
            .insert(schema.name().to_string(), Arc::clone(&schema));
        schema
    }

    /// Look up a schema by type name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
    }

    /// Look up a schema by type name, failing with `UnknownType`.
    pub fn resolve(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Remove every registered type in one atomic operation.
    pub fn clear(&self) {
        self.schemas.write().expect("lock poisoned").clear();
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.schemas.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.names())
            .finish()
    }
}
