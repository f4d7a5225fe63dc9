//! Shared fixtures for the engine's test modules.

use std::sync::Arc;

use rho_schema::{FieldDef, Registry, Schema};
use rho_store::{HashStore, MemoryHashStore};

use crate::client::{Client, Model};

/// A client wired to an instrumented in-memory store.
pub(crate) struct TestEnv {
    pub client: Client,
    pub store: Arc<MemoryHashStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        let store = Arc::new(MemoryHashStore::new());
        let registry = Arc::new(Registry::new());
        let client = Client::new(Arc::clone(&store) as Arc<dyn HashStore>, registry);
        Self { client, store }
    }

    /// `Foo`: optional text `name`, optional int `num`, implicit `id`.
    pub fn register_foo(&self) -> Model {
        self.client.registry().register(
            Schema::builder("Foo")
                .field("name", FieldDef::text())
                .field("num", FieldDef::int())
                .build()
                .expect("valid schema"),
        );
        self.client.model("Foo").expect("registered")
    }

    /// `Item`: text `name`, int `count` defaulting to zero.
    pub fn register_item(&self) -> Model {
        self.client.registry().register(
            Schema::builder("Item")
                .field("name", FieldDef::text())
                .field("count", FieldDef::int().default_value(0))
                .build()
                .expect("valid schema"),
        );
        self.client.model("Item").expect("registered")
    }
}
