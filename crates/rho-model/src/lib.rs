//! The rho mapping engine: typed records over hash-structured key-value
//! entries.
//!
//! Each record type is declared once as a [`Schema`] and registered in a
//! [`Registry`]; each instance is a [`Record`] mapped onto a single hash
//! entry keyed `"{prefix}:{identity}"`. The engine layers four behaviors
//! over the store boundary:
//!
//! - **Lazy loading** -- a record can materialize with a field subset;
//!   unloaded fields fetch themselves in exactly one round trip on first
//!   access, and an explicitly-none field stays distinguishable from one
//!   never loaded.
//! - **Dirty tracking** -- saves write only the delta since the last
//!   load/save unless the type or the call says otherwise.
//! - **Transactional persistence** -- creates are guarded by an optimistic
//!   watch-then-check transaction (two concurrent creates of one identity
//!   resolve to one winner), and save/delete hooks queue side effects that
//!   commit atomically with the record.
//! - **Lazy relations** -- a relation stores only its `<name>_id` companion
//!   field; the target record resolves through the registry on first
//!   access and is cached until the companion changes.
//!
//! # Example
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use rho_model::{Client, FieldDef, MemoryHashStore, Registry, Schema, Value};
//!
//! let store = Arc::new(MemoryHashStore::new());
//! let registry = Arc::new(Registry::new());
//! let client = Client::new(store, registry);
//!
//! client.registry().register(
//!     Schema::builder("Item")
//!         .field("name", FieldDef::text())
//!         .field("count", FieldDef::int().default_value(0))
//!         .build()?,
//! );
//! let items = client.model("Item")?;
//!
//! let mut item = items.create(&[("id", 1.into()), ("name", "widget".into())])?;
//! assert_eq!(item.get("count")?, Value::Int(0));
//! item.save()?;
//!
//! let mut back = items.get(1)?;
//! assert_eq!(back.get("name")?, Value::Text("widget".into()));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fetch;
pub mod record;
pub mod relation;
pub mod save;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Client, CreateHook, DeleteHook, Model, SaveHook};
pub use error::{ModelError, ModelResult};
pub use fetch::GetOptions;
pub use record::Record;
pub use save::SaveOptions;

pub use rho_schema::{
    Field, FieldDef, FieldDefault, FieldKind, Registry, Relation, Schema, SchemaBuilder,
    SchemaError,
};
pub use rho_store::{
    Command, HashStore, MemoryHashStore, Reply, StoreError, Transaction,
};
pub use rho_types::{Identity, Value};
