//! Record instance state.
//!
//! A [`Record`] holds the per-object state machine the engine revolves
//! around: current values, the set of fields confirmed loaded, the dirty
//! snapshot, the resolved-relation cache, and the new/existing flag. It
//! carries the shared context so attribute access can perform its own
//! store round trips (one lazy fetch per first access of an unloaded
//! field, never more).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rho_schema::Schema;
use rho_store::HashStore;
use rho_types::{Identity, Value};

use crate::client::SharedContext;
use crate::error::{ModelError, ModelResult};

/// One typed record instance, mapped onto a single hash entry.
#[derive(Clone)]
pub struct Record {
    pub(crate) ctx: SharedContext,
    pub(crate) schema: Arc<Schema>,
    /// Current values, keyed by real field name. An explicit none is
    /// present here; a never-loaded field is absent.
    pub(crate) data: HashMap<String, Value>,
    /// Real fields confirmed loaded. Never shrinks outside delete/reload.
    pub(crate) loaded: HashSet<String>,
    /// Values as of the last load/save; the base for dirty computation.
    pub(crate) snapshot: HashMap<String, Value>,
    /// Resolved related instances, keyed by relation name.
    pub(crate) related: HashMap<String, Option<Box<Record>>>,
    /// True until the first successful save.
    pub(crate) is_new: bool,
    /// True when only a requested subset of fields was loaded.
    pub(crate) partial: bool,
}

impl Record {
    /// Construct an instance and run the initialization pass: explicit
    /// values first, then the loaded-set for full loads, then defaults.
    ///
    /// A field absent from the explicit values takes its declared default;
    /// failing that -- on non-partial construction only -- an allow-none
    /// field is explicitly set to none, so "known to be none" stays
    /// distinguishable from "not yet loaded". Partial loads leave
    /// unrequested fields unset so they lazy-load on first access.
    pub(crate) fn build(
        ctx: SharedContext,
        schema: Arc<Schema>,
        values: Vec<(String, Value)>,
        is_new: bool,
        partial: bool,
    ) -> ModelResult<Self> {
        let mut record = Self {
            ctx,
            schema,
            data: HashMap::new(),
            loaded: HashSet::new(),
            snapshot: HashMap::new(),
            related: HashMap::new(),
            is_new,
            partial,
        };
        let schema = Arc::clone(&record.schema);

        for (name, value) in values {
            if is_new {
                // Caller input: validate at the point of assignment.
                record.set(&name, value)?;
            } else {
                // Decoded wire data is stored as-is.
                record.store_value(&name, value);
            }
        }

        if !is_new && !partial {
            for field in schema.fields() {
                record.loaded.insert(field.name().to_string());
            }
        }

        if !partial {
            for field in schema.fields() {
                if record.data.contains_key(field.name()) {
                    continue;
                }
                if let Some(default) = field.default() {
                    let name = field.name().to_string();
                    record.set(&name, default)?;
                } else if field.allow_none() {
                    record.store_value(field.name(), Value::None);
                }
            }
        }

        record.reset_snapshot();
        Ok(record)
    }

    /// The record type name.
    pub fn record_type(&self) -> &str {
        self.schema.name()
    }

    /// The frozen schema of this record's type.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// True until the instance has been saved (or was loaded) at least
    /// once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// True when the instance was materialized with a field subset.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// The identity value, if set.
    pub fn identity(&self) -> Option<Identity> {
        self.data
            .get(self.schema.identity_field())
            .and_then(Identity::from_value)
    }

    /// The composite store key. Fails when no identity is set.
    pub fn key(&self) -> ModelResult<String> {
        let identity = self
            .identity()
            .ok_or_else(|| ModelError::MissingIdentity(self.schema.name().to_string()))?;
        Ok(self.schema.key_for(&identity))
    }

    /// Read a field value.
    ///
    /// Identity reads never touch the store. Reading any other unloaded
    /// field on a non-new instance fetches exactly that field in one
    /// round trip, marks it loaded, and answers locally thereafter.
    pub fn get(&mut self, name: &str) -> ModelResult<Value> {
        let field = self.schema.require_field(name)?;
        let skip_load = self.is_new || field.is_identity();
        if !skip_load && !self.loaded.contains(name) {
            self.load_field(name)?;
        }
        Ok(self.data.get(name).cloned().unwrap_or(Value::None))
    }

    /// Write a field value: validate, normalize, store, mark loaded.
    ///
    /// Writing a relation's companion id field drops that relation's
    /// cached instance.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        let field = self.schema.require_field(name)?;
        field.validate(&value)?;
        let normalized = field.normalize(value);
        self.store_value(name, normalized);
        Ok(())
    }

    /// Insert a trusted value without validation (wire data, lazy loads,
    /// explicit-none fills) and keep the caches coherent.
    pub(crate) fn store_value(&mut self, name: &str, value: Value) {
        if let Some(relation) = self
            .schema
            .relation_for_id_field(name)
            .map(|r| r.name().to_string())
        {
            self.related.remove(&relation);
        }
        self.data.insert(name.to_string(), value);
        self.loaded.insert(name.to_string());
    }

    fn load_field(&mut self, name: &str) -> ModelResult<()> {
        let key = self.key()?;
        let raw = self.ctx.store.hash_get_field(&key, name)?;
        let value = match raw {
            Some(raw) => self.schema.require_field(name)?.decode(&raw)?,
            None => Value::None,
        };
        self.store_value(name, value);
        Ok(())
    }

    /// Names of the fields confirmed loaded, sorted.
    pub fn loaded_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.loaded.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The changed fields since the last load/save: every current value
    /// compared against the snapshot by value equality (structured values
    /// compare deeply). Fields absent from the snapshot always report
    /// changed.
    pub fn dirty_fields(&self) -> HashMap<String, Value> {
        self.data
            .iter()
            .filter(|(name, value)| self.snapshot.get(*name) != Some(value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_fields().is_empty()
    }

    /// Reset the dirty base to the current values.
    pub(crate) fn reset_snapshot(&mut self) {
        self.snapshot = self.data.clone();
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Some(id) => write!(f, "{}:{}", self.schema.name(), id),
            None => write!(f, "{}:<unset>", self.schema.name()),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type", &self.schema.name())
            .field("identity", &self.identity())
            .field("loaded", &self.loaded.len())
            .field("new", &self.is_new)
            .field("partial", &self.partial)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rho_types::Value;
    use serde_json::json;

    use crate::error::ModelError;
    use crate::testing::TestEnv;

    #[test]
    fn construction_sets_values_and_loaded_set() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 123.into())])
            .unwrap();

        assert!(rec.is_new());
        assert_eq!(rec.loaded_fields(), vec!["id", "name", "num"]);
        assert_eq!(rec.identity(), Some(1.into()));
    }

    #[test]
    fn unset_allow_none_field_is_explicit_none() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("id", 1.into()), ("num", 10.into())]).unwrap();

        // "name" was never passed, but it is known-none, not unloaded.
        assert!(rec.loaded_fields().contains(&"name"));
        assert_eq!(rec.get("name").unwrap(), Value::None);
        // No store call happened for it.
        assert_eq!(env.store.command_count("hget"), 0);
    }

    #[test]
    fn static_default_applies_once_at_construction() {
        let env = TestEnv::new();
        let item = env.register_item();
        let mut rec = item.create(&[("id", 1.into()), ("name", "a".into())]).unwrap();

        // Default of zero still applies.
        assert_eq!(rec.get("count").unwrap(), Value::Int(0));
    }

    #[test]
    fn produced_default_applies() {
        let env = TestEnv::new();
        env.client.registry().register(
            rho_schema::Schema::builder("Stamp")
                .field(
                    "created_at",
                    rho_schema::FieldDef::time().default_with(|| Value::Time(chrono::Utc::now())),
                )
                .build()
                .unwrap(),
        );
        let model = env.client.model("Stamp").unwrap();
        let mut rec = model.create(&[("id", 1.into())]).unwrap();
        assert!(matches!(rec.get("created_at").unwrap(), Value::Time(_)));
    }

    #[test]
    fn set_validates_kind() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("id", 1.into())]).unwrap();

        let err = rec.set("num", "not a number").unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("id", 1.into())]).unwrap();

        assert!(rec.get("nope").is_err());
        assert!(rec.set("nope", 1).is_err());
    }

    #[test]
    fn key_requires_identity() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let rec = foo.create(&[("name", "x".into())]).unwrap();

        assert!(rec.identity().is_none());
        assert!(matches!(
            rec.key().unwrap_err(),
            ModelError::MissingIdentity(_)
        ));
    }

    #[test]
    fn key_derivation() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let rec = foo.create(&[("id", 1.into())]).unwrap();
        assert_eq!(rec.key().unwrap(), "foo:1");
    }

    #[test]
    fn dirty_tracks_changes_by_value() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 10.into())])
            .unwrap();
        rec.save().unwrap();
        assert!(!rec.is_dirty());

        rec.set("name", "bar").unwrap();
        let dirty = rec.dirty_fields();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty.get("name"), Some(&Value::Text("bar".into())));

        // Setting the same value back makes it clean again.
        rec.set("name", "foo").unwrap();
        assert!(!rec.is_dirty());
    }

    #[test]
    fn dirty_compares_structured_values_deeply() {
        let env = TestEnv::new();
        env.client.registry().register(
            rho_schema::Schema::builder("Doc")
                .field("body", rho_schema::FieldDef::json())
                .build()
                .unwrap(),
        );
        let model = env.client.model("Doc").unwrap();
        let mut rec = model
            .create(&[("id", 1.into()), ("body", json!({"a": [1, 2]}).into())])
            .unwrap();
        rec.save().unwrap();

        rec.set("body", json!({"a": [1, 2]})).unwrap();
        assert!(!rec.is_dirty());

        rec.set("body", json!({"a": [1, 3]})).unwrap();
        assert!(rec.is_dirty());
    }

    #[test]
    fn float_field_accepts_int_and_normalizes() {
        let env = TestEnv::new();
        env.client.registry().register(
            rho_schema::Schema::builder("FloatModel")
                .field("x", rho_schema::FieldDef::float())
                .build()
                .unwrap(),
        );
        let model = env.client.model("FloatModel").unwrap();
        let mut rec = model.create(&[("id", 1.into()), ("x", 1.into())]).unwrap();
        assert_eq!(rec.get("x").unwrap(), Value::Float(1.0));

        rec.save().unwrap();
        let mut back = model.get(1).unwrap();
        assert_eq!(back.get("x").unwrap(), Value::Float(1.0));
    }

    #[test]
    fn display_and_debug() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let rec = foo.create(&[("id", 7.into())]).unwrap();
        assert_eq!(rec.to_string(), "Foo:7");
        assert!(format!("{rec:?}").contains("Record"));
    }
}
