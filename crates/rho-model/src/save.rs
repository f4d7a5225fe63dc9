//! The save engine: transactional persistence of record state.
//!
//! A save validates and encodes the write set (the dirty delta by default,
//! the full value set on demand), splits it into field sets and field
//! deletions, and applies it in one round trip. Creating a record is
//! guarded by an optimistic watch-then-check transaction so two concurrent
//! creates of the same identity resolve to exactly one winner. Explicit
//! none values persist as hash-field deletions, which is what keeps "none"
//! and "absent" the same thing on the wire.

use std::collections::HashMap;
use std::sync::Arc;

use rho_store::{Command, StoreError, Transaction};
use rho_types::{Identity, Value};

use crate::client::Model;
use crate::error::{ModelError, ModelResult};
use crate::record::Record;

/// Per-call save options.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    force_create: bool,
    modified_only: Option<bool>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the create-collision guard: write over an existing key instead
    /// of failing with `AlreadyExists`.
    pub fn force_create(mut self) -> Self {
        self.force_create = true;
        self
    }

    /// Override the record type's delta-save policy for this call.
    pub fn modified_only(mut self, on: bool) -> Self {
        self.modified_only = Some(on);
        self
    }
}

impl Record {
    /// Persist this record with default options.
    pub fn save(&mut self) -> ModelResult<()> {
        self.save_with(&SaveOptions::new())
    }

    /// Persist this record.
    ///
    /// A new record is guarded against create collisions: the key is
    /// watched, checked for existence, and written in one optimistic
    /// transaction; a concurrent create of the same identity surfaces as
    /// [`ModelError::AlreadyExists`] for the loser. Subsequent saves write
    /// only the dirty delta unless the type or the options say otherwise.
    /// A single-command write with no guard or hook goes out as a plain
    /// pipeline; anything multi-command commits transactionally. An empty
    /// write set performs no store round trip at all.
    pub fn save_with(&mut self, options: &SaveOptions) -> ModelResult<()> {
        let key = self.key()?;
        let commands = self.write_commands(&key, options)?;
        if commands.is_empty() {
            tracing::debug!(record = %self, "save skipped, nothing changed");
            self.is_new = false;
            return Ok(());
        }

        let guard = self.is_new && !options.force_create;
        let hook = self.ctx.save_hook(self.schema.name());
        if guard || hook.is_some() || commands.len() > 1 {
            let mut txn = self.ctx.store.transaction();
            if guard {
                txn.watch(&key)?;
                if txn.exists(&key)? {
                    txn.abort();
                    return Err(ModelError::AlreadyExists { key });
                }
            }
            for command in commands {
                txn.queue(command);
            }
            if let Some(hook) = hook {
                hook(self, txn.as_mut())?;
            }
            txn.commit().map_err(|err| match err {
                // The watched key changed between check and commit, so some
                // concurrent writer created it first.
                StoreError::WatchConflict(_) => ModelError::AlreadyExists { key: key.clone() },
                other => ModelError::Store(other),
            })?;
        } else {
            self.ctx.store.pipeline(&commands)?;
        }

        tracing::debug!(record = %self, created = self.is_new, "saved");
        self.is_new = false;
        self.reset_snapshot();
        Ok(())
    }

    /// Queue this record's write set into a caller-owned transaction so it
    /// commits together with other queued work.
    ///
    /// The create-collision guard is skipped (watch scope belongs to the
    /// transaction's owner), and the record's local state advances at queue
    /// time: if the owner never commits, the record believes itself saved
    /// while the store disagrees.
    pub fn save_in(
        &mut self,
        txn: &mut dyn Transaction,
        options: &SaveOptions,
    ) -> ModelResult<()> {
        let key = self.key()?;
        let commands = self.write_commands(&key, options)?;
        if commands.is_empty() {
            tracing::debug!(record = %self, "save skipped, nothing changed");
            self.is_new = false;
            return Ok(());
        }
        for command in commands {
            txn.queue(command);
        }
        if let Some(hook) = self.ctx.save_hook(self.schema.name()) {
            hook(self, txn)?;
        }
        self.is_new = false;
        self.reset_snapshot();
        Ok(())
    }

    /// Delete this record's key, atomically with any delete-hook work.
    ///
    /// The instance reverts to the unsaved state with its current values
    /// intact, so saving it again re-creates the key.
    pub fn delete(&mut self) -> ModelResult<()> {
        let key = self.key()?;
        let mut txn = self.ctx.store.transaction();
        txn.queue(Command::Delete { key: key.clone() });
        if let Some(hook) = self.ctx.delete_hook(self.schema.name()) {
            hook(self, txn.as_mut())?;
        }
        txn.commit()?;
        tracing::debug!(record = %self, "deleted");
        self.is_new = true;
        self.snapshot.clear();
        self.related.clear();
        Ok(())
    }

    /// Re-read this record from the store, replacing all local state
    /// (including unsaved changes). Fails with `NotFound` when the key no
    /// longer exists.
    pub fn reload(&mut self) -> ModelResult<()> {
        let key = self.key()?;
        let hash = self
            .ctx
            .store
            .hash_get_all(&key)?
            .filter(|hash| !hash.is_empty())
            .ok_or(ModelError::NotFound { key })?;
        let id = self
            .identity()
            .ok_or_else(|| ModelError::MissingIdentity(self.schema.name().to_string()))?;
        let model = Model::with_schema(Arc::clone(&self.ctx), Arc::clone(&self.schema));
        let values = model.decode_hash(&id, hash)?;
        *self = Record::build(
            Arc::clone(&self.ctx),
            Arc::clone(&self.schema),
            values,
            false,
            false,
        )?;
        Ok(())
    }

    /// Validate and encode the write set into store commands: one
    /// `HashSet` for present values, one `HashDel` for explicit nones, and
    /// the type's TTL refresh when it declares one.
    fn write_commands(
        &self,
        key: &str,
        options: &SaveOptions,
    ) -> ModelResult<Vec<Command>> {
        let modified_only = options
            .modified_only
            .unwrap_or_else(|| self.schema.save_modified_only());
        let write_set: HashMap<String, Value> = if modified_only && !self.is_new {
            self.dirty_fields()
        } else {
            self.data.clone()
        };

        let mut entries = Vec::new();
        let mut deletions = Vec::new();
        for (name, value) in &write_set {
            let field = self.schema.require_field(name)?;
            field.validate(value)?;
            match field.encode(value)? {
                Some(raw) => entries.push((name.clone(), raw)),
                None => deletions.push(name.clone()),
            }
        }
        // Deterministic wire order.
        entries.sort();
        deletions.sort();

        let mut commands = Vec::new();
        if !entries.is_empty() {
            commands.push(Command::HashSet {
                key: key.to_string(),
                entries,
            });
        }
        // A fresh key has no fields to delete from.
        if !deletions.is_empty() && (!self.is_new || options.force_create) {
            commands.push(Command::HashDel {
                key: key.to_string(),
                fields: deletions,
            });
        }
        if !commands.is_empty() {
            if let Some(ttl_secs) = self.schema.ttl_secs() {
                commands.push(Command::Expire {
                    key: key.to_string(),
                    ttl_secs,
                });
            }
        }
        Ok(commands)
    }
}

impl Model {
    /// Blind write: create a record's hash directly from field values,
    /// without materializing an instance. Fails with `AlreadyExists` when
    /// the key is already present.
    pub fn set(&self, id: impl Into<Identity>, values: &[(&str, Value)]) -> ModelResult<()> {
        let id = id.into();
        let key = self.schema.key_for(&id);

        let mut entries = Vec::with_capacity(values.len() + 1);
        let identity_field = self.schema.require_field(self.schema.identity_field())?;
        let identity_value = id.to_value();
        identity_field.validate(&identity_value)?;
        if let Some(raw) = identity_field.encode(&identity_value)? {
            entries.push((identity_field.name().to_string(), raw));
        }
        for (name, value) in values {
            let field = self.schema.require_field(name)?;
            field.validate(value)?;
            let normalized = field.normalize(value.clone());
            // None means absent: nothing to write for a fresh key.
            if let Some(raw) = field.encode(&normalized)? {
                entries.push((name.to_string(), raw));
            }
        }
        entries.sort();

        if self.ctx.store.exists(&key)? {
            return Err(ModelError::AlreadyExists { key });
        }
        let mut commands = vec![Command::HashSet {
            key: key.clone(),
            entries,
        }];
        if let Some(ttl_secs) = self.schema.ttl_secs() {
            commands.push(Command::Expire { key, ttl_secs });
        }
        self.ctx.store.pipeline(&commands)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use rho_schema::{FieldDef, Schema};
    use rho_store::{Command, HashStore};
    use rho_types::Value;

    use super::SaveOptions;
    use crate::error::ModelError;
    use crate::testing::TestEnv;

    // -----------------------------------------------------------------------
    // Create and update
    // -----------------------------------------------------------------------

    #[test]
    fn save_writes_encoded_fields() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 123.into())])
            .unwrap();
        rec.save().unwrap();

        let hash = env.store.raw_hash("foo:1").unwrap();
        assert_eq!(hash.get("id").map(String::as_str), Some("1"));
        assert_eq!(hash.get("name").map(String::as_str), Some("foo"));
        assert_eq!(hash.get("num").map(String::as_str), Some("123"));
        assert!(!rec.is_new());
        assert!(!rec.is_dirty());
    }

    #[test]
    fn none_fields_are_absent_from_the_hash() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("id", 1.into()), ("num", 5.into())]).unwrap();
        rec.save().unwrap();

        let hash = env.store.raw_hash("foo:1").unwrap();
        assert!(!hash.contains_key("name"));
    }

    #[test]
    fn save_without_identity_fails() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("name", "x".into())]).unwrap();
        assert!(matches!(
            rec.save().unwrap_err(),
            ModelError::MissingIdentity(_)
        ));
        assert!(env.store.is_empty());
    }

    #[test]
    fn update_persists_changes() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into())])
            .unwrap();
        rec.save().unwrap();

        rec.set("name", "bar").unwrap();
        rec.save().unwrap();

        let mut back = foo.get(1).unwrap();
        assert_eq!(back.get("name").unwrap(), Value::Text("bar".into()));
    }

    #[test]
    fn setting_none_deletes_the_hash_field() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();
        env.store.reset_counts();

        rec.set("name", Value::None).unwrap();
        rec.save().unwrap();

        assert_eq!(env.store.command_count("hdel"), 1);
        let hash = env.store.raw_hash("foo:1").unwrap();
        assert!(!hash.contains_key("name"));
        assert!(hash.contains_key("num"));

        // The value round-trips as explicit none.
        let mut back = foo.get(1).unwrap();
        assert_eq!(back.get("name").unwrap(), Value::None);
    }

    #[test]
    fn mixed_sets_and_deletions_in_one_save() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();
        env.store.reset_counts();

        rec.set("name", Value::None).unwrap();
        rec.set("num", 6).unwrap();
        rec.save().unwrap();

        assert_eq!(env.store.command_count("hset"), 1);
        assert_eq!(env.store.command_count("hdel"), 1);
    }

    // -----------------------------------------------------------------------
    // Delta policy
    // -----------------------------------------------------------------------

    #[test]
    fn clean_record_save_is_a_no_op() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into())])
            .unwrap();
        rec.save().unwrap();
        env.store.reset_counts();

        rec.save().unwrap();
        assert_eq!(env.store.pipeline_count(), 0);
    }

    #[test]
    fn delta_save_only_touches_dirty_fields() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();

        // Clobber a field behind the record's back; a delta save must not
        // restore it.
        env.store
            .pipeline(&[Command::HashSet {
                key: "foo:1".to_string(),
                entries: vec![("num".to_string(), "999".to_string())],
            }])
            .unwrap();

        rec.set("name", "bar").unwrap();
        rec.save().unwrap();

        let hash = env.store.raw_hash("foo:1").unwrap();
        assert_eq!(hash.get("name").map(String::as_str), Some("bar"));
        assert_eq!(hash.get("num").map(String::as_str), Some("999"));
    }

    #[test]
    fn full_save_policy_writes_everything() {
        let env = TestEnv::new();
        env.client.registry().register(
            Schema::builder("Snap")
                .field("name", FieldDef::text())
                .field("num", FieldDef::int())
                .save_modified_only(false)
                .build()
                .unwrap(),
        );
        let model = env.client.model("Snap").unwrap();
        let mut rec = model
            .create(&[("id", 1.into()), ("name", "a".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();

        env.store
            .pipeline(&[Command::HashSet {
                key: "snap:1".to_string(),
                entries: vec![("num".to_string(), "999".to_string())],
            }])
            .unwrap();

        rec.set("name", "b").unwrap();
        rec.save().unwrap();

        // The full value set went out, restoring the clobbered field.
        let hash = env.store.raw_hash("snap:1").unwrap();
        assert_eq!(hash.get("num").map(String::as_str), Some("5"));
    }

    #[test]
    fn per_call_override_beats_the_type_policy() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "a".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();

        env.store
            .pipeline(&[Command::HashSet {
                key: "foo:1".to_string(),
                entries: vec![("num".to_string(), "999".to_string())],
            }])
            .unwrap();

        rec.set("name", "b").unwrap();
        rec.save_with(&SaveOptions::new().modified_only(false)).unwrap();

        let hash = env.store.raw_hash("foo:1").unwrap();
        assert_eq!(hash.get("num").map(String::as_str), Some("5"));
    }

    // -----------------------------------------------------------------------
    // Create collisions
    // -----------------------------------------------------------------------

    #[test]
    fn creating_an_existing_identity_fails() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut first = foo
            .create(&[("id", 1.into()), ("name", "first".into())])
            .unwrap();
        first.save().unwrap();

        let mut second = foo
            .create(&[("id", 1.into()), ("name", "second".into())])
            .unwrap();
        let err = second.save().unwrap_err();
        assert!(matches!(err, ModelError::AlreadyExists { key } if key == "foo:1"));

        // The loser wrote nothing.
        let hash = env.store.raw_hash("foo:1").unwrap();
        assert_eq!(hash.get("name").map(String::as_str), Some("first"));
    }

    #[test]
    fn force_create_overwrites() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut first = foo
            .create(&[("id", 1.into()), ("name", "first".into())])
            .unwrap();
        first.save().unwrap();

        let mut second = foo
            .create(&[("id", 1.into()), ("name", "second".into())])
            .unwrap();
        second.save_with(&SaveOptions::new().force_create()).unwrap();

        let hash = env.store.raw_hash("foo:1").unwrap();
        assert_eq!(hash.get("name").map(String::as_str), Some("second"));
    }

    #[test]
    fn concurrent_creates_yield_one_winner() {
        let env = Arc::new(TestEnv::new());
        env.register_foo();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let env = Arc::clone(&env);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let foo = env.client.model("Foo").unwrap();
                    let mut rec = foo
                        .create(&[("id", 1.into()), ("num", i64::from(i).into())])
                        .unwrap();
                    barrier.wait();
                    rec.save()
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ModelError::AlreadyExists { .. })));
    }

    // -----------------------------------------------------------------------
    // TTL
    // -----------------------------------------------------------------------

    #[test]
    fn declared_ttl_is_refreshed_on_save() {
        let env = TestEnv::new();
        env.client.registry().register(
            Schema::builder("Session")
                .field("token", FieldDef::text())
                .ttl_secs(3600)
                .build()
                .unwrap(),
        );
        let model = env.client.model("Session").unwrap();
        let mut rec = model
            .create(&[("id", 1.into()), ("token", "t".into())])
            .unwrap();
        rec.save().unwrap();
        assert_eq!(env.store.command_count("expire"), 1);
        assert!(env.store.raw_hash("session:1").is_some());

        rec.set("token", "u").unwrap();
        rec.save().unwrap();
        assert_eq!(env.store.command_count("expire"), 2);
    }

    // -----------------------------------------------------------------------
    // Hooks and shared transactions
    // -----------------------------------------------------------------------

    #[test]
    fn save_hook_commits_with_the_record() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        env.client.on_save("Foo", |record, txn| {
            let key = format!("audit:{}", record.identity().map(|i| i.to_string()).unwrap_or_default());
            txn.queue(Command::HashSet {
                key,
                entries: vec![("saved".to_string(), "1".to_string())],
            });
            Ok(())
        });

        let mut rec = foo.create(&[("id", 1.into()), ("num", 5.into())]).unwrap();
        rec.save().unwrap();

        assert!(env.store.raw_hash("foo:1").is_some());
        assert!(env.store.raw_hash("audit:1").is_some());
    }

    #[test]
    fn failing_save_hook_aborts_the_save() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        env.client.on_save("Foo", |record, _txn| {
            Err(ModelError::MissingIdentity(
                record.record_type().to_string(),
            ))
        });

        let mut rec = foo.create(&[("id", 1.into()), ("num", 5.into())]).unwrap();
        assert!(rec.save().is_err());
        assert!(env.store.is_empty());
        assert!(rec.is_new());
    }

    #[test]
    fn delete_hook_commits_with_the_delete() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        env.store
            .pipeline(&[Command::HashSet {
                key: "audit:1".to_string(),
                entries: vec![("saved".to_string(), "1".to_string())],
            }])
            .unwrap();
        env.client.on_delete("Foo", |_record, txn| {
            txn.queue(Command::Delete {
                key: "audit:1".to_string(),
            });
            Ok(())
        });

        let mut rec = foo.create(&[("id", 1.into()), ("num", 5.into())]).unwrap();
        rec.save().unwrap();
        rec.delete().unwrap();

        assert!(env.store.raw_hash("foo:1").is_none());
        assert!(env.store.raw_hash("audit:1").is_none());
    }

    #[test]
    fn save_in_commits_multiple_records_together() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut a = foo.create(&[("id", 1.into()), ("num", 1.into())]).unwrap();
        let mut b = foo.create(&[("id", 2.into()), ("num", 2.into())]).unwrap();

        let mut txn = env.client.transaction();
        a.save_in(txn.as_mut(), &SaveOptions::new()).unwrap();
        b.save_in(txn.as_mut(), &SaveOptions::new()).unwrap();
        // Nothing hits the store before commit.
        assert!(env.store.is_empty());

        txn.commit().unwrap();
        assert!(env.store.raw_hash("foo:1").is_some());
        assert!(env.store.raw_hash("foo:2").is_some());
    }

    // -----------------------------------------------------------------------
    // Delete and reload
    // -----------------------------------------------------------------------

    #[test]
    fn delete_removes_the_key_and_resets_state() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "foo".into())])
            .unwrap();
        rec.save().unwrap();
        rec.delete().unwrap();

        assert!(env.store.is_empty());
        assert!(rec.is_new());

        // The instance keeps its values and can be re-created.
        rec.save().unwrap();
        let mut back = foo.get(1).unwrap();
        assert_eq!(back.get("name").unwrap(), Value::Text("foo".into()));
    }

    #[test]
    fn reload_discards_local_changes() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo
            .create(&[("id", 1.into()), ("name", "stored".into()), ("num", 5.into())])
            .unwrap();
        rec.save().unwrap();

        rec.set("name", "unsaved").unwrap();
        env.store
            .pipeline(&[Command::HashSet {
                key: "foo:1".to_string(),
                entries: vec![("num".to_string(), "42".to_string())],
            }])
            .unwrap();

        rec.reload().unwrap();
        assert_eq!(rec.get("name").unwrap(), Value::Text("stored".into()));
        assert_eq!(rec.get("num").unwrap(), Value::Int(42));
        assert!(!rec.is_dirty());
    }

    #[test]
    fn reload_of_a_deleted_key_fails() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let mut rec = foo.create(&[("id", 1.into()), ("num", 1.into())]).unwrap();
        rec.save().unwrap();
        env.store.delete("foo:1").unwrap();

        assert!(matches!(
            rec.reload().unwrap_err(),
            ModelError::NotFound { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Validation at save time
    // -----------------------------------------------------------------------

    #[test]
    fn required_field_must_be_present_to_save() {
        let env = TestEnv::new();
        env.client.registry().register(
            Schema::builder("Strict")
                .field("name", FieldDef::text().required())
                .build()
                .unwrap(),
        );
        let model = env.client.model("Strict").unwrap();
        let mut rec = model.create(&[("id", 1.into())]).unwrap();
        assert!(matches!(rec.save().unwrap_err(), ModelError::Schema(_)));

        rec.set("name", "ok").unwrap();
        rec.save().unwrap();
    }

    // -----------------------------------------------------------------------
    // Blind writes
    // -----------------------------------------------------------------------

    #[test]
    fn blind_set_writes_without_an_instance() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        foo.set(2, &[("name", "direct".into()), ("num", 7.into())])
            .unwrap();

        let hash = env.store.raw_hash("foo:2").unwrap();
        assert_eq!(hash.get("id").map(String::as_str), Some("2"));
        assert_eq!(hash.get("name").map(String::as_str), Some("direct"));

        let mut back = foo.get(2).unwrap();
        assert_eq!(back.get("num").unwrap(), Value::Int(7));
    }

    #[test]
    fn blind_set_on_existing_key_fails() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        foo.set(2, &[("num", 7.into())]).unwrap();

        let err = foo.set(2, &[("num", 8.into())]).unwrap_err();
        assert!(matches!(err, ModelError::AlreadyExists { key } if key == "foo:2"));
    }

    #[test]
    fn blind_set_validates_values() {
        let env = TestEnv::new();
        let foo = env.register_foo();
        let err = foo.set(2, &[("num", "text".into())]).unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
        assert!(env.store.is_empty());
    }
}
