//! Lazy relation resolution.
//!
//! A relation stores nothing but its integer companion field
//! (`<name>_id`); the related record itself is fetched on first access and
//! cached on the owning instance. Writing the companion field, directly or
//! through [`Record::set_related`], drops the cached instance so the next
//! access re-resolves. Targets are looked up by type name through the
//! registry at access time, so a relation may reference a type registered
//! later than its owner.

use std::sync::Arc;

use rho_schema::SchemaError;
use rho_types::{Identity, Value};

use crate::client::Model;
use crate::error::{ModelError, ModelResult};
use crate::fetch::GetOptions;
use crate::record::Record;

impl Record {
    /// Resolve a relation to its target record.
    ///
    /// Returns `None` when the companion field is none or the referenced
    /// identity no longer exists (a dangling reference is a miss, not an
    /// error). The result is cached; only a companion-field write
    /// invalidates it.
    pub fn related(&mut self, name: &str) -> ModelResult<Option<Record>> {
        if let Some(cached) = self.related.get(name) {
            return Ok(cached.as_ref().map(|rec| (**rec).clone()));
        }
        let relation = self.require_relation(name)?;

        let id_value = self.get(relation.id_field())?;
        let resolved = match Identity::from_value(&id_value) {
            None => None,
            Some(id) => {
                let target_schema = self.ctx.registry.resolve(relation.target())?;
                let model = Model::with_schema(Arc::clone(&self.ctx), target_schema);
                let mut options = GetOptions::new().raise_missing(false);
                // Only worth asking for substitutes when a hook can make
                // them.
                if self.ctx.has_create_hook(relation.target()) {
                    options = options.allow_create();
                }
                model.get_with(id, &options)?
            }
        };

        self.related
            .insert(name.to_string(), resolved.clone().map(Box::new));
        Ok(resolved)
    }

    /// Point a relation at a target record (or at nothing).
    ///
    /// Only the companion field changes locally; persisting it is the next
    /// save's business. The target must have an identity.
    pub fn set_related(&mut self, name: &str, target: Option<&Record>) -> ModelResult<()> {
        let relation = self.require_relation(name)?;
        match target {
            Some(rec) => {
                let id = rec.identity().ok_or_else(|| {
                    ModelError::MissingIdentity(rec.record_type().to_string())
                })?;
                self.set(relation.id_field(), id.to_value())?;
                self.related
                    .insert(name.to_string(), Some(Box::new(rec.clone())));
            }
            None => {
                self.set(relation.id_field(), Value::None)?;
                self.related.insert(name.to_string(), None);
            }
        }
        Ok(())
    }

    fn require_relation(&self, name: &str) -> ModelResult<rho_schema::Relation> {
        self.schema
            .relation(name)
            .cloned()
            .ok_or_else(|| {
                ModelError::Schema(SchemaError::UnknownField {
                    record_type: self.schema.name().to_string(),
                    field: name.to_string(),
                })
            })
    }
}
