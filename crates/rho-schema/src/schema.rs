//! Record type schemas.
//!
//! A [`Schema`] is the frozen result of the static registration pass that
//! runs once when a record type is declared: declared fields are collected,
//! implicit fields are synthesized (a numeric `id` identity when none is
//! marked, a `<relation>_id` companion per relation), and the result is an
//! immutable lookup table shared by every instance of the type.

use std::collections::BTreeMap;
use std::sync::Arc;

use rho_types::Identity;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{Field, FieldDef};

/// A declared relation: a derived accessor resolving to another record
/// type's instance. Only the companion identity field is ever stored.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    target: String,
    id_field: String,
}

impl Relation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the target record type, resolved through the registry at
    /// access time (so forward references work).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Name of the synthesized companion field holding the related
    /// identity.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }
}

/// The frozen schema of a record type.
#[derive(Debug)]
pub struct Schema {
    name: String,
    key_prefix: String,
    identity_field: String,
    fields: BTreeMap<String, Field>,
    relations: BTreeMap<String, Relation>,
    save_modified_only: bool,
    ttl_secs: Option<u64>,
}

impl Schema {
    /// Start declaring a record type.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            save_modified_only: true,
            ttl_secs: None,
        }
    }

    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key prefix (lowercased type name).
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Name of the identity field.
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Look up a real (store-backed) field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Look up a real field, failing with `UnknownField`.
    pub fn require_field(&self, name: &str) -> SchemaResult<&Field> {
        self.fields.get(name).ok_or_else(|| SchemaError::UnknownField {
            record_type: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// All real fields, in name order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Names of all real fields, in name order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Look up a declared relation by accessor name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// All declared relations, in name order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// The relation whose companion field is `field_name`, if any. Used to
    /// invalidate a cached related instance when its id field is written
    /// directly.
    pub fn relation_for_id_field(&self, field_name: &str) -> Option<&Relation> {
        self.relations.values().find(|r| r.id_field == field_name)
    }

    /// Whether saves persist only the dirty delta by default.
    pub fn save_modified_only(&self) -> bool {
        self.save_modified_only
    }

    /// Declared time-to-live, applied to the record key on every save.
    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }

    /// The composite store key for an identity: `"{prefix}:{identity}"`.
    pub fn key_for(&self, identity: &Identity) -> String {
        format!("{}:{}", self.key_prefix, identity)
    }
}

/// Builder for a [`Schema`]; the declaration-time registration pass.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, FieldDef)>,
    relations: Vec<(String, String)>,
    save_modified_only: bool,
    ttl_secs: Option<u64>,
}

impl SchemaBuilder {
    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.push((name.into(), def));
        self
    }

    /// Declare a relation to another record type (by name; the target may
    /// be declared later). Synthesizes an integer `<name>_id` companion
    /// field, the relation's only stored footprint.
    pub fn relation(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.push((name.into(), target.into()));
        self
    }

    /// Persist the full value set on save instead of the dirty delta.
    pub fn save_modified_only(mut self, on: bool) -> Self {
        self.save_modified_only = on;
        self
    }

    /// Expire records of this type after the given number of seconds.
    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.ttl_secs = Some(secs);
        self
    }

    /// Freeze the declaration into an immutable schema.
    pub fn build(self) -> SchemaResult<Arc<Schema>> {
        if self.name.is_empty() {
            return Err(SchemaError::InvalidName(self.name));
        }

        let mut fields: BTreeMap<String, Field> = BTreeMap::new();
        let mut identity_field: Option<String> = None;

        for (name, def) in self.fields {
            if def.is_identity {
                if identity_field.is_some() {
                    return Err(SchemaError::MultipleIdentityFields(self.name));
                }
                identity_field = Some(name.clone());
            }
            if fields.insert(name.clone(), Field::new(&name, def)).is_some() {
                return Err(SchemaError::DuplicateField {
                    record_type: self.name,
                    field: name,
                });
            }
        }

        let mut relations = BTreeMap::new();
        for (name, target) in self.relations {
            if fields.contains_key(&name) {
                return Err(SchemaError::DuplicateField {
                    record_type: self.name,
                    field: name,
                });
            }
            let id_field = format!("{name}_id");
            if fields
                .insert(id_field.clone(), Field::new(&id_field, FieldDef::int()))
                .is_some()
            {
                return Err(SchemaError::DuplicateField {
                    record_type: self.name,
                    field: id_field,
                });
            }
            let relation = Relation {
                name: name.clone(),
                target,
                id_field,
            };
            if relations.insert(name.clone(), relation).is_some() {
                return Err(SchemaError::DuplicateField {
                    record_type: self.name,
                    field: name,
                });
            }
        }

        let identity_field = match identity_field {
            Some(name) => name,
            None => {
                // Synthesize the numeric identity.
                if fields.contains_key("id") {
                    return Err(SchemaError::IdentityUnresolvable(self.name));
                }
                fields.insert(
                    "id".to_string(),
                    Field::new("id", FieldDef::int().identity()),
                );
                "id".to_string()
            }
        };

        Ok(Arc::new(Schema {
            key_prefix: self.name.to_lowercase(),
            name: self.name,
            identity_field,
            fields,
            relations,
            save_modified_only: self.save_modified_only,
            ttl_secs: self.ttl_secs,
        }))
    }
}
