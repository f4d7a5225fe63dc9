//! Field system and schema registry for rho.
//!
//! A record type is declared once through [`Schema::builder`]: fields are
//! described by [`FieldDef`]s, relations by target type name. Building the
//! schema runs the static registration pass -- implicit identity and
//! relation-companion fields are synthesized and the result is frozen into
//! an immutable lookup table. Registering the schema in a [`Registry`]
//! makes it resolvable by name, which is what lets relations reference
//! forward-declared types.
//!
//! Fields own the wire codecs: validation against the kind's allowed type
//! set, encoding to the store's native strings, and decoding back. A none
//! value bypasses the codec entirely -- it encodes as "absent" (a hash
//! field deletion) and is never decoded.

pub mod codec;
pub mod error;
pub mod field;
pub mod registry;
pub mod schema;

pub use error::{SchemaError, SchemaResult};
pub use field::{Field, FieldDef, FieldDefault, FieldKind};
pub use registry::Registry;
pub use schema::{Relation, Schema, SchemaBuilder};
