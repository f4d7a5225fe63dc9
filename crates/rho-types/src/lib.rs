//! Foundation types for rho.
//!
//! This crate defines the two types every other rho layer speaks:
//!
//! - [`Value`] -- a dynamically typed field value as held on a record
//!   instance (the "native" side of a field codec)
//! - [`Identity`] -- the value that forms the unique key suffix for a
//!   record instance
//!
//! No I/O happens here; encoding to and from the store's wire strings is
//! the schema layer's job.

pub mod identity;
pub mod value;

pub use identity::Identity;
pub use value::Value;
