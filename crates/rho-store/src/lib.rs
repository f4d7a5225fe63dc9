//! Store boundary for rho.
//!
//! The mapping engine treats its backing key-value store through a narrow
//! contract: each record is one hash entry keyed `"{prefix}:{identity}"`,
//! and every operation the engine performs is a [`Command`] executed either
//! in a pipelined batch (one round trip, no cross-key atomicity) or inside
//! an optimistic watch-then-commit [`Transaction`].
//!
//! # Backends
//!
//! All backends implement the [`HashStore`] trait:
//!
//! - [`MemoryHashStore`] -- mutex-guarded in-memory store for tests and
//!   embedding, with real watch semantics and per-command counters
//!
//! # Design Rules
//!
//! 1. One pipelined batch is one round trip; reply slots are positional.
//! 2. Pipelining never implies atomicity across keys.
//! 3. A subset read of an absent key is distinguishable from a present key
//!    with absent fields.
//! 4. A watched key modified before commit aborts the whole transaction;
//!    nothing queued applies.
//! 5. No retries; conflicts and failures propagate to the caller.

pub mod command;
pub mod error;
pub mod memory;
pub mod traits;

pub use command::{Command, Reply};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryHashStore;
pub use traits::{HashStore, Transaction};
