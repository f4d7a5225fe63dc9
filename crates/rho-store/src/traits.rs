use std::collections::HashMap;

use crate::command::{Command, Reply};
use crate::error::{StoreError, StoreResult};

/// The key-value store the mapping engine runs against.
///
/// All implementations must satisfy these invariants:
/// - One batch passed to [`pipeline`](Self::pipeline) executes as a single
///   round trip and returns one reply slot per command, in order.
/// - Pipelining does not imply atomicity: each command in a batch succeeds
///   or fails independently of the others.
/// - A subset read of an absent key reports the key as absent
///   ([`Reply::Fields`]`(None)`), never as a present-but-empty hash.
/// - Atomicity is available only through [`transaction`](Self::transaction):
///   queued commands apply together at commit, and a watched key that
///   changes before commit aborts the whole transaction.
/// - No automatic retry: conflicts and failures are propagated to the
///   caller.
pub trait HashStore: Send + Sync {
    /// Execute a batch of commands as one pipelined round trip.
    fn pipeline(&self, commands: &[Command]) -> StoreResult<Vec<Reply>>;

    /// Begin an optimistic transaction against this store.
    fn transaction(&self) -> Box<dyn Transaction + '_>;

    /// Read every field of the hash at `key`. `None` when the key is absent.
    fn hash_get_all(&self, key: &str) -> StoreResult<Option<HashMap<String, String>>> {
        let replies = self.pipeline(&[Command::HashGetAll {
            key: key.to_string(),
        }])?;
        single(replies)?.into_hash()
    }

    /// Read one field of the hash at `key`. `None` when either the key or
    /// the field is absent.
    fn hash_get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let replies = self.pipeline(&[Command::HashGet {
            key: key.to_string(),
            fields: vec![field.to_string()],
        }])?;
        let fields = single(replies)?.into_fields()?;
        Ok(fields.and_then(|mut f| f.pop().flatten()))
    }

    /// Check whether `key` exists.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        let replies = self.pipeline(&[Command::Exists {
            key: key.to_string(),
        }])?;
        single(replies)?.into_bool()
    }

    /// Delete `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> StoreResult<bool> {
        let replies = self.pipeline(&[Command::Delete {
            key: key.to_string(),
        }])?;
        single(replies)?.into_bool()
    }
}

fn single(mut replies: Vec<Reply>) -> StoreResult<Reply> {
    match replies.len() {
        1 => Ok(replies.remove(0)),
        got => Err(StoreError::ReplyCountMismatch { sent: 1, got }),
    }
}

/// An optimistic watch-then-commit transaction.
///
/// Usage follows the store's native protocol: register watches, perform any
/// immediate reads needed to decide, queue the buffered write set, then
/// commit. If any watched key was modified by another operation between the
/// watch and the commit, `commit` fails with
/// [`StoreError::WatchConflict`] and none of the queued commands apply.
pub trait Transaction {
    /// Watch `key`: any modification to it before commit aborts the
    /// transaction.
    fn watch(&mut self, key: &str) -> StoreResult<()>;

    /// Immediate (non-queued) existence check, executed while watches are
    /// active. Used for guarded create-if-absent flows.
    fn exists(&mut self, key: &str) -> StoreResult<bool>;

    /// Queue a command for atomic execution at commit.
    fn queue(&mut self, command: Command);

    /// Number of queued commands.
    fn queued(&self) -> usize;

    /// Atomically apply all queued commands.
    fn commit(self: Box<Self>) -> StoreResult<Vec<Reply>>;

    /// Discard the transaction without applying anything.
    fn abort(self: Box<Self>);
}
