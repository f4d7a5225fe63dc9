use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::command::{Command, Reply};
use crate::error::{StoreError, StoreResult};
use crate::traits::{HashStore, Transaction};

/// In-memory, `HashMap`-based hash store.
///
/// Intended for tests and embedding. All entries live behind a single
/// `Mutex`, which is what makes transaction commits atomic: a commit takes
/// the lock once, verifies every watched key's version, and applies the
/// queued commands before releasing it. Every mutation of a key bumps a
/// per-key version counter (surviving key deletion), so a watch observes
/// deletes and re-creates as conflicts too.
///
/// TTLs are enforced lazily: an expired entry is purged the next time any
/// command touches its key.
///
/// The store also counts executed commands by wire name (`"hgetall"`,
/// `"hget"`, `"hset"`, ...), which lets tests assert exact round-trip
/// counts (e.g. "lazy-loading this field performed exactly one `hget`").
pub struct MemoryHashStore {
    inner: Mutex<Inner>,
    counts: Mutex<HashMap<&'static str, u64>>,
    pipelines: Mutex<u64>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
}

struct Entry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new() -> Self {
        Self {
            fields: HashMap::new(),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Inner {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Drop the entry at `key` if its TTL has elapsed. Counts as a
    /// modification for watch purposes.
    fn purge_expired(&mut self, key: &str) {
        let now = Instant::now();
        let expired = self.entries.get(key).is_some_and(|e| e.is_expired(now));
        if expired {
            self.entries.remove(key);
            self.bump(key);
        }
    }

    fn apply(&mut self, command: &Command) -> Reply {
        self.purge_expired(command.key());
        match command {
            Command::HashGetAll { key } => {
                Reply::Hash(self.entries.get(key).map(|e| e.fields.clone()))
            }
            Command::HashGet { key, fields } => Reply::Fields(self.entries.get(key).map(|e| {
                fields
                    .iter()
                    .map(|f| e.fields.get(f).cloned())
                    .collect()
            })),
            Command::HashSet { key, entries } => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(Entry::new);
                for (field, value) in entries {
                    entry.fields.insert(field.clone(), value.clone());
                }
                self.bump(key);
                Reply::Unit
            }
            Command::HashDel { key, fields } => {
                let mut removed = 0u64;
                if let Some(entry) = self.entries.get_mut(key) {
                    for field in fields {
                        if entry.fields.remove(field).is_some() {
                            removed += 1;
                        }
                    }
                    // A hash with no fields left does not exist.
                    if entry.fields.is_empty() {
                        self.entries.remove(key);
                    }
                }
                if removed > 0 {
                    self.bump(key);
                }
                Reply::Count(removed)
            }
            Command::Delete { key } => {
                let existed = self.entries.remove(key).is_some();
                if existed {
                    self.bump(key);
                }
                Reply::Bool(existed)
            }
            Command::Exists { key } => Reply::Bool(self.entries.contains_key(key)),
            Command::Expire { key, ttl_secs } => {
                if *ttl_secs == 0 {
                    if self.entries.remove(key).is_some() {
                        self.bump(key);
                    }
                } else if let Some(entry) = self.entries.get_mut(key) {
                    entry.expires_at = Some(Instant::now() + Duration::from_secs(*ttl_secs));
                    self.bump(key);
                }
                Reply::Unit
            }
        }
    }
}

impl MemoryHashStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            counts: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(0),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all keys. Versions are retained so open watches still
    /// conflict.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let keys: Vec<String> = inner.entries.keys().cloned().collect();
        for key in keys {
            inner.entries.remove(&key);
            inner.bump(&key);
        }
    }

    /// Raw view of the hash at `key`, for test assertions. Does not count
    /// as a store round trip.
    pub fn raw_hash(&self, key: &str) -> Option<HashMap<String, String>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.purge_expired(key);
        inner.entries.get(key).map(|e| e.fields.clone())
    }

    /// How many commands with the given wire name have executed (pipelined
    /// or committed) since construction or the last
    /// [`reset_counts`](Self::reset_counts).
    pub fn command_count(&self, name: &str) -> u64 {
        self.counts
            .lock()
            .expect("lock poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// How many pipelined round trips have executed since construction or
    /// the last [`reset_counts`](Self::reset_counts). A batch of any size
    /// counts as one.
    pub fn pipeline_count(&self) -> u64 {
        *self.pipelines.lock().expect("lock poisoned")
    }

    /// Zero all command and round-trip counters.
    pub fn reset_counts(&self) {
        self.counts.lock().expect("lock poisoned").clear();
        *self.pipelines.lock().expect("lock poisoned") = 0;
    }

    fn record(&self, name: &'static str) {
        *self
            .counts
            .lock()
            .expect("lock poisoned")
            .entry(name)
            .or_insert(0) += 1;
    }
}

impl Default for MemoryHashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashStore for MemoryHashStore {
    fn pipeline(&self, commands: &[Command]) -> StoreResult<Vec<Reply>> {
        *self.pipelines.lock().expect("lock poisoned") += 1;
        let mut inner = self.inner.lock().expect("lock poisoned");
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            self.record(command.name());
            replies.push(inner.apply(command));
        }
        Ok(replies)
    }

    fn transaction(&self) -> Box<dyn Transaction + '_> {
        Box::new(MemoryTransaction {
            store: self,
            watched: Vec::new(),
            queue: Vec::new(),
        })
    }
}

impl std::fmt::Debug for MemoryHashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHashStore")
            .field("key_count", &self.len())
            .finish()
    }
}

/// Transaction over a [`MemoryHashStore`].
///
/// `watch` snapshots the key's version counter; `commit` re-checks every
/// snapshot under the store lock before applying the queue, so a concurrent
/// mutation of any watched key makes the commit fail with
/// [`StoreError::WatchConflict`].
struct MemoryTransaction<'a> {
    store: &'a MemoryHashStore,
    watched: Vec<(String, u64)>,
    queue: Vec<Command>,
}

impl Transaction for MemoryTransaction<'_> {
    fn watch(&mut self, key: &str) -> StoreResult<()> {
        let mut inner = self.store.inner.lock().expect("lock poisoned");
        inner.purge_expired(key);
        let version = inner.version(key);
        self.watched.push((key.to_string(), version));
        Ok(())
    }

    fn exists(&mut self, key: &str) -> StoreResult<bool> {
        self.store.record("exists");
        let mut inner = self.store.inner.lock().expect("lock poisoned");
        inner.purge_expired(key);
        Ok(inner.entries.contains_key(key))
    }

    fn queue(&mut self, command: Command) {
        self.queue.push(command);
    }

    fn queued(&self) -> usize {
        self.queue.len()
    }

    fn commit(self: Box<Self>) -> StoreResult<Vec<Reply>> {
        let mut inner = self.store.inner.lock().expect("lock poisoned");
        for (key, version) in &self.watched {
            inner.purge_expired(key);
            if inner.version(key) != *version {
                tracing::debug!(key = %key, "watched key changed, aborting transaction");
                return Err(StoreError::WatchConflict(key.clone()));
            }
        }
        let mut replies = Vec::with_capacity(self.queue.len());
        for command in &self.queue {
            self.store.record(command.name());
            replies.push(inner.apply(command));
        }
        Ok(replies)
    }

    fn abort(self: Box<Self>) {}
}
