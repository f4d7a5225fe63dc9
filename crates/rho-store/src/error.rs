/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An optimistic transaction aborted because a watched key changed
    /// between `watch` and `commit`.
    #[error("transaction aborted: watched key {0} was modified concurrently")]
    WatchConflict(String),

    /// A reply slot did not carry the variant the caller expected. This
    /// indicates a backend that does not honor the command/reply contract.
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    /// A pipeline returned the wrong number of reply slots.
    #[error("reply count mismatch: sent {sent} commands, got {got} replies")]
    ReplyCountMismatch { sent: usize, got: usize },

    /// Backend-specific failure (connection loss, protocol error, ...).
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error from the underlying store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
