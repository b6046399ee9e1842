//! Sync error types.

use thiserror::Error;

use crate::models::DocumentError;

/// Errors reported by a remote document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store could not be reached, or failed transiently.
    #[error("Document store unreachable: {0}")]
    Unreachable(String),

    /// The store refused the request.
    #[error("Document store rejected the request: {0}")]
    Rejected(String),

    /// The store returned a document that does not fit the day schema.
    #[error("Malformed day document: {0}")]
    Malformed(#[from] DocumentError),
}

impl StoreError {
    /// A rejected write will be rejected again on replay.
    pub fn is_permanent(&self) -> bool {
        matches!(self, StoreError::Rejected(_))
    }
}

/// Outcome of a persist call that did not reach the remote store.
///
/// Queued and deferred mutations are replayed by the next flush. Rejected
/// ones are set aside with [`SyncEngine::rejected`](super::SyncEngine::rejected)
/// so they cannot block the queue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// The write failed and the mutation was queued.
    #[error("Change saved locally, remote write failed: {0}")]
    Queued(StoreError),

    /// Earlier changes are still pending, so this one waits behind them.
    #[error("Change saved locally, waiting behind {0} pending change(s)")]
    Deferred(usize),

    /// The store refused the change; it was set aside instead of queued.
    #[error("Change rejected by the document store and set aside: {0}")]
    Rejected(StoreError),
}
