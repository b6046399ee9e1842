//! Sync with the remote day-document store.
//!
//! Local edits become [`PendingMutation`](crate::models::PendingMutation)s.
//! The [`SyncEngine`] writes them through a [`DocumentStore`], queues the ones
//! that fail and replays the queue on request. Remote snapshots flow the other
//! way through [`DocumentStore::subscribe`].

mod engine;
mod error;
mod queue;
mod remote;
mod store;
mod worker;

pub use engine::{FlushReport, SyncEngine};
pub use error::{PersistenceError, StoreError};
pub use queue::{QueueFile, QueueFileError};
pub use remote::HttpDocumentStore;
pub use store::{DocumentStore, MemoryDocumentStore, SnapshotStream};
pub use worker::{SyncHandle, SyncRequest, SyncWorker};
