//! Background task that owns the sync engine.
//!
//! Log edits only enqueue requests here and return, so the UI never waits on
//! the network. Requests are handled one at a time in the order they arrive.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::engine::{FlushReport, SyncEngine};
use super::store::DocumentStore;
use crate::models::PendingMutation;

#[derive(Debug)]
pub enum SyncRequest {
    Persist(PendingMutation),
    Flush(Option<oneshot::Sender<FlushReport>>),
    /// Answered once every earlier request has been handled.
    Barrier(oneshot::Sender<()>),
}

/// Cloneable sender side of a [`SyncWorker`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncRequest>,
}

impl SyncHandle {
    /// Handle plus the raw request receiver, for callers that drive requests
    /// themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hands a mutation to the worker without waiting for the write.
    pub fn submit(&self, mutation: PendingMutation) {
        if let Err(mpsc::error::SendError(request)) = self.tx.send(SyncRequest::Persist(mutation)) {
            tracing::warn!("Sync worker stopped, dropping {:?}", request);
        }
    }

    /// Asks for a flush without waiting for it.
    pub fn request_flush(&self) {
        let _ = self.tx.send(SyncRequest::Flush(None));
    }

    /// Flushes and waits for the report. `None` if the worker is gone.
    pub async fn flush(&self) -> Option<FlushReport> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SyncRequest::Flush(Some(reply))).ok()?;
        rx.await.ok()
    }

    /// Waits until everything submitted so far has been handled.
    pub async fn settled(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SyncRequest::Barrier(reply)).is_ok() {
            let _ = rx.await;
        }
    }
}

pub struct SyncWorker;

impl SyncWorker {
    /// Starts the worker task. It stops once every handle has been dropped.
    pub fn spawn<S>(engine: Arc<SyncEngine<S>>) -> (SyncHandle, JoinHandle<()>)
    where
        S: DocumentStore + ?Sized + 'static,
    {
        let (handle, rx) = SyncHandle::channel();
        let task = tokio::spawn(Self::run(engine, rx));
        (handle, task)
    }

    /// Handles requests until the channel closes.
    pub async fn run<S>(engine: Arc<SyncEngine<S>>, mut rx: mpsc::UnboundedReceiver<SyncRequest>)
    where
        S: DocumentStore + ?Sized,
    {
        while let Some(request) = rx.recv().await {
            match request {
                SyncRequest::Persist(mutation) => {
                    // Failures are queued or set aside by the engine.
                    let _ = engine.persist(mutation).await;
                }
                SyncRequest::Flush(reply) => {
                    let report = engine.flush_queue().await;
                    if let Some(reply) = reply {
                        let _ = reply.send(report);
                    }
                }
                SyncRequest::Barrier(reply) => {
                    let _ = reply.send(());
                }
            }
        }
        tracing::debug!("Sync worker finished with {} pending", engine.pending_len());
    }
}
