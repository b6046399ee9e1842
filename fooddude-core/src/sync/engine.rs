use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{PersistenceError, StoreError};
use super::store::DocumentStore;
use crate::models::{MutationOp, PendingMutation};

/// Result of one flush pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Mutations confirmed by the store during this pass.
    pub replayed: usize,
    /// Mutations put back into the queue: the one that failed and everything
    /// behind it.
    pub requeued: usize,
    /// Mutations the store refused; they were set aside.
    pub rejected: usize,
    /// True when another flush was already running and this call did nothing.
    pub skipped: bool,
}

/// Persists log mutations for one user and queues the ones that fail.
///
/// The queue is FIFO. Once something is queued, later mutations wait behind
/// it instead of being written ahead of it, so the remote document sees
/// changes in the order they were made. Nothing retries on a timer; the owner
/// calls [`SyncEngine::flush_queue`] on reconnect or foreground events.
///
/// Mutations the store rejects outright are moved to a separate list so a
/// single bad change cannot hold back everything queued after it.
pub struct SyncEngine<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    user: String,
    queue: Mutex<VecDeque<PendingMutation>>,
    rejected: Mutex<Vec<PendingMutation>>,
    flushing: AtomicBool,
}

/// Clears the flushing flag however the flush ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<S: DocumentStore + ?Sized> SyncEngine<S> {
    pub fn new(store: Arc<S>, user: impl Into<String>) -> Self {
        Self {
            store,
            user: user.into(),
            queue: Mutex::new(VecDeque::new()),
            rejected: Mutex::new(Vec::new()),
            flushing: AtomicBool::new(false),
        }
    }

    /// Seeds the queue with mutations left over from an earlier run.
    pub fn with_pending(self, pending: Vec<PendingMutation>) -> Self {
        self.lock_queue().extend(pending);
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pending_len(&self) -> usize {
        self.lock_queue().len()
    }

    /// Copy of the queue in replay order.
    pub fn pending(&self) -> Vec<PendingMutation> {
        self.lock_queue().iter().cloned().collect()
    }

    /// Mutations the store refused, oldest first.
    pub fn rejected(&self) -> Vec<PendingMutation> {
        self.rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_aside(&self, mutation: PendingMutation, error: &StoreError) {
        tracing::warn!("Setting aside {}: {}", mutation, error);
        self.rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mutation);
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<PendingMutation>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes one mutation to the remote store.
    ///
    /// On failure the mutation is queued and the error is returned for
    /// reporting only; the caller has nothing to recover.
    pub async fn persist(&self, mutation: PendingMutation) -> Result<(), PersistenceError> {
        {
            let mut queue = self.lock_queue();
            if !queue.is_empty() || self.flushing.load(Ordering::SeqCst) {
                let ahead = queue.len();
                tracing::debug!("Deferring {} behind {} pending", mutation, ahead);
                queue.push_back(mutation);
                return Err(PersistenceError::Deferred(ahead));
            }
        }

        match self.apply(&mutation).await {
            Ok(()) => {
                tracing::debug!("Persisted {}", mutation);
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                self.set_aside(mutation, &e);
                Err(PersistenceError::Rejected(e))
            }
            Err(e) => {
                tracing::warn!("Queued {} after failed write: {}", mutation, e);
                self.lock_queue().push_back(mutation);
                Err(PersistenceError::Queued(e))
            }
        }
    }

    /// Replays queued mutations in order.
    ///
    /// The pass stops at the first mutation that cannot reach the store; it
    /// and everything behind it go back to the front of the queue, ahead of
    /// anything queued while the flush was running. Rejected mutations are
    /// set aside and the pass continues. A call made while another flush is in
    /// progress returns immediately with `skipped` set.
    pub async fn flush_queue(&self) -> FlushReport {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return FlushReport {
                skipped: true,
                ..Default::default()
            };
        }
        let _guard = FlushGuard(&self.flushing);

        let mut batch: VecDeque<PendingMutation> = self.lock_queue().drain(..).collect();
        if batch.is_empty() {
            return FlushReport::default();
        }
        tracing::info!("Replaying {} pending change(s)", batch.len());

        let mut report = FlushReport::default();
        while let Some(mutation) = batch.pop_front() {
            match self.apply(&mutation).await {
                Ok(()) => report.replayed += 1,
                Err(e) if e.is_permanent() => {
                    self.set_aside(mutation, &e);
                    report.rejected += 1;
                }
                Err(e) => {
                    tracing::debug!("Replay of {} failed: {}", mutation, e);
                    batch.push_front(mutation);
                    break;
                }
            }
        }

        report.requeued = batch.len();
        let mut queue = self.lock_queue();
        let newer: Vec<PendingMutation> = queue.drain(..).collect();
        queue.extend(batch);
        queue.extend(newer);

        if report.requeued > 0 {
            tracing::warn!("{} change(s) still waiting to be saved", report.requeued);
        }
        report
    }

    async fn apply(&self, mutation: &PendingMutation) -> Result<(), StoreError> {
        let (user, date, meal) = (self.user.as_str(), mutation.date, mutation.meal);
        match &mutation.op {
            MutationOp::Append(entry) => self.store.append(user, date, meal, entry).await,
            MutationOp::ReplaceSlot(entries) => self.store.replace(user, date, meal, entries).await,
            MutationOp::ClearSlot => self.store.replace(user, date, meal, &[]).await,
        }
    }
}
