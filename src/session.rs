//! Per-invocation sync session for the CLI.
//!
//! Each command run is one "foreground" event: saved changes from earlier
//! runs are loaded and flushed first, the command edits the log, and whatever
//! still could not be written is saved back to disk on exit.

use chrono::NaiveDate;
use fooddude_core::{
    DayLog, DocumentStore, FlushReport, HttpDocumentStore, LogStore, QueueFile, SyncEngine,
    SyncHandle, SyncWorker,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

use fooddude::config::{Config, SyncConfig};

/// Sync client configuration errors
#[derive(Debug)]
pub enum SessionError {
    NotConfigured,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotConfigured => write!(
                f,
                "Sync not configured. Set sync.server_url and sync.api_key in config, \
                 or FOODDUDE_SYNC_URL and FOODDUDE_SYNC_API_KEY."
            ),
        }
    }
}

impl std::error::Error for SessionError {}

pub fn document_store(sync: &SyncConfig) -> Result<HttpDocumentStore, SessionError> {
    match (&sync.server_url, &sync.api_key) {
        (Some(url), Some(key)) => Ok(HttpDocumentStore::new(url.clone(), key.clone())),
        _ => Err(SessionError::NotConfigured),
    }
}

pub struct Session {
    pub log: LogStore,
    user_id: String,
    engine: Arc<SyncEngine<dyn DocumentStore>>,
    handle: SyncHandle,
    worker: JoinHandle<()>,
    queue_file: QueueFile,
    rejected_file: QueueFile,
    startup_flush: Option<FlushReport>,
}

/// What was left over when a session closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Changes still only on this device, saved for the next run.
    pub pending: usize,
    /// Changes the server refused during this run, saved aside.
    pub rejected: usize,
}

impl Session {
    pub async fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn DocumentStore> = Arc::new(document_store(&config.sync)?);
        let queue_file = QueueFile::new(config.pending_queue_path());
        let pending = queue_file.load()?;
        let had_pending = !pending.is_empty();

        let user_id = config.user_id.value.clone();
        let engine = Arc::new(SyncEngine::new(store, user_id.clone()).with_pending(pending));
        let (handle, worker) = SyncWorker::spawn(engine.clone());

        let startup_flush = if had_pending {
            handle.flush().await
        } else {
            None
        };

        Ok(Self {
            log: LogStore::with_sync(handle.clone()),
            user_id,
            engine,
            handle,
            worker,
            queue_file,
            rejected_file: QueueFile::new(config.rejected_changes_path()),
            startup_flush,
        })
    }

    /// Result of replaying changes saved by earlier runs, if there were any.
    pub fn startup_flush(&self) -> Option<&FlushReport> {
        self.startup_flush.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.engine.pending_len()
    }

    /// Loads the day from the server, then re-applies changes for that day
    /// that have not reached the server yet. Offline, those changes are laid
    /// over an empty day. Returns whether the server answered.
    pub async fn load_day(&mut self, date: NaiveDate) -> bool {
        let (base, online) = match self.engine.store().fetch(&self.user_id, date).await {
            Ok(day) => (day, true),
            Err(e) => {
                tracing::warn!("Could not load {} from server: {}", date, e);
                (DayLog::new(), false)
            }
        };
        self.log.apply_remote_snapshot(date, base);

        let pending = self.engine.pending();
        self.log
            .replay_pending(pending.iter().filter(|mutation| mutation.date == date));
        online
    }

    /// Keeps the day in sync with the server, calling `on_change` with every
    /// new version, until the server closes the subscription.
    pub async fn follow_day<F>(
        &mut self,
        date: NaiveDate,
        on_change: F,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: FnMut(&DayLog),
    {
        let snapshots = self.engine.store().subscribe(&self.user_id, date).await?;
        self.log.follow(date, snapshots, on_change).await;
        Ok(())
    }

    /// Waits for submitted changes, stops the worker and saves what is left.
    pub async fn close(self) -> Result<CloseReport, Box<dyn std::error::Error>> {
        let Session {
            log,
            engine,
            handle,
            worker,
            queue_file,
            rejected_file,
            ..
        } = self;

        handle.settled().await;
        drop(log);
        drop(handle);
        worker.await?;

        let pending = engine.pending();
        queue_file.save(&pending)?;

        let rejected = engine.rejected();
        if !rejected.is_empty() {
            let mut kept = rejected_file.load()?;
            kept.extend(rejected.iter().cloned());
            rejected_file.save(&kept)?;
        }

        Ok(CloseReport {
            pending: pending.len(),
            rejected: rejected.len(),
        })
    }
}

/// Prints the "may not be saved yet" notice after a write.
pub fn report_pending(report: CloseReport) {
    if report.pending > 0 {
        println!(
            "⚠ {} change{} not saved to the server yet; they will be sent on the next run.",
            report.pending,
            if report.pending == 1 { " is" } else { "s are" }
        );
    }
    if report.rejected > 0 {
        println!(
            "✗ The server refused {} change{}; see `fooddude sync status`.",
            report.rejected,
            if report.rejected == 1 { "" } else { "s" }
        );
    }
}
