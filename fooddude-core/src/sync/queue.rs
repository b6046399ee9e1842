//! On-disk copy of the pending mutation queue.
//!
//! The queue itself lives in memory inside the engine. A short-lived process
//! (the CLI) saves it here on exit and loads it on start so changes made
//! while offline survive until the next flush.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::PendingMutation;

#[derive(Error, Debug)]
pub enum QueueFileError {
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),

    #[error("Corrupt pending queue {}: {}", .0.display(), .1)]
    Corrupt(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct QueueFile {
    path: PathBuf,
}

impl QueueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved queue. A missing file is an empty queue.
    pub fn load(&self) -> Result<Vec<PendingMutation>, QueueFileError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| QueueFileError::Corrupt(self.path.clone(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(QueueFileError::Io(self.path.clone(), e)),
        }
    }

    /// Saves the queue, replacing the previous file atomically. An empty queue
    /// removes the file.
    pub fn save(&self, pending: &[PendingMutation]) -> Result<(), QueueFileError> {
        if pending.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(QueueFileError::Io(self.path.clone(), e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| QueueFileError::Io(parent.to_path_buf(), e))?;
        }

        let bytes = serde_json::to_vec_pretty(pending)
            .map_err(|e| QueueFileError::Corrupt(self.path.clone(), e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            File::create(&temp_path).map_err(|e| QueueFileError::Io(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| QueueFileError::Io(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| QueueFileError::Io(temp_path.clone(), e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| QueueFileError::Io(self.path.clone(), e))?;
        Ok(())
    }
}
