//! Server-side day document storage.
//!
//! Stores one JSON document per user and date:
//! ```text
//! <DATA_DIR>/
//!   <user_id>/
//!     2024-01-01.json
//!     2024-01-02.json
//! ```
//!
//! Each document maps meal names to arrays of entries. Fields the server does
//! not know about are kept as they are.

use chrono::NaiveDate;
use fooddude_core::{FoodEntry, MealSlot};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum DayStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Stored file is not a JSON object.
    CorruptDocument(PathBuf, String),
    /// Invalid user ID (e.g., contains path separators).
    InvalidUserId(String),
}

impl std::fmt::Display for DayStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            DayStorageError::CorruptDocument(path, e) => {
                write!(f, "Failed to load document {}: {}", path.display(), e)
            }
            DayStorageError::InvalidUserId(id) => {
                write!(f, "Invalid user ID: {}", id)
            }
        }
    }
}

impl std::error::Error for DayStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DayStorageError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// File-backed day documents.
///
/// Writes are read-modify-write, so callers serialize them (the server keeps
/// the storage behind a lock).
#[derive(Debug, Clone)]
pub struct DayStorage {
    data_dir: PathBuf,
}

impl DayStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Validates a user ID to prevent path traversal attacks.
    pub fn validate_user_id(user_id: &str) -> Result<(), DayStorageError> {
        if user_id.is_empty()
            || user_id.contains('/')
            || user_id.contains('\\')
            || user_id.contains("..")
            || user_id.starts_with('.')
        {
            return Err(DayStorageError::InvalidUserId(user_id.to_string()));
        }
        Ok(())
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(user_id)
    }

    fn doc_path(&self, user_id: &str, date: NaiveDate) -> PathBuf {
        self.user_dir(user_id)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Loads a day document. A day with no file is an empty object.
    pub fn load(&self, user_id: &str, date: NaiveDate) -> Result<Value, DayStorageError> {
        Self::validate_user_id(user_id)?;

        let path = self.doc_path(user_id, date);
        match fs::read(&path) {
            Ok(bytes) => {
                let doc: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| DayStorageError::CorruptDocument(path.clone(), e.to_string()))?;
                if !doc.is_object() {
                    return Err(DayStorageError::CorruptDocument(
                        path,
                        "not a JSON object".to_string(),
                    ));
                }
                Ok(doc)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(e) => Err(DayStorageError::IoError(path, e)),
        }
    }

    /// Appends an entry to a meal and returns the updated document.
    pub fn append(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal: MealSlot,
        entry: &FoodEntry,
    ) -> Result<Value, DayStorageError> {
        let mut doc = self.load(user_id, date)?;
        let entry = serde_json::to_value(entry)
            .map_err(|e| DayStorageError::CorruptDocument(self.doc_path(user_id, date), e.to_string()))?;

        if let Some(fields) = doc.as_object_mut() {
            match fields.get_mut(meal.as_str()) {
                Some(Value::Array(items)) => items.push(entry),
                _ => {
                    fields.insert(meal.as_str().to_string(), Value::Array(vec![entry]));
                }
            }
        }

        self.save(user_id, date, &doc)?;
        Ok(doc)
    }

    /// Overwrites a meal's entries and returns the updated document.
    pub fn replace(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal: MealSlot,
        entries: &[FoodEntry],
    ) -> Result<Value, DayStorageError> {
        let mut doc = self.load(user_id, date)?;
        let entries = serde_json::to_value(entries)
            .map_err(|e| DayStorageError::CorruptDocument(self.doc_path(user_id, date), e.to_string()))?;

        if let Some(fields) = doc.as_object_mut() {
            fields.insert(meal.as_str().to_string(), entries);
        }

        self.save(user_id, date, &doc)?;
        Ok(doc)
    }

    /// Saves a document, replacing the previous file atomically.
    fn save(&self, user_id: &str, date: NaiveDate, doc: &Value) -> Result<(), DayStorageError> {
        Self::validate_user_id(user_id)?;

        let user_dir = self.user_dir(user_id);
        let path = self.doc_path(user_id, date);

        fs::create_dir_all(&user_dir).map_err(|e| DayStorageError::IoError(user_dir.clone(), e))?;

        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| DayStorageError::CorruptDocument(path.clone(), e.to_string()))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        let mut file =
            File::create(&temp_path).map_err(|e| DayStorageError::IoError(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| DayStorageError::IoError(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| DayStorageError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &path).map_err(|e| DayStorageError::IoError(path, e))?;

        Ok(())
    }
}
