//! Read-only food-composition index.
//!
//! Two engines implement [`FoodIndex`] with identical observable behaviour:
//! an embedded SQLite database ([`SqliteFoodIndex`]) and an in-memory table
//! ([`MemoryFoodIndex`]). A match is an ASCII case-insensitive substring match
//! on the food name; results come back in source order, truncated to `limit`.

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::FoodRecord;

pub use memory::MemoryFoodIndex;
pub use sqlite::SqliteFoodIndex;

/// Result limit for manual (typed) searches.
pub const MANUAL_SEARCH_LIMIT: usize = 30;
/// Result limit for voice-driven searches.
pub const VOICE_SEARCH_LIMIT: usize = 12;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Food index is not loaded yet")]
    IndexUnavailable,

    #[error("Failed to open food index {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Food index query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait FoodIndex: Send + Sync {
    /// Returns up to `limit` records whose name contains `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, IndexError>;
}

/// Trims the query and reports whether a search should run at all.
pub(crate) fn prepare_query(query: &str, limit: usize) -> Option<&str> {
    let q = query.trim();
    if q.is_empty() || limit == 0 {
        None
    } else {
        Some(q)
    }
}
