use async_trait::async_trait;
use std::sync::OnceLock;

use super::{prepare_query, FoodIndex, IndexError};
use crate::models::FoodRecord;

/// In-memory food index.
///
/// Created empty; searches fail with [`IndexError::IndexUnavailable`] until
/// [`MemoryFoodIndex::load`] has been called once.
#[derive(Debug, Default)]
pub struct MemoryFoodIndex {
    rows: OnceLock<Vec<IndexedRecord>>,
}

#[derive(Debug)]
struct IndexedRecord {
    folded_name: String,
    record: FoodRecord,
}

impl MemoryFoodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index that is already loaded with `records`.
    pub fn with_records(records: Vec<FoodRecord>) -> Self {
        let index = Self::new();
        index.load(records);
        index
    }

    /// Loads the reference rows. Only the first call has an effect.
    pub fn load(&self, records: Vec<FoodRecord>) -> bool {
        let rows = records
            .into_iter()
            .map(|record| IndexedRecord {
                folded_name: record.name.to_ascii_lowercase(),
                record,
            })
            .collect();
        self.rows.set(rows).is_ok()
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.get().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FoodIndex for MemoryFoodIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, IndexError> {
        let rows = self.rows.get().ok_or(IndexError::IndexUnavailable)?;
        let Some(q) = prepare_query(query, limit) else {
            return Ok(Vec::new());
        };
        let needle = q.to_ascii_lowercase();

        Ok(rows
            .iter()
            .filter(|row| row.folded_name.contains(&needle))
            .take(limit)
            .map(|row| row.record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<FoodRecord> {
        vec![
            FoodRecord::from_raw(1, "Eggs, scrambled", 200.0, 14.0, 2.0, 15.0),
            FoodRecord::from_raw(2, "Toast", 80.0, 3.0, 15.0, 1.0),
            FoodRecord::from_raw(3, "Egg white", 17.0, 3.6, 0.2, 0.1),
            FoodRecord::from_raw(4, "100% Juice", 110.0, 0.0, 26.0, 0.0),
        ]
    }

    #[tokio::test]
    async fn test_search_before_load_is_unavailable() {
        let index = MemoryFoodIndex::new();
        let err = index.search("egg", 10).await.unwrap_err();
        assert!(matches!(err, IndexError::IndexUnavailable));
    }

    #[tokio::test]
    async fn test_search_case_insensitive_in_source_order() {
        let index = MemoryFoodIndex::with_records(records());
        let names: Vec<String> = index
            .search("EGG", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Eggs, scrambled", "Egg white"]);
    }

    #[tokio::test]
    async fn test_search_truncates_to_limit() {
        let index = MemoryFoodIndex::with_records(records());
        let results = index.search("e", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let index = MemoryFoodIndex::with_records(records());
        assert!(index.search("  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wildcards_are_literal() {
        let index = MemoryFoodIndex::with_records(records());
        let results = index.search("0%", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(index.search("_", 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_load_only_once() {
        let index = MemoryFoodIndex::new();
        assert!(index.load(records()));
        assert!(!index.load(Vec::new()));
        assert_eq!(index.len(), 4);
    }
}
