use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use super::{prepare_query, FoodIndex, IndexError};
use crate::models::FoodRecord;

/// Food index backed by the bundled SQLite reference database.
///
/// Expects a `foods(name, calories, protein, carbs, fat)` table. The database
/// is opened read-only by [`SqliteFoodIndex::load`].
#[derive(Debug)]
pub struct SqliteFoodIndex {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

#[derive(sqlx::FromRow)]
struct FoodRow {
    id: i64,
    name: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

// SQLite's LIKE is already case-insensitive for ASCII, which is the folding
// the in-memory engine uses too. Names are matched after the same cleanup
// `FoodRecord::from_raw` applies: trimmed, blank becomes "Unknown".
const SEARCH_SQL: &str = r"
    SELECT id, name, calories, protein, carbs, fat
    FROM (
        SELECT
            rowid AS id,
            CASE
                WHEN TRIM(COALESCE(CAST(name AS TEXT), ''), char(32, 9, 10, 13)) = ''
                    THEN 'Unknown'
                ELSE TRIM(CAST(name AS TEXT), char(32, 9, 10, 13))
            END AS name,
            COALESCE(CAST(calories AS REAL), 0.0) AS calories,
            COALESCE(CAST(protein AS REAL), 0.0) AS protein,
            COALESCE(CAST(carbs AS REAL), 0.0) AS carbs,
            COALESCE(CAST(fat AS REAL), 0.0) AS fat
        FROM foods
    )
    WHERE name LIKE ? ESCAPE '\'
    ORDER BY id
    LIMIT ?
";

impl SqliteFoodIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    /// Opens the database and loads it in one step.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let index = Self::new(path);
        index.load().await?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.pool.initialized()
    }

    /// Connects to the reference database. Safe to call more than once.
    pub async fn load(&self) -> Result<(), IndexError> {
        self.pool
            .get_or_try_init(|| async {
                let open_err = |e: sqlx::Error| IndexError::Open {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                };

                if !self.path.exists() {
                    return Err(IndexError::Open {
                        path: self.path.display().to_string(),
                        reason: "file not found".to_string(),
                    });
                }

                let options = SqliteConnectOptions::new()
                    .filename(&self.path)
                    .read_only(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
                    .map_err(open_err)?;

                let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM foods")
                    .fetch_one(&pool)
                    .await
                    .map_err(open_err)?;
                tracing::info!("Food index loaded: {} foods from {}", count, self.path.display());

                Ok(pool)
            })
            .await?;
        Ok(())
    }
}

/// Escapes LIKE wildcards so the query is matched as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl FoodIndex for SqliteFoodIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, IndexError> {
        let pool = self.pool.get().ok_or(IndexError::IndexUnavailable)?;
        let Some(q) = prepare_query(query, limit) else {
            return Ok(Vec::new());
        };

        let rows: Vec<FoodRow> = sqlx::query_as(SEARCH_SQL)
            .bind(like_pattern(q))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(pool)
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                FoodRecord::from_raw(row.id, &row.name, row.calories, row.protein, row.carbs, row.fat)
            })
            .collect())
    }
}
