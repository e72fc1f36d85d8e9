// src/models/pool.rs

use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::StorageError;

/// Represents a row of the 'pools' table. A pool groups questions inside
/// a context and carries presentation defaults for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: Option<i64>,
    pub context: String,
    pub title: String,
    /// Difficulty rating, 1 (easy) to 5 (hard).
    pub difficulty: i64,
    /// Default point value for questions drawn from this pool.
    pub points: f64,
    pub mint: bool,
    pub historical: bool,
}

impl Pool {
    pub fn new(context: &str, title: &str) -> Self {
        Self {
            id: None,
            context: context.to_string(),
            title: title.to_string(),
            difficulty: 3,
            points: 0.0,
            mint: false,
            historical: false,
        }
    }

    pub(crate) fn require_id(&self) -> Result<i64, StorageError> {
        self.id
            .ok_or_else(|| StorageError::Store("pool is not persisted".to_string()))
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            context: row.try_get("context")?,
            title: row.try_get("title")?,
            difficulty: row.try_get("difficulty")?,
            points: row.try_get("points")?,
            mint: row.try_get("mint")?,
            historical: row.try_get("historical")?,
        })
    }
}

/// Question tallies for one pool, split by the survey and valid flags.
/// Drafts are never counted; archived questions are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoolCounts {
    pub valid_assessment: i64,
    pub invalid_assessment: i64,
    pub valid_survey: i64,
    pub invalid_survey: i64,
}

impl PoolCounts {
    pub(crate) fn tally(&mut self, survey: bool, valid: bool, count: i64) {
        match (survey, valid) {
            (false, true) => self.valid_assessment += count,
            (false, false) => self.invalid_assessment += count,
            (true, true) => self.valid_survey += count,
            (true, false) => self.invalid_survey += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.valid_assessment + self.invalid_assessment + self.valid_survey + self.invalid_survey
    }
}
