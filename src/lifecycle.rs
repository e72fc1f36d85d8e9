// src/lifecycle.rs

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::cache::RequestCache;
use crate::error::StorageError;
use crate::storage::QuestionStorage;
use crate::store::Arg;

/// Visibility filter for pool-scoped reads and counts: drafts are out,
/// archived snapshots stay in.
pub(crate) const POOL_LISTABLE: &str = "q.mint = 0";

/// Visibility filter for context-scoped reads and counts: drafts and
/// archived snapshots are both out.
pub(crate) const CONTEXT_LISTABLE: &str = "q.mint = 0 AND q.historical = 0";

impl QuestionStorage {
    /// Delete every draft created before `stale`, returning the ids that
    /// were removed. Title side-records go with them.
    pub async fn clear_stale_mint_questions(
        &self,
        cache: &mut RequestCache,
        stale: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError> {
        let threshold = Arg::Int(stale.timestamp_millis());
        let mut uow = self.store().begin("clear_stale_mint_questions").await?;
        let rows = uow
            .read(
                "SELECT id FROM questions WHERE mint = 1 AND created_at < ? ORDER BY id ASC",
                &[threshold.clone()],
            )
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get("id")?);
        }
        uow.write(
            "DELETE FROM question_titles WHERE question_id IN \
             (SELECT id FROM questions WHERE mint = 1 AND created_at < ?)",
            &[threshold.clone()],
        )
        .await?;
        uow.write(
            "DELETE FROM questions WHERE mint = 1 AND created_at < ?",
            &[threshold],
        )
        .await?;
        uow.commit().await?;
        cache.clear();
        tracing::debug!("Cleared {} stale draft questions", ids.len());
        Ok(ids)
    }

    /// Delete every question of a context, whatever its state, together
    /// with the title side-records. Pools are left alone.
    pub async fn clear_context(
        &self,
        cache: &mut RequestCache,
        context: &str,
    ) -> Result<(), StorageError> {
        let mut uow = self.store().begin("clear_context").await?;
        uow.write(
            "DELETE FROM question_titles WHERE question_id IN \
             (SELECT id FROM questions WHERE context = ?)",
            &[Arg::from(context)],
        )
        .await?;
        uow.write(
            "DELETE FROM questions WHERE context = ?",
            &[Arg::from(context)],
        )
        .await?;
        uow.commit().await?;
        cache.clear();
        Ok(())
    }
}
