// src/storage.rs

use std::collections::HashMap;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::cache::RequestCache;
use crate::error::StorageError;
use crate::lifecycle::{CONTEXT_LISTABLE, POOL_LISTABLE};
use crate::models::pool::{Pool, PoolCounts};
use crate::models::question::Question;
use crate::sort::{QuestionSort, paginate};
use crate::store::{Arg, RecordStore, UnitOfWork};
use crate::translate::plain_text_summary;

/// All question rows carry their title from the side table; pools are
/// joined for the pool sort keys.
const QUESTION_FIELDS: &str = "q.id, q.context, q.type, q.pool_id, q.description, \
    q.presentation_text, q.presentation_attachments, q.feedback, q.hints, q.guest, \
    q.type_data, q.explain_reason, q.survey, q.valid, q.mint, q.historical, \
    q.created_by, q.created_at, q.modified_by, q.modified_at, t.title";

const QUESTION_TABLES: &str = "questions q \
    LEFT JOIN pools p ON q.pool_id = p.id \
    LEFT JOIN question_titles t ON t.question_id = q.id";

const INSERT_QUESTION: &str = r#"
INSERT INTO questions
    (context, type, pool_id, description, presentation_text, presentation_attachments,
     feedback, hints, guest, type_data, explain_reason, survey, valid, mint, historical,
     created_by, created_at, modified_by, modified_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

// Creation attribution is written once and never updated.
const UPDATE_QUESTION: &str = r#"
UPDATE questions
SET context = ?, type = ?, pool_id = ?, description = ?, presentation_text = ?,
    presentation_attachments = ?, feedback = ?, hints = ?, guest = ?, type_data = ?,
    explain_reason = ?, survey = ?, valid = ?, mint = ?, historical = ?,
    modified_by = ?, modified_at = ?
WHERE id = ?
"#;

/// Persistence for questions and the pools that hold them.
///
/// Reads go through the caller's [`RequestCache`]; writes evict from it.
/// Rows that fail to decode are logged and skipped, never surfaced as
/// errors: a listing drops them and a single-row lookup reports `None`.
#[derive(Debug, Clone)]
pub struct QuestionStorage {
    store: RecordStore,
}

impl QuestionStorage {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Insert or update a question together with its title side-record.
    ///
    /// The display description is refreshed from the presentation text on
    /// every save. A successful insert assigns the id back onto the entity.
    pub async fn save_question(
        &self,
        cache: &mut RequestCache,
        question: &mut Question,
    ) -> Result<(), StorageError> {
        question.description = plain_text_summary(question.presentation_text.as_deref());

        match question.id {
            Some(id) => {
                let mut uow = self
                    .store
                    .begin(&format!("update_question: {}", id))
                    .await?;
                uow.write(UPDATE_QUESTION, &Self::update_args(question, id)?)
                    .await?;
                write_title(&mut uow, id, question.title()).await?;
                uow.commit().await?;
                cache.evict(id);
            }
            None => {
                let mut uow = self.store.begin("insert_question").await?;
                let id = uow
                    .insert(INSERT_QUESTION, &Self::insert_args(question)?)
                    .await?;
                write_title(&mut uow, id, question.title()).await?;
                uow.commit().await?;
                question.id = Some(id);
            }
        }
        Ok(())
    }

    /// Fetch one question by id, serving from the cache when possible.
    /// An unknown id is `None`, not an error; so is a row that cannot
    /// be decoded.
    pub async fn get_question(
        &self,
        cache: &mut RequestCache,
        id: i64,
    ) -> Result<Option<Question>, StorageError> {
        if let Some(question) = cache.get(id) {
            return Ok(Some(question.clone()));
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE q.id = ?",
            QUESTION_FIELDS, QUESTION_TABLES
        );
        let rows = self.store.read(&sql, &[Arg::Int(id)]).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        match Question::from_row(row) {
            Ok(question) => {
                cache.insert(question.clone());
                Ok(Some(question))
            }
            Err(e) => {
                tracing::warn!("Skipping undecodable question {}: {}", id, e);
                Ok(None)
            }
        }
    }

    pub async fn exists_question(&self, id: i64) -> Result<bool, StorageError> {
        let rows = self
            .store
            .read(
                "SELECT COUNT(1) AS count FROM questions WHERE id = ?",
                &[Arg::Int(id)],
            )
            .await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get("count")?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// Delete a question and its title side-record.
    pub async fn remove_question(
        &self,
        cache: &mut RequestCache,
        question: &Question,
    ) -> Result<(), StorageError> {
        let id = question.require_id()?;
        let mut uow = self
            .store
            .begin(&format!("remove_question: {}", id))
            .await?;
        uow.write(
            "DELETE FROM question_titles WHERE question_id = ?",
            &[Arg::Int(id)],
        )
        .await?;
        uow.write("DELETE FROM questions WHERE id = ?", &[Arg::Int(id)])
            .await?;
        uow.commit().await?;
        cache.evict(id);
        Ok(())
    }

    /// Reassign a question to another pool. The question keeps its
    /// context; only ownership moves.
    pub async fn move_question(
        &self,
        cache: &mut RequestCache,
        question: &mut Question,
        destination: &Pool,
    ) -> Result<(), StorageError> {
        let id = question.require_id()?;
        let pool_id = destination.require_id()?;
        self.store
            .write(
                "UPDATE questions SET pool_id = ? WHERE id = ?",
                &[Arg::Int(pool_id), Arg::Int(id)],
            )
            .await?;
        question.pool_id = Some(pool_id);
        cache.evict(id);
        Ok(())
    }

    /// Count the listable questions of a context. Optional filters apply
    /// conjunctively.
    pub async fn count_context_questions(
        &self,
        context: &str,
        question_type: Option<&str>,
        survey: Option<bool>,
        valid: Option<bool>,
    ) -> Result<i64, StorageError> {
        let mut sql = format!(
            "SELECT COUNT(1) AS count FROM questions q WHERE {} AND q.context = ?",
            CONTEXT_LISTABLE
        );
        let mut args = vec![Arg::from(context)];
        push_filters(&mut sql, &mut args, question_type, survey, valid);
        let rows = self.store.read(&sql, &args).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get("count")?,
            None => 0,
        };
        Ok(count)
    }

    /// Count one pool's questions, bucketed by the survey and valid flags.
    /// Archived questions count here; drafts never do.
    pub async fn count_pool_questions(
        &self,
        pool: &Pool,
        question_type: Option<&str>,
    ) -> Result<PoolCounts, StorageError> {
        let pool_id = pool.require_id()?;
        let mut sql = format!(
            "SELECT q.survey, q.valid, COUNT(1) AS count FROM questions q \
             WHERE {} AND q.pool_id = ?",
            POOL_LISTABLE
        );
        let mut args = vec![Arg::Int(pool_id)];
        if let Some(question_type) = question_type {
            sql.push_str(" AND q.type = ?");
            args.push(Arg::from(question_type));
        }
        sql.push_str(" GROUP BY q.survey, q.valid");
        let rows = self.store.read(&sql, &args).await?;
        let mut counts = PoolCounts::default();
        for row in &rows {
            let survey: bool = row.try_get("survey")?;
            let valid: bool = row.try_get("valid")?;
            let count: i64 = row.try_get("count")?;
            counts.tally(survey, valid, count);
        }
        Ok(counts)
    }

    /// Bucketed counts for every live pool of a context, in one query.
    pub async fn count_context_pool_questions(
        &self,
        context: &str,
    ) -> Result<HashMap<i64, PoolCounts>, StorageError> {
        // The draft filter rides in the join so pools with no listable
        // questions still land in the map, with zero counts.
        let sql = "SELECT p.id AS pool_id, q.survey, q.valid, COUNT(q.id) AS count \
                   FROM pools p LEFT JOIN questions q ON p.id = q.pool_id AND q.mint = 0 \
                   WHERE p.context = ? AND p.mint = 0 AND p.historical = 0 \
                   GROUP BY p.id, q.survey, q.valid";
        let rows = self.store.read(sql, &[Arg::from(context)]).await?;
        let mut counts: HashMap<i64, PoolCounts> = HashMap::new();
        for row in &rows {
            let pool_id: i64 = row.try_get("pool_id")?;
            let survey: Option<bool> = row.try_get("survey")?;
            let valid: Option<bool> = row.try_get("valid")?;
            let count: i64 = row.try_get("count")?;
            let entry = counts.entry(pool_id).or_default();
            if let (Some(survey), Some(valid)) = (survey, valid) {
                entry.tally(survey, valid, count);
            }
        }
        Ok(counts)
    }

    /// List a context's questions: non-draft, non-archived, sorted,
    /// optionally filtered and paged.
    #[allow(clippy::too_many_arguments)]
    pub async fn find_context_questions(
        &self,
        cache: &mut RequestCache,
        context: &str,
        sort: QuestionSort,
        question_type: Option<&str>,
        page_num: Option<i64>,
        page_size: Option<i64>,
        survey: Option<bool>,
        valid: Option<bool>,
    ) -> Result<Vec<Question>, StorageError> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} AND q.context = ?",
            QUESTION_FIELDS, QUESTION_TABLES, CONTEXT_LISTABLE
        );
        let mut args = vec![Arg::from(context)];
        push_filters(&mut sql, &mut args, question_type, survey, valid);
        sql.push_str(" ORDER BY ");
        sql.push_str(sort.order_by());
        let rows = self.store.read(&sql, &args).await?;
        let questions = decode_rows(cache, rows);
        Ok(paginate(questions, page_num, page_size))
    }

    /// List a pool's questions. Unlike the context listing, archived
    /// questions show up here; drafts still do not.
    #[allow(clippy::too_many_arguments)]
    pub async fn find_pool_questions(
        &self,
        cache: &mut RequestCache,
        pool: &Pool,
        sort: QuestionSort,
        question_type: Option<&str>,
        page_num: Option<i64>,
        page_size: Option<i64>,
        survey: Option<bool>,
        valid: Option<bool>,
    ) -> Result<Vec<Question>, StorageError> {
        let pool_id = pool.require_id()?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} AND q.pool_id = ?",
            QUESTION_FIELDS, QUESTION_TABLES, POOL_LISTABLE
        );
        let mut args = vec![Arg::Int(pool_id)];
        push_filters(&mut sql, &mut args, question_type, survey, valid);
        sql.push_str(" ORDER BY ");
        sql.push_str(sort.order_by());
        let rows = self.store.read(&sql, &args).await?;
        let questions = decode_rows(cache, rows);
        Ok(paginate(questions, page_num, page_size))
    }

    /// Ids of a pool's non-draft questions, in id order.
    pub async fn get_pool_question_ids(
        &self,
        pool: &Pool,
        survey: Option<bool>,
        valid: Option<bool>,
    ) -> Result<Vec<i64>, StorageError> {
        let pool_id = pool.require_id()?;
        let mut sql = format!(
            "SELECT q.id AS id FROM questions q WHERE {} AND q.pool_id = ?",
            POOL_LISTABLE
        );
        let mut args = vec![Arg::Int(pool_id)];
        push_filters(&mut sql, &mut args, None, survey, valid);
        sql.push_str(" ORDER BY q.id ASC");
        let rows = self.store.read(&sql, &args).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    /// Every non-archived question id in the store, drafts included.
    pub async fn find_all_non_historical_ids(&self) -> Result<Vec<i64>, StorageError> {
        let rows = self
            .store
            .read(
                "SELECT q.id AS id FROM questions q WHERE q.historical = 0 ORDER BY q.id ASC",
                &[],
            )
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    pub async fn save_pool(&self, pool: &mut Pool) -> Result<(), StorageError> {
        match pool.id {
            Some(id) => {
                self.store
                    .write(
                        "UPDATE pools SET context = ?, title = ?, difficulty = ?, points = ?, \
                         mint = ?, historical = ? WHERE id = ?",
                        &[
                            Arg::from(pool.context.as_str()),
                            Arg::from(pool.title.as_str()),
                            Arg::Int(pool.difficulty),
                            Arg::Real(pool.points),
                            Arg::Bool(pool.mint),
                            Arg::Bool(pool.historical),
                            Arg::Int(id),
                        ],
                    )
                    .await?;
            }
            None => {
                let id = self
                    .store
                    .insert(
                        "INSERT INTO pools (context, title, difficulty, points, mint, historical) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                        &[
                            Arg::from(pool.context.as_str()),
                            Arg::from(pool.title.as_str()),
                            Arg::Int(pool.difficulty),
                            Arg::Real(pool.points),
                            Arg::Bool(pool.mint),
                            Arg::Bool(pool.historical),
                        ],
                    )
                    .await?;
                pool.id = Some(id);
            }
        }
        Ok(())
    }

    pub async fn get_pool(&self, id: i64) -> Result<Option<Pool>, StorageError> {
        let rows = self
            .store
            .read(
                "SELECT id, context, title, difficulty, points, mint, historical \
                 FROM pools WHERE id = ?",
                &[Arg::Int(id)],
            )
            .await?;
        match rows.first() {
            Some(row) => Ok(Some(Pool::from_row(row)?)),
            None => Ok(None),
        }
    }

    fn base_args(question: &Question) -> Result<Vec<Arg>, StorageError> {
        Ok(vec![
            Arg::from(question.context.as_str()),
            Arg::from(question.question_type.as_str()),
            question.pool_id.map(Arg::Int).unwrap_or(Arg::Null),
            text_or_null(question.description.as_deref()),
            text_or_null(question.presentation_text.as_deref()),
            json_arg(&question.presentation_attachments)?,
            text_or_null(question.feedback.as_deref()),
            text_or_null(question.hints.as_deref()),
            json_arg(&question.guest)?,
            json_arg(&question.type_data)?,
            Arg::Bool(question.explain_reason),
            Arg::Bool(question.survey),
            Arg::Bool(question.valid),
            Arg::Bool(question.mint),
            Arg::Bool(question.historical),
        ])
    }

    fn insert_args(question: &Question) -> Result<Vec<Arg>, StorageError> {
        let mut args = Self::base_args(question)?;
        args.push(Arg::from(question.created.user_id.as_str()));
        args.push(Arg::Int(question.created.date.timestamp_millis()));
        args.push(Arg::from(question.modified.user_id.as_str()));
        args.push(Arg::Int(question.modified.date.timestamp_millis()));
        Ok(args)
    }

    fn update_args(question: &Question, id: i64) -> Result<Vec<Arg>, StorageError> {
        let mut args = Self::base_args(question)?;
        args.push(Arg::from(question.modified.user_id.as_str()));
        args.push(Arg::Int(question.modified.date.timestamp_millis()));
        args.push(Arg::Int(id));
        Ok(args)
    }
}

/// Replace a question's title side-record inside an open unit of work.
/// `None` clears it.
pub(crate) async fn write_title(
    uow: &mut UnitOfWork,
    question_id: i64,
    title: Option<&str>,
) -> Result<(), StorageError> {
    uow.write(
        "DELETE FROM question_titles WHERE question_id = ?",
        &[Arg::Int(question_id)],
    )
    .await?;
    if let Some(title) = title {
        uow.write(
            "INSERT INTO question_titles (question_id, title) VALUES (?, ?)",
            &[Arg::Int(question_id), Arg::from(title)],
        )
        .await?;
    }
    Ok(())
}

/// Decode listing rows, caching the good ones. A row that fails to decode
/// is logged and skipped rather than failing the whole listing.
fn decode_rows(cache: &mut RequestCache, rows: Vec<SqliteRow>) -> Vec<Question> {
    let mut questions = Vec::with_capacity(rows.len());
    for row in &rows {
        match Question::from_row(row) {
            Ok(question) => {
                cache.insert(question.clone());
                questions.push(question);
            }
            Err(e) => {
                tracing::warn!("Skipping undecodable question row: {}", e);
            }
        }
    }
    questions
}

fn push_filters(
    sql: &mut String,
    args: &mut Vec<Arg>,
    question_type: Option<&str>,
    survey: Option<bool>,
    valid: Option<bool>,
) {
    if let Some(survey) = survey {
        sql.push_str(" AND q.survey = ?");
        args.push(Arg::Bool(survey));
    }
    if let Some(valid) = valid {
        sql.push_str(" AND q.valid = ?");
        args.push(Arg::Bool(valid));
    }
    if let Some(question_type) = question_type {
        sql.push_str(" AND q.type = ?");
        args.push(Arg::from(question_type));
    }
}

fn text_or_null(value: Option<&str>) -> Arg {
    match value {
        Some(v) => Arg::from(v),
        None => Arg::Null,
    }
}

fn json_arg(values: &[String]) -> Result<Arg, StorageError> {
    Ok(Arg::Text(serde_json::to_string(values)?))
}
