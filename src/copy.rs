// src/copy.rs

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;

use crate::cache::RequestCache;
use crate::error::StorageError;
use crate::models::pool::Pool;
use crate::models::question::Question;
use crate::sort::QuestionSort;
use crate::storage::{QuestionStorage, write_title};
use crate::store::{Arg, UnitOfWork};
use crate::translate::{
    Translation, rewrite_question_references, translate_embedded_references, translate_reference,
};

/// Decides whether a copy candidate duplicates a question already present
/// in the destination pool.
pub trait QuestionMatcher {
    fn matches(&self, existing: &Question, candidate: &Question) -> bool;
}

/// The default matcher: equal content, ignoring identity, pool, audit
/// stamps and lifecycle flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentMatcher;

impl QuestionMatcher for ContentMatcher {
    fn matches(&self, existing: &Question, candidate: &Question) -> bool {
        existing.question_type == candidate.question_type
            && existing.survey == candidate.survey
            && existing.explain_reason == candidate.explain_reason
            && existing.presentation_text == candidate.presentation_text
            && existing.presentation_attachments == candidate.presentation_attachments
            && existing.feedback == candidate.feedback
            && existing.hints == candidate.hints
            && existing.guest == candidate.guest
            && existing.type_data == candidate.type_data
            && existing.title() == candidate.title()
    }
}

/// What to copy, where to, and how.
pub struct CopySpec<'a> {
    /// Acting user, stamped onto every copy.
    pub user_id: &'a str,
    pub source: &'a Pool,
    pub destination: &'a Pool,
    /// Copies become archived snapshots; unusable questions are skipped.
    pub as_history: bool,
    /// Reference rewrites applied to every copied question.
    pub translations: Option<&'a [Translation]>,
    /// Absorb copies into content-equal questions already in the
    /// destination instead of duplicating them.
    pub merge: bool,
    /// When present, only these source question ids are copied.
    pub include: Option<&'a HashSet<i64>>,
    /// Duplicate detection used when merging.
    pub matcher: &'a dyn QuestionMatcher,
}

impl<'a> CopySpec<'a> {
    /// A plain copy of everything in `source` into `destination`.
    pub fn new(user_id: &'a str, source: &'a Pool, destination: &'a Pool) -> Self {
        Self {
            user_id,
            source,
            destination,
            as_history: false,
            translations: None,
            merge: false,
            include: None,
            matcher: &ContentMatcher,
        }
    }
}

/// One source question's outcome in a copy run.
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedQuestion {
    pub source_id: i64,
    /// The new copy, or the existing destination question that absorbed it.
    pub question_id: i64,
    pub merged: bool,
}

// Row-to-row copy keyed on the source question, with the destination
// context, pool, audit stamps and the historical override patched in.
const COPY_QUESTION: &str = r#"
INSERT INTO questions
    (context, type, pool_id, description, presentation_text, presentation_attachments,
     feedback, hints, guest, type_data, explain_reason, survey, valid, mint, historical,
     created_by, created_at, modified_by, modified_at)
SELECT ?, q.type, ?, q.description, q.presentation_text, q.presentation_attachments,
       q.feedback, q.hints, q.guest, q.type_data, q.explain_reason, q.survey, q.valid,
       q.mint, CASE WHEN ? THEN 1 ELSE q.historical END,
       ?, ?, ?, ?
FROM questions q WHERE q.id = ?
"#;

const COPY_TITLE: &str = r#"
INSERT INTO question_titles (question_id, title)
SELECT ?, t.title FROM question_titles t WHERE t.question_id = ?
"#;

impl QuestionStorage {
    /// Copy the source pool's questions into the destination pool.
    ///
    /// A plain copy runs as one unit of work: all row copies land or none
    /// do. Merging or filtering with `include` switches to question-by-
    /// question copying, where each copy commits on its own, so a failure
    /// partway leaves the earlier copies in place. Two concurrent merges
    /// into one pool can each insert a copy the other would have absorbed;
    /// callers serialize merges into the same destination.
    pub async fn copy_pool_questions(
        &self,
        cache: &mut RequestCache,
        spec: &CopySpec<'_>,
    ) -> Result<Vec<CopiedQuestion>, StorageError> {
        if spec.merge || spec.include.is_some() {
            self.copy_question_by_question(cache, spec).await
        } else {
            self.copy_rows_directly(spec).await
        }
    }

    async fn copy_rows_directly(
        &self,
        spec: &CopySpec<'_>,
    ) -> Result<Vec<CopiedQuestion>, StorageError> {
        let source_id = spec.source.require_id()?;
        let destination_id = spec.destination.require_id()?;
        // History snapshots only ever include usable questions.
        let valid = if spec.as_history { Some(true) } else { None };
        let ids = self.get_pool_question_ids(spec.source, None, valid).await?;
        let now = Utc::now().timestamp_millis();

        let mut uow = self
            .store()
            .begin(&format!("copy_pool_questions: {}", source_id))
            .await?;
        let mut copied = Vec::with_capacity(ids.len());
        for qid in ids {
            let new_id = uow
                .insert(
                    COPY_QUESTION,
                    &[
                        Arg::from(spec.destination.context.as_str()),
                        Arg::Int(destination_id),
                        Arg::Bool(spec.as_history),
                        Arg::from(spec.user_id),
                        Arg::Int(now),
                        Arg::from(spec.user_id),
                        Arg::Int(now),
                        Arg::Int(qid),
                    ],
                )
                .await?;
            uow.write(COPY_TITLE, &[Arg::Int(new_id), Arg::Int(qid)])
                .await?;
            if let Some(translations) = spec.translations {
                rewrite_row_references(&mut uow, new_id, translations).await?;
            }
            copied.push(CopiedQuestion {
                source_id: qid,
                question_id: new_id,
                merged: false,
            });
        }
        uow.commit().await?;
        tracing::debug!(
            "Copied {} questions from pool {} to pool {}",
            copied.len(),
            source_id,
            destination_id
        );
        Ok(copied)
    }

    async fn copy_question_by_question(
        &self,
        cache: &mut RequestCache,
        spec: &CopySpec<'_>,
    ) -> Result<Vec<CopiedQuestion>, StorageError> {
        let destination_id = spec.destination.require_id()?;
        let now = Utc::now();
        let questions = self
            .find_pool_questions(
                cache,
                spec.source,
                QuestionSort::CreatedDateAsc,
                None,
                None,
                None,
                None,
                None,
            )
            .await?;

        let mut copied = Vec::with_capacity(questions.len());
        for question in &questions {
            let source_id = question.require_id()?;
            if let Some(include) = spec.include {
                if !include.contains(&source_id) {
                    continue;
                }
            }
            // History snapshots only ever include usable questions.
            if spec.as_history && !question.valid {
                continue;
            }

            let mut clone = question.cloned_into(spec.destination, spec.user_id, now);
            if spec.as_history {
                clone.historical = true;
            }
            if let Some(translations) = spec.translations {
                rewrite_question_references(&mut clone, translations);
            }

            if spec.merge {
                // Candidates are read fresh each time so copies made
                // earlier in this run absorb later duplicates.
                let candidates = self
                    .find_pool_questions(
                        cache,
                        spec.destination,
                        QuestionSort::CreatedDateAsc,
                        Some(&clone.question_type),
                        None,
                        None,
                        None,
                        None,
                    )
                    .await?;
                if let Some(existing) = candidates
                    .iter()
                    .find(|existing| spec.matcher.matches(existing, &clone))
                {
                    copied.push(CopiedQuestion {
                        source_id,
                        question_id: existing.require_id()?,
                        merged: true,
                    });
                    continue;
                }
            }

            self.save_question(cache, &mut clone).await?;
            copied.push(CopiedQuestion {
                source_id,
                question_id: clone.require_id()?,
                merged: false,
            });
        }
        tracing::debug!(
            "Copied {} questions into pool {} ({} merged)",
            copied.len(),
            destination_id,
            copied.iter().filter(|c| c.merged).count()
        );
        Ok(copied)
    }
}

/// Rewrite the references of one freshly copied row, inside the copy's
/// unit of work. Touches the same fields as the in-memory rewrite.
async fn rewrite_row_references(
    uow: &mut UnitOfWork,
    question_id: i64,
    translations: &[Translation],
) -> Result<(), StorageError> {
    if translations.is_empty() {
        return Ok(());
    }
    let rows = uow
        .read(
            "SELECT q.presentation_text, q.presentation_attachments, q.feedback, q.hints, \
             q.guest, q.type_data, t.title \
             FROM questions q LEFT JOIN question_titles t ON t.question_id = q.id \
             WHERE q.id = ?",
            &[Arg::Int(question_id)],
        )
        .await?;
    let Some(row) = rows.first() else {
        return Ok(());
    };

    let text: Option<String> = row.try_get("presentation_text")?;
    let attachments: String = row.try_get("presentation_attachments")?;
    let feedback: Option<String> = row.try_get("feedback")?;
    let hints: Option<String> = row.try_get("hints")?;
    let guest: String = row.try_get("guest")?;
    let type_data: String = row.try_get("type_data")?;
    let title: Option<String> = row.try_get("title")?;

    let text = text.map(|t| translate_embedded_references(&t, translations));
    let feedback = feedback.map(|t| translate_embedded_references(&t, translations));
    let hints = hints.map(|t| translate_embedded_references(&t, translations));

    let mut attachments: Vec<String> = serde_json::from_str(&attachments)?;
    for reference in &mut attachments {
        *reference = translate_reference(reference, translations);
    }
    let mut guest: Vec<String> = serde_json::from_str(&guest)?;
    for entry in &mut guest {
        *entry = translate_embedded_references(entry, translations);
    }
    let mut type_data: Vec<String> = serde_json::from_str(&type_data)?;
    for entry in &mut type_data {
        *entry = translate_embedded_references(entry, translations);
    }

    uow.write(
        "UPDATE questions SET presentation_text = ?, presentation_attachments = ?, \
         feedback = ?, hints = ?, guest = ?, type_data = ? WHERE id = ?",
        &[
            text.map(Arg::Text).unwrap_or(Arg::Null),
            Arg::Text(serde_json::to_string(&attachments)?),
            feedback.map(Arg::Text).unwrap_or(Arg::Null),
            hints.map(Arg::Text).unwrap_or(Arg::Null),
            Arg::Text(serde_json::to_string(&guest)?),
            Arg::Text(serde_json::to_string(&type_data)?),
            Arg::Int(question_id),
        ],
    )
    .await?;

    let title = title
        .map(|t| translate_embedded_references(&t, translations))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    write_title(uow, question_id, title.as_deref()).await?;
    Ok(())
}
