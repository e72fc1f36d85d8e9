// src/models/question.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::StorageError;
use crate::models::pool::Pool;

/// Who touched a record, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub user_id: String,
    pub date: DateTime<Utc>,
}

/// Represents a row of the 'questions' table, plus the optional title
/// side-record.
///
/// `id` is `None` until the store assigns one on first save. A fresh
/// question is a mint draft: invisible to listings and counts until the
/// caller clears the flag, and purged by the lifecycle sweep if abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Option<i64>,

    /// Tenant/course scope the question belongs to.
    pub context: String,

    /// Plugin type key selecting the type-specific payload schema.
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    pub question_type: String,

    /// Owning pool; `None` only transiently, between clone and re-save.
    pub pool_id: Option<i64>,

    /// Plain-text summary of the presentation text; refreshed on save,
    /// display-only.
    pub description: Option<String>,

    /// The main body shown to the taker, as markup.
    pub presentation_text: Option<String>,

    /// Ordered resource references attached to the presentation.
    /// Stored as a JSON array in the database.
    pub presentation_attachments: Vec<String>,

    pub feedback: Option<String>,
    pub hints: Option<String>,

    /// Free-form strings owned by whoever hosts the question.
    /// Stored as a JSON array in the database.
    pub guest: Vec<String>,

    /// Opaque payload interpreted by the question type.
    /// Stored as a JSON array in the database.
    pub type_data: Vec<String>,

    /// Survey presentation attribute: ask takers to explain their answer.
    pub explain_reason: bool,

    /// Ungraded (survey) variant.
    pub survey: bool,

    /// Content-complete and usable. Stored, never enforced: a save is
    /// accepted whatever this says.
    pub valid: bool,

    /// Draft not yet finalized; hidden from every listing and count.
    pub mint: bool,

    /// Immutable archived snapshot, created only by the copy engine.
    pub historical: bool,

    pub created: Attribution,
    pub modified: Attribution,

    // Kept behind accessors: blank and absent normalize to the same state.
    title: Option<String>,
}

impl Question {
    /// A new mint draft in `context`, not yet persisted.
    pub fn new(context: &str, question_type: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        let stamp = Attribution {
            user_id: user_id.to_string(),
            date: now,
        };
        Self {
            id: None,
            context: context.to_string(),
            question_type: question_type.to_string(),
            pool_id: None,
            description: None,
            presentation_text: None,
            presentation_attachments: Vec::new(),
            feedback: None,
            hints: None,
            guest: Vec::new(),
            type_data: Vec::new(),
            explain_reason: false,
            survey: false,
            valid: false,
            mint: true,
            historical: false,
            created: stamp.clone(),
            modified: stamp,
            title: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set the title. Blank collapses to absent.
    pub fn set_title(&mut self, title: Option<&str>) {
        self.title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    /// A copy of this question targeted at `destination`: same content,
    /// no identity yet, fresh audit stamps.
    pub fn cloned_into(&self, destination: &Pool, user_id: &str, now: DateTime<Utc>) -> Self {
        let stamp = Attribution {
            user_id: user_id.to_string(),
            date: now,
        };
        let mut copy = self.clone();
        copy.id = None;
        copy.pool_id = destination.id;
        copy.context = destination.context.clone();
        copy.created = stamp.clone();
        copy.modified = stamp;
        copy
    }

    pub(crate) fn require_id(&self) -> Result<i64, StorageError> {
        self.id
            .ok_or_else(|| StorageError::Store("question is not persisted".to_string()))
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        let created_at: i64 = row.try_get("created_at")?;
        let modified_at: i64 = row.try_get("modified_at")?;
        let attachments: String = row.try_get("presentation_attachments")?;
        let guest: String = row.try_get("guest")?;
        let type_data: String = row.try_get("type_data")?;
        let title: Option<String> = row.try_get("title")?;

        let mut question = Self {
            id: Some(row.try_get("id")?),
            context: row.try_get("context")?,
            question_type: row.try_get("type")?,
            pool_id: row.try_get("pool_id")?,
            description: row.try_get("description")?,
            presentation_text: row.try_get("presentation_text")?,
            presentation_attachments: serde_json::from_str(&attachments)?,
            feedback: row.try_get("feedback")?,
            hints: row.try_get("hints")?,
            guest: serde_json::from_str(&guest)?,
            type_data: serde_json::from_str(&type_data)?,
            explain_reason: row.try_get("explain_reason")?,
            survey: row.try_get("survey")?,
            valid: row.try_get("valid")?,
            mint: row.try_get("mint")?,
            historical: row.try_get("historical")?,
            created: Attribution {
                user_id: row.try_get("created_by")?,
                date: millis_to_date(created_at)?,
            },
            modified: Attribution {
                user_id: row.try_get("modified_by")?,
                date: millis_to_date(modified_at)?,
            },
            title: None,
        };
        question.set_title(title.as_deref());
        Ok(question)
    }
}

fn millis_to_date(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Encoding(format!("date out of range: {}", millis)))
}
