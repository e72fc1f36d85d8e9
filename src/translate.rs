// src/translate.rs

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// One reference rewrite: occurrences of `from` become `to`.
///
/// Applied to opaque reference strings; no URL parsing happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    from: String,
    to: String,
}

impl Translation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn apply(&self, reference: &str) -> String {
        reference.replace(&self.from, &self.to)
    }
}

fn double_quoted_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(src|href)\s*=\s*"([^"]*)""#).expect("reference regex must compile")
    })
}

fn single_quoted_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(src|href)\s*=\s*'([^']*)'").expect("reference regex must compile")
    })
}

fn markup_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup regex must compile"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex must compile"))
}

/// Apply every translation in order to a bare reference string.
pub fn translate_reference(reference: &str, translations: &[Translation]) -> String {
    translations
        .iter()
        .fold(reference.to_string(), |reference, t| t.apply(&reference))
}

/// Rewrite the references embedded in markup: the value of every `src`
/// and `href` attribute, in either quoting style. Attribute spacing is
/// normalized in the process.
pub fn translate_embedded_references(text: &str, translations: &[Translation]) -> String {
    let text = double_quoted_reference().replace_all(text, |caps: &regex::Captures| {
        format!(r#"{}="{}""#, &caps[1], translate_reference(&caps[2], translations))
    });
    let text = single_quoted_reference().replace_all(&text, |caps: &regex::Captures| {
        format!("{}='{}'", &caps[1], translate_reference(&caps[2], translations))
    });
    text.into_owned()
}

/// Rewrite every reference the question carries, in place.
///
/// Markup fields (presentation text, feedback, hints, guest entries,
/// type data entries, title) get their embedded attribute values
/// rewritten; attachment entries are bare references and are rewritten
/// directly.
pub fn rewrite_question_references(question: &mut Question, translations: &[Translation]) {
    if translations.is_empty() {
        return;
    }
    if let Some(text) = question.presentation_text.take() {
        question.presentation_text = Some(translate_embedded_references(&text, translations));
    }
    if let Some(text) = question.feedback.take() {
        question.feedback = Some(translate_embedded_references(&text, translations));
    }
    if let Some(text) = question.hints.take() {
        question.hints = Some(translate_embedded_references(&text, translations));
    }
    for reference in &mut question.presentation_attachments {
        *reference = translate_reference(reference, translations);
    }
    for entry in &mut question.guest {
        *entry = translate_embedded_references(entry, translations);
    }
    for entry in &mut question.type_data {
        *entry = translate_embedded_references(entry, translations);
    }
    let title = question
        .title()
        .map(|t| translate_embedded_references(t, translations));
    question.set_title(title.as_deref());
}

/// Reduce markup to a plain-text summary of at most 255 characters.
/// Tags become spaces, entities for non-breaking spaces are unfolded,
/// and runs of whitespace collapse. All-markup input yields `None`.
pub fn plain_text_summary(text: Option<&str>) -> Option<String> {
    let text = text?;
    let stripped = markup_tag().replace_all(text, " ");
    let stripped = stripped.replace("&nbsp;", " ");
    let collapsed = whitespace_run().replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(255).collect())
}
