// src/cache.rs

use std::collections::HashMap;

use crate::models::question::Question;

/// Questions already read during the current request or job, keyed by id.
///
/// One instance belongs to one unit of caller work; it is never shared
/// across requests. Reads populate it, writes and removals evict, and the
/// bulk lifecycle operations clear it outright. A caller that mutates rows
/// behind the storage layer's back must clear it too.
#[derive(Debug, Default)]
pub struct RequestCache {
    questions: HashMap<i64, Question>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<&Question> {
        self.questions.get(&id)
    }

    pub(crate) fn insert(&mut self, question: Question) {
        if let Some(id) = question.id {
            self.questions.insert(id, question);
        }
    }

    pub(crate) fn evict(&mut self, id: i64) {
        self.questions.remove(&id);
    }

    pub(crate) fn clear(&mut self) {
        self.questions.clear();
    }
}
