//! One quiz attempt of one conversation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

/// Category id → accumulated score.
pub type Scores = BTreeMap<String, f64>;

/// A recorded answer. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text: Option<String>,
}

/// A free-text option was chosen and the text has not arrived yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFreeText {
    pub question_id: String,
    pub value: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    participant: String,
    /// `0 <= position <= question_count`.
    position: usize,
    scores: Scores,
    answers: Vec<Answer>,
    pending_free_text: Option<PendingFreeText>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with a zero score for every catalog category.
    pub fn new(participant: impl Into<String>, catalog: &Catalog) -> Self {
        Self {
            participant: participant.into(),
            position: 0,
            scores: catalog
                .categories()
                .iter()
                .map(|c| (c.id.clone(), 0.0))
                .collect(),
            answers: Vec::new(),
            pending_free_text: None,
            started_at: Utc::now(),
        }
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn pending_free_text(&self) -> Option<&PendingFreeText> {
        self.pending_free_text.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append an answer, add one point to each contributing category and
    /// advance to the next question.
    pub(crate) fn record<'a>(
        &mut self,
        answer: Answer,
        categories: impl IntoIterator<Item = &'a String>,
    ) {
        for category in categories {
            // Unknown ids never reach here: the catalog validates references.
            if let Some(score) = self.scores.get_mut(category) {
                *score += 1.0;
            }
        }
        self.answers.push(answer);
        self.position += 1;
    }

    pub(crate) fn set_pending(&mut self, pending: PendingFreeText) {
        self.pending_free_text = Some(pending);
    }

    pub(crate) fn take_pending(&mut self) -> Option<PendingFreeText> {
        self.pending_free_text.take()
    }
}
