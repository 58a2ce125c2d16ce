use serde::{Deserialize, Serialize};

use super::FreeTextEntry;
use crate::quiz::QuizTexts;

/// Snapshot of every statistic, ready to be rendered as one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Number of records the report was computed from.
    pub total: usize,
    /// (display name, wins), most wins first.
    pub winners: Vec<(String, usize)>,
    /// (question label, rendered shares), catalog order.
    pub answers: Vec<(String, String)>,
    pub free_text: Vec<FreeTextEntry>,
}

impl StatsReport {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn render(&self, texts: &QuizTexts) -> String {
        let mut out = texts.stats_title.clone();

        if self.is_empty() {
            out.push_str("\n\n");
            out.push_str(&texts.stats_empty);
            return out;
        }

        out.push_str("\n\n");
        out.push_str(&texts.winners_heading);
        for (name, wins) in &self.winners {
            out.push_str(&format!("\n{name}: {wins}"));
        }

        if !self.answers.is_empty() {
            out.push_str("\n\n");
            out.push_str(&texts.answers_heading);
            for (label, shares) in &self.answers {
                out.push_str(&format!("\n{label}: {shares}"));
            }
        }

        if !self.free_text.is_empty() {
            out.push_str("\n\n");
            out.push_str(&texts.free_text_heading);
            for entry in &self.free_text {
                out.push_str(&format!("\n«{}» ({})", entry.text, entry.prompt));
            }
        }

        out
    }
}
