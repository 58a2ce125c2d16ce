use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one end-user conversation (a Telegram chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a message delivered by the channel, used for later deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

/// Every input the conversational channel delivers to the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizEvent {
    /// `/start`: greet and offer the quiz.
    Greet,
    /// Start (or restart) the quiz.
    Start {
        participant: String,
        /// Send the "already a philosopher" line before the first question.
        #[serde(default)]
        announce: bool,
    },
    /// An option button was pressed.
    OptionSelected {
        /// Question the button belonged to; `None` for buttons that carry
        /// only the value.
        question_id: Option<String>,
        value: String,
    },
    /// A plain text message.
    FreeTextSupplied { text: String },
    /// `/stats` or the "show stats" button.
    ShowStats,
}

/// What pressing a button means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonAction {
    StartQuiz,
    AlreadyPhilosopher,
    ShowStats,
    Answer { question_id: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Every output the quiz asks the channel to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Text { text: String },
    /// Text with one button per row.
    Buttons { text: String, buttons: Vec<Button> },
    /// `reference` is a local file path, a URL or a channel-side file id.
    Photo { reference: String, caption: String },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text { text: text.into() }
    }

    /// The visible text (or caption) of the message.
    pub fn body(&self) -> &str {
        match self {
            Outbound::Text { text } | Outbound::Buttons { text, .. } => text,
            Outbound::Photo { caption, .. } => caption,
        }
    }
}
