//! Static quiz content: questions, options, categories.

use serde::{Deserialize, Deserializer, Serialize};

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub text: String,
    /// Token returned when the option is selected. Unique within its question.
    pub value: String,
    /// Categories that gain one point when this option is chosen.
    #[serde(default, alias = "philosophers")]
    pub categories: Vec<String>,
    /// Selecting the option asks for a follow-up text message.
    #[serde(default)]
    pub free_text: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    pub fn option(&self, value: &str) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.value == value)
    }
}

/// A classification outcome of the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quote: String,
    /// Path, URL or channel file id of the category picture.
    #[serde(default)]
    pub avatar: String,
}

/// Identifiers in the content files are written both as `1` and `"1"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}
