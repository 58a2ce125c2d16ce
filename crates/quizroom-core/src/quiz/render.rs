//! User-facing texts and message rendering.

use serde::{Deserialize, Serialize};

use crate::catalog::{Category, Question};
use crate::events::{Button, ButtonAction, Outbound};

/// Every fixed string the bot sends. Stored under `[quiz.texts]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizTexts {
    pub greeting: String,
    pub start_button: String,
    pub already_button: String,
    pub already_reply: String,
    pub question_label: String,
    pub free_text_prompt: String,
    pub done: String,
    pub stats_offer: String,
    pub stats_button: String,
    pub apology: String,
    pub stats_title: String,
    pub winners_heading: String,
    pub answers_heading: String,
    pub free_text_heading: String,
    pub stats_empty: String,
}

impl Default for QuizTexts {
    fn default() -> Self {
        Self {
            greeting: "Hi! 🦒\nWant to find out which philosopher you are?".into(),
            start_button: "Yes, let's go!".into(),
            already_button: "I'm already a philosopher.".into(),
            already_reply: "All the more interesting, let's compare notes!".into(),
            question_label: "Question".into(),
            free_text_prompt: "Write your answer in a message ✍️".into(),
            done: "Done!\nOne moment... checking your answers against the ancient scrolls 🤓"
                .into(),
            stats_offer: "Want to see the statistics?".into(),
            stats_button: "Yes, show me!".into(),
            apology: "Sorry, something went wrong while saving your result. Please try again later."
                .into(),
            stats_title: "📊 Statistics across all attempts:".into(),
            winners_heading: "🏆 Winners:".into(),
            answers_heading: "✅ Answer popularity:".into(),
            free_text_heading: "✍️ In their own words:".into(),
            stats_empty: "No completed quizzes yet.".into(),
        }
    }
}

/// `/start` reply: greeting plus the two entry buttons.
pub fn greeting(texts: &QuizTexts, greeting: Option<&str>) -> Outbound {
    Outbound::Buttons {
        text: greeting.unwrap_or(&texts.greeting).to_string(),
        buttons: vec![
            Button::new(&texts.start_button, ButtonAction::StartQuiz),
            Button::new(&texts.already_button, ButtonAction::AlreadyPhilosopher),
        ],
    }
}

/// `"Question 2/10\n<prompt>"` with one button per option.
pub fn question(texts: &QuizTexts, question: &Question, index: usize, total: usize) -> Outbound {
    Outbound::Buttons {
        text: format!(
            "{} {}/{}\n{}",
            texts.question_label,
            index + 1,
            total,
            question.prompt
        ),
        buttons: question
            .options
            .iter()
            .map(|opt| {
                Button::new(
                    &opt.text,
                    ButtonAction::Answer {
                        question_id: question.id.clone(),
                        value: opt.value.clone(),
                    },
                )
            })
            .collect(),
    }
}

pub fn result_caption(category: &Category) -> String {
    format!(
        "{} {}\n{}\n\n💬 {}",
        category.emoji, category.name, category.description, category.quote
    )
    .trim_start()
    .to_string()
}

pub fn result_photo(category: &Category) -> Outbound {
    Outbound::Photo {
        reference: category.avatar.clone(),
        caption: result_caption(category),
    }
}

pub fn stats_offer(texts: &QuizTexts) -> Outbound {
    Outbound::Buttons {
        text: texts.stats_offer.clone(),
        buttons: vec![Button::new(&texts.stats_button, ButtonAction::ShowStats)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{category, option};

    #[test]
    fn question_numbering_is_one_based() {
        let q = crate::catalog::fixtures::question("q1", vec![option("a", &[]), option("b", &[])]);
        let out = question(&QuizTexts::default(), &q, 0, 2);
        assert_eq!(out.body(), "Question 1/2\nPrompt q1");
        match out {
            Outbound::Buttons { buttons, .. } => {
                assert_eq!(buttons.len(), 2);
                assert_eq!(
                    buttons[1].action,
                    ButtonAction::Answer {
                        question_id: "q1".into(),
                        value: "b".into()
                    }
                );
            }
            other => panic!("expected buttons, got {other:?}"),
        }
    }

    #[test]
    fn greeting_prefers_content_greeting() {
        let texts = QuizTexts::default();
        assert_eq!(greeting(&texts, Some("Salve!")).body(), "Salve!");
        assert_eq!(greeting(&texts, None).body(), texts.greeting);
    }

    #[test]
    fn caption_contains_name_and_quote() {
        let caption = result_caption(&category("C1"));
        assert!(caption.starts_with("🏛 Name C1"));
        assert!(caption.ends_with("💬 Quote C1"));
    }
}
