//! The immutable quiz catalog.
//!
//! Loaded once at startup from a content directory:
//!
//! - `questions.json`: ordered array of [`Question`]
//! - `categories.json` (or the older `philosophers.json`): array of [`Category`]
//! - `greetings.json` (optional): `{ "greetings": [..] }`
//!
//! Loading validates the invariants the engine relies on; any failure is
//! fatal because no quiz can run without a catalog.

mod model;

pub use model::{Category, Question, QuizOption};

use std::collections::HashSet;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::error::CatalogError;

/// Marker that turns an option into a free-text option when it appears in
/// the option text.
pub const DEFAULT_FREE_TEXT_MARKER: &str = "✍️";

/// Separates the question id from the option value in button payloads, so
/// question ids may not contain it.
pub const QUESTION_ID_SEPARATOR: char = ':';

#[derive(Debug, Clone)]
pub struct Catalog {
    questions: Vec<Question>,
    categories: Vec<Category>,
    greetings: Vec<String>,
}

#[derive(Deserialize)]
struct GreetingsFile {
    #[serde(default)]
    greetings: Vec<String>,
}

impl Catalog {
    /// Build a catalog, validating ids, option values and category references.
    pub fn new(
        questions: Vec<Question>,
        categories: Vec<Category>,
        greetings: Vec<String>,
    ) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::NoQuestions);
        }
        if categories.is_empty() {
            return Err(CatalogError::NoCategories);
        }

        let mut category_ids = HashSet::new();
        for c in &categories {
            if !category_ids.insert(c.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "category",
                    id: c.id.clone(),
                });
            }
        }

        let mut question_ids = HashSet::new();
        for q in &questions {
            if !question_ids.insert(q.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "question",
                    id: q.id.clone(),
                });
            }
            if q.id.contains(QUESTION_ID_SEPARATOR) {
                return Err(CatalogError::InvalidQuestionId(q.id.clone()));
            }
            if q.options.is_empty() {
                return Err(CatalogError::EmptyQuestion(q.id.clone()));
            }
            let mut values = HashSet::new();
            for opt in &q.options {
                if !values.insert(opt.value.as_str()) {
                    return Err(CatalogError::DuplicateValue {
                        question: q.id.clone(),
                        value: opt.value.clone(),
                    });
                }
                if let Some(unknown) = opt
                    .categories
                    .iter()
                    .find(|c| !category_ids.contains(c.as_str()))
                {
                    return Err(CatalogError::UnknownCategory {
                        question: q.id.clone(),
                        value: opt.value.clone(),
                        category: unknown.clone(),
                    });
                }
            }
        }

        Ok(Self {
            questions,
            categories,
            greetings,
        })
    }

    /// Load the catalog from a content directory.
    ///
    /// Options whose text contains `free_text_marker` are flagged as
    /// free-text options in addition to those that declare `free_text`.
    pub fn load_dir(dir: &Path, free_text_marker: &str) -> Result<Self, CatalogError> {
        let mut questions: Vec<Question> = read_json(&dir.join("questions.json"))?;

        let categories_path = dir.join("categories.json");
        let categories: Vec<Category> = if categories_path.exists() {
            read_json(&categories_path)?
        } else {
            read_json(&dir.join("philosophers.json"))?
        };

        let greetings_path = dir.join("greetings.json");
        let greetings = if greetings_path.exists() {
            read_json::<GreetingsFile>(&greetings_path)?.greetings
        } else {
            Vec::new()
        };

        if !free_text_marker.is_empty() {
            for opt in questions.iter_mut().flat_map(|q| q.options.iter_mut()) {
                if opt.text.contains(free_text_marker) {
                    opt.free_text = true;
                }
            }
        }

        let catalog = Self::new(questions, categories, greetings)?;
        info!(
            questions = catalog.question_count(),
            categories = catalog.categories.len(),
            greetings = catalog.greetings.len(),
            dir = %dir.display(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn question_by_id(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Categories in declaration order. This order breaks scoring ties.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Position of the category in declaration order.
    pub fn category_rank(&self, id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// A random greeting, if the content provides any.
    pub fn greeting<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.greetings.choose(rng).map(String::as_str)
    }

    pub fn greeting_count(&self) -> usize {
        self.greetings.len()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CatalogError::ParseFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn option(value: &str, categories: &[&str]) -> QuizOption {
        QuizOption {
            text: value.to_uppercase(),
            value: value.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            free_text: false,
        }
    }

    pub fn free_text_option(value: &str, categories: &[&str]) -> QuizOption {
        QuizOption {
            free_text: true,
            ..option(value, categories)
        }
    }

    pub fn question(id: &str, options: Vec<QuizOption>) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("Prompt {id}"),
            options,
        }
    }

    pub fn category(id: &str) -> Category {
        Category {
            id: id.to_string(),
            name: format!("Name {id}"),
            emoji: "🏛".into(),
            description: format!("About {id}"),
            quote: format!("Quote {id}"),
            avatar: format!("avatars/{id}.jpg"),
        }
    }

    /// Two questions: q1 {a→C1, b→C2}, q2 {a→C2, b→C1, free→C1 (free text)}.
    pub fn small_catalog() -> Catalog {
        Catalog::new(
            vec![
                question("q1", vec![option("a", &["C1"]), option("b", &["C2"])]),
                question(
                    "q2",
                    vec![
                        option("a", &["C2"]),
                        option("b", &["C1"]),
                        free_text_option("free", &["C1"]),
                    ],
                ),
            ],
            vec![category("C1"), category("C2")],
            vec!["Hello!".into()],
        )
        .unwrap()
    }
}
