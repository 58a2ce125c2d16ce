//! # Quizroom Core Library
//!
//! This library provides the core logic of the Quizroom personality quiz
//! bot: a participant answers a fixed sequence of multiple-choice questions,
//! each option adds points to one or more categories, and the highest
//! weighted score names the category the participant "is".
//!
//! The library knows nothing about Telegram or HTTP. Transports implement
//! [`quiz::Channel`] and feed [`events::QuizEvent`]s into a
//! [`quiz::Dispatcher`]; the `quizroom` binary wires the rest.
//!
//! ## Architecture
//!
//! - **Catalog**: immutable questions, options and categories loaded once
//! - **Quiz**: per-conversation session state machine, scoring resolver,
//!   result recorder and the async service that drives them
//! - **Analytics**: winner frequency, answer distribution and free-text
//!   samples recomputed from the result log
//! - **Storage**: SQLite result log and profile store, TOML configuration
//!
//! ## Key Components
//!
//! - [`QuizEngine`]: session state machine
//! - [`ScoringResolver`]: weighting rules and winner selection
//! - [`Database`]: result log, player profiles and known users
//! - [`Config`]: application configuration management

pub mod analytics;
pub mod catalog;
pub mod error;
pub mod events;
pub mod quiz;
pub mod storage;

pub use analytics::{Analytics, StatsReport};
pub use catalog::{Catalog, Category, Question, QuizOption};
pub use error::{
    CatalogError, ChannelError, ConfigError, CoreError, DatabaseError, QuizError,
};
pub use events::{Button, ButtonAction, ConversationId, MessageRef, Outbound, QuizEvent};
pub use quiz::{
    Channel, Dispatcher, QuizEngine, QuizService, QuizTexts, ResultRecorder, ScoringResolver,
    ServiceSettings, SessionStore, WeightingRule,
};
pub use storage::{Config, Database, ResultLog, ResultRecord};
