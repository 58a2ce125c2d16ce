//! Core error types for quizroom-core.
//!
//! This module defines the error hierarchy using thiserror. Quiz-flow
//! errors that are recovered locally (stale or duplicate input) live in
//! [`QuizError`]; everything that has to reach the operator is a
//! [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quizroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog could not be loaded or is inconsistent
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Quiz flow errors that were not recovered locally
    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Conversational channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored payload could not be encoded or decoded
    #[error("Corrupt record payload: {0}")]
    Payload(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Catalog loading errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A catalog file could not be read
    #[error("Failed to read catalog file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A catalog file is not valid JSON for its schema
    #[error("Failed to parse catalog file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The catalog has no questions
    #[error("Catalog contains no questions")]
    NoQuestions,

    /// The catalog has no categories
    #[error("Catalog contains no categories")]
    NoCategories,

    /// A question id contains the button payload separator
    #[error("Question id '{0}' must not contain ':'")]
    InvalidQuestionId(String),

    /// A question has no options
    #[error("Question '{0}' has no options")]
    EmptyQuestion(String),

    /// Two questions or two categories share an identifier
    #[error("Duplicate {kind} identifier '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    /// Two options of one question share a value token
    #[error("Question '{question}' has duplicate option value '{value}'")]
    DuplicateValue { question: String, value: String },

    /// An option contributes to a category that does not exist
    #[error("Option '{value}' of question '{question}' references unknown category '{category}'")]
    UnknownCategory {
        question: String,
        value: String,
        category: String,
    },
}

/// Quiz flow errors.
///
/// Everything except [`QuizError::PersistenceWriteFailure`] is recovered as a
/// silent no-op by the service.
#[derive(Error, Debug)]
pub enum QuizError {
    /// Event for a conversation with no session
    #[error("No active session for conversation {0}")]
    NoActiveSession(crate::events::ConversationId),

    /// Selected value is not an option of the current question
    #[error("Option '{value}' is not available for question '{question}'")]
    UnknownOption { question: String, value: String },

    /// Selection made for a question other than the current one
    #[error("Selection for question '{got}' while question '{expected}' is open")]
    StaleSelection { expected: String, got: String },

    /// Selection while a free-text answer is still pending
    #[error("Free-text answer for question '{0}' is still pending")]
    AwaitingFreeText(String),

    /// Free text supplied while no free-text option was chosen
    #[error("No free-text answer is pending")]
    NoPendingFreeText,

    /// Every question has been answered; the session awaits recording
    #[error("Session is already complete")]
    SessionCompleted,

    /// The result log append failed after all retries
    #[error("Failed to persist result after {attempts} attempt(s): {source}")]
    PersistenceWriteFailure {
        attempts: u32,
        #[source]
        source: DatabaseError,
    },
}

impl QuizError {
    /// Whether the error is a stale/duplicate input guard that the service
    /// recovers from by ignoring the event.
    pub fn is_ignorable(&self) -> bool {
        !matches!(self, QuizError::PersistenceWriteFailure { .. })
    }
}

/// Conversational channel errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API rejected the call
    #[error("API error ({method}): {description}")]
    Api { method: String, description: String },

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Payload(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
