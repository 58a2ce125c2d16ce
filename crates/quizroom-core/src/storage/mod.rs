mod config;
pub mod database;
pub mod legacy;
mod results;

pub use config::{
    CatalogConfig, Config, MiniappConfig, QuizConfig, ResultLogConfig, ScoringConfig,
    TelegramConfig,
};
pub use database::Database;
pub use legacy::ImportSummary;
pub use results::{ResultLog, ResultRecord};

use std::path::PathBuf;

/// Returns `~/.config/quizroom[-dev]/` based on QUIZROOM_ENV.
///
/// Set QUIZROOM_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUIZROOM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("quizroom-dev")
    } else {
        base_dir.join("quizroom")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
