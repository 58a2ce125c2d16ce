//! TOML-based application configuration.
//!
//! Stores operator settings including:
//! - Quiz timing, sampling and every user-facing text
//! - Catalog location and the free-text marker
//! - Score weighting rules
//! - Telegram and mini-app endpoints
//!
//! Configuration is stored at `~/.config/quizroom/config.toml`. Secrets are
//! never stored here; the bot token comes from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::catalog::DEFAULT_FREE_TEXT_MARKER;
use crate::error::ConfigError;
use crate::quiz::{QuizTexts, ServiceSettings, WeightingRule};

/// Quiz flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
    /// Delete answered question messages after this many seconds. 0 keeps them.
    #[serde(default)]
    pub cleanup_delay_secs: u64,
    #[serde(default = "default_sample_size")]
    pub free_text_sample_size: usize,
    /// Stop a conversation's worker after this long without events.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub texts: QuizTexts,
}

/// Where the question and category files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_free_text_marker")]
    pub free_text_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_weighting")]
    pub weighting: Vec<WeightingRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultLogConfig {
    /// Extra attempts after a failed append.
    #[serde(default = "default_append_retries")]
    pub append_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

/// Profile HTTP API bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniappConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/quizroom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub result_log: ResultLogConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub miniapp: MiniappConfig,
}

// Default functions
fn default_reveal_delay_ms() -> u64 {
    1500
}
fn default_sample_size() -> usize {
    crate::analytics::DEFAULT_SAMPLE_SIZE
}
fn default_idle_timeout_secs() -> u64 {
    600
}
fn default_catalog_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_free_text_marker() -> String {
    DEFAULT_FREE_TEXT_MARKER.into()
}
fn default_weighting() -> Vec<WeightingRule> {
    vec![WeightingRule::new("Диоген_plus", 1.5, "Диоген")]
}
fn default_append_retries() -> u32 {
    2
}
fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3001
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: default_reveal_delay_ms(),
            cleanup_delay_secs: 0,
            free_text_sample_size: default_sample_size(),
            idle_timeout_secs: default_idle_timeout_secs(),
            texts: QuizTexts::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dir: default_catalog_dir(),
            free_text_marker: default_free_text_marker(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weighting: default_weighting(),
        }
    }
}

impl Default for ResultLogConfig {
    fn default() -> Self {
        Self {
            append_retries: default_append_retries(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Default for MiniappConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            quiz: QuizConfig::default(),
            catalog: CatalogConfig::default(),
            scoring: ScoringConfig::default(),
            result_log: ResultLogConfig::default(),
            telegram: TelegramConfig::default(),
            miniapp: MiniappConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::MissingKey(key.into()));
        }
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.into(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::MissingKey(key.into()))?;
                continue;
            }

            let obj = current
                .as_object_mut()
                .ok_or_else(|| ConfigError::MissingKey(key.into()))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| ConfigError::MissingKey(key.into()))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
        }
        Ok(())
    }

    fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    Self::flatten(&key, v, out);
                }
            }
            serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/quizroom"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by key in memory. The new value keeps the type of the
    /// old one; arrays and tables take JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.into(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Every leaf value as `(dot.path, value)`, sorted by key.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            Self::flatten("", &json, &mut out);
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            reveal_delay: Duration::from_millis(self.quiz.reveal_delay_ms),
            cleanup_delay: (self.quiz.cleanup_delay_secs > 0)
                .then(|| Duration::from_secs(self.quiz.cleanup_delay_secs)),
            free_text_sample_size: self.quiz.free_text_sample_size,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.quiz.idle_timeout_secs.max(1))
    }

    /// Bot token from `BOT_TOKEN`, falling back to `QUIZROOM_BOT_TOKEN`.
    pub fn bot_token() -> Option<String> {
        ["BOT_TOKEN", "QUIZROOM_BOT_TOKEN"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|token| !token.trim().is_empty())
    }

    /// Mini-app port, overridable with `MINIAPP_PORT`.
    pub fn miniapp_port(&self) -> u16 {
        std::env::var("MINIAPP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.miniapp.port)
    }
}
