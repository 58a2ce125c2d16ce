//! SQLite-based persistence.
//!
//! Provides persistent storage for:
//! - Completed quiz attempts (the result log)
//! - Mini-app player profiles (opaque JSON documents)
//! - Conversations that have greeted the bot at least once

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::warn;

use super::data_dir;
use super::results::{ResultLog, ResultRecord};
use crate::error::{CoreError, DatabaseError};
use crate::events::ConversationId;

/// SQLite database shared by the bot and the profile API.
///
/// The connection sits behind a mutex, so every write is serialized.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/quizroom/quizroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("quizroom.db");
        Ok(Self::open_path(&path)?)
    }

    pub fn open_path(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS results (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    participant      TEXT NOT NULL,
                    winning_category TEXT NOT NULL,
                    scores           TEXT NOT NULL,
                    answers          TEXT NOT NULL,
                    recorded_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS players (
                    id   TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                    conversation_id INTEGER PRIMARY KEY,
                    first_seen      TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_results_winning_category ON results(winning_category);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Number of stored results.
    pub fn result_count(&self) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Store a new player profile under a fresh id, stamping `createdAt`
    /// and `lastUpdated`. Returns the id.
    ///
    /// # Errors
    /// Returns [`DatabaseError::Payload`] if `body` is not a JSON object.
    pub fn create_player(&self, body: Value) -> Result<String, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let mut fields = into_object(body)?;
        fields.insert("createdAt".into(), Value::String(now.clone()));
        fields.insert("lastUpdated".into(), Value::String(now));
        self.put_player(&id, &Value::Object(fields))?;
        Ok(id)
    }

    /// Replace the profile stored under `id`, creating it if absent, and
    /// stamp `lastUpdated`.
    pub fn replace_player(&self, id: &str, body: Value) -> Result<(), DatabaseError> {
        let mut fields = into_object(body)?;
        fields.insert("lastUpdated".into(), Value::String(Utc::now().to_rfc3339()));
        self.put_player(id, &Value::Object(fields))
    }

    /// Store `body` verbatim under `id`.
    pub fn put_player(&self, id: &str, body: &Value) -> Result<(), DatabaseError> {
        let text = serde_json::to_string(body)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO players (id, body) VALUES (?1, ?2)",
            params![id, text],
        )?;
        Ok(())
    }

    pub fn get_player(&self, id: &str) -> Result<Option<Value>, DatabaseError> {
        let body: Option<String> = self
            .conn()
            .query_row("SELECT body FROM players WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn player_count(&self) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remember a conversation. Returns `true` the first time it is seen.
    pub fn remember_user(&self, conversation: ConversationId) -> Result<bool, DatabaseError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (conversation_id, first_seen) VALUES (?1, ?2)",
            params![conversation.0, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    pub fn user_count(&self) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, DatabaseError> {
    match body {
        Value::Object(fields) => Ok(fields),
        other => Err(DatabaseError::Payload(format!(
            "player body must be a JSON object, got {other}"
        ))),
    }
}

impl ResultLog for Database {
    fn append(&self, record: &ResultRecord) -> Result<(), DatabaseError> {
        let scores = serde_json::to_string(&record.scores)?;
        let answers = serde_json::to_string(&record.answers)?;
        self.conn().execute(
            "INSERT INTO results (participant, winning_category, scores, answers, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.participant,
                record.winning_category,
                scores,
                answers,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Rows that no longer decode are skipped with a warning.
    fn read_all(&self) -> Result<Vec<ResultRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, participant, winning_category, scores, answers, recorded_at
             FROM results ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, participant, winning_category, scores, answers, recorded_at) = row?;
            match decode_row(participant, winning_category, &scores, &answers, &recorded_at) {
                Ok(record) => records.push(record),
                Err(e) => warn!(row = id, error = %e, "skipping undecodable result"),
            }
        }
        Ok(records)
    }
}

fn decode_row(
    participant: String,
    winning_category: String,
    scores: &str,
    answers: &str,
    recorded_at: &str,
) -> Result<ResultRecord, DatabaseError> {
    let recorded_at = DateTime::parse_from_rfc3339(recorded_at)
        .map_err(|e| DatabaseError::Payload(e.to_string()))?
        .with_timezone(&Utc);
    Ok(ResultRecord {
        participant,
        winning_category,
        scores: serde_json::from_str(scores)?,
        answers: serde_json::from_str(answers)?,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Answer;
    use serde_json::json;

    fn record(winner: &str) -> ResultRecord {
        ResultRecord {
            participant: "alice".into(),
            winning_category: winner.into(),
            scores: [("C1".to_string(), 2.0), ("C2".to_string(), 0.5)]
                .into_iter()
                .collect(),
            answers: vec![Answer {
                question_id: "q1".into(),
                value: "a".into(),
                free_text: Some("hello".into()),
            }],
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_read_back_in_order() {
        let db = Database::open_memory().unwrap();
        db.append(&record("C1")).unwrap();
        db.append(&record("C2")).unwrap();

        let all = db.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].winning_category, "C1");
        assert_eq!(all[1].winning_category, "C2");
        assert_eq!(all[0].answers[0].free_text.as_deref(), Some("hello"));
        assert_eq!(all[0].scores["C2"], 0.5);
        assert_eq!(db.result_count().unwrap(), 2);
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let db = Database::open_memory().unwrap();
        db.append(&record("C1")).unwrap();
        db.conn()
            .execute(
                "INSERT INTO results (participant, winning_category, scores, answers, recorded_at)
                 VALUES ('bob', 'C2', 'not json', '[]', 'yesterday')",
                [],
            )
            .unwrap();

        let all = db.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].winning_category, "C1");
    }

    #[test]
    fn open_path_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizroom.db");
        Database::open_path(&path).unwrap().append(&record("C1")).unwrap();
        let reopened = Database::open_path(&path).unwrap();
        assert_eq!(reopened.read_all().unwrap().len(), 1);
    }

    #[test]
    fn create_player_stamps_timestamps() {
        let db = Database::open_memory().unwrap();
        let id = db.create_player(json!({"name": "Hypatia"})).unwrap();
        let stored = db.get_player(&id).unwrap().unwrap();
        assert_eq!(stored["name"], "Hypatia");
        assert!(stored["createdAt"].is_string());
        assert_eq!(stored["createdAt"], stored["lastUpdated"]);
    }

    #[test]
    fn replace_player_overwrites_body() {
        let db = Database::open_memory().unwrap();
        let id = db.create_player(json!({"name": "Hypatia", "level": 1})).unwrap();
        db.replace_player(&id, json!({"level": 2})).unwrap();

        let stored = db.get_player(&id).unwrap().unwrap();
        assert_eq!(stored["level"], 2);
        assert!(stored.get("name").is_none());
        assert!(stored["lastUpdated"].is_string());
    }

    #[test]
    fn replace_player_creates_missing_id() {
        let db = Database::open_memory().unwrap();
        db.replace_player("fresh", json!({})).unwrap();
        assert!(db.get_player("fresh").unwrap().is_some());
    }

    #[test]
    fn players_require_object_bodies() {
        let db = Database::open_memory().unwrap();
        let err = db.create_player(json!([1, 2])).unwrap_err();
        assert!(matches!(err, DatabaseError::Payload(_)));
        assert_eq!(db.player_count().unwrap(), 0);
    }

    #[test]
    fn missing_player_is_none() {
        let db = Database::open_memory().unwrap();
        assert!(db.get_player("nope").unwrap().is_none());
    }

    #[test]
    fn remember_user_reports_first_visit() {
        let db = Database::open_memory().unwrap();
        assert!(db.remember_user(ConversationId(7)).unwrap());
        assert!(!db.remember_user(ConversationId(7)).unwrap());
        assert_eq!(db.user_count().unwrap(), 1);
    }
}
