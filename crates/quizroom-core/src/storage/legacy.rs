//! One-off imports of the JSON files written by earlier deployments.
//!
//! - `results.json`: `{"results": [{user, topPhilosopher, scores, answers, date}]}`
//!   where `topPhilosopher` is a display name, not an id.
//! - `players_wrong_format.json`: `{"players": [ {...}, ... ]}`, an array
//!   instead of an id-keyed map.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::database::Database;
use super::results::{ResultLog, ResultRecord};
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::quiz::Answer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// Winner names that matched no category; imported as-is.
    pub unmapped: Vec<String>,
}

#[derive(Deserialize)]
struct LegacyResults {
    #[serde(default)]
    results: Vec<LegacyResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyResult {
    #[serde(default)]
    user: Value,
    top_philosopher: Option<String>,
    #[serde(default)]
    scores: BTreeMap<String, f64>,
    #[serde(default)]
    answers: Vec<LegacyAnswer>,
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAnswer {
    question_id: Value,
    value: Value,
    #[serde(default)]
    free_text: Option<String>,
}

#[derive(Deserialize)]
struct LegacyPlayers {
    #[serde(default)]
    players: Value,
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Convert a legacy results file into records, resolving winner names
/// against the catalog. Entries without a winner are skipped.
pub fn parse_results(
    content: &str,
    catalog: &Catalog,
) -> Result<(Vec<ResultRecord>, ImportSummary), CoreError> {
    let legacy: LegacyResults = serde_json::from_str(content)?;
    let mut summary = ImportSummary::default();
    let mut records = Vec::with_capacity(legacy.results.len());

    for entry in legacy.results {
        let Some(name) = entry.top_philosopher else {
            summary.skipped += 1;
            continue;
        };
        let winning_category = match catalog
            .category_by_name(&name)
            .or_else(|| catalog.category(&name))
        {
            Some(category) => category.id.clone(),
            None => {
                if !summary.unmapped.contains(&name) {
                    summary.unmapped.push(name.clone());
                }
                name
            }
        };
        let recorded_at = entry
            .date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        records.push(ResultRecord {
            participant: plain(&entry.user),
            winning_category,
            scores: entry.scores,
            answers: entry
                .answers
                .iter()
                .map(|a| Answer {
                    question_id: plain(&a.question_id),
                    value: plain(&a.value),
                    free_text: a.free_text.clone().filter(|t| !t.is_empty()),
                })
                .collect(),
            recorded_at,
        });
        summary.imported += 1;
    }

    Ok((records, summary))
}

/// Append every record of a legacy results file to `log`.
pub fn import_results<L: ResultLog + ?Sized>(
    path: &Path,
    catalog: &Catalog,
    log: &L,
) -> Result<ImportSummary, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let (records, summary) = parse_results(&content, catalog)?;
    for record in &records {
        log.append(record)?;
    }
    if !summary.unmapped.is_empty() {
        warn!(names = ?summary.unmapped, "winner names without a matching category");
    }
    info!(imported = summary.imported, skipped = summary.skipped, "results imported");
    Ok(summary)
}

/// Move every player of an array-shaped players file into the profile
/// store under fresh ids.
///
/// `lastUpdated` is taken from `SavedDate` when present, and
/// `TreePartData.PlayerId` is filled with the new id when missing.
pub fn import_players(path: &Path, db: &Database) -> Result<ImportSummary, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let legacy: LegacyPlayers = serde_json::from_str(&content)?;
    let mut summary = ImportSummary::default();

    let Value::Array(players) = legacy.players else {
        warn!(path = %path.display(), "players file has no player array, nothing to import");
        return Ok(summary);
    };

    for player in players {
        let Value::Object(mut fields) = player else {
            summary.skipped += 1;
            continue;
        };
        let id = uuid::Uuid::new_v4().to_string();

        let last_updated = match fields.get("SavedDate") {
            Some(Value::String(saved)) if !saved.is_empty() => saved.clone(),
            _ => Utc::now().to_rfc3339(),
        };
        fields.insert("lastUpdated".into(), Value::String(last_updated));

        if let Some(Value::Object(tree)) = fields.get_mut("TreePartData") {
            let has_id = tree
                .get("PlayerId")
                .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
            if !has_id {
                tree.insert("PlayerId".into(), Value::String(id.clone()));
            }
        }

        db.put_player(&id, &Value::Object(fields))?;
        summary.imported += 1;
    }

    info!(imported = summary.imported, skipped = summary.skipped, "players imported");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;

    const RESULTS: &str = r#"{
        "results": [
            {
                "user": "alice",
                "topPhilosopher": "Name C2",
                "scores": {"C1": 1, "C2": 2},
                "answers": [
                    {"questionId": 1, "value": "b"},
                    {"questionId": "q2", "value": "free", "freeText": "Know thyself"}
                ],
                "date": "2024-05-01T10:00:00.000Z"
            },
            {"user": 12345, "topPhilosopher": "Zeno", "scores": {}, "answers": []},
            {"user": "carol"}
        ]
    }"#;

    #[test]
    fn parse_results_maps_names_to_ids() {
        let catalog = small_catalog();
        let (records, summary) = parse_results(RESULTS, &catalog).unwrap();

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unmapped, vec!["Zeno".to_string()]);

        assert_eq!(records[0].winning_category, "C2");
        assert_eq!(records[0].answers[0].question_id, "1");
        assert_eq!(records[0].answers[0].free_text, None);
        assert_eq!(records[0].answers[1].free_text.as_deref(), Some("Know thyself"));
        assert_eq!(records[0].scores["C2"], 2.0);
        assert_eq!(records[0].recorded_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert_eq!(records[1].participant, "12345");
        assert_eq!(records[1].winning_category, "Zeno");
    }

    #[test]
    fn import_results_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, RESULTS).unwrap();
        let db = Database::open_memory().unwrap();

        let summary = import_results(&path, &small_catalog(), &db).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(db.read_all().unwrap().len(), 2);
    }

    #[test]
    fn import_players_assigns_ids_and_fills_tree_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players_wrong_format.json");
        std::fs::write(
            &path,
            r#"{"players": [
                {"Name": "A", "SavedDate": "2024-01-02T03:04:05Z", "TreePartData": {}},
                {"Name": "B", "TreePartData": {"PlayerId": "kept"}},
                "garbage"
            ]}"#,
        )
        .unwrap();
        let db = Database::open_memory().unwrap();

        let summary = import_players(&path, &db).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(db.player_count().unwrap(), 2);
    }

    #[test]
    fn import_players_tolerates_missing_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.json");
        std::fs::write(&path, r#"{"players": {}}"#).unwrap();
        let db = Database::open_memory().unwrap();

        assert_eq!(import_players(&path, &db).unwrap(), ImportSummary::default());
    }
}
