//! Persistent record of completed attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::quiz::{Answer, Scores};

/// One completed attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub participant: String,
    pub winning_category: String,
    /// Weighted scores the winner was chosen from.
    pub scores: Scores,
    pub answers: Vec<Answer>,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only store of [`ResultRecord`]s.
///
/// Implementations serialize concurrent appends so no record is lost or
/// interleaved.
pub trait ResultLog: Send + Sync {
    fn append(&self, record: &ResultRecord) -> Result<(), DatabaseError>;

    /// Every record in append order.
    fn read_all(&self) -> Result<Vec<ResultRecord>, DatabaseError>;
}
