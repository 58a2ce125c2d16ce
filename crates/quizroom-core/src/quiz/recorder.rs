//! Turns a completed attempt into a persisted result record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::engine::Completion;
use crate::error::QuizError;
use crate::storage::{ResultLog, ResultRecord};

/// Appends exactly one [`ResultRecord`] per completed session.
pub struct ResultRecorder<L: ?Sized> {
    log: Arc<L>,
    /// Extra attempts after a failed append.
    retries: u32,
}

impl<L: ResultLog + ?Sized> ResultRecorder<L> {
    pub fn new(log: Arc<L>, retries: u32) -> Self {
        Self { log, retries }
    }

    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    /// Build the record, stamp it with the current time and append it.
    ///
    /// # Errors
    /// Returns [`QuizError::PersistenceWriteFailure`] once every attempt has
    /// failed. Nothing has been written in that case.
    pub fn record(&self, completion: &Completion) -> Result<ResultRecord, QuizError> {
        let record = ResultRecord {
            participant: completion.participant.clone(),
            winning_category: completion.resolution.winner.clone(),
            scores: completion.resolution.scores.clone(),
            answers: completion.answers.clone(),
            recorded_at: Utc::now(),
        };

        let attempts = self.retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.log.append(&record) {
                Ok(()) => {
                    info!(
                        participant = %record.participant,
                        winner = %record.winning_category,
                        "result recorded"
                    );
                    return Ok(record);
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "result append failed, retrying");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(QuizError::PersistenceWriteFailure {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::quiz::scoring::Resolution;
    use crate::quiz::session::Answer;
    use crate::storage::Database;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn completion() -> Completion {
        Completion {
            participant: "alice".into(),
            resolution: Resolution {
                winner: "C1".into(),
                scores: [("C1".to_string(), 2.0), ("C2".to_string(), 1.0)]
                    .into_iter()
                    .collect(),
            },
            answers: vec![Answer {
                question_id: "q1".into(),
                value: "a".into(),
                free_text: None,
            }],
        }
    }

    /// Fails the first `failures` appends.
    struct FlakyLog {
        failures: u32,
        calls: AtomicU32,
        inner: Database,
    }

    impl ResultLog for FlakyLog {
        fn append(&self, record: &ResultRecord) -> Result<(), DatabaseError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DatabaseError::Locked);
            }
            self.inner.append(record)
        }

        fn read_all(&self) -> Result<Vec<ResultRecord>, DatabaseError> {
            self.inner.read_all()
        }
    }

    #[test]
    fn record_appends_exactly_once() {
        let db = Arc::new(Database::open_memory().unwrap());
        let recorder = ResultRecorder::new(Arc::clone(&db), 0);
        let record = recorder.record(&completion()).unwrap();
        assert_eq!(record.winning_category, "C1");

        let all = db.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].participant, "alice");
        assert_eq!(all[0].answers, record.answers);
    }

    #[test]
    fn maximal_retry_budget_does_not_overflow() {
        let db = Arc::new(Database::open_memory().unwrap());
        let recorder = ResultRecorder::new(Arc::clone(&db), u32::MAX);
        recorder.record(&completion()).unwrap();
        assert_eq!(db.read_all().unwrap().len(), 1);
    }

    #[test]
    fn record_retries_transient_failures() {
        let log = Arc::new(FlakyLog {
            failures: 2,
            calls: AtomicU32::new(0),
            inner: Database::open_memory().unwrap(),
        });
        let recorder = ResultRecorder::new(Arc::clone(&log), 2);
        recorder.record(&completion()).unwrap();
        assert_eq!(log.calls.load(Ordering::SeqCst), 3);
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn record_surfaces_persistent_failure() {
        let log = Arc::new(FlakyLog {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            inner: Database::open_memory().unwrap(),
        });
        let recorder = ResultRecorder::new(Arc::clone(&log), 1);
        let err = recorder.record(&completion()).unwrap_err();
        assert!(matches!(
            err,
            QuizError::PersistenceWriteFailure { attempts: 2, .. }
        ));
        assert!(log.read_all().unwrap().is_empty());
    }
}
