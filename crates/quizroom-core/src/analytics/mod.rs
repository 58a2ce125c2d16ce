//! Aggregate statistics over the result log.
//!
//! Every query reads the full log and recomputes from scratch; nothing is
//! cached between calls. An empty or unreadable log produces empty results.
//!
//! - **Winner frequency**: how often each category won
//! - **Answer distribution**: per question, share of each selected value
//! - **Free-text sample**: a few random answers given in the user's own words

mod report;

pub use report::StatsReport;

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::Catalog;
use crate::storage::{ResultLog, ResultRecord};

/// Free-text answers shown per stats request unless configured otherwise.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Share of one value among a question's answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueShare {
    pub value: String,
    pub count: usize,
    /// Rounded to the nearest integer percent.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDistribution {
    pub question_id: String,
    pub total: usize,
    /// Most chosen first; equal counts keep first-seen order.
    pub shares: Vec<ValueShare>,
}

impl QuestionDistribution {
    /// `"a 75% b 25%"`.
    pub fn render(&self) -> String {
        self.shares
            .iter()
            .map(|s| format!("{} {}%", s.value, s.percent))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextEntry {
    pub question_id: String,
    /// Prompt of the question, or its id if the catalog no longer has it.
    pub prompt: String,
    pub text: String,
}

/// Read the whole log, treating a failed read as an empty log.
pub fn load_records<L: ResultLog + ?Sized>(log: &L) -> Vec<ResultRecord> {
    log.read_all().unwrap_or_else(|e| {
        warn!(error = %e, "result log unreadable, reporting empty statistics");
        Vec::new()
    })
}

/// Category id → number of records it won.
pub fn winner_frequency(records: &[ResultRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.winning_category.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 * 100.0 / total as f64).round() as u32
}

pub struct Analytics<'a> {
    catalog: &'a Catalog,
}

impl<'a> Analytics<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Per-question value shares, questions in catalog order followed by
    /// unknown question ids in first-seen order.
    pub fn answer_distribution(&self, records: &[ResultRecord]) -> Vec<QuestionDistribution> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut questions: Vec<(&str, Vec<(&str, usize)>)> = Vec::new();

        for answer in records.iter().flat_map(|r| r.answers.iter()) {
            let slot = *index.entry(answer.question_id.as_str()).or_insert_with(|| {
                questions.push((answer.question_id.as_str(), Vec::new()));
                questions.len() - 1
            });
            let values = &mut questions[slot].1;
            match values.iter_mut().find(|(v, _)| *v == answer.value) {
                Some((_, count)) => *count += 1,
                None => values.push((answer.value.as_str(), 1)),
            }
        }

        // Stable sorts keep first-seen order among equals.
        questions.sort_by_key(|(id, _)| {
            self.catalog
                .questions()
                .iter()
                .position(|q| q.id == *id)
                .unwrap_or(usize::MAX)
        });

        questions
            .into_iter()
            .map(|(question_id, mut values)| {
                values.sort_by(|a, b| b.1.cmp(&a.1));
                let total: usize = values.iter().map(|(_, c)| c).sum();
                QuestionDistribution {
                    question_id: question_id.to_string(),
                    total,
                    shares: values
                        .into_iter()
                        .map(|(value, count)| ValueShare {
                            value: value.to_string(),
                            count,
                            percent: percent(count, total),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Every answer carrying free text, in log order.
    pub fn free_text_entries(&self, records: &[ResultRecord]) -> Vec<FreeTextEntry> {
        records
            .iter()
            .flat_map(|r| r.answers.iter())
            .filter_map(|answer| {
                let text = answer.free_text.as_ref()?;
                let prompt = self
                    .catalog
                    .question_by_id(&answer.question_id)
                    .map(|q| q.prompt.clone())
                    .unwrap_or_else(|| answer.question_id.clone());
                Some(FreeTextEntry {
                    question_id: answer.question_id.clone(),
                    prompt,
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Up to `n` distinct free-text entries drawn uniformly without replacement.
    pub fn free_text_sample<R: Rng + ?Sized>(
        &self,
        records: &[ResultRecord],
        n: usize,
        rng: &mut R,
    ) -> Vec<FreeTextEntry> {
        let entries = self.free_text_entries(records);
        entries.choose_multiple(rng, n).cloned().collect()
    }

    /// All three queries bundled for display.
    pub fn report<R: Rng + ?Sized>(
        &self,
        records: &[ResultRecord],
        sample_size: usize,
        rng: &mut R,
    ) -> StatsReport {
        let frequency = winner_frequency(records);
        let mut winners: Vec<(String, usize)> = frequency.into_iter().collect();
        winners.sort_by_key(|(id, count)| {
            (
                std::cmp::Reverse(*count),
                self.catalog.category_rank(id).unwrap_or(usize::MAX),
            )
        });
        let winners = winners
            .into_iter()
            .map(|(id, count)| {
                let name = self
                    .catalog
                    .category(&id)
                    .map(|c| c.name.clone())
                    .unwrap_or(id);
                (name, count)
            })
            .collect();

        let answers = self
            .answer_distribution(records)
            .into_iter()
            .map(|d| {
                let label = self
                    .catalog
                    .question_by_id(&d.question_id)
                    .map(|q| q.prompt.clone())
                    .unwrap_or_else(|| d.question_id.clone());
                (label, d.render())
            })
            .collect();

        StatsReport {
            total: records.len(),
            winners,
            answers,
            free_text: self.free_text_sample(records, sample_size, rng),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::quiz::Answer;
    use crate::storage::ResultRecord;

    pub fn answer(question: &str, value: &str) -> Answer {
        Answer {
            question_id: question.into(),
            value: value.into(),
            free_text: None,
        }
    }

    pub fn free_answer(question: &str, value: &str, text: &str) -> Answer {
        Answer {
            free_text: Some(text.into()),
            ..answer(question, value)
        }
    }

    pub fn record(winner: &str, answers: Vec<Answer>) -> ResultRecord {
        ResultRecord {
            participant: "someone".into(),
            winning_category: winner.into(),
            scores: Default::default(),
            answers,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    #[test]
    fn winner_frequency_counts_each_record() {
        let records = vec![record("A", vec![]), record("A", vec![]), record("B", vec![])];
        let freq = winner_frequency(&records);
        assert_eq!(freq.len(), 2);
        assert_eq!(freq["A"], 2);
        assert_eq!(freq["B"], 1);
    }

    #[test]
    fn distribution_three_to_one() {
        let catalog = small_catalog();
        let records = vec![
            record("C1", vec![answer("q1", "Y")]),
            record("C1", vec![answer("q1", "X")]),
            record("C1", vec![answer("q1", "X")]),
            record("C1", vec![answer("q1", "X")]),
        ];
        let dist = Analytics::new(&catalog).answer_distribution(&records);
        assert_eq!(dist.len(), 1);
        assert_eq!(dist[0].total, 4);
        let x = dist[0].shares.iter().find(|s| s.value == "X").unwrap();
        let y = dist[0].shares.iter().find(|s| s.value == "Y").unwrap();
        assert_eq!(x.percent, 75);
        assert_eq!(y.percent, 25);
        assert_eq!(dist[0].render(), "X 75% Y 25%");
    }

    #[test]
    fn distribution_orders_questions_by_catalog() {
        let catalog = small_catalog();
        let records = vec![record(
            "C1",
            vec![answer("zz", "a"), answer("q2", "a"), answer("q1", "b")],
        )];
        let ids: Vec<_> = Analytics::new(&catalog)
            .answer_distribution(&records)
            .into_iter()
            .map(|d| d.question_id)
            .collect();
        assert_eq!(ids, vec!["q1", "q2", "zz"]);
    }

    #[test]
    fn distribution_percentages_sum_close_to_hundred() {
        let catalog = small_catalog();
        let records = vec![
            record("C1", vec![answer("q1", "a")]),
            record("C1", vec![answer("q1", "b")]),
            record("C1", vec![answer("q1", "c")]),
        ];
        let dist = Analytics::new(&catalog).answer_distribution(&records);
        let sum: u32 = dist[0].shares.iter().map(|s| s.percent).sum();
        assert!((99..=101).contains(&sum), "sum was {sum}");
    }

    #[test]
    fn free_text_sample_of_one_returns_it() {
        let catalog = small_catalog();
        let records = vec![record("C1", vec![answer("q1", "a"), free_answer("q2", "free", "X")])];
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        let sample = Analytics::new(&catalog).free_text_sample(&records, 3, &mut rng);
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].text, "X");
        assert_eq!(sample[0].prompt, "Prompt q2");
    }

    #[test]
    fn free_text_sample_of_empty_pool_is_empty() {
        let catalog = small_catalog();
        let records = vec![record("C1", vec![answer("q1", "a")])];
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        assert!(Analytics::new(&catalog)
            .free_text_sample(&records, 3, &mut rng)
            .is_empty());
        assert!(Analytics::new(&catalog)
            .free_text_sample(&[], 3, &mut rng)
            .is_empty());
    }

    #[test]
    fn free_text_sample_is_distinct_and_bounded() {
        let catalog = small_catalog();
        let answers = (0..10)
            .map(|i| free_answer("q2", "free", &format!("text {i}")))
            .collect();
        let records = vec![record("C1", answers)];
        let mut rng = Mcg128Xsl64::seed_from_u64(42);
        let sample = Analytics::new(&catalog).free_text_sample(&records, 3, &mut rng);
        assert_eq!(sample.len(), 3);
        let mut texts: Vec<_> = sample.iter().map(|e| e.text.clone()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), 3);
    }

    #[test]
    fn report_uses_display_names_and_orders_winners() {
        let catalog = small_catalog();
        let records = vec![record("C2", vec![]), record("C1", vec![]), record("C2", vec![])];
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        let report = Analytics::new(&catalog).report(&records, 3, &mut rng);
        assert_eq!(report.total, 3);
        assert_eq!(
            report.winners,
            vec![("Name C2".to_string(), 2), ("Name C1".to_string(), 1)]
        );
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
    }
}
