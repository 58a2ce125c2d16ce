use std::path::PathBuf;

use clap::Subcommand;
use quizroom_core::analytics::{self, winner_frequency, Analytics};
use quizroom_core::storage::Database;
use quizroom_core::Config;

use super::load_catalog;

#[derive(Subcommand)]
pub enum StatsAction {
    /// How often each category won
    Winners {
        #[arg(long)]
        json: bool,
    },
    /// Share of each answer per question
    Answers {
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Random sample of free-text answers
    FreeText {
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
        /// Number of entries (defaults to quiz.free_text_sample_size)
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
    /// The report the bot sends for /stats
    Report {
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let records = analytics::load_records(&db);
    let mut rng = rand::thread_rng();

    match action {
        StatsAction::Winners { json } => {
            let winners = winner_frequency(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&winners)?);
            } else {
                for (category, count) in winners {
                    println!("{category}: {count}");
                }
            }
        }
        StatsAction::Answers { catalog_dir, json } => {
            let catalog = load_catalog(&config, catalog_dir)?;
            let distribution = Analytics::new(&catalog).answer_distribution(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&distribution)?);
            } else {
                for question in distribution {
                    println!("{}: {}", question.question_id, question.render());
                }
            }
        }
        StatsAction::FreeText { catalog_dir, count } => {
            let catalog = load_catalog(&config, catalog_dir)?;
            let n = count.unwrap_or(config.quiz.free_text_sample_size);
            for entry in Analytics::new(&catalog).free_text_sample(&records, n, &mut rng) {
                println!("[{}] {}", entry.question_id, entry.text);
            }
        }
        StatsAction::Report { catalog_dir } => {
            let catalog = load_catalog(&config, catalog_dir)?;
            let report = Analytics::new(&catalog).report(
                &records,
                config.quiz.free_text_sample_size,
                &mut rng,
            );
            println!("{}", report.render(&config.quiz.texts));
        }
    }
    Ok(())
}
