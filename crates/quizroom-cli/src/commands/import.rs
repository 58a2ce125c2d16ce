use std::path::PathBuf;

use clap::Subcommand;
use quizroom_core::storage::{legacy, Database, ImportSummary};
use quizroom_core::Config;

use super::load_catalog;

#[derive(Subcommand)]
pub enum ImportAction {
    /// Append a legacy results.json to the result log
    Results {
        /// Path to results.json
        file: PathBuf,
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
    },
    /// Move an array-shaped players file into the profile store
    Players {
        /// Path to players_wrong_format.json
        file: PathBuf,
    },
}

fn print_summary(summary: &ImportSummary) {
    println!("imported: {}", summary.imported);
    println!("skipped:  {}", summary.skipped);
    for name in &summary.unmapped {
        println!("warning: no category named {name:?}, kept as-is");
    }
}

pub fn run(action: ImportAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        ImportAction::Results { file, catalog_dir } => {
            let config = Config::load()?;
            let catalog = load_catalog(&config, catalog_dir)?;
            print_summary(&legacy::import_results(&file, &catalog, &db)?);
        }
        ImportAction::Players { file } => {
            print_summary(&legacy::import_players(&file, &db)?);
        }
    }
    Ok(())
}
