use std::path::PathBuf;

use clap::Subcommand;
use quizroom_core::Config;

use super::load_catalog;
use crate::telegram;

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Load and validate the catalog, then print a summary
    Check {
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
    },
}

pub fn run(action: CatalogAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    match action {
        CatalogAction::Check { catalog_dir } => {
            let catalog = load_catalog(&config, catalog_dir)?;
            let free_text = catalog
                .questions()
                .iter()
                .flat_map(|q| q.options.iter())
                .filter(|o| o.free_text)
                .count();
            let greetings = catalog.greeting_count();
            println!("questions:  {}", catalog.question_count());
            println!("categories: {}", catalog.categories().len());
            println!("free-text options: {free_text}");
            println!("greetings:  {greetings}");
            for (question, value) in telegram::oversized_callbacks(&catalog) {
                let limit = telegram::MAX_CALLBACK_DATA;
                println!("warning: option {value:?} of question {question} exceeds {limit} bytes");
            }
            for category in catalog.categories() {
                if category.avatar.is_empty() {
                    println!("warning: category {} has no avatar", category.id);
                }
            }
        }
    }
    Ok(())
}
