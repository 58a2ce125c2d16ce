use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quizroom_core::storage::Database;
use quizroom_core::{
    Config, Dispatcher, QuizEngine, QuizService, ResultRecorder, ScoringResolver, SessionStore,
};
use tracing::{error, info};

use super::load_catalog;
use crate::server;
use crate::telegram::{self, TelegramClient};

#[derive(Args)]
pub struct BotArgs {
    /// Catalog directory (defaults to catalog.dir)
    #[arg(long)]
    catalog_dir: Option<PathBuf>,
    /// Also serve the mini-app profile API
    #[arg(long)]
    with_miniapp: bool,
}

pub fn run(args: BotArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let token = Config::bot_token().ok_or("BOT_TOKEN is not set")?;
    let catalog = Arc::new(load_catalog(&config, args.catalog_dir)?);
    let db = Arc::new(Database::open()?);

    let resolver = ScoringResolver::new(config.scoring.weighting.clone(), &catalog);
    let engine = QuizEngine::new(
        catalog,
        resolver,
        Arc::new(SessionStore::new()),
        config.quiz.texts.clone(),
    );
    let client = Arc::new(TelegramClient::new(&config.telegram.api_base, &token)?);
    let recorder = ResultRecorder::new(Arc::clone(&db), config.result_log.append_retries);
    let service = QuizService::new(
        engine,
        Arc::clone(&client),
        recorder,
        config.service_settings(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let dispatcher = Dispatcher::new(Arc::new(service), config.idle_timeout());

        if args.with_miniapp {
            let db = Arc::clone(&db);
            let host = config.miniapp.host.clone();
            let port = config.miniapp_port();
            tokio::spawn(async move {
                if let Err(e) = server::serve(db, &host, port).await {
                    error!(error = %e, "mini-app API stopped");
                }
            });
        }

        telegram::run_polling(client, dispatcher, db, config.telegram.poll_timeout_secs).await;
    });

    info!("bot stopped");
    Ok(())
}
