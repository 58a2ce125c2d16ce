use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod server;
mod telegram;

#[derive(Parser)]
#[command(name = "quizroom", version, about = "Quizroom philosopher quiz bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Bot(commands::bot::BotArgs),
    /// Serve the mini-app profile API
    Serve(commands::serve::ServeArgs),
    /// Quiz statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Catalog validation
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Import data files from earlier deployments
    Import {
        #[command(subcommand)]
        action: commands::import::ImportAction,
    },
}

/// Log to stderr, filtered by `RUST_LOG` or else `log_level` from the config.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = quizroom_core::Config::load_or_default().log_level;
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Bot(args) => commands::bot::run(args),
        Commands::Serve(args) => commands::serve::run(args),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Catalog { action } => commands::catalog::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Import { action } => commands::import::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
