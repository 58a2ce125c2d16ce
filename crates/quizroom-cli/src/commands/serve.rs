use std::sync::Arc;

use clap::Args;
use quizroom_core::storage::Database;
use quizroom_core::Config;

use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (defaults to miniapp.host)
    #[arg(long)]
    host: Option<String>,
    /// Port (defaults to MINIAPP_PORT, then miniapp.port)
    #[arg(long)]
    port: Option<u16>,
}

pub fn run(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?);
    let host = args.host.unwrap_or_else(|| config.miniapp.host.clone());
    let port = args.port.unwrap_or_else(|| config.miniapp_port());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(db, &host, port))?;
    Ok(())
}
