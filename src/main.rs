use anyhow::Result;
use clap::{Parser, Subcommand};
use cura_backend::api;
use cura_backend::config::CuraConfig;
use cura_backend::database::Database;
use cura_backend::telemetry;

#[derive(Parser)]
#[command(author, version, about = "Cura social backend daemon")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST and realtime access
    Serve,
    /// Apply pending schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let config = CuraConfig::from_env()?;

    let database = Database::connect(&config.paths).map_err(anyhow::Error::from)?;
    database.ensure_migrations().map_err(anyhow::Error::from)?;
    tracing::info!(db_path = %config.paths.db_path.display(), "store ready");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, database).await,
        Command::Migrate => Ok(()),
    }
}
