//! Gridiron Data Hub CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::Commands;
use config::Settings;

#[derive(Parser)]
#[command(name = "gridiron")]
#[command(author, version, about = "Gridiron Data Hub: nflverse data API and warehouse loader", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "GRIDIRON_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => handlers::serve(settings, bind).await?,
        Commands::Load {
            dataset,
            seasons,
            incremental_key,
            in_memory,
        } => handlers::load(&settings, dataset, seasons, incremental_key, in_memory).await?,
        Commands::Schedule { once, in_memory } => handlers::schedule(&settings, once, in_memory).await?,
        Commands::CheckConfig => handlers::check_config(&settings)?,
    }

    Ok(())
}
