use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo::config::MnemoConfig;

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Multi-tenant memory API for humans and AI agents")]
struct Cli {
    /// Path to a config file (defaults to ~/.mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MnemoConfig::load_from(path)?,
        None => MnemoConfig::load()?,
    };

    // RUST_LOG wins over the configured log level when set
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Serve => {
            mnemo::http::serve(config).await?;
        }
    }

    Ok(())
}
