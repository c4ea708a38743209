mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use fetchbot::app;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => app::run(args.config.as_deref()).await?,
        Commands::CheckConfig(args) => app::check_config(args.config.as_deref())?,
    }

    Ok(())
}
