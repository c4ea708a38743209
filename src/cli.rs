use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetchbot")]
#[command(about = "Chat bot that downloads media links posted to it", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the homeserver and serve download requests
    Run(ConfigArgs),
    /// Load and validate the configuration, then print it
    CheckConfig(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// TOML configuration file (defaults to $FETCHBOT_CONFIG or config/fetchbot.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
