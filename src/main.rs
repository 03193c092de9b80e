use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod backend;
mod cli;
mod command;
mod config;
mod domain;
mod pipeline;
mod prompt;
mod workspace;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert(args) => command::run_convert(args).await,
        Commands::Digest(args) => command::run_digest(args).await,
        Commands::StripMarkers(args) => command::run_strip_markers(args).await,
    }
}
