use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tracker_sync=info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(&cli.config, args).await,
        Commands::Schedule(args) => commands::schedule::run(&cli.config, args).await,
        Commands::Validate(args) => commands::validate::run(&cli.config, args),
        Commands::State(cmd) => commands::state::run(&cli.config, cmd).await
    }
}
