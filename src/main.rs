mod commands;

use clap::Parser;
use kogaro::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => commands::run::run(args).await?,
        Some(Commands::Check) => commands::check::run().await?,
        Some(Commands::Version) => commands::version::run()?,
        None => commands::run::run(kogaro::cli::RunArgs::parse_from(["kogaro"])).await?,
    }

    Ok(())
}
