//! cvboost - Main Entry Point

use clap::Parser;
use cvboost::cli::{cmd_prepare, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for the rmse line
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cvboost=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare(args) => cmd_prepare(&args)?,
        Commands::Train(args) => cmd_train(&args)?,
    }

    Ok(())
}
