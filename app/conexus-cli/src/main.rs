mod cli;
mod commands;

use anyhow::{anyhow, Result};
use clap::Parser;
use conexus_rag::RAGConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ingest(args) => commands::ingest(config, args).await,
        Commands::Ask(args) => commands::ask(config, args).await,
        Commands::Stats => commands::stats(config).await,
        Commands::DeleteCase(args) => commands::delete_case(config, args).await,
        Commands::EnsureIndexes => commands::ensure_indexes(config).await,
    }
}

fn load_config(cli: &Cli) -> Result<RAGConfig> {
    match &cli.config {
        Some(path) => RAGConfig::from_file(path).map_err(|e| anyhow!(e)),
        None => {
            let mut config = RAGConfig::default();
            config.apply_env_overrides();
            config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
            Ok(config)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
