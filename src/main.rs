//! stackwise - Main Entry Point
//!
//! Benchmarks averaging and stacking ensembles from the command line.

use clap::Parser;
use stackwise::cli::{cmd_benchmark, cmd_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackwise=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Benchmark { rows, features, noise, seed, dataset, config } => {
            cmd_benchmark(rows, features, noise, seed, dataset, config.as_ref())?;
        }
        Commands::Config { output } => {
            cmd_config(output.as_ref())?;
        }
    }

    Ok(())
}
