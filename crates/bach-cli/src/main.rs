//! # bach-exec
//!
//! Synthetic-workload driver for the BachLedger parallel executor.
//!
//! ## Usage
//!
//! ```bash
//! # Run 5 batches of 2000 tasks over a small, contended address pool
//! bach-exec run --tasks 2000 --batches 5 --addresses 64 --seed 42
//!
//! # Greedy grouping, one group at a time
//! bach-exec run --algorithm legacy --waves
//!
//! # Compare the grouping algorithms on one batch
//! bach-exec partition --tasks 500 --addresses 32
//!
//! # Show the effective configuration
//! bach-exec --config exec.toml config --show
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;
mod workload;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

/// BachLedger parallel executor driver
#[derive(Parser, Debug)]
#[command(name = "bach-exec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// TOML config file with [executor] and [workload] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute generated batches and report results
    Run(commands::WorkloadArgs),
    /// Compare grouping algorithms on one generated batch
    Partition(commands::WorkloadArgs),
    /// Show the effective configuration
    Config {
        /// Print the configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": format!("{:#}", e),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Logs go to stderr so stdout stays parseable in JSON mode
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load config".to_string(),
    })?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            commands::run::execute(&config, cli.json)?;
        }
        Commands::Partition(args) => {
            args.apply(&mut config);
            commands::partition::execute(&config, cli.json)?;
        }
        Commands::Config { show } => handle_config(&config, show, cli.json)?,
    }
    Ok(())
}

fn handle_config(config: &Config, show: bool, json: bool) -> Result<(), CliError> {
    if !show {
        Output::new(json)
            .field("hint", "use --show to display the effective configuration")
            .line("Use --show to display the effective configuration")
            .print();
        return Ok(());
    }

    config.validate()?;
    Output::new(json)
        .field_serde("executor", &config.executor)
        .field_serde("workload", &config.workload)
        .line(config.to_toml()?.trim_end())
        .print();
    Ok(())
}
