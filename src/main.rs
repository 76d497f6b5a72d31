//! Binary entry point for notiledger.
//!
//! This binary provides the CLI interface for the notification ledger.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use notiledger::cli::{self, EvaluateArgs, IngestOptions};
use notiledger::config::{CONFIG_PATH_ENV, NotiledgerConfig};
use notiledger::observability::{self, LogFormat};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Notiledger - turns payment notifications into ledger entries, once.
#[derive(Parser)]
#[command(name = "notiledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: pretty, compact or json.
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Evaluate one notification and print the decision.
    Evaluate {
        /// Source application identifier.
        #[arg(short, long)]
        source: String,

        /// Notification title.
        #[arg(short, long)]
        title: Option<String>,

        /// Notification body.
        #[arg(short, long)]
        body: Option<String>,

        /// Post time in epoch milliseconds (default: now).
        #[arg(long)]
        time: Option<i64>,

        /// Mark the notification as a group summary.
        #[arg(long)]
        group_summary: bool,
    },

    /// Run JSON-lines notifications through the pipeline.
    Ingest {
        /// Input file, or `-` for stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Ledger file to append accepted entries to.
        #[arg(short, long)]
        ledger: Option<PathBuf>,

        /// Events processed concurrently.
        #[arg(long, default_value_t = cli::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// Show dedup store counts.
    Stats,

    /// Remove dedup records past the retention period.
    Cleanup {
        /// Days to keep (default: configured retention).
        #[arg(long)]
        days: Option<u32>,

        /// Show what would be removed without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every dedup record.
    Clear {
        /// Confirm the removal.
        #[arg(long)]
        yes: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format '{value}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is the common case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match NotiledgerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    if let Err(e) = observability::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run_command(command: Commands, config: &NotiledgerConfig) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Evaluate {
            source,
            title,
            body,
            time,
            group_summary,
        } => {
            let store = cli::open_store(config).context("opening dedup store")?;
            let args = EvaluateArgs {
                source,
                title,
                body,
                time,
                group_summary,
            };
            cli::cmd_evaluate(config, store, &args, &mut out).context("evaluating notification")?;
        },

        Commands::Ingest {
            input,
            ledger,
            concurrency,
        } => {
            let options = IngestOptions {
                input,
                ledger,
                concurrency,
            };
            let summary = cli::cmd_ingest(config, &options, shutdown_signal(), &mut out)
                .await
                .context("ingesting notifications")?;
            let totals = serde_json::to_string(&summary).context("rendering ingest summary")?;
            eprintln!("{totals}");
        },

        Commands::Stats => {
            let store = cli::open_store(config).context("opening dedup store")?;
            cli::cmd_stats(store.as_ref(), store.db_path(), &mut out)
                .context("reading dedup store stats")?;
        },

        Commands::Cleanup { days, dry_run } => {
            let store = cli::open_store(config).context("opening dedup store")?;
            cli::cmd_cleanup(store, config.retention, days, dry_run, &mut out)
                .context("running retention cleanup")?;
        },

        Commands::Clear { yes } => {
            let store = cli::open_store(config).context("opening dedup store")?;
            cli::cmd_clear(store.as_ref(), yes, &mut out).context("clearing dedup store")?;
        },

        Commands::Config => {
            cli::cmd_config(config, &mut out).context("printing configuration")?;
        },
    }

    out.flush().context("flushing output")?;
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}
