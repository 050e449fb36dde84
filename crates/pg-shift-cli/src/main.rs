//! pg-shift CLI - zero-downtime PostgreSQL schema migrations.

mod commands;

use clap::{Parser, Subcommand};
use pg_shift::{config, Config, MigrateError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

const DEFAULT_CONFIG_PATH: &str = "pg-shift.yml";

#[derive(Parser)]
#[command(name = "pg-shift")]
#[command(about = "Zero-downtime PostgreSQL schema migration CLI")]
#[command(version)]
#[command(long_about = "pg-shift analyzes SQL migrations using the real PostgreSQL parser,
detects dangerous DDL operations that cause table locks and outages,
suggests safe alternatives, and applies migrations with advisory locking
and checksum drift detection.")]
struct Cli {
    /// Path to YAML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Path to migration files
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Apply {
        /// Show what would be applied without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip the dangerous-migration safety gate
        #[arg(long)]
        force: bool,

        /// Override lock timeout (e.g., 10s, 1m)
        #[arg(long, value_parser = humantime::parse_duration)]
        lock_timeout: Option<Duration>,

        /// Override statement timeout (e.g., 30s, 5m)
        #[arg(long, value_parser = humantime::parse_duration)]
        statement_timeout: Option<Duration>,
    },

    /// Analyze migrations for dangerous operations
    Analyze {
        /// Directory to analyze (defaults to the configured migrations dir)
        dir: Option<PathBuf>,

        /// Exit with a non-zero code if high/critical findings exist
        #[arg(long)]
        fail_on_high: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show the execution plan for pending migrations
    Plan,

    /// Show migration status
    Status,

    /// Roll back applied migrations
    Rollback {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1)]
        steps: usize,

        /// Roll back to a specific migration version
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let cfg = load_config(&cli)?;
    let cancel = shutdown_token();

    match cli.command {
        Commands::Apply {
            dry_run,
            force,
            lock_timeout,
            statement_timeout,
        } => {
            commands::apply::run(
                &cfg,
                &cancel,
                commands::apply::ApplyArgs {
                    dry_run,
                    force,
                    lock_timeout,
                    statement_timeout,
                },
            )
            .await
        }
        Commands::Analyze {
            dir,
            fail_on_high,
            format,
        } => commands::analyze::run(&cfg, dir.as_deref(), fail_on_high, &format),
        Commands::Plan => commands::plan::run(&cfg).await,
        Commands::Status => commands::status::run(&cfg).await,
        Commands::Rollback { steps, target } => {
            commands::rollback::run(&cfg, steps, target.as_deref()).await
        }
    }
}

/// Load configuration with precedence flag > env > file.
fn load_config(cli: &Cli) -> Result<Config, MigrateError> {
    // A missing config file is only an error when the operator pointed at
    // a non-default path explicitly.
    let allow_missing = cli.config == PathBuf::from(DEFAULT_CONFIG_PATH);

    let mut cfg = Config::load(&cli.config, allow_missing)?;
    config::merge_env(&mut cfg);

    if let Some(url) = &cli.database_url {
        cfg.database_url = Some(url.clone());
    }

    if let Some(dir) = &cli.migrations_dir {
        cfg.migrations_dir = dir.clone();
    }

    Ok(cfg)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancellation token tripped by SIGINT, for graceful shutdown between
/// migrations.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trip = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current statement");
            trip.cancel();
        }
    });

    cancel
}
