//! `pg-shift apply` - apply pending migrations.

use super::print_analysis_results;
use pg_shift::config::redact_url;
use pg_shift::driver::{self, ApplyOptions};
use pg_shift::executor::{ProgressCallback, ProgressStatus};
use pg_shift::{db, Config, MigrateError, Result};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ApplyArgs {
    pub dry_run: bool,
    pub force: bool,
    pub lock_timeout: Option<Duration>,
    pub statement_timeout: Option<Duration>,
}

pub async fn run(cfg: &Config, cancel: &CancellationToken, args: ApplyArgs) -> Result<()> {
    let Some(url) = cfg.database_url.as_deref() else {
        return Err(MigrateError::DatabaseUrlRequired);
    };

    let plan = driver::load_plan(&cfg.migrations_dir)?;
    if plan.is_empty() {
        println!("No migration files found.");
        return Ok(());
    }

    if !args.force && !args.dry_run {
        let results = driver::analyze_plan(&plan, cfg.target_pg_version)?;
        if print_analysis_results(&results) {
            return Err(MigrateError::DangerousMigrations);
        }
    }

    println!("Connecting to {}", redact_url(url));
    let pool = db::new_pool(url).await?;

    if args.dry_run {
        println!("\n--- DRY RUN (no changes will be made) ---");
    }

    let opts = ApplyOptions {
        lock_timeout: args.lock_timeout.unwrap_or(cfg.lock_timeout),
        statement_timeout: args.statement_timeout.unwrap_or(cfg.statement_timeout),
        dry_run: args.dry_run,
        force: args.force,
        target_pg_version: cfg.target_pg_version,
    };

    let report = driver::execute_plan(&pool, cancel, &plan, &opts, Some(progress_printer())).await?;

    if args.dry_run {
        println!(
            "\nDry run complete: {} migration(s) simulated, nothing executed.",
            report.total
        );
    } else {
        println!(
            "\nApply complete: {} applied, {} skipped.",
            report.applied, report.skipped
        );
    }

    Ok(())
}

/// Per-migration status lines for the operator's terminal.
fn progress_printer() -> ProgressCallback {
    Box::new(|event| match event.status {
        ProgressStatus::Starting => {
            print!("  Applying {}_{} ... ", event.version, event.name);
            let _ = std::io::stdout().flush();
        }
        ProgressStatus::Completed => {
            println!("done ({} ms)", event.duration.as_millis());
        }
        ProgressStatus::Skipped => {}
        ProgressStatus::Failed => {
            println!("FAILED");
            if let Some(error) = &event.error {
                println!("    Error: {error}");
            }
        }
    })
}
