//! The apply driver: ties loader → analyser → executor behind a single
//! entrypoint.

use crate::analyzer::{AnalysisResult, Analyzer, DEFAULT_PG_VERSION};
use crate::error::{MigrateError, Result};
use crate::executor::{Executor, ProgressCallback, ProgressStatus};
use crate::ledger::Ledger;
use crate::migration::{self, Migration};
use deadpool_postgres::Pool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for an apply run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Per-transaction `lock_timeout`; zero means "do not set".
    pub lock_timeout: Duration,
    /// Per-transaction `statement_timeout`; zero means "do not set".
    pub statement_timeout: Duration,
    /// Simulate only: emit `Skipped` for every migration, mutate nothing.
    pub dry_run: bool,
    /// Skip the dangerous-migration gate.
    pub force: bool,
    /// PostgreSQL version the danger rules evaluate against.
    pub target_pg_version: u32,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::ZERO,
            statement_timeout: Duration::ZERO,
            dry_run: false,
            force: false,
            target_pg_version: DEFAULT_PG_VERSION,
        }
    }
}

/// Outcome counts for an apply run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyReport {
    /// Migrations in the plan.
    pub total: usize,
    /// Migrations executed and recorded this run.
    pub applied: usize,
    /// Migrations skipped (already applied, or everything in dry-run).
    pub skipped: usize,
}

/// Load migrations from a directory and return them in execution order.
pub fn load_plan(dir: &Path) -> Result<Vec<Migration>> {
    let migrations = migration::load_from_dir(dir)
        .map_err(|e| MigrateError::context("loading migrations", e))?;
    Ok(migration::sort(&migrations))
}

/// Run the danger analyser over a plan.
pub fn analyze_plan(plan: &[Migration], target_pg_version: u32) -> Result<Vec<AnalysisResult>> {
    Analyzer::new()
        .with_pg_version(target_pg_version)
        .analyze_all(plan)
        .map_err(|e| MigrateError::context("analyzing migrations", e))
}

/// Execute an already-loaded plan, counting outcomes. The caller's
/// progress callback, if any, observes every event.
pub async fn execute_plan(
    pool: &Pool,
    cancel: &CancellationToken,
    plan: &[Migration],
    opts: &ApplyOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<ApplyReport> {
    let applied = Arc::new(AtomicUsize::new(0));
    let skipped = Arc::new(AtomicUsize::new(0));

    let counter = {
        let applied = Arc::clone(&applied);
        let skipped = Arc::clone(&skipped);
        Box::new(move |event: crate::executor::ProgressEvent| {
            match event.status {
                ProgressStatus::Completed => {
                    applied.fetch_add(1, Ordering::Relaxed);
                }
                ProgressStatus::Skipped => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                ProgressStatus::Starting | ProgressStatus::Failed => {}
            }
            if let Some(callback) = &on_progress {
                callback(event);
            }
        })
    };

    let executor = Executor::new(pool.clone(), Ledger::new(pool.clone()))
        .with_lock_timeout(opts.lock_timeout)
        .with_statement_timeout(opts.statement_timeout)
        .with_dry_run(opts.dry_run)
        .with_progress_callback(counter);

    executor.apply(cancel, plan).await?;

    Ok(ApplyReport {
        total: plan.len(),
        applied: applied.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
    })
}

/// Load, sort, analyse, and apply the migrations in `dir`.
///
/// Unless `force` or `dry_run` is set, the run aborts with
/// [`MigrateError::DangerousMigrations`] when any finding is High or
/// Critical severity.
pub async fn apply(
    pool: &Pool,
    cancel: &CancellationToken,
    dir: &Path,
    opts: &ApplyOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<ApplyReport> {
    let plan = load_plan(dir)?;
    if plan.is_empty() {
        return Ok(ApplyReport::default());
    }

    if !opts.force && !opts.dry_run {
        let results = analyze_plan(&plan, opts.target_pg_version)?;
        if results.iter().any(|r| r.has_high_or_critical()) {
            return Err(MigrateError::DangerousMigrations);
        }
    }

    execute_plan(pool, cancel, &plan, opts, on_progress).await
}
