//! `pg-shift plan` - execution plan for pending migrations.

use pg_shift::config::redact_url;
use pg_shift::{db, driver, Config, Ledger, MigrateError, MigrationLedger, Result, Severity};
use std::collections::HashSet;

pub async fn run(cfg: &Config) -> Result<()> {
    let Some(url) = cfg.database_url.as_deref() else {
        return Err(MigrateError::DatabaseUrlRequired);
    };

    let plan = driver::load_plan(&cfg.migrations_dir)?;
    if plan.is_empty() {
        println!("No migration files found.");
        return Ok(());
    }

    let results = driver::analyze_plan(&plan, cfg.target_pg_version)?;

    println!("Connecting to {}", redact_url(url));
    let pool = db::new_pool(url).await?;

    let ledger = Ledger::new(pool.clone());
    ledger.ensure_table().await?;
    let applied: HashSet<String> = ledger
        .get_applied()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();

    println!(
        "\nExecution plan (target PostgreSQL {}):",
        cfg.target_pg_version
    );

    let mut pending = 0;
    for result in &results {
        let m = &result.migration;
        let state = if applied.contains(&m.version) {
            "applied"
        } else {
            pending += 1;
            "pending"
        };

        let danger = if result.max_severity > Severity::Safe {
            format!("  max severity: {}", result.max_severity)
        } else {
            String::new()
        };

        println!("  {:<16} {:<32} {state}{danger}", m.version, m.name);
    }

    println!("\n{} migration(s), {} pending.", plan.len(), pending);

    Ok(())
}
