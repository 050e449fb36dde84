//! `pg-shift status` - applied vs pending migrations.

use pg_shift::config::redact_url;
use pg_shift::{db, driver, Config, Ledger, MigrateError, MigrationLedger, Result};
use std::collections::HashSet;

pub async fn run(cfg: &Config) -> Result<()> {
    let Some(url) = cfg.database_url.as_deref() else {
        return Err(MigrateError::DatabaseUrlRequired);
    };

    println!("Connecting to {}", redact_url(url));
    let pool = db::new_pool(url).await?;

    let ledger = Ledger::new(pool.clone());
    ledger.ensure_table().await?;
    let applied = ledger.get_applied().await?;

    let plan = driver::load_plan(&cfg.migrations_dir)?;
    let applied_versions: HashSet<&str> = applied.iter().map(|m| m.version.as_str()).collect();

    if applied.is_empty() {
        println!("\nNo migrations applied.");
    } else {
        println!("\nApplied migrations:");
        for m in &applied {
            println!(
                "  {:<16} {:<32} {} ({} ms)",
                m.version,
                m.filename,
                m.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
                m.duration_ms
            );
        }
    }

    let pending: Vec<_> = plan
        .iter()
        .filter(|m| !applied_versions.contains(m.version.as_str()))
        .collect();

    if pending.is_empty() {
        println!("\nNo pending migrations.");
    } else {
        println!("\nPending migrations:");
        for m in &pending {
            println!("  {:<16} {}", m.version, m.name);
        }
    }

    println!(
        "\n{} applied, {} pending.",
        applied.len(),
        pending.len()
    );

    Ok(())
}
