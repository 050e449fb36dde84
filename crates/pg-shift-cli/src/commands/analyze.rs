//! `pg-shift analyze` - static analysis of migration files. No database
//! connection required.

use super::print_analysis_results;
use pg_shift::driver;
use pg_shift::{AnalysisResult, Config, MigrateError, Result};
use std::path::Path;

pub fn run(cfg: &Config, dir: Option<&Path>, fail_on_high: bool, format: &str) -> Result<()> {
    let dir = dir.unwrap_or(&cfg.migrations_dir);

    let plan = driver::load_plan(dir)?;
    if plan.is_empty() {
        println!("No migration files found.");
        return Ok(());
    }

    let results = driver::analyze_plan(&plan, cfg.target_pg_version)?;

    let has_high_or_critical = match format {
        "json" => print_json(&results)?,
        _ => print_analysis_results(&results),
    };

    if fail_on_high && has_high_or_critical {
        return Err(MigrateError::DangerousMigrations);
    }

    Ok(())
}

fn print_json(results: &[AnalysisResult]) -> Result<bool> {
    let findings: Vec<serde_json::Value> = results
        .iter()
        .flat_map(|result| {
            result.findings.iter().map(|finding| {
                serde_json::json!({
                    "migration": format!("{}_{}", result.migration.version, result.migration.name),
                    "version": result.migration.version,
                    "rule": finding.rule,
                    "severity": finding.severity.to_string(),
                    "table": finding.table,
                    "statement": finding.statement,
                    "message": finding.message,
                    "suggestion": finding.suggestion,
                    "lock_type": finding.lock_type,
                    "stmt_index": finding.stmt_index,
                })
            })
        })
        .collect();

    let output = serde_json::to_string_pretty(&findings)
        .map_err(|e| MigrateError::Config(format!("serializing findings: {e}")))?;
    println!("{output}");

    Ok(results.iter().any(|r| r.has_high_or_critical()))
}
