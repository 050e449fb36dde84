//! Command implementations.

pub mod analyze;
pub mod apply;
pub mod plan;
pub mod rollback;
pub mod status;

use pg_shift::AnalysisResult;

/// Print analysis results in text form and report whether any migration
/// carries a High or Critical finding.
pub fn print_analysis_results(results: &[AnalysisResult]) -> bool {
    let mut total_findings = 0;
    let mut migrations_with_findings = 0;
    let mut has_high_or_critical = false;

    for result in results {
        if result.findings.is_empty() {
            continue;
        }

        println!(
            "\n=== {}_{} ===",
            result.migration.version, result.migration.name
        );

        for finding in &result.findings {
            println!("  [{}] {}", finding.severity, finding.message);
            println!("    Table: {}", finding.table);
            println!("    Rule:  {}", finding.rule);

            if !finding.statement.is_empty() {
                println!("    SQL:   {}", finding.statement);
            }

            println!("    Fix:   {}\n", finding.suggestion);
        }

        total_findings += result.findings.len();
        migrations_with_findings += 1;

        if result.has_high_or_critical() {
            has_high_or_critical = true;
        }
    }

    if total_findings == 0 {
        println!("No dangerous operations detected.");
    } else {
        println!("Found {total_findings} finding(s) across {migrations_with_findings} migration(s).");
    }

    has_high_or_critical
}
