//! Static danger analysis of migration SQL.
//!
//! The analyser runs an ordered set of rules over every parsed statement
//! of a migration. Each rule is a pure function of the AST and a
//! [`RuleContext`]; rules never read the database.

pub mod rules;

use crate::error::{MigrateError, Result};
use crate::migration::Migration;
use crate::parser::{self, RawStmt};
use pg_query::protobuf::RangeVar;
use std::fmt;

/// Maximum characters of statement SQL carried on a finding for display.
const STATEMENT_DISPLAY_LEN: usize = 120;

/// Danger level of a finding, ordered from harmless to catastrophic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// No danger detected.
    Safe,
    /// Minor concern.
    Low,
    /// Moderate risk with workarounds available.
    Medium,
    /// Significant risk: table lock or rewrite likely.
    High,
    /// Data loss or extended downtime guaranteed.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Safe => "SAFE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// A single dangerous pattern detected in a migration.
#[derive(Debug, Clone)]
pub struct Finding {
    /// Stable kebab-case rule identifier (e.g., `create-index-not-concurrent`).
    pub rule: &'static str,
    /// Danger level.
    pub severity: Severity,
    /// Affected table, qualified as `schema.name` where known.
    pub table: String,
    /// The statement SQL, truncated for display.
    pub statement: String,
    /// Human-readable description of the danger.
    pub message: String,
    /// Safe alternative approach.
    pub suggestion: String,
    /// PostgreSQL lock type acquired (e.g., `ACCESS EXCLUSIVE`).
    pub lock_type: &'static str,
    /// 0-based index in the migration's statement list.
    pub stmt_index: usize,
}

/// All findings for a single migration.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub migration: Migration,
    pub findings: Vec<Finding>,
    /// Highest severity across all findings; `Safe` when there are none.
    pub max_severity: Severity,
}

impl AnalysisResult {
    /// True if any finding is High or Critical severity.
    pub fn has_high_or_critical(&self) -> bool {
        self.max_severity >= Severity::High
    }
}

/// Contextual information passed to rules during analysis.
pub struct RuleContext<'a> {
    pub migration: &'a Migration,
    pub target_pg_version: u32,
    pub stmt_index: usize,
    /// The full migration SQL, for extracting statement text.
    pub sql: &'a str,
}

/// A danger detection rule.
///
/// Implementations inspect a single parsed statement and return zero or
/// more findings. They must be pure: no I/O, no database access.
pub trait Rule: Send + Sync {
    /// Unique kebab-case identifier for this rule.
    fn id(&self) -> &'static str;

    /// Examine a single parsed statement and return any findings.
    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding>;
}

/// An ordered collection of rules. Registration order is preserved and
/// determines finding order within a statement.
#[derive(Default)]
pub struct Registry {
    rules: Vec<Box<dyn Rule>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the registry.
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// All registered rules, in registration order.
    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }
}

/// Extract a qualified table name from a `RangeVar`.
pub fn table_name(rv: Option<&RangeVar>) -> String {
    let Some(rv) = rv else {
        return "<unknown>".to_string();
    };

    if rv.schemaname.is_empty() {
        rv.relname.clone()
    } else {
        format!("{}.{}", rv.schemaname, rv.relname)
    }
}

/// Truncate a SQL string to `max_len` characters for display.
pub fn truncate_sql(sql: &str, max_len: usize) -> String {
    if sql.len() <= max_len {
        return sql.to_string();
    }

    let cut = sql
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len.saturating_sub(3))
        .last()
        .unwrap_or(0);
    format!("{}...", &sql[..cut])
}

/// Runs registered rules against parsed migrations.
pub struct Analyzer {
    registry: Registry,
    pg_version: u32,
}

/// Default target PostgreSQL version when none is configured.
pub const DEFAULT_PG_VERSION: u32 = 14;

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Create an analyzer with the default rule set and PostgreSQL version.
    pub fn new() -> Self {
        Self {
            registry: rules::default_registry(),
            pg_version: DEFAULT_PG_VERSION,
        }
    }

    /// Replace the rule registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the target PostgreSQL version rules evaluate against.
    pub fn with_pg_version(mut self, version: u32) -> Self {
        self.pg_version = version;
        self
    }

    /// Parse and analyze a single migration, returning all findings in
    /// statement-major, rule-registration-minor order.
    pub fn analyze(&self, m: &Migration) -> Result<AnalysisResult> {
        let parsed = parser::parse(&m.up_sql)
            .map_err(|e| MigrateError::context(format!("parsing migration {}", m.version), e))?;

        let mut findings = Vec::new();
        let mut max_severity = Severity::Safe;

        for (i, stmt) in parsed.stmts.iter().enumerate() {
            let ctx = RuleContext {
                migration: m,
                target_pg_version: self.pg_version,
                stmt_index: i,
                sql: &m.up_sql,
            };

            let stmt_sql = truncate_sql(
                &parser::extract_stmt_sql(&parsed.stmts, i, &parsed.sql),
                STATEMENT_DISPLAY_LEN,
            );

            for rule in self.registry.rules() {
                for mut finding in rule.check(stmt, &ctx) {
                    finding.statement = stmt_sql.clone();
                    max_severity = max_severity.max(finding.severity);
                    findings.push(finding);
                }
            }
        }

        Ok(AnalysisResult {
            migration: m.clone(),
            findings,
            max_severity,
        })
    }

    /// Analyze multiple migrations, stopping at the first parse failure.
    pub fn analyze_all(&self, migrations: &[Migration]) -> Result<Vec<AnalysisResult>> {
        migrations.iter().map(|m| self.analyze(m)).collect()
    }
}

#[cfg(test)]
pub(crate) fn test_migration(version: &str, sql: &str) -> Migration {
    use crate::migration::compute_checksum;
    use std::path::PathBuf;

    Migration {
        version: version.to_string(),
        name: format!("test_{version}"),
        up_sql: sql.to_string(),
        down_sql: None,
        checksum: compute_checksum(sql),
        file_path: PathBuf::from(format!("migrations/V{version}_test.up.sql")),
    }
}
