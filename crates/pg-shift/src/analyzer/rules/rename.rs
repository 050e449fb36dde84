//! Detects table and column renames.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::ObjectType;

/// Renames are instant in the database but break every caller still using
/// the old name. `RENAME INDEX` and other rename targets are not flagged.
pub struct RenameRule;

impl Rule for RenameRule {
    fn id(&self) -> &'static str {
        "rename"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(NodeEnum::RenameStmt(rename)) = stmt_node(stmt) else {
            return Vec::new();
        };

        let (message, suggestion) = match rename.rename_type() {
            ObjectType::ObjectTable => (
                "RENAME TABLE breaks application code that references the old name",
                "Use a staged approach: add new name (view), update app code, remove old name",
            ),
            ObjectType::ObjectColumn => (
                "RENAME COLUMN breaks application code that references the old column name",
                "Use a staged approach: add new column, backfill, update app code, drop old column",
            ),
            _ => return Vec::new(),
        };

        vec![Finding {
            rule: self.id(),
            severity: Severity::Medium,
            table: table_name(rename.relation.as_ref()),
            statement: String::new(),
            message: message.to_string(),
            suggestion: suggestion.to_string(),
            lock_type: "ACCESS EXCLUSIVE",
            stmt_index: ctx.stmt_index,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{test_migration, Analyzer, Registry};

    fn check(sql: &str) -> Vec<Finding> {
        let mut registry = Registry::new();
        registry.register(Box::new(RenameRule));
        let analyzer = Analyzer::new().with_registry(registry);
        analyzer.analyze(&test_migration("001", sql)).unwrap().findings
    }

    #[test]
    fn flags_rename_table() {
        let findings = check("ALTER TABLE users RENAME TO app_users;");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "rename");
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].table, "users");
        assert!(findings[0].message.contains("RENAME TABLE"));
    }

    #[test]
    fn flags_rename_column() {
        let findings = check("ALTER TABLE users RENAME COLUMN email TO email_address;");

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("RENAME COLUMN"));
    }

    #[test]
    fn ignores_rename_index() {
        let findings = check("ALTER INDEX idx_old RENAME TO idx_new;");

        assert!(findings.is_empty());
    }
}
