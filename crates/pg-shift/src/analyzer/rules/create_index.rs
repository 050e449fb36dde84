//! Detects `CREATE INDEX` without `CONCURRENTLY`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};

/// Non-concurrent index creation takes a SHARE lock that blocks writes for
/// the duration of the build.
pub struct CreateIndexRule;

impl Rule for CreateIndexRule {
    fn id(&self) -> &'static str {
        "create-index-not-concurrent"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(NodeEnum::IndexStmt(idx)) = stmt_node(stmt) else {
            return Vec::new();
        };

        if idx.concurrent {
            return Vec::new();
        }

        vec![Finding {
            rule: self.id(),
            severity: Severity::High,
            table: table_name(idx.relation.as_ref()),
            statement: String::new(),
            message: "CREATE INDEX without CONCURRENTLY locks the table for writes".to_string(),
            suggestion: "Use CREATE INDEX CONCURRENTLY to avoid blocking writes during index creation"
                .to_string(),
            lock_type: "SHARE",
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
        registry.register(Box::new(CreateIndexRule));
        let analyzer = Analyzer::new().with_registry(registry);
        analyzer.analyze(&test_migration("001", sql)).unwrap().findings
    }

    #[test]
    fn flags_plain_create_index() {
        let findings = check("CREATE INDEX idx_users_email ON users (email);");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "create-index-not-concurrent");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].table, "users");
        assert_eq!(findings[0].lock_type, "SHARE");
    }

    #[test]
    fn flags_unique_index() {
        let findings = check("CREATE UNIQUE INDEX idx_users_email ON users (email);");

        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn flags_partial_index() {
        let findings =
            check("CREATE INDEX idx_active ON users (email) WHERE deleted_at IS NULL;");

        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn allows_concurrent_index() {
        let findings = check("CREATE INDEX CONCURRENTLY idx_users_email ON users (email);");

        assert!(findings.is_empty());
    }

    #[test]
    fn ignores_other_statements() {
        let findings = check("CREATE TABLE users (id INT);");

        assert!(findings.is_empty());
    }

    #[test]
    fn qualifies_schema_in_table_name() {
        let findings = check("CREATE INDEX idx ON app.users (email);");

        assert_eq!(findings[0].table, "app.users");
    }
}
