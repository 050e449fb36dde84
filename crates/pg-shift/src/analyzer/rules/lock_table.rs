//! Detects explicit `LOCK TABLE` statements.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};

/// Explicit table locks of any mode serialize against normal traffic.
/// One finding per locked relation.
pub struct LockTableRule;

impl Rule for LockTableRule {
    fn id(&self) -> &'static str {
        "lock-table"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(NodeEnum::LockStmt(lock)) = stmt_node(stmt) else {
            return Vec::new();
        };

        lock.relations
            .iter()
            .filter_map(|rel| match rel.node.as_ref() {
                Some(NodeEnum::RangeVar(rv)) => Some(Finding {
                    rule: self.id(),
                    severity: Severity::High,
                    table: table_name(Some(rv)),
                    statement: String::new(),
                    message: "Explicit LOCK TABLE can block other queries and cause downtime"
                        .to_string(),
                    suggestion:
                        "Avoid explicit table locks. Let PostgreSQL manage locking through normal operations"
                            .to_string(),
                    lock_type: "EXPLICIT",
                    stmt_index: ctx.stmt_index,
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{test_migration, Analyzer, Registry};

    fn check(sql: &str) -> Vec<Finding> {
        let mut registry = Registry::new();
        registry.register(Box::new(LockTableRule));
        let analyzer = Analyzer::new().with_registry(registry);
        analyzer.analyze(&test_migration("001", sql)).unwrap().findings
    }

    #[test]
    fn flags_lock_table() {
        let findings = check("LOCK TABLE users;");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "lock-table");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].table, "users");
        assert_eq!(findings[0].lock_type, "EXPLICIT");
    }

    #[test]
    fn flags_lock_with_explicit_mode() {
        let findings = check("LOCK TABLE users IN ACCESS EXCLUSIVE MODE;");

        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn flags_share_mode_lock() {
        let findings = check("LOCK TABLE users IN SHARE MODE;");

        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn one_finding_per_relation() {
        let findings = check("LOCK TABLE users, posts;");

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].table, "users");
        assert_eq!(findings[1].table, "posts");
    }

    #[test]
    fn ignores_other_statements() {
        let findings = check("SELECT * FROM users FOR UPDATE;");

        assert!(findings.is_empty());
    }
}
