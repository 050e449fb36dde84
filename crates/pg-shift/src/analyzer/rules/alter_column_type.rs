//! Detects `ALTER TABLE ... ALTER COLUMN ... TYPE`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::AlterTableType;

/// Changing a column's type rewrites the table under ACCESS EXCLUSIVE,
/// with rare binary-compatible exceptions the planner decides.
pub struct AlterColumnTypeRule;

impl Rule for AlterColumnTypeRule {
    fn id(&self) -> &'static str {
        "alter-column-type"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(NodeEnum::AlterTableStmt(alter)) = stmt_node(stmt) else {
            return Vec::new();
        };

        let mut findings = Vec::new();

        for cmd_node in &alter.cmds {
            let Some(NodeEnum::AlterTableCmd(cmd)) = cmd_node.node.as_ref() else {
                continue;
            };

            if cmd.subtype() != AlterTableType::AtAlterColumnType {
                continue;
            }

            findings.push(Finding {
                rule: self.id(),
                severity: Severity::High,
                table: table_name(alter.relation.as_ref()),
                statement: String::new(),
                message:
                    "ALTER COLUMN TYPE rewrites the entire table while holding an ACCESS EXCLUSIVE lock"
                        .to_string(),
                suggestion:
                    "Use a staged approach: add new column, backfill data, swap columns, drop old column"
                        .to_string(),
                lock_type: "ACCESS EXCLUSIVE",
                stmt_index: ctx.stmt_index,
            });
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{test_migration, Analyzer, Registry};

    fn check(sql: &str) -> Vec<Finding> {
        let mut registry = Registry::new();
        registry.register(Box::new(AlterColumnTypeRule));
        let analyzer = Analyzer::new().with_registry(registry);
        analyzer.analyze(&test_migration("001", sql)).unwrap().findings
    }

    #[test]
    fn flags_alter_column_type() {
        let findings = check("ALTER TABLE users ALTER COLUMN id TYPE BIGINT;");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "alter-column-type");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].table, "users");
        assert_eq!(findings[0].lock_type, "ACCESS EXCLUSIVE");
    }

    #[test]
    fn flags_type_change_with_using() {
        let findings =
            check("ALTER TABLE users ALTER COLUMN id TYPE BIGINT USING id::bigint;");

        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn ignores_other_alter_subcommands() {
        let findings = check("ALTER TABLE users ALTER COLUMN id SET DEFAULT 0;");

        assert!(findings.is_empty());
    }
}
