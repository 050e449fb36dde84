//! Detects `ALTER TABLE ... ALTER COLUMN ... SET NOT NULL`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::AlterTableType;

/// PostgreSQL 12 can prove NOT NULL from an existing validated CHECK
/// constraint and skip the full scan.
const PG_VERSION_SAFE_SET_NOT_NULL: u32 = 12;

/// SET NOT NULL scans the whole table to verify no NULLs exist.
pub struct SetNotNullRule;

impl Rule for SetNotNullRule {
    fn id(&self) -> &'static str {
        "set-not-null"
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

            if cmd.subtype() != AlterTableType::AtSetNotNull {
                continue;
            }

            let (severity, suggestion) = if ctx.target_pg_version >= PG_VERSION_SAFE_SET_NOT_NULL {
                (
                    Severity::Medium,
                    "First add CHECK (col IS NOT NULL) NOT VALID, then VALIDATE CONSTRAINT, then SET NOT NULL",
                )
            } else {
                (
                    Severity::High,
                    "Requires full table scan. Consider application-level enforcement instead.",
                )
            };

            findings.push(Finding {
                rule: self.id(),
                severity,
                table: table_name(alter.relation.as_ref()),
                statement: String::new(),
                message: "SET NOT NULL requires a full table scan to verify no NULL values exist"
                    .to_string(),
                suggestion: suggestion.to_string(),
                lock_type: "ACCESS EXCLUSIVE",
                stmt_index: ctx.stmt_index,
            });
        }

        findings
    }
}
