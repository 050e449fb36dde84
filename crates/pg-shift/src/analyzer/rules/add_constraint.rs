//! Detects `ALTER TABLE ... ADD CONSTRAINT` without `NOT VALID`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::{AlterTableType, ConstrType};

/// Validating a new CHECK or FOREIGN KEY constraint scans the whole table
/// while the ALTER holds its lock. PRIMARY KEY and UNIQUE are ignored
/// here; they have their own index-build semantics.
pub struct AddConstraintRule;

impl Rule for AddConstraintRule {
    fn id(&self) -> &'static str {
        "add-constraint-without-not-valid"
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

            if cmd.subtype() != AlterTableType::AtAddConstraint {
                continue;
            }

            let Some(NodeEnum::Constraint(constraint)) =
                cmd.def.as_ref().and_then(|d| d.node.as_ref())
            else {
                continue;
            };

            if constraint.contype() != ConstrType::ConstrCheck
                && constraint.contype() != ConstrType::ConstrForeign
            {
                continue;
            }

            if constraint.skip_validation {
                continue; // has NOT VALID
            }

            findings.push(Finding {
                rule: self.id(),
                severity: Severity::High,
                table: table_name(alter.relation.as_ref()),
                statement: String::new(),
                message: "ADD CONSTRAINT without NOT VALID scans the entire table while holding a lock"
                    .to_string(),
                suggestion: "Add with NOT VALID, then VALIDATE CONSTRAINT in a separate statement"
                    .to_string(),
                lock_type: "ACCESS EXCLUSIVE",
                stmt_index: ctx.stmt_index,
            });
        }

        findings
    }
}
