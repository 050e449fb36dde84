//! Detects `ALTER TABLE ... ADD COLUMN` with a dangerous DEFAULT.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::{AlterTableCmd, AlterTableType, ConstrType, Node, RangeVar};

/// PostgreSQL 11 started writing non-volatile column defaults to the
/// catalog instead of rewriting the table.
const PG_VERSION_SAFE_NON_VOLATILE_DEFAULT: u32 = 11;

/// ADD COLUMN with a DEFAULT the server cannot precompute forces a full
/// table rewrite under ACCESS EXCLUSIVE.
pub struct AddColumnRule;

impl Rule for AddColumnRule {
    fn id(&self) -> &'static str {
        "add-column-volatile-default"
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

            if cmd.subtype() != AlterTableType::AtAddColumn {
                continue;
            }

            if let Some(finding) = self.check_add_column(cmd, alter.relation.as_ref(), ctx) {
                findings.push(finding);
            }
        }

        findings
    }
}

impl AddColumnRule {
    fn check_add_column(
        &self,
        cmd: &AlterTableCmd,
        relation: Option<&RangeVar>,
        ctx: &RuleContext<'_>,
    ) -> Option<Finding> {
        let col_def = match cmd.def.as_ref().and_then(|d| d.node.as_ref()) {
            Some(NodeEnum::ColumnDef(col)) => col,
            _ => return None,
        };

        let default_expr = extract_default_expr(&col_def.constraints)?;

        if ctx.target_pg_version >= PG_VERSION_SAFE_NON_VOLATILE_DEFAULT
            && !is_volatile_default(default_expr)
        {
            return None;
        }

        let message = if ctx.target_pg_version < PG_VERSION_SAFE_NON_VOLATILE_DEFAULT {
            "ADD COLUMN with DEFAULT rewrites the entire table on PG < 11"
        } else {
            "ADD COLUMN with volatile DEFAULT rewrites the entire table"
        };

        Some(Finding {
            rule: self.id(),
            severity: Severity::High,
            table: table_name(relation),
            statement: String::new(),
            message: message.to_string(),
            suggestion: "Add column without DEFAULT, then backfill in batches".to_string(),
            lock_type: "ACCESS EXCLUSIVE",
            stmt_index: ctx.stmt_index,
        })
    }
}

/// Find the DEFAULT expression on a column definition. DEFAULT is stored
/// as a `CONSTR_DEFAULT` constraint with the expression in `raw_expr`.
fn extract_default_expr(constraints: &[Node]) -> Option<&NodeEnum> {
    for c in constraints {
        let Some(NodeEnum::Constraint(constraint)) = c.node.as_ref() else {
            continue;
        };

        if constraint.contype() == ConstrType::ConstrDefault {
            return constraint.raw_expr.as_ref().and_then(|e| e.node.as_ref());
        }
    }

    None
}

/// Whether a DEFAULT expression is volatile. Constants and type casts of
/// constants are non-volatile; everything else (function calls like
/// `now()`, `gen_random_uuid()`) is assumed volatile.
fn is_volatile_default(expr: &NodeEnum) -> bool {
    match expr {
        NodeEnum::AConst(_) => false,
        NodeEnum::TypeCast(cast) => !matches!(
            cast.arg.as_ref().and_then(|a| a.node.as_ref()),
            Some(NodeEnum::AConst(_))
        ),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{test_migration, Analyzer, Registry};

    fn check(sql: &str, pg_version: u32) -> Vec<Finding> {
        let mut registry = Registry::new();
        registry.register(Box::new(AddColumnRule));
        let analyzer = Analyzer::new()
            .with_registry(registry)
            .with_pg_version(pg_version);
        analyzer.analyze(&test_migration("001", sql)).unwrap().findings
    }

    #[test]
    fn literal_default_safe_on_pg11() {
        let findings = check("ALTER TABLE users ADD COLUMN active BOOLEAN DEFAULT true;", 11);

        assert!(findings.is_empty());
    }

    #[test]
    fn literal_default_flagged_on_pg10() {
        let findings = check("ALTER TABLE users ADD COLUMN active BOOLEAN DEFAULT true;", 10);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0].message.contains("PG < 11"));
    }

    #[test]
    fn volatile_default_flagged_on_all_versions() {
        let sql = "ALTER TABLE users ADD COLUMN created_at TIMESTAMPTZ DEFAULT now();";

        for version in [10, 11, 14, 16] {
            let findings = check(sql, version);
            assert_eq!(findings.len(), 1, "expected finding on PG {version}");
        }
    }

    #[test]
    fn cast_of_literal_default_safe_on_pg11() {
        let findings = check(
            "ALTER TABLE users ADD COLUMN status TEXT DEFAULT 'active'::text;",
            14,
        );

        assert!(findings.is_empty());
    }

    #[test]
    fn no_default_is_safe() {
        let findings = check("ALTER TABLE users ADD COLUMN email TEXT;", 14);

        assert!(findings.is_empty());
    }

    #[test]
    fn one_finding_per_offending_add_column() {
        let sql = "ALTER TABLE users ADD COLUMN a TIMESTAMPTZ DEFAULT now(), \
                   ADD COLUMN b TIMESTAMPTZ DEFAULT now();";

        let findings = check(sql, 14);

        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn ignores_non_alter_statements() {
        let findings = check("CREATE TABLE t (created_at TIMESTAMPTZ DEFAULT now());", 14);

        assert!(findings.is_empty());
    }
}
