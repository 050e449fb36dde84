//! Detects `DROP TABLE` and `TRUNCATE`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::{DropStmt, ObjectType, TruncateStmt};

/// Dropping or truncating a table destroys data. `DROP INDEX` and
/// `DROP VIEW` are not flagged.
pub struct DropTableRule;

impl Rule for DropTableRule {
    fn id(&self) -> &'static str {
        "drop-table"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        match stmt_node(stmt) {
            Some(NodeEnum::DropStmt(drop)) => self.check_drop(drop, ctx),
            Some(NodeEnum::TruncateStmt(truncate)) => self.check_truncate(truncate, ctx),
            _ => Vec::new(),
        }
    }
}

impl DropTableRule {
    fn check_drop(&self, drop: &DropStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if drop.remove_type() != ObjectType::ObjectTable {
            return Vec::new();
        }

        let message = if drop.missing_ok {
            "DROP TABLE IF EXISTS is irreversible and will permanently delete all data"
        } else {
            "DROP TABLE is irreversible and will permanently delete all data"
        };

        vec![Finding {
            rule: self.id(),
            severity: Severity::Critical,
            table: extract_drop_table_names(drop).join(", "),
            statement: String::new(),
            message: message.to_string(),
            suggestion: "Ensure you have a backup and that no application code references this table"
                .to_string(),
            lock_type: "ACCESS EXCLUSIVE",
            stmt_index: ctx.stmt_index,
        }]
    }

    fn check_truncate(&self, truncate: &TruncateStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let tables: Vec<String> = truncate
            .relations
            .iter()
            .filter_map(|rel| match rel.node.as_ref() {
                Some(NodeEnum::RangeVar(rv)) => Some(table_name(Some(rv))),
                _ => None,
            })
            .collect();

        vec![Finding {
            rule: self.id(),
            severity: Severity::Critical,
            table: tables.join(", "),
            statement: String::new(),
            message: "TRUNCATE removes all data from the table and is difficult to reverse"
                .to_string(),
            suggestion: "Ensure you have a backup before truncating production tables".to_string(),
            lock_type: "ACCESS EXCLUSIVE",
            stmt_index: ctx.stmt_index,
        }]
    }
}

/// Table names in a DROP statement arrive as lists of name parts
/// (`schema`, `name`); join each list with dots.
fn extract_drop_table_names(drop: &DropStmt) -> Vec<String> {
    let mut tables = Vec::new();

    for obj in &drop.objects {
        let Some(NodeEnum::List(list)) = obj.node.as_ref() else {
            continue;
        };

        let parts: Vec<&str> = list
            .items
            .iter()
            .filter_map(|item| match item.node.as_ref() {
                Some(NodeEnum::String(s)) => Some(s.sval.as_str()),
                _ => None,
            })
            .collect();

        if !parts.is_empty() {
            tables.push(parts.join("."));
        }
    }

    tables
}
