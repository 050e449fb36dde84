//! Detects `VACUUM FULL`.

use crate::analyzer::{table_name, Finding, Rule, RuleContext, Severity};
use crate::parser::{stmt_node, NodeEnum, RawStmt};
use pg_query::protobuf::VacuumStmt;

/// VACUUM FULL rewrites the table into a new file under ACCESS EXCLUSIVE;
/// plain VACUUM does not block anything.
pub struct VacuumFullRule;

impl Rule for VacuumFullRule {
    fn id(&self) -> &'static str {
        "vacuum-full"
    }

    fn check(&self, stmt: &RawStmt, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(NodeEnum::VacuumStmt(vacuum)) = stmt_node(stmt) else {
            return Vec::new();
        };

        if !is_vacuum_full(vacuum) {
            return Vec::new();
        }

        vec![Finding {
            rule: self.id(),
            severity: Severity::High,
            table: extract_vacuum_table(vacuum),
            statement: String::new(),
            message: "VACUUM FULL rewrites the entire table and holds an ACCESS EXCLUSIVE lock"
                .to_string(),
            suggestion: "Use regular VACUUM instead, which does not block reads or writes"
                .to_string(),
            lock_type: "ACCESS EXCLUSIVE",
            stmt_index: ctx.stmt_index,
        }]
    }
}

fn is_vacuum_full(vacuum: &VacuumStmt) -> bool {
    vacuum.options.iter().any(|opt| {
        matches!(opt.node.as_ref(), Some(NodeEnum::DefElem(de)) if de.defname == "full")
    })
}

fn extract_vacuum_table(vacuum: &VacuumStmt) -> String {
    for rel in &vacuum.rels {
        let Some(NodeEnum::VacuumRelation(vr)) = rel.node.as_ref() else {
            continue;
        };

        if let Some(relation) = &vr.relation {
            return table_name(Some(relation));
        }
    }

    "<all tables>".to_string()
}
