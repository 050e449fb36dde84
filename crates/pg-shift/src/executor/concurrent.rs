//! AST-based detection of `CREATE INDEX CONCURRENTLY`.

use crate::error::{MigrateError, Result};
use crate::parser::{self, NodeEnum};

/// Parse the SQL and return true if any statement is a
/// `CREATE INDEX CONCURRENTLY`. Such statements cannot run inside a
/// transaction block, so the whole migration must execute directly on
/// the pool. Detection is AST-based so comments and whitespace cannot
/// fool it.
pub fn contains_concurrent_index(sql: &str) -> Result<bool> {
    let result = parser::parse(sql)
        .map_err(|e| MigrateError::context("parsing SQL for concurrent index detection", e))?;

    Ok(result
        .stmts
        .iter()
        .filter_map(parser::stmt_node)
        .any(|node| matches!(node, NodeEnum::IndexStmt(idx) if idx.concurrent)))
}
