//! Thin façade over the PostgreSQL grammar.
//!
//! Wraps [`pg_query`] (the Rust binding of libpg_query, the actual
//! PostgreSQL parser) and yields raw statement nodes with byte offsets
//! into the original SQL. The protobuf AST stays behind this module and
//! the analyzer rules; nothing else in the crate should touch it.

use crate::error::Result;

pub use pg_query::protobuf::RawStmt;
pub use pg_query::NodeEnum;

/// The parsed AST together with the original SQL text.
#[derive(Debug)]
pub struct ParseResult {
    pub stmts: Vec<RawStmt>,
    pub sql: String,
}

/// Parse a PostgreSQL SQL string and return the AST.
///
/// Empty or whitespace-only input yields zero statements without error.
/// Statement offsets are relative to the trimmed input, which is identical
/// to the stored text for migrations because the loader trims on read.
pub fn parse(sql: &str) -> Result<ParseResult> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Ok(ParseResult {
            stmts: Vec::new(),
            sql: sql.to_string(),
        });
    }

    let parsed = pg_query::parse(trimmed)?;

    Ok(ParseResult {
        stmts: parsed.protobuf.stmts,
        sql: sql.to_string(),
    })
}

/// The statement node inside a raw statement, if present.
pub fn stmt_node(stmt: &RawStmt) -> Option<&NodeEnum> {
    stmt.stmt.as_ref().and_then(|n| n.node.as_ref())
}

/// Extract the SQL text for statement `idx` from the full SQL string,
/// using the byte offsets the parser recorded. Out-of-bounds indices or
/// overlapping offsets yield an empty string.
pub fn extract_stmt_sql(stmts: &[RawStmt], idx: usize, full_sql: &str) -> String {
    let Some(stmt) = stmts.get(idx) else {
        return String::new();
    };

    if stmt.stmt_location < 0 {
        return String::new();
    }
    let start = stmt.stmt_location as usize;

    let end = match stmts.get(idx + 1) {
        Some(next) if next.stmt_location >= 0 => next.stmt_location as usize,
        Some(_) => return String::new(),
        None => full_sql.len(),
    };

    if start > full_sql.len() || end > full_sql.len() || start >= end {
        return String::new();
    }

    full_sql[start..end].trim().to_string()
}
