//! Transactional plumbing for migration execution.

use crate::error::{MigrateError, Result};
use deadpool_postgres::Pool;
use std::time::Duration;
use tokio_postgres::Transaction;

/// Execute SQL directly on the pool, outside any transaction. Required
/// for `CREATE INDEX CONCURRENTLY`, which cannot run inside a
/// transaction block.
pub async fn exec_without_transaction(pool: &Pool, sql: &str) -> Result<()> {
    let conn = pool
        .get()
        .await
        .map_err(|e| MigrateError::pool("acquiring connection for migration", e))?;

    conn.batch_execute(sql)
        .await
        .map_err(|e| MigrateError::db("executing outside transaction", e))?;

    Ok(())
}

/// Set `lock_timeout` for the current transaction. The migration then
/// fails fast when it cannot acquire a lock, instead of queueing behind
/// long-running queries and blocking traffic arriving after it.
pub async fn set_lock_timeout(tx: &Transaction<'_>, timeout: Duration) -> Result<()> {
    let sql = format!("SET lock_timeout = '{}ms'", timeout.as_millis());

    tx.batch_execute(&sql)
        .await
        .map_err(|e| MigrateError::db("setting lock_timeout", e))?;

    Ok(())
}

/// Set `statement_timeout` for the current transaction, bounding the
/// migration's runtime.
pub async fn set_statement_timeout(tx: &Transaction<'_>, timeout: Duration) -> Result<()> {
    let sql = format!("SET statement_timeout = '{}ms'", timeout.as_millis());

    tx.batch_execute(&sql)
        .await
        .map_err(|e| MigrateError::db("setting statement_timeout", e))?;

    Ok(())
}
