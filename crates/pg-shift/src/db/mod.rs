//! Database connection pooling and cross-process locking.

mod advisory_lock;

pub use advisory_lock::{AdvisoryLock, MIGRATION_LOCK_ID};

use crate::error::{MigrateError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::debug;

/// Conservative connection cap; a migration run is sequential and needs
/// one pinned lock connection plus a working connection.
const DEFAULT_MAX_CONNS: usize = 5;

/// Create a connection pool for the given database URL.
///
/// Parses the connection string, caps the pool size, and pings the
/// database to verify connectivity before returning.
pub async fn new_pool(database_url: &str) -> Result<Pool> {
    let pg_config: PgConfig = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| MigrateError::InvalidDatabaseUrl(e.to_string()))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);

    let pool = Pool::builder(mgr)
        .max_size(DEFAULT_MAX_CONNS)
        .build()
        .map_err(|e| MigrateError::ConnectionFailed(e.to_string()))?;

    let client = pool
        .get()
        .await
        .map_err(|e| MigrateError::ConnectionFailed(e.to_string()))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| MigrateError::ConnectionFailed(e.to_string()))?;

    debug!("database connection verified");

    Ok(pool)
}
