//! Session-level advisory locking for migration runs.

use crate::error::{MigrateError, Result};
use deadpool_postgres::{Object, Pool};
use tracing::debug;

/// Advisory lock key used to prevent concurrent migration runs. Stable
/// across processes and releases; third-party tools acquiring the same
/// key will serialize against this engine, as intended.
pub const MIGRATION_LOCK_ID: i64 = 123_456_789;

/// A dedicated pooled connection holding a session-level advisory lock.
///
/// Session locks must be released on the connection that acquired them,
/// so the handle owns the connection for its lifetime. Call
/// [`AdvisoryLock::release`] when done; dropping the handle without
/// releasing returns the connection to the pool with the lock still held,
/// which blocks other runs until the connection is closed.
pub struct AdvisoryLock {
    conn: Option<Object>,
}

impl AdvisoryLock {
    /// Attempt to acquire the session-level advisory lock.
    ///
    /// Returns [`MigrateError::LockNotAcquired`] if another session holds
    /// the lock; the checked-out connection is returned to the pool in
    /// that case.
    pub async fn try_acquire(pool: &Pool) -> Result<Self> {
        let conn = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("acquiring connection for advisory lock", e))?;

        let row = conn
            .query_one("SELECT pg_try_advisory_lock($1)", &[&MIGRATION_LOCK_ID])
            .await
            .map_err(|e| MigrateError::db("executing pg_try_advisory_lock", e))?;

        let acquired: bool = row.get(0);
        if !acquired {
            return Err(MigrateError::LockNotAcquired);
        }

        debug!(lock_id = MIGRATION_LOCK_ID, "advisory lock acquired");

        Ok(Self { conn: Some(conn) })
    }

    /// Unlock the advisory lock and return the connection to the pool.
    /// Safe to call multiple times; subsequent calls are no-ops.
    pub async fn release(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        let result = conn
            .execute("SELECT pg_advisory_unlock($1)", &[&MIGRATION_LOCK_ID])
            .await;
        drop(conn);

        result.map_err(|e| MigrateError::db("releasing advisory lock", e))?;

        debug!(lock_id = MIGRATION_LOCK_ID, "advisory lock released");

        Ok(())
    }

    /// Whether this handle still owns the lock connection.
    pub fn is_held(&self) -> bool {
        self.conn.is_some()
    }
}
