//! The migration ledger: CRUD over the `schema_migrations` table.
//!
//! The ledger is the source of truth for what has been applied. Rows are
//! inserted on first apply, upserted when a rolled-back migration is
//! re-applied, and status-toggled on rollback.

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;

/// DDL for the ledger table. Idempotent and safe to run concurrently.
const CREATE_LEDGER_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version      TEXT PRIMARY KEY,
    filename     TEXT NOT NULL,
    checksum     TEXT NOT NULL,
    applied_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    duration_ms  INTEGER NOT NULL,
    status       TEXT NOT NULL DEFAULT 'applied'
)";

/// Status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Applied,
    RolledBack,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Applied => "applied",
            MigrationStatus::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "applied" => Ok(MigrationStatus::Applied),
            "rolled_back" => Ok(MigrationStatus::RolledBack),
            other => Err(MigrateError::Config(format!(
                "invalid migration status: {other}"
            ))),
        }
    }
}

/// A migration record from the `schema_migrations` table.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub version: String,
    pub filename: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub duration_ms: i32,
    pub status: MigrationStatus,
}

/// The fields needed to record a migration as applied.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub version: String,
    pub filename: String,
    pub checksum: String,
    pub duration_ms: i32,
}

/// The ledger operations the executor depends on. Split out as a trait so
/// executor logic can be exercised against an in-memory ledger in tests.
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Create the `schema_migrations` table if it does not exist.
    async fn ensure_table(&self) -> Result<()>;

    /// Whether a migration version has been successfully applied.
    async fn is_applied(&self, version: &str) -> Result<bool>;

    /// The recorded checksum for a migration version.
    async fn get_checksum(&self, version: &str) -> Result<String>;

    /// Insert or update a migration record with status `applied`.
    async fn record_applied(&self, params: &RecordParams) -> Result<()>;
}

/// PostgreSQL-backed ledger.
pub struct Ledger {
    pool: Pool,
}

impl Ledger {
    /// Create a ledger backed by the given connection pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// All applied migrations, ordered by version ascending. Rows with
    /// status `rolled_back` are excluded.
    pub async fn get_applied(&self) -> Result<Vec<AppliedMigration>> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("querying applied migrations", e))?;

        let rows = conn
            .query(
                "SELECT version, filename, checksum, applied_at, duration_ms, status
                 FROM schema_migrations
                 WHERE status = 'applied'
                 ORDER BY version",
                &[],
            )
            .await
            .map_err(|e| MigrateError::db("querying applied migrations", e))?;

        rows.iter()
            .map(|row| {
                Ok(AppliedMigration {
                    version: row.get(0),
                    filename: row.get(1),
                    checksum: row.get(2),
                    applied_at: row.get(3),
                    duration_ms: row.get(4),
                    status: MigrationStatus::parse(row.get(5))?,
                })
            })
            .collect()
    }

    /// Set a migration's status to `rolled_back`. Returns
    /// [`MigrateError::MigrationNotFound`] if no row exists.
    pub async fn record_rolled_back(&self, version: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("recording migration as rolled back", e))?;

        let affected = conn
            .execute(
                "UPDATE schema_migrations SET status = 'rolled_back' WHERE version = $1",
                &[&version],
            )
            .await
            .map_err(|e| {
                MigrateError::db(format!("recording migration {version} as rolled back"), e)
            })?;

        if affected == 0 {
            return Err(MigrateError::MigrationNotFound {
                version: version.to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MigrationLedger for Ledger {
    async fn ensure_table(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("creating schema_migrations table", e))?;

        conn.execute(CREATE_LEDGER_SQL, &[])
            .await
            .map_err(|e| MigrateError::TableCreation(e.to_string()))?;

        Ok(())
    }

    async fn is_applied(&self, version: &str) -> Result<bool> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("checking if migration is applied", e))?;

        let row = conn
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = $1 AND status = 'applied')",
                &[&version],
            )
            .await
            .map_err(|e| {
                MigrateError::db(format!("checking if migration {version} is applied"), e)
            })?;

        Ok(row.get(0))
    }

    async fn get_checksum(&self, version: &str) -> Result<String> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("getting migration checksum", e))?;

        let row = conn
            .query_opt(
                "SELECT checksum FROM schema_migrations WHERE version = $1",
                &[&version],
            )
            .await
            .map_err(|e| MigrateError::db(format!("getting checksum for migration {version}"), e))?;

        match row {
            Some(row) => Ok(row.get(0)),
            None => Err(MigrateError::MigrationNotFound {
                version: version.to_string(),
            }),
        }
    }

    async fn record_applied(&self, params: &RecordParams) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("recording migration as applied", e))?;

        conn.execute(
            "INSERT INTO schema_migrations (version, filename, checksum, duration_ms, status)
             VALUES ($1, $2, $3, $4, 'applied')
             ON CONFLICT (version) DO UPDATE SET
                 filename = EXCLUDED.filename,
                 checksum = EXCLUDED.checksum,
                 applied_at = NOW(),
                 duration_ms = EXCLUDED.duration_ms,
                 status = 'applied'",
            &[
                &params.version,
                &params.filename,
                &params.checksum,
                &params.duration_ms,
            ],
        )
        .await
        .map_err(|e| {
            MigrateError::db(
                format!("recording migration {} as applied", params.version),
                e,
            )
        })?;

        Ok(())
    }
}
