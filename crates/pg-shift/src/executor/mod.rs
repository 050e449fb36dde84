//! Migration execution with advisory locking, checksum verification,
//! transactional safety, and progress reporting.

mod concurrent;
mod transaction;

pub use concurrent::contains_concurrent_index;
pub use transaction::{exec_without_transaction, set_lock_timeout, set_statement_timeout};

use crate::db::AdvisoryLock;
use crate::error::{MigrateError, Result};
use crate::ledger::{Ledger, MigrationLedger, RecordParams};
use crate::migration::Migration;
use deadpool_postgres::Pool;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-migration outcome reported via the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Starting,
    Completed,
    Failed,
    Skipped,
}

/// Emitted by the executor for each migration processed. `Starting` is
/// always followed by `Completed` or `Failed`; `Skipped` is emitted alone.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub version: String,
    pub name: String,
    pub status: ProgressStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

impl ProgressEvent {
    fn new(m: &Migration, status: ProgressStatus) -> Self {
        Self {
            version: m.version.clone(),
            name: m.name.clone(),
            status,
            duration: Duration::ZERO,
            error: None,
        }
    }
}

/// Callback invoked synchronously for each progress event, in order.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Applies pending migrations in plan order.
///
/// Holds the advisory lock for the whole run, skips already-applied
/// migrations after verifying their checksum, and routes migrations
/// containing `CREATE INDEX CONCURRENTLY` outside transaction blocks.
pub struct Executor<L: MigrationLedger = Ledger> {
    pool: Pool,
    ledger: L,
    /// Zero means "do not set".
    lock_timeout: Duration,
    /// Zero means "do not set".
    statement_timeout: Duration,
    dry_run: bool,
    on_progress: Option<ProgressCallback>,
    #[cfg(test)]
    exec_override: Option<fn(&Migration) -> Result<()>>,
}

impl<L: MigrationLedger> Executor<L> {
    /// Create an executor over the given pool and ledger.
    pub fn new(pool: Pool, ledger: L) -> Self {
        Self {
            pool,
            ledger,
            lock_timeout: Duration::ZERO,
            statement_timeout: Duration::ZERO,
            dry_run: false,
            on_progress: None,
            #[cfg(test)]
            exec_override: None,
        }
    }

    /// Set the per-transaction `lock_timeout`. Zero disables it.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the per-transaction `statement_timeout`. Zero disables it.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Enable dry-run mode: no SQL is executed, no ledger rows written.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set a callback invoked for each migration processed.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Execute pending migrations in the given order.
    ///
    /// Acquires the advisory lock before touching the ledger and holds it
    /// until the last migration completes or fails; release is attempted
    /// even when the run errors. A failed migration aborts the run, but
    /// migrations already recorded stay recorded.
    pub async fn apply(&self, cancel: &CancellationToken, migrations: &[Migration]) -> Result<()> {
        let mut lock = AdvisoryLock::try_acquire(&self.pool)
            .await
            .map_err(|e| MigrateError::context("acquiring migration lock", e))?;

        let result = self.apply_locked(cancel, migrations).await;

        if let Err(e) = lock.release().await {
            warn!("failed to release advisory lock: {e}");
        }

        result
    }

    /// Reverse the most recent applied migrations. Not yet implemented.
    pub async fn rollback(&self, _steps: usize) -> Result<()> {
        Err(MigrateError::RollbackNotImplemented)
    }

    /// Reverse all migrations applied after the target version. Not yet
    /// implemented.
    pub async fn rollback_to_version(&self, _version: &str) -> Result<()> {
        Err(MigrateError::RollbackNotImplemented)
    }

    async fn apply_locked(
        &self,
        cancel: &CancellationToken,
        migrations: &[Migration],
    ) -> Result<()> {
        self.ledger.ensure_table().await?;

        for m in migrations {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            self.apply_one(cancel, m).await?;
        }

        Ok(())
    }

    /// Handle a single migration: skip if applied, dry-run check, execute,
    /// record, and fire progress.
    async fn apply_one(&self, cancel: &CancellationToken, m: &Migration) -> Result<()> {
        if self.should_skip(m).await? {
            self.fire_progress(ProgressEvent::new(m, ProgressStatus::Skipped));
            return Ok(());
        }

        if self.dry_run {
            self.fire_progress(ProgressEvent::new(m, ProgressStatus::Skipped));
            return Ok(());
        }

        self.fire_progress(ProgressEvent::new(m, ProgressStatus::Starting));

        let start = Instant::now();
        let exec_result = self.run_migration_sql(cancel, m).await;
        let duration = start.elapsed();

        if let Err(e) = exec_result {
            self.fire_progress(ProgressEvent {
                duration,
                error: Some(e.to_string()),
                ..ProgressEvent::new(m, ProgressStatus::Failed)
            });

            return Err(MigrateError::context(
                format!("executing migration {}", m.version),
                e,
            ));
        }

        self.ledger
            .record_applied(&RecordParams {
                version: m.version.clone(),
                filename: m.filename(),
                checksum: m.checksum.clone(),
                duration_ms: duration.as_millis().min(i32::MAX as u128) as i32,
            })
            .await
            .map_err(|e| {
                MigrateError::context(format!("recording migration {}", m.version), e)
            })?;

        self.fire_progress(ProgressEvent {
            duration,
            ..ProgressEvent::new(m, ProgressStatus::Completed)
        });

        Ok(())
    }

    /// True if the migration is already applied. Verifies the stored
    /// checksum to catch file drift.
    async fn should_skip(&self, m: &Migration) -> Result<bool> {
        let applied = self
            .ledger
            .is_applied(&m.version)
            .await
            .map_err(|e| MigrateError::context(format!("checking migration {}", m.version), e))?;

        if !applied {
            return Ok(false);
        }

        let stored = self.ledger.get_checksum(&m.version).await.map_err(|e| {
            MigrateError::context(format!("getting checksum for {}", m.version), e)
        })?;

        if stored != m.checksum {
            return Err(MigrateError::ChecksumMismatch {
                version: m.version.clone(),
                stored,
                computed: m.checksum.clone(),
            });
        }

        Ok(true)
    }

    async fn run_migration_sql(&self, cancel: &CancellationToken, m: &Migration) -> Result<()> {
        #[cfg(test)]
        if let Some(exec) = self.exec_override {
            return exec(m);
        }

        self.execute_migration(cancel, m).await
    }

    /// Run the migration SQL, choosing between transactional and
    /// non-transactional execution based on whether it contains a
    /// concurrent index build.
    async fn execute_migration(&self, cancel: &CancellationToken, m: &Migration) -> Result<()> {
        let concurrent = contains_concurrent_index(&m.up_sql)?;

        let execute = async {
            if concurrent {
                // Timeouts are transaction-scoped and do not apply here.
                exec_without_transaction(&self.pool, &m.up_sql).await
            } else {
                self.execute_in_transaction(m).await
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(MigrateError::Cancelled),
            result = execute => result,
        }
    }

    async fn execute_in_transaction(&self, m: &Migration) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool("acquiring connection for migration", e))?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| MigrateError::db("beginning transaction", e))?;

        if !self.lock_timeout.is_zero() {
            set_lock_timeout(&tx, self.lock_timeout).await?;
        }

        if !self.statement_timeout.is_zero() {
            set_statement_timeout(&tx, self.statement_timeout).await?;
        }

        tx.batch_execute(&m.up_sql)
            .await
            .map_err(|e| MigrateError::db("executing SQL", e))?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::db("committing transaction", e))?;

        Ok(())
    }

    fn fire_progress(&self, event: ProgressEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::compute_checksum;
    use async_trait::async_trait;
    use deadpool_postgres::{Manager, ManagerConfig, RecyclingMethod};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tokio_postgres::NoTls;

    /// In-memory ledger mirroring the upsert semantics of the real one.
    #[derive(Default)]
    struct MockLedger {
        applied: Mutex<HashMap<String, String>>,
        recorded: Mutex<Vec<RecordParams>>,
        is_applied_err: bool,
        checksum_err: bool,
        record_err: bool,
    }

    #[async_trait]
    impl MigrationLedger for MockLedger {
        async fn ensure_table(&self) -> Result<()> {
            Ok(())
        }

        async fn is_applied(&self, version: &str) -> Result<bool> {
            if self.is_applied_err {
                return Err(MigrateError::Config("db error".to_string()));
            }
            Ok(self.applied.lock().unwrap().contains_key(version))
        }

        async fn get_checksum(&self, version: &str) -> Result<String> {
            if self.checksum_err {
                return Err(MigrateError::Config("db error".to_string()));
            }
            self.applied
                .lock()
                .unwrap()
                .get(version)
                .cloned()
                .ok_or_else(|| MigrateError::MigrationNotFound {
                    version: version.to_string(),
                })
        }

        async fn record_applied(&self, params: &RecordParams) -> Result<()> {
            if self.record_err {
                return Err(MigrateError::Config("record failed".to_string()));
            }
            self.applied
                .lock()
                .unwrap()
                .insert(params.version.clone(), params.checksum.clone());
            self.recorded.lock().unwrap().push(params.clone());
            Ok(())
        }
    }

    /// A pool that is never connected; tests exercising executor logic
    /// route execution through `exec_override` instead.
    fn dummy_pool() -> Pool {
        let mut cfg = tokio_postgres::Config::new();
        cfg.host("localhost").user("nobody").dbname("nowhere");
        let mgr = Manager::from_config(
            cfg,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        Pool::builder(mgr).max_size(1).build().unwrap()
    }

    fn test_migration(version: &str, sql: &str) -> Migration {
        Migration {
            version: version.to_string(),
            name: format!("test_{version}"),
            up_sql: sql.to_string(),
            down_sql: None,
            checksum: compute_checksum(sql),
            file_path: PathBuf::from(format!("migrations/V{version}_test.up.sql")),
        }
    }

    fn test_executor(ledger: MockLedger) -> Executor<MockLedger> {
        Executor::new(dummy_pool(), ledger)
    }

    fn capture_events(
        executor: Executor<MockLedger>,
    ) -> (Executor<MockLedger>, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let executor =
            executor.with_progress_callback(Box::new(move |e| sink.lock().unwrap().push(e)));
        (executor, events)
    }

    #[tokio::test]
    async fn should_skip_not_applied_returns_false() {
        let executor = test_executor(MockLedger::default());
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        assert!(!executor.should_skip(&m).await.unwrap());
    }

    #[tokio::test]
    async fn should_skip_applied_with_matching_checksum_returns_true() {
        let m = test_migration("001", "CREATE TABLE t (id INT);");
        let ledger = MockLedger::default();
        ledger
            .applied
            .lock()
            .unwrap()
            .insert("001".to_string(), m.checksum.clone());
        let executor = test_executor(ledger);

        assert!(executor.should_skip(&m).await.unwrap());
    }

    #[tokio::test]
    async fn should_skip_checksum_mismatch_is_an_error() {
        let m = test_migration("001", "CREATE TABLE t (id INT);");
        let ledger = MockLedger::default();
        ledger
            .applied
            .lock()
            .unwrap()
            .insert("001".to_string(), "wrong-checksum".to_string());
        let executor = test_executor(ledger);

        let err = executor.should_skip(&m).await.unwrap_err();

        assert!(matches!(
            err.root_cause(),
            MigrateError::ChecksumMismatch { .. }
        ));
        assert!(err.to_string().contains("stored=wrong-checksum"));
    }

    #[tokio::test]
    async fn should_skip_is_applied_error_adds_context() {
        let ledger = MockLedger {
            is_applied_err: true,
            ..MockLedger::default()
        };
        let executor = test_executor(ledger);
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        let err = executor.should_skip(&m).await.unwrap_err();

        assert!(err.to_string().contains("checking migration 001"));
    }

    #[tokio::test]
    async fn should_skip_checksum_error_adds_context() {
        let ledger = MockLedger {
            checksum_err: true,
            ..MockLedger::default()
        };
        ledger
            .applied
            .lock()
            .unwrap()
            .insert("001".to_string(), "x".to_string());
        let executor = test_executor(ledger);
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        let err = executor.should_skip(&m).await.unwrap_err();

        assert!(err.to_string().contains("getting checksum for 001"));
    }

    #[tokio::test]
    async fn apply_one_skips_already_applied() {
        let m = test_migration("001", "CREATE TABLE t (id INT);");
        let ledger = MockLedger::default();
        ledger
            .applied
            .lock()
            .unwrap()
            .insert("001".to_string(), m.checksum.clone());
        let (executor, events) = capture_events(test_executor(ledger));

        executor
            .apply_one(&CancellationToken::new(), &m)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Skipped);
    }

    #[tokio::test]
    async fn apply_one_dry_run_emits_skipped_and_records_nothing() {
        let (executor, events) =
            capture_events(test_executor(MockLedger::default()).with_dry_run(true));
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        executor
            .apply_one(&CancellationToken::new(), &m)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Skipped);
        assert!(executor.ledger.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_one_success_fires_starting_then_completed_and_records() {
        let (mut executor, events) = capture_events(test_executor(MockLedger::default()));
        executor.exec_override = Some(|_| Ok(()));
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        executor
            .apply_one(&CancellationToken::new(), &m)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ProgressStatus::Starting);
        assert_eq!(events[1].status, ProgressStatus::Completed);

        let recorded = executor.ledger.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].version, "001");
        assert_eq!(recorded[0].checksum, m.checksum);
        assert_eq!(recorded[0].filename, "V001_test.up.sql");
    }

    #[tokio::test]
    async fn apply_one_exec_error_fires_failed_and_wraps_error() {
        let (mut executor, events) = capture_events(test_executor(MockLedger::default()));
        executor.exec_override = Some(|_| Err(MigrateError::Config("SQL error".to_string())));
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        let err = executor
            .apply_one(&CancellationToken::new(), &m)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("executing migration 001"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ProgressStatus::Starting);
        assert_eq!(events[1].status, ProgressStatus::Failed);
        assert!(events[1].error.as_deref().unwrap().contains("SQL error"));

        assert!(executor.ledger.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_one_record_error_is_wrapped() {
        let ledger = MockLedger {
            record_err: true,
            ..MockLedger::default()
        };
        let mut executor = test_executor(ledger);
        executor.exec_override = Some(|_| Ok(()));
        let m = test_migration("001", "CREATE TABLE t (id INT);");

        let err = executor
            .apply_one(&CancellationToken::new(), &m)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("recording migration 001"));
    }

    #[tokio::test]
    async fn apply_locked_stops_at_first_failure() {
        let (mut executor, events) = capture_events(test_executor(MockLedger::default()));
        executor.exec_override = Some(|m| {
            if m.version == "002" {
                Err(MigrateError::Config("boom".to_string()))
            } else {
                Ok(())
            }
        });

        let migrations = vec![
            test_migration("001", "CREATE TABLE a (id INT);"),
            test_migration("002", "CREATE TABLE b (id INT);"),
            test_migration("003", "CREATE TABLE c (id INT);"),
        ];

        let err = executor
            .apply_locked(&CancellationToken::new(), &migrations)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("executing migration 002"));

        // 001 applied and durable; 003 never attempted.
        let recorded = executor.ledger.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].version, "001");

        let events = events.lock().unwrap();
        let statuses: Vec<ProgressStatus> = events.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProgressStatus::Starting,
                ProgressStatus::Completed,
                ProgressStatus::Starting,
                ProgressStatus::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn apply_locked_pre_cancelled_token_stops_before_work() {
        let mut executor = test_executor(MockLedger::default());
        executor.exec_override = Some(|_| Ok(()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let migrations = vec![test_migration("001", "CREATE TABLE a (id INT);")];

        let err = executor.apply_locked(&cancel, &migrations).await.unwrap_err();

        assert!(matches!(err, MigrateError::Cancelled));
        assert!(executor.ledger.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_returns_not_implemented() {
        let executor = test_executor(MockLedger::default());

        let err = executor.rollback(1).await.unwrap_err();
        assert!(matches!(err, MigrateError::RollbackNotImplemented));

        let err = executor.rollback_to_version("001").await.unwrap_err();
        assert!(matches!(err, MigrateError::RollbackNotImplemented));
    }
}
