//! # pg-shift
//!
//! Zero-downtime schema migration engine for PostgreSQL.
//!
//! This library analyses SQL migrations with the real PostgreSQL parser,
//! detects dangerous DDL operations that cause table locks and outages,
//! and applies migrations against a live database with:
//!
//! - **Static danger analysis** over the PostgreSQL AST (nine built-in rules)
//! - **Advisory locking** so concurrent runs serialise across processes
//! - **Checksum drift detection** between applied migrations and files on disk
//! - **Transactional execution** with `lock_timeout` / `statement_timeout`,
//!   routing `CREATE INDEX CONCURRENTLY` outside transaction blocks
//! - **An auditable ledger** in the `schema_migrations` table
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_shift::driver::{self, ApplyOptions};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_shift::Result<()> {
//!     let pool = pg_shift::db::new_pool("postgres://localhost/app").await?;
//!     let cancel = CancellationToken::new();
//!     let report = driver::apply(
//!         &pool,
//!         &cancel,
//!         Path::new("./migrations"),
//!         &ApplyOptions::default(),
//!         None,
//!     )
//!     .await?;
//!     println!("Applied {} migration(s)", report.applied);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod migration;
pub mod parser;

// Re-exports for convenient access
pub use analyzer::{AnalysisResult, Analyzer, Finding, Registry, Rule, RuleContext, Severity};
pub use config::Config;
pub use db::{AdvisoryLock, MIGRATION_LOCK_ID};
pub use error::{MigrateError, Result};
pub use executor::{Executor, ProgressEvent, ProgressStatus};
pub use ledger::{AppliedMigration, Ledger, MigrationLedger, MigrationStatus, RecordParams};
pub use migration::{compute_checksum, load_from_dir, sort, Migration};
