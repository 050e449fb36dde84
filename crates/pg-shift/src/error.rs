//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration operations.
///
/// Variants are the stable API contract: callers branch on identity, not on
/// message text. Only [`MigrateError::LockNotAcquired`],
/// [`MigrateError::ChecksumMismatch`] and [`MigrateError::DangerousMigrations`]
/// are actionable; everything else is fatal to the run.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The database URL could not be parsed.
    #[error("invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    /// Connecting to or pinging the database failed.
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// The advisory lock is already held by another session.
    #[error("migration lock not acquired")]
    LockNotAcquired,

    /// No ledger row exists for the requested version.
    #[error("migration {version}: not found in schema_migrations")]
    MigrationNotFound { version: String },

    /// The ledger checksum differs from the checksum of the file on disk.
    #[error("migration {version}: checksum mismatch: stored={stored} computed={computed}")]
    ChecksumMismatch {
        version: String,
        stored: String,
        computed: String,
    },

    /// The schema_migrations table could not be created.
    #[error("creating schema_migrations table: {0}")]
    TableCreation(String),

    /// Reserved generic execution wrapper.
    #[error("migration execution failed")]
    ExecutionFailed,

    /// Rollback is not yet available.
    #[error("rollback not yet implemented")]
    RollbackNotImplemented,

    /// Apply refused because the analyser reported high or critical findings.
    #[error("apply aborted: dangerous migrations detected (use --force to override)")]
    DangerousMigrations,

    /// No database URL was configured.
    #[error("database URL is required (set --database-url, PGSHIFT_DATABASE_URL, or database_url in config)")]
    DatabaseUrlRequired,

    /// SQL could not be parsed by the PostgreSQL grammar.
    #[error("parsing SQL: {0}")]
    Parse(#[from] pg_query::Error),

    /// Database query or execution error with operation context.
    #[error("{context}: {source}")]
    Db {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Connection pool error with context.
    #[error("{context}: {message}")]
    Pool { context: String, message: String },

    /// IO error with operation context (file reads, directory scans).
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error (invalid YAML values, bad durations, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The run was cancelled (SIGINT, etc.)
    #[error("migration cancelled")]
    Cancelled,

    /// A wrapper adding operation context around another migration error.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    /// Create a Db error with context about the operation that failed.
    pub fn db(context: impl Into<String>, source: tokio_postgres::Error) -> Self {
        MigrateError::Db {
            context: context.into(),
            source,
        }
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(context: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Pool {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create an Io error with context about the operation that failed.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MigrateError::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap another migration error with operation context.
    pub fn context(context: impl Into<String>, source: MigrateError) -> Self {
        MigrateError::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Peel off [`MigrateError::Context`] wrappers and return the underlying
    /// error, so callers can branch on identity regardless of wrapping depth.
    pub fn root_cause(&self) -> &MigrateError {
        let mut err = self;
        while let MigrateError::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Format the error with its full source chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_context() {
        let err = MigrateError::context(
            "acquiring migration lock",
            MigrateError::context("inner", MigrateError::LockNotAcquired),
        );

        assert!(matches!(err.root_cause(), MigrateError::LockNotAcquired));
    }

    #[test]
    fn root_cause_of_plain_error_is_itself() {
        let err = MigrateError::DangerousMigrations;
        assert!(matches!(err.root_cause(), MigrateError::DangerousMigrations));
    }

    #[test]
    fn context_display_prefixes_inner_message() {
        let err = MigrateError::context("executing migration 001", MigrateError::Cancelled);
        assert_eq!(
            err.to_string(),
            "executing migration 001: migration cancelled"
        );
    }

    #[test]
    fn format_detailed_includes_source_chain() {
        let err = MigrateError::context("outer", MigrateError::RollbackNotImplemented);
        let detailed = err.format_detailed();

        assert!(detailed.contains("outer"));
        assert!(detailed.contains("Caused by"));
        assert!(detailed.contains("rollback not yet implemented"));
    }
}
