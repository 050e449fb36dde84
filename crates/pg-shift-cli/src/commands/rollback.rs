//! `pg-shift rollback` - reserved; the executor does not implement
//! rollback yet, so the command surfaces the sentinel error.

use pg_shift::{Config, MigrateError, Result};

pub async fn run(_cfg: &Config, _steps: usize, _target: Option<&str>) -> Result<()> {
    Err(MigrateError::RollbackNotImplemented)
}
