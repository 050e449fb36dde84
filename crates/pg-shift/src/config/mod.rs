//! Configuration loading from file, environment, and defaults.
//!
//! Precedence is flag > environment > file; the CLI applies flags after
//! calling [`Config::load`] and [`merge_env`].

mod redact;

pub use redact::redact_url;

use crate::analyzer::DEFAULT_PG_VERSION;
use crate::error::{MigrateError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default values for configuration fields.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FORMAT: &str = "text";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub migrations_dir: PathBuf,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
    pub target_pg_version: u32,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            target_pg_version: DEFAULT_PG_VERSION,
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

/// Raw YAML file representation with humantime duration strings.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    migrations_dir: Option<PathBuf>,
    lock_timeout: Option<String>,
    statement_timeout: Option<String>,
    target_pg_version: Option<u32>,
    format: Option<String>,
}

impl Config {
    /// Read a YAML configuration file. If `allow_missing` is true and the
    /// file does not exist, defaults are returned.
    pub fn load(path: &Path, allow_missing: bool) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(MigrateError::io(
                    format!("reading config file {}", path.display()),
                    e,
                ));
            }
        };

        let raw: RawConfig = serde_yaml::from_str(&data)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut cfg = Self::default();

        if raw.database_url.is_some() {
            cfg.database_url = raw.database_url;
        }

        if let Some(dir) = raw.migrations_dir {
            cfg.migrations_dir = dir;
        }

        if let Some(s) = raw.lock_timeout {
            cfg.lock_timeout = parse_duration("lock_timeout", &s)?;
        }

        if let Some(s) = raw.statement_timeout {
            cfg.statement_timeout = parse_duration("statement_timeout", &s)?;
        }

        if let Some(v) = raw.target_pg_version {
            cfg.target_pg_version = v;
        }

        if let Some(f) = raw.format {
            cfg.format = f;
        }

        Ok(cfg)
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| MigrateError::Config(format!("parsing {field} {value:?}: {e}")))
}

/// Override config fields from `PGSHIFT_*` environment variables.
pub fn merge_env(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PGSHIFT_DATABASE_URL") {
        if !v.is_empty() {
            cfg.database_url = Some(v);
        }
    }

    if let Ok(v) = std::env::var("PGSHIFT_MIGRATIONS_DIR") {
        if !v.is_empty() {
            cfg.migrations_dir = PathBuf::from(v);
        }
    }

    if let Ok(v) = std::env::var("PGSHIFT_LOCK_TIMEOUT") {
        if let Ok(d) = humantime::parse_duration(&v) {
            cfg.lock_timeout = d;
        }
    }

    if let Ok(v) = std::env::var("PGSHIFT_STATEMENT_TIMEOUT") {
        if let Ok(d) = humantime::parse_duration(&v) {
            cfg.statement_timeout = d;
        }
    }
}
