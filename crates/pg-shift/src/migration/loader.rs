//! Directory scanning and up/down file pairing.

use super::{compute_checksum, Migration};
use crate::error::{MigrateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// Matches migration files in two formats:
//
//   V{version}_{name}.up.sql   (e.g., V001_create_users.up.sql)
//   {timestamp}_{name}.up.sql  (e.g., 20240101120000_create_users.up.sql)
static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:V(\d+)|(\d{14}))_(.+)\.(up|down)\.sql$").expect("valid regex"));

/// Intermediate pairing of up/down files sharing a version+name key.
#[derive(Default)]
struct MigrationFile {
    version: String,
    name: String,
    up_file: Option<String>,
    down_file: Option<String>,
}

/// Scan a directory for migration files and return them as unsorted
/// [`Migration`] values. Files that do not match the naming pattern are
/// skipped, as is a `.down.sql` with no matching `.up.sql`.
pub fn load_from_dir(dir: &Path) -> Result<Vec<Migration>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        MigrateError::io(format!("reading migrations directory {}", dir.display()), e)
    })?;

    let mut grouped: HashMap<String, MigrationFile> = HashMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| {
            MigrateError::io(format!("reading migrations directory {}", dir.display()), e)
        })?;

        if entry.path().is_dir() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        let Some(captures) = FILENAME_PATTERN.captures(file_name) else {
            continue;
        };

        // Group 1 is the V-prefixed version, group 2 the timestamp form.
        let version = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let name = &captures[3];
        let direction = &captures[4];

        let key = format!("{version}_{name}");
        let mf = grouped.entry(key).or_insert_with(|| MigrationFile {
            version: version.to_string(),
            name: name.to_string(),
            ..MigrationFile::default()
        });

        if direction == "up" {
            mf.up_file = Some(file_name.to_string());
        } else {
            mf.down_file = Some(file_name.to_string());
        }
    }

    let mut migrations = Vec::new();

    for mf in grouped.into_values() {
        let Some(up_file) = &mf.up_file else {
            continue; // orphan .down.sql
        };

        migrations.push(read_migration(&mf, up_file, dir)?);
    }

    Ok(migrations)
}

/// Read up/down SQL files and build a [`Migration`].
fn read_migration(mf: &MigrationFile, up_file: &str, dir: &Path) -> Result<Migration> {
    let up_path = dir.join(up_file);
    let up_sql = read_trimmed(&up_path)?;

    let down_sql = match &mf.down_file {
        Some(down_file) => Some(read_trimmed(&dir.join(down_file))?),
        None => None,
    };

    Ok(Migration {
        version: mf.version.clone(),
        name: mf.name.clone(),
        checksum: compute_checksum(&up_sql),
        up_sql,
        down_sql,
        file_path: up_path,
    })
}

fn read_trimmed(path: &Path) -> Result<String> {
    let data = fs::read_to_string(path)
        .map_err(|e| MigrateError::io(format!("reading migration file {}", path.display()), e))?;
    Ok(data.trim().to_string())
}
