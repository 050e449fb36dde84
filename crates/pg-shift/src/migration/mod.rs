//! Migration files: loading, checksums, and plan ordering.

mod loader;

pub use loader::load_from_dir;

use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// A single database migration loaded from disk.
///
/// Immutable after load; the `version` string orders the plan
/// lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// `"001"` or `"20240101120000"`, extracted from the filename.
    pub version: String,
    /// `"create_users"`, extracted from the filename.
    pub name: String,
    /// Contents of the `.up.sql` file, whitespace-trimmed.
    pub up_sql: String,
    /// Contents of the `.down.sql` file, if one exists.
    pub down_sql: Option<String>,
    /// SHA-256 hex digest of `up_sql`.
    pub checksum: String,
    /// Path to the `.up.sql` file, for diagnostics.
    pub file_path: PathBuf,
}

impl Migration {
    /// The filename recorded in the ledger (base name of the up file).
    pub fn filename(&self) -> String {
        self.file_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// Compute the SHA-256 hex digest of the given SQL string.
pub fn compute_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Return a new vector of migrations sorted by version in lexicographic
/// order. The sort is stable and the input is left untouched.
pub fn sort(migrations: &[Migration]) -> Vec<Migration> {
    let mut sorted = migrations.to_vec();
    sorted.sort_by(|a, b| a.version.cmp(&b.version));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: &str) -> Migration {
        Migration {
            version: version.to_string(),
            name: format!("test_{version}"),
            up_sql: String::new(),
            down_sql: None,
            checksum: String::new(),
            file_path: PathBuf::from(format!("V{version}_test.up.sql")),
        }
    }

    #[test]
    fn checksum_is_64_char_lowercase_hex() {
        let sum = compute_checksum("CREATE TABLE users (id SERIAL);");

        assert_eq!(sum.len(), 64);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = compute_checksum("SELECT 1;");
        let b = compute_checksum("SELECT 1;");
        let c = compute_checksum("SELECT 2;");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn checksum_of_empty_string_matches_sha256_empty() {
        assert_eq!(
            compute_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sort_orders_lexicographically() {
        let input = vec![migration("003"), migration("001"), migration("002")];

        let sorted = sort(&input);

        let versions: Vec<&str> = sorted.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, ["001", "002", "003"]);
    }

    #[test]
    fn sort_does_not_mutate_input() {
        let input = vec![migration("002"), migration("001")];

        let _ = sort(&input);

        assert_eq!(input[0].version, "002");
        assert_eq!(input[1].version, "001");
    }

    #[test]
    fn sort_is_idempotent() {
        let input = vec![migration("002"), migration("001"), migration("010")];

        let once = sort(&input);
        let twice = sort(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn sort_mixes_v_and_timestamp_versions_lexicographically() {
        let input = vec![migration("20240101120000"), migration("001")];

        let sorted = sort(&input);

        assert_eq!(sorted[0].version, "001");
        assert_eq!(sorted[1].version, "20240101120000");
    }

    #[test]
    fn filename_is_base_name_of_up_file() {
        let mut m = migration("001");
        m.file_path = PathBuf::from("migrations/V001_test.up.sql");

        assert_eq!(m.filename(), "V001_test.up.sql");
    }
}
