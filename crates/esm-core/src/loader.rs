//! Read a directory of `V{version}__{name}.yaml` files into a [`MigrationSet`].
//!
//! ```yaml
//! # V1_0_0__create_people.yaml
//! migrations:
//!   - type: CREATE_INDEX
//!     index: people
//!     definition:
//!       settings: { number_of_replicas: 0 }
//! ```
//!
//! The checksum is taken over the parsed file serialised back to YAML, so
//! comments and formatting do not count as edits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::migration::{Migration, MigrationMeta, MigrationSet};
use crate::operation::Operation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationFile {
    migrations: Vec<Operation>,
}

fn file_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^V([0-9]+(?:_[0-9]+)*)__([a-zA-Z0-9][a-zA-Z0-9_-]*)\.yaml$").unwrap()
    })
}

/// Split a migration file name into `(version, name)`.
///
/// `V1_2_0__add_field.yaml` becomes `("1.2.0", "add_field")`. Names that do
/// not follow the pattern yield `None`.
pub fn parse_file_name(file_name: &str) -> Option<(String, String)> {
    let caps = file_name_re().captures(file_name)?;
    Some((caps[1].replace('_', "."), caps[2].to_string()))
}

/// Lowercase hex SHA-256.
pub fn checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build a migration from a file name and its contents.
pub fn parse_migration(file_name: &str, contents: &str) -> Result<Migration> {
    let invalid = |reason: String| MigrationError::InvalidMigrationFile {
        path: file_name.to_string(),
        reason,
    };

    let (version, name) = parse_file_name(file_name)
        .ok_or_else(|| invalid("name must look like V<major>[_<minor>...]__<name>.yaml".into()))?;
    let file: MigrationFile =
        serde_yaml::from_str(contents).map_err(|e| invalid(e.to_string()))?;
    let normalized = serde_yaml::to_string(&file)?;

    let meta = MigrationMeta::new(version, name, checksum(&normalized))?;
    Ok(Migration::new(meta, file.migrations))
}

pub fn load_migration_file(path: &Path) -> Result<Migration> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MigrationError::InvalidMigrationFile {
            path: path.display().to_string(),
            reason: "file name is not valid UTF-8".into(),
        })?;
    let contents = std::fs::read_to_string(path)?;
    parse_migration(file_name, &contents).map_err(|e| match e {
        MigrationError::InvalidMigrationFile { reason, .. } => MigrationError::InvalidMigrationFile {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// Load every migration file in `dir`. Other files are skipped.
pub fn load_migration_set(dir: &Path) -> Result<MigrationSet> {
    if !dir.is_dir() {
        return Err(MigrationError::Config(format!(
            "migrations directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut migrations = Vec::new();
    for path in paths {
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| file_name_re().is_match(n));
        if !path.is_file() || !matches {
            debug!(path = %path.display(), "not a migration file, skipping");
            continue;
        }

        let migration = load_migration_file(&path)?;
        if let Some(first) = seen.get(migration.version()) {
            return Err(MigrationError::InvalidMigrationFile {
                path: path.display().to_string(),
                reason: format!(
                    "version {} is already defined by {}",
                    migration.version(),
                    first.display()
                ),
            });
        }
        debug!(
            path = %path.display(),
            version = migration.version(),
            checksum = migration.meta.checksum(),
            "loaded migration"
        );
        seen.insert(migration.version().to_string(), path);
        migrations.push(migration);
    }

    Ok(MigrationSet::new(migrations))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
