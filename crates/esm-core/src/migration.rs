use std::cmp::Ordering;

use crate::error::{ConsistencyViolation, MigrationError, Result};
use crate::operation::Operation;
use crate::version;

// ---------------------------------------------------------------------------
// MigrationMeta
// ---------------------------------------------------------------------------

/// Identity of one migration: what the ledger records about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationMeta {
    version: String,
    name: String,
    checksum: String,
}

impl MigrationMeta {
    pub fn new(
        version: impl Into<String>,
        name: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Result<Self> {
        let version = version.into();
        let name = name.into();
        let checksum = checksum.into();

        version::validate(&version)?;
        if name.trim().is_empty() {
            return Err(MigrationError::InvalidMigrationFile {
                path: version,
                reason: "name must not be empty".into(),
            });
        }
        if checksum.trim().is_empty() {
            return Err(MigrationError::InvalidMigrationFile {
                path: version,
                reason: "checksum must not be empty".into(),
            });
        }

        Ok(Self {
            version,
            name,
            checksum,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// One versioned unit of work: its identity plus the operations to run, in
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub meta: MigrationMeta,
    pub operations: Vec<Operation>,
}

impl Migration {
    pub fn new(meta: MigrationMeta, operations: Vec<Operation>) -> Self {
        Self { meta, operations }
    }

    pub fn version(&self) -> &str {
        self.meta.version()
    }
}

// ---------------------------------------------------------------------------
// MigrationSet
// ---------------------------------------------------------------------------

/// Unordered collection of migrations. The orchestrator sorts it by version
/// before use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationSet {
    pub migrations: Vec<Migration>,
}

impl MigrationSet {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Consume the set and return its migrations in ascending version order.
    ///
    /// Two versions that compare equal (`1.1` and `1.01`) are rejected as
    /// duplicates.
    pub fn into_sorted(self) -> Result<Vec<Migration>> {
        let mut migrations = self.migrations;
        version::sort_by_version(&mut migrations, |m| m.version())?;
        for pair in migrations.windows(2) {
            if version::compare(pair[0].version(), pair[1].version())? == Ordering::Equal {
                return Err(ConsistencyViolation::DuplicateVersion(pair[1].version().to_string()).into());
            }
        }
        Ok(migrations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: &str) -> Migration {
        Migration::new(
            MigrationMeta::new(version, format!("m{version}"), "abc").unwrap(),
            vec![],
        )
    }

    #[test]
    fn meta_rejects_malformed_version() {
        let err = MigrationMeta::new("1.x", "init", "abc").unwrap_err();
        assert!(matches!(err, MigrationError::Version(_)));
    }

    #[test]
    fn meta_rejects_blank_name_and_checksum() {
        assert!(MigrationMeta::new("1.0", "  ", "abc").is_err());
        assert!(MigrationMeta::new("1.0", "init", "").is_err());
    }

    #[test]
    fn into_sorted_orders_by_version() {
        let set = MigrationSet::new(vec![migration("1.10"), migration("1.2"), migration("1.9")]);
        let versions: Vec<String> = set
            .into_sorted()
            .unwrap()
            .iter()
            .map(|m| m.version().to_string())
            .collect();
        assert_eq!(versions, vec!["1.2", "1.9", "1.10"]);
    }

    #[test]
    fn into_sorted_rejects_numerically_equal_versions() {
        let set = MigrationSet::new(vec![migration("1.1"), migration("2"), migration("1.01")]);
        let err = set.into_sorted().unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Consistency(ConsistencyViolation::DuplicateVersion(_))
        ));
    }
}
