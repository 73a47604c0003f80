//! Pre-flight comparison of the local migration set against ledger history.
//!
//! Gates run in a fixed order and the first violation wins:
//!
//! 1. every ledger record is `SUCCESS` (unless previous failures are ignored)
//! 2. the local set is at least as long as the successful history
//! 3. the history is a prefix of the local set (version, checksum, name)
//! 4. new migrations sort after the latest recorded one (unless older
//!    versions are allowed)
//!
//! When older versions are allowed, a new migration may sort *between*
//! recorded ones, so gate 3 matches history records to local migrations by
//! version instead of by position.

use std::cmp::Ordering;

use crate::error::{ConsistencyViolation, MigrationError, Result};
use crate::ledger::LedgerRecord;
use crate::migration::{Migration, MigrationMeta};
use crate::types::MigrationState;
use crate::version;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub ignore_previous_failures: bool,
    pub allow_older_versions: bool,
}

/// `remote` and `local` must both be in ascending version order.
pub fn check(remote: &[LedgerRecord], local: &[Migration], options: CheckOptions) -> Result<()> {
    if !options.ignore_previous_failures {
        check_previous_outcomes(remote)?;
    }
    check_not_shrunk(remote, local)?;
    if options.allow_older_versions {
        check_history_by_version(remote, local)?;
    } else {
        check_prefix(remote, local)?;
        check_newer(remote, local)?;
    }
    Ok(())
}

fn check_previous_outcomes(remote: &[LedgerRecord]) -> Result<()> {
    match remote.iter().find(|r| r.state != MigrationState::Success) {
        Some(record) => Err(MigrationError::PreviousMigrationFailed {
            version: record.version.clone(),
            state: record.state,
            message: record.failure_message.clone().unwrap_or_default(),
        }),
        None => Ok(()),
    }
}

fn check_not_shrunk(remote: &[LedgerRecord], local: &[Migration]) -> Result<()> {
    let applied = remote
        .iter()
        .filter(|r| r.state == MigrationState::Success)
        .count();
    if local.len() < applied {
        return Err(ConsistencyViolation::SetShrunk {
            local: local.len(),
            applied,
        }
        .into());
    }
    Ok(())
}

fn check_prefix(remote: &[LedgerRecord], local: &[Migration]) -> Result<()> {
    for (i, record) in remote.iter().enumerate() {
        // Only reachable with ignored failures: history longer than the set.
        let Some(migration) = local.get(i) else {
            return Err(ConsistencyViolation::SetShrunk {
                local: local.len(),
                applied: remote.len(),
            }
            .into());
        };
        compare_record(record, &migration.meta)?;
    }
    Ok(())
}

fn check_history_by_version(remote: &[LedgerRecord], local: &[Migration]) -> Result<()> {
    for record in remote {
        let Some(migration) = local.iter().find(|m| m.version() == record.version) else {
            return Err(ConsistencyViolation::MissingVersion {
                version: record.version.clone(),
                name: record.name.clone(),
            }
            .into());
        };
        compare_record(record, &migration.meta)?;
    }
    Ok(())
}

fn compare_record(record: &LedgerRecord, meta: &MigrationMeta) -> Result<()> {
    if record.version != meta.version() {
        return Err(ConsistencyViolation::VersionMismatch {
            name: meta.name().to_string(),
            local: meta.version().to_string(),
            remote: record.version.clone(),
        }
        .into());
    }
    if record.sha256_checksum != meta.checksum() {
        return Err(ConsistencyViolation::ChecksumMismatch {
            version: meta.version().to_string(),
            local: meta.checksum().to_string(),
            remote: record.sha256_checksum.clone(),
        }
        .into());
    }
    if record.name != meta.name() {
        return Err(ConsistencyViolation::NameMismatch {
            version: meta.version().to_string(),
            local: meta.name().to_string(),
            remote: record.name.clone(),
        }
        .into());
    }
    Ok(())
}

fn check_newer(remote: &[LedgerRecord], local: &[Migration]) -> Result<()> {
    let Some(latest) = remote.last() else {
        return Ok(());
    };
    for migration in local.iter().skip(remote.len()) {
        if version::compare(&latest.version, migration.version())? != Ordering::Less {
            return Err(ConsistencyViolation::OlderVersion {
                version: migration.version().to_string(),
                latest: latest.version.clone(),
            }
            .into());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
