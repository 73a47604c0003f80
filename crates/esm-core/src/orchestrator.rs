//! Apply a migration set to the store under the global lock.
//!
//! One call to [`Orchestrator::apply_migration_set`] runs:
//!
//! ```text
//! sort + dedup local set
//! bootstrap (once per orchestrator)
//! loop: acquire lock ── busy ──> sleep(backoff), retry up to retry_count
//!        │
//!        └─ held: refresh → list history → check → apply unapplied → release
//! ```
//!
//! Migrations run strictly one at a time in version order. Each one is
//! recorded `IN_PROGRESS` before its first operation and patched to
//! `SUCCESS` or `FAILURE` afterwards. The first failure aborts the batch.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::checker::{self, CheckOptions};
use crate::error::{MigrationError, Result};
use crate::ledger::Ledger;
use crate::lock::GlobalLock;
use crate::migration::{Migration, MigrationSet};
use crate::transport::{Transport, TransportError};
use crate::types::MigrationState;

pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(30_000);
pub const DEFAULT_RETRY_COUNT: u32 = 5;

// ---------------------------------------------------------------------------
// MigrationOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Scopes both the lock record and the ledger records.
    pub identifier: String,
    pub ignore_previous_failures: bool,
    pub allow_older_versions: bool,
    /// Fixed delay between lock attempts.
    pub backoff_period: Duration,
    /// Extra lock attempts after the first one.
    pub retry_count: u32,
}

impl MigrationOptions {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ignore_previous_failures: false,
            allow_older_versions: false,
            backoff_period: DEFAULT_BACKOFF,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }

    fn check_options(&self) -> CheckOptions {
        CheckOptions {
            ignore_previous_failures: self.ignore_previous_failures,
            allow_older_versions: self.allow_older_versions,
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Versions touched by one successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// Already in the ledger, whatever their outcome.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<T> {
    transport: T,
    options: MigrationOptions,
    bootstrapped: bool,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(transport: T, options: MigrationOptions) -> Result<Self> {
        if options.identifier.trim().is_empty() {
            return Err(MigrationError::Config("identifier must not be empty".into()));
        }
        Ok(Self {
            transport,
            options,
            bootstrapped: false,
        })
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn apply_migration_set(&mut self, set: MigrationSet) -> Result<ApplyReport> {
        let local = set.into_sorted()?;
        if !self.bootstrapped {
            Ledger::new(&self.transport).bootstrap()?;
            self.bootstrapped = true;
        }

        let identifier = self.options.identifier.as_str();
        let lock = GlobalLock::new(&self.transport);
        let started = Instant::now();

        let mut attempt = 0;
        loop {
            if lock.acquire(identifier)? {
                info!(identifier, migrations = local.len(), "migration lock acquired");
                let outcome = self.run_locked(&local);
                let released = lock.release(identifier);
                return match (outcome, released) {
                    (Ok(report), Ok(())) => {
                        info!(
                            identifier,
                            applied = report.applied.len(),
                            skipped = report.skipped.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "migration run finished"
                        );
                        Ok(report)
                    }
                    (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
                    (Err(e), Err(release_err)) => {
                        error!(identifier, error = %release_err, "failed to release migration lock");
                        Err(e)
                    }
                };
            }

            if attempt == self.options.retry_count {
                return Err(MigrationError::Locked {
                    attempts: attempt + 1,
                });
            }
            attempt += 1;
            warn!(
                identifier,
                attempt,
                retry_count = self.options.retry_count,
                backoff_ms = self.options.backoff_period.as_millis() as u64,
                "migration lock is held elsewhere, backing off"
            );
            std::thread::sleep(self.options.backoff_period);
        }
    }

    fn run_locked(&self, local: &[Migration]) -> Result<ApplyReport> {
        let identifier = self.options.identifier.as_str();
        let ledger = Ledger::new(&self.transport);

        ledger.refresh()?;
        let remote = ledger.list_all(identifier)?;
        checker::check(&remote, local, self.options.check_options())?;
        info!(
            identifier,
            local = local.len(),
            recorded = remote.len(),
            "consistency checks passed"
        );

        let recorded: HashSet<&str> = remote.iter().map(|r| r.version.as_str()).collect();
        let mut report = ApplyReport::default();
        for migration in local {
            if recorded.contains(migration.version()) {
                debug!(identifier, version = migration.version(), "already recorded, skipping");
                report.skipped.push(migration.version().to_string());
                continue;
            }
            self.apply_one(&ledger, migration)?;
            report.applied.push(migration.version().to_string());
        }
        Ok(report)
    }

    fn apply_one(&self, ledger: &Ledger<&T>, migration: &Migration) -> Result<()> {
        let identifier = self.options.identifier.as_str();
        let version = migration.version();
        info!(
            identifier,
            version,
            name = migration.meta.name(),
            operations = migration.operations.len(),
            "applying migration"
        );

        ledger.insert_in_progress(identifier, &migration.meta)?;
        let outcome = self
            .execute_operations(migration)
            .map_err(MigrationError::from)
            .and_then(|()| ledger.mark_outcome(identifier, version, MigrationState::Success, ""));
        match outcome {
            Ok(()) => {
                info!(identifier, version, "migration succeeded");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                error!(identifier, version, error = %message, "migration failed");
                if let Err(mark_err) =
                    ledger.mark_outcome(identifier, version, MigrationState::Failure, &message)
                {
                    error!(identifier, version, error = %mark_err, "could not record migration failure");
                }
                Err(MigrationError::MigrationFailed {
                    version: version.to_string(),
                    message,
                })
            }
        }
    }

    fn execute_operations(&self, migration: &Migration) -> std::result::Result<(), TransportError> {
        for (step, op) in migration.operations.iter().enumerate() {
            debug!(version = migration.version(), step, kind = op.kind(), "executing operation");
            self.transport.execute(&op.to_request())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
