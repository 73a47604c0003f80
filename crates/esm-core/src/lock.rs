//! Single-record mutex held in the store while a migration run is active.
//!
//! The lock is the document `{identifier}-global` in the lock index, written
//! with a create-only request. It carries no owner token and no expiry: a
//! process that dies while holding it leaves every later run for the same
//! identifier locked out until the record is removed by hand (`esm unlock`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::operation::{Definition, OpType, Operation};
use crate::transport::Transport;

pub const LOCK_INDEX: &str = "elasticsearch_migration_lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub created: DateTime<Utc>,
}

pub fn lock_id(identifier: &str) -> String {
    format!("{identifier}-global")
}

pub struct GlobalLock<T> {
    transport: T,
}

impl<T: Transport> GlobalLock<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Try to take the lock.
    ///
    /// `Ok(false)` means another run holds it. Every other failure is an
    /// error, never a `false`.
    pub fn acquire(&self, identifier: &str) -> Result<bool> {
        let record = LockRecord {
            created: Utc::now(),
        };
        let op = Operation::IndexDocument {
            index: LOCK_INDEX.to_string(),
            id: Some(lock_id(identifier)),
            op_type: Some(OpType::Create),
            definition: Definition::Raw(serde_json::to_string(&record)?),
        };
        match self.transport.execute(&op.to_request()) {
            Ok(_) => {
                debug!(identifier, "acquired migration lock");
                Ok(true)
            }
            Err(e) if e.is_version_conflict() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the lock record. Not retried.
    ///
    /// A record that is already gone counts as released.
    pub fn release(&self, identifier: &str) -> Result<()> {
        let op = Operation::DeleteDocument {
            index: LOCK_INDEX.to_string(),
            id: lock_id(identifier),
        };
        match self.transport.execute(&op.to_request()) {
            Ok(_) => {
                debug!(identifier, "released migration lock");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(identifier, "migration lock was already gone on release");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
