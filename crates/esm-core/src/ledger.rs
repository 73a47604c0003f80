//! Persistent migration history, one document per `(identifier, version)`.
//!
//! # Storage layout
//!
//! ```text
//! elasticsearch_migration_version/_doc/{identifier}-{version}
//!   { identifier, version, name, sha256Checksum, state, failureMessage, created }
//! ```
//!
//! Records are created `IN_PROGRESS` right before a migration runs and then
//! patched to `SUCCESS` or `FAILURE`. They are never deleted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MigrationError, Result};
use crate::lock::LOCK_INDEX;
use crate::migration::MigrationMeta;
use crate::operation::{Definition, OpType, Operation};
use crate::transport::{Request, Transport};
use crate::types::{Method, MigrationState};
use crate::version;

pub const VERSION_INDEX: &str = "elasticsearch_migration_version";

/// Upper bound on records returned for one identifier.
pub const PAGE_SIZE: usize = 1000;

const LOCK_INDEX_SCHEMA: &str = include_str!("../schema/elasticsearch_migration_lock.json");
const VERSION_INDEX_SCHEMA: &str = include_str!("../schema/elasticsearch_migration_version.json");

// ---------------------------------------------------------------------------
// LedgerRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub identifier: String,
    pub version: String,
    pub name: String,
    pub sha256_checksum: String,
    pub state: MigrationState,
    #[serde(default)]
    pub failure_message: Option<String>,
    pub created: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn in_progress(identifier: &str, meta: &MigrationMeta) -> Self {
        Self {
            identifier: identifier.to_string(),
            version: meta.version().to_string(),
            name: meta.name().to_string(),
            sha256_checksum: meta.checksum().to_string(),
            state: MigrationState::InProgress,
            failure_message: None,
            created: Utc::now(),
        }
    }
}

pub fn record_id(identifier: &str, version: &str) -> String {
    format!("{identifier}-{version}")
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct Ledger<T> {
    transport: T,
}

impl<T: Transport> Ledger<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Create the lock and version indices unless they already exist.
    pub fn bootstrap(&self) -> Result<()> {
        for (index, schema) in [
            (LOCK_INDEX, LOCK_INDEX_SCHEMA),
            (VERSION_INDEX, VERSION_INDEX_SCHEMA),
        ] {
            let op = Operation::CreateIndex {
                index: index.to_string(),
                definition: Definition::Raw(schema.to_string()),
            };
            match self.transport.execute(&op.to_request()) {
                Ok(_) => info!(index, "created index"),
                Err(e) if e.is_already_exists() => debug!(index, "index already exists"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Make every earlier write to the version index visible to search.
    pub fn refresh(&self) -> Result<()> {
        self.transport
            .execute(&Request::new(Method::Post, format!("/{VERSION_INDEX}/_refresh")))?;
        Ok(())
    }

    /// All records for `identifier`, ascending by version.
    pub fn list_all(&self, identifier: &str) -> Result<Vec<LedgerRecord>> {
        let query = serde_json::json!({
            "query": { "bool": { "must": [ { "term": { "identifier": identifier } } ] } },
            "size": PAGE_SIZE,
        });
        let resp = self.transport.execute(
            &Request::new(Method::Post, format!("/{VERSION_INDEX}/_search"))
                .body(query.to_string()),
        )?;
        let body = resp.json()?;

        let hits = body["hits"]["hits"].as_array().ok_or_else(|| {
            MigrationError::UnexpectedResponse(format!(
                "search on '{VERSION_INDEX}' returned no hits array: {}",
                resp.body
            ))
        })?;
        let mut records = hits
            .iter()
            .map(|hit| serde_json::from_value::<LedgerRecord>(hit["_source"].clone()))
            .collect::<serde_json::Result<Vec<_>>>()?;

        // 6.x reports a bare number, 7.x+ an object
        let total = body["hits"]["total"]["value"]
            .as_u64()
            .or_else(|| body["hits"]["total"].as_u64());
        if let Some(total) = total {
            if total as usize > records.len() {
                warn!(
                    identifier,
                    total,
                    returned = records.len(),
                    "ledger history exceeds page size; consistency checks see a truncated history"
                );
            }
        }

        version::sort_by_version(&mut records, |r| r.version.as_str())?;
        Ok(records)
    }

    /// Create-only write of a fresh `IN_PROGRESS` record.
    ///
    /// Fails if a record for this version already exists.
    pub fn insert_in_progress(&self, identifier: &str, meta: &MigrationMeta) -> Result<()> {
        let record = LedgerRecord::in_progress(identifier, meta);
        let op = Operation::IndexDocument {
            index: VERSION_INDEX.to_string(),
            id: Some(record_id(identifier, meta.version())),
            op_type: Some(OpType::Create),
            definition: Definition::Raw(serde_json::to_string(&record)?),
        };
        self.transport.execute(&op.to_request())?;
        Ok(())
    }

    /// Patch `state` and `failureMessage` on an existing record.
    pub fn mark_outcome(
        &self,
        identifier: &str,
        version: &str,
        state: MigrationState,
        failure_message: &str,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "doc": { "state": state, "failureMessage": failure_message }
        });
        let op = Operation::UpdateDocument {
            index: VERSION_INDEX.to_string(),
            id: record_id(identifier, version),
            definition: Definition::Structured(patch),
        };
        self.transport.execute(&op.to_request())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
