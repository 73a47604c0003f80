//! Versioned schema and data migrations for Elasticsearch.
//!
//! A migration set is applied under a store-held lock; every applied version
//! is recorded in a ledger index so later runs skip it and detect drift.

pub mod checker;
pub mod config;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod lock;
pub mod migration;
pub mod operation;
pub mod orchestrator;
pub mod transport;
pub mod types;
pub mod version;

#[cfg(test)]
mod testing;

pub use error::{ConsistencyViolation, MigrationError, Result};
pub use migration::{Migration, MigrationMeta, MigrationSet};
pub use orchestrator::{ApplyReport, MigrationOptions, Orchestrator};
pub use transport::{HttpTransport, Transport, TransportError};
