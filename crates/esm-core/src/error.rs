use thiserror::Error;

use crate::transport::TransportError;
use crate::types::MigrationState;
use crate::version::VersionFormatError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Version(#[from] VersionFormatError),

    #[error("migration is locked by another process (gave up after {attempts} attempts)")]
    Locked { attempts: u32 },

    #[error("previous migration {version} is in {state} state. Message: {message}")]
    PreviousMigrationFailed {
        version: String,
        state: MigrationState,
        message: String,
    },

    #[error(transparent)]
    Consistency(#[from] ConsistencyViolation),

    #[error("performing migration version {version} failed. Message: {message}")]
    MigrationFailed { version: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected response from store: {0}")]
    UnexpectedResponse(String),

    #[error("invalid migration file {path}: {reason}")]
    InvalidMigrationFile { path: String, reason: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Pre-flight mismatch between the local migration set and the ledger.
///
/// Raised before any operation executes; nothing is written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyViolation {
    #[error("local migration set smaller than the one found in the store. Local: {local}, applied: {applied}")]
    SetShrunk { local: usize, applied: usize },

    #[error("version mismatch for {name}. Local version: {local}, store version: {remote}")]
    VersionMismatch {
        name: String,
        local: String,
        remote: String,
    },

    #[error("checksum mismatch for {version}. Local checksum: {local}, store checksum: {remote}")]
    ChecksumMismatch {
        version: String,
        local: String,
        remote: String,
    },

    #[error("name mismatch for {version}. Local name: {local}, store name: {remote}")]
    NameMismatch {
        version: String,
        local: String,
        remote: String,
    },

    #[error("migration {version} ({name}) is recorded in the store but missing from the local set")]
    MissingVersion { version: String, name: String },

    #[error("migration set contains version {version} which is not newer than the latest applied version {latest}")]
    OlderVersion { version: String, latest: String },

    #[error("migration set contains version {0} more than once")]
    DuplicateVersion(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
