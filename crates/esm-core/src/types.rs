use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MigrationState
// ---------------------------------------------------------------------------

/// Ledger state of a single migration version.
///
/// Transitions: `InProgress → Success | Failure`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationState {
    InProgress,
    Success,
    Failure,
}

impl MigrationState {
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationState::InProgress => "IN_PROGRESS",
            MigrationState::Success => "SUCCESS",
            MigrationState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, MigrationState::InProgress)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
