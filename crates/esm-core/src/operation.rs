//! The closed set of changes a migration file can describe.
//!
//! Each variant knows how to turn itself into a store [`Request`]; the
//! orchestrator never looks past [`Operation::to_request`].

use serde::{Deserialize, Serialize};

use crate::transport::Request;
use crate::types::Method;

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// A JSON request body, written in YAML either as a literal JSON string or
/// as a structured mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Definition {
    Raw(String),
    Structured(serde_json::Value),
}

impl Definition {
    pub fn to_body(&self) -> String {
        match self {
            Definition::Raw(s) => s.clone(),
            Definition::Structured(v) => v.to_string(),
        }
    }

    fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            Definition::Raw(s) => serde_json::from_str(s).ok(),
            Definition::Structured(v) => Some(v.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// OpType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    Index,
    Create,
}

impl OpType {
    pub fn as_str(self) -> &'static str {
        match self {
            OpType::Index => "index",
            OpType::Create => "create",
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    CreateIndex {
        index: String,
        definition: Definition,
    },
    DeleteIndex {
        index: String,
    },
    CreateOrUpdateIndexTemplate {
        template: String,
        definition: Definition,
    },
    DeleteIndexTemplate {
        template: String,
    },
    UpdateMapping {
        indices: Vec<String>,
        definition: Definition,
    },
    IndexDocument {
        index: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        op_type: Option<OpType>,
        definition: Definition,
    },
    DeleteDocument {
        index: String,
        id: String,
    },
    UpdateDocument {
        index: String,
        id: String,
        definition: Definition,
    },
    Aliases {
        definition: Definition,
    },
    CreateIngestPipeline {
        id: String,
        definition: Definition,
    },
    DeleteIngestPipeline {
        id: String,
    },
    Reindex {
        definition: Definition,
    },
    UpdateIndexSettings {
        index: String,
        definition: Definition,
    },
}

impl Operation {
    /// Short tag used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateIndex { .. } => "CREATE_INDEX",
            Operation::DeleteIndex { .. } => "DELETE_INDEX",
            Operation::CreateOrUpdateIndexTemplate { .. } => "CREATE_OR_UPDATE_INDEX_TEMPLATE",
            Operation::DeleteIndexTemplate { .. } => "DELETE_INDEX_TEMPLATE",
            Operation::UpdateMapping { .. } => "UPDATE_MAPPING",
            Operation::IndexDocument { .. } => "INDEX_DOCUMENT",
            Operation::DeleteDocument { .. } => "DELETE_DOCUMENT",
            Operation::UpdateDocument { .. } => "UPDATE_DOCUMENT",
            Operation::Aliases { .. } => "ALIASES",
            Operation::CreateIngestPipeline { .. } => "CREATE_INGEST_PIPELINE",
            Operation::DeleteIngestPipeline { .. } => "DELETE_INGEST_PIPELINE",
            Operation::Reindex { .. } => "REINDEX",
            Operation::UpdateIndexSettings { .. } => "UPDATE_INDEX_SETTINGS",
        }
    }

    pub fn to_request(&self) -> Request {
        match self {
            Operation::CreateIndex { index, definition } => {
                // primary plus every replica must be active before we move on
                let replicas = definition
                    .as_json()
                    .and_then(|v| v["settings"]["number_of_replicas"].as_u64())
                    .unwrap_or(0);
                Request::new(Method::Put, format!("/{index}"))
                    .param("wait_for_active_shards", (replicas + 1).to_string())
                    .body(definition.to_body())
            }
            Operation::DeleteIndex { index } => Request::new(Method::Delete, format!("/{index}")),
            Operation::CreateOrUpdateIndexTemplate {
                template,
                definition,
            } => Request::new(Method::Put, format!("/_template/{template}"))
                .body(definition.to_body()),
            Operation::DeleteIndexTemplate { template } => {
                Request::new(Method::Delete, format!("/_template/{template}"))
            }
            Operation::UpdateMapping {
                indices,
                definition,
            } => Request::new(Method::Put, format!("/{}/_mapping", indices.join(",")))
                .body(definition.to_body()),
            Operation::IndexDocument {
                index,
                id,
                op_type,
                definition,
            } => {
                let method = if id.is_some() {
                    Method::Put
                } else {
                    Method::Post
                };
                let path = match id {
                    Some(id) => format!("/{index}/_doc/{id}"),
                    None => format!("/{index}/_doc"),
                };
                Request::new(method, path)
                    .param("op_type", op_type.unwrap_or(OpType::Create).as_str())
                    .param("refresh", "wait_for")
                    .body(definition.to_body())
            }
            Operation::DeleteDocument { index, id } => {
                Request::new(Method::Delete, format!("/{index}/_doc/{id}"))
                    .param("refresh", "wait_for")
            }
            Operation::UpdateDocument {
                index,
                id,
                definition,
            } => Request::new(Method::Post, format!("/{index}/_update/{id}"))
                .param("refresh", "wait_for")
                .body(definition.to_body()),
            Operation::Aliases { definition } => {
                Request::new(Method::Post, "/_aliases").body(definition.to_body())
            }
            Operation::CreateIngestPipeline { id, definition } => {
                Request::new(Method::Put, format!("/_ingest/pipeline/{id}"))
                    .body(definition.to_body())
            }
            Operation::DeleteIngestPipeline { id } => {
                Request::new(Method::Delete, format!("/_ingest/pipeline/{id}"))
            }
            Operation::Reindex { definition } => {
                Request::new(Method::Post, "/_reindex").body(definition.to_body())
            }
            Operation::UpdateIndexSettings { index, definition } => {
                Request::new(Method::Put, format!("/{index}/_settings")).body(definition.to_body())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
