//! HTTP plumbing between the migration engine and the document store.
//!
//! The engine only ever talks to the store through [`Transport`], which makes
//! the lock, ledger, and orchestrator testable against an in-memory store.
//! [`HttpTransport`] is the production implementation on top of
//! `reqwest::blocking`.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ElasticsearchConfig;
use crate::error::{MigrationError, Result};
use crate::types::Method;

/// Parameter clamped to the cluster size so single-node clusters do not block.
const WAIT_FOR_ACTIVE_SHARDS: &str = "wait_for_active_shards";

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub parameters: BTreeMap<String, String>,
    /// Multi-valued: the same name may appear more than once.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters: BTreeMap::new(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The store answered with a non-success status.
    #[error("store responded with HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("I/O error talking to store: {0}")]
    Io(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Io(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TransportError::Status { message, .. } => message,
            TransportError::Io(message) => message,
        }
    }

    /// Index or template creation hit something that already exists.
    ///
    /// The marker differs between store versions, so all known ones are
    /// accepted.
    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(400)
            && [
                "index_already_exists_exception",
                "resource_already_exists_exception",
                "IndexAlreadyExistsException",
            ]
            .iter()
            .any(|marker| self.message().contains(marker))
    }

    /// A create-only write found an existing document.
    pub fn is_version_conflict(&self) -> bool {
        self.status() == Some(409) && self.message().contains("version_conflict_engine_exception")
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Performs a single request against the document store.
pub trait Transport {
    fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        (**self).execute(request)
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    urls: Vec<String>,
    path_prefix: String,
    credentials: Option<(String, Option<String>)>,
    node_count: OnceLock<u64>,
}

impl HttpTransport {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(MigrationError::Config(
                "at least one elasticsearch url is required".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, values) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MigrationError::Config(format!("header '{name}': {e}")))?;
            for value in values {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| MigrationError::Config(format!("header '{name}': {e}")))?;
                headers.append(name.clone(), value);
            }
        }

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MigrationError::Config(format!("http client: {e}")))?;

        let path_prefix = match config.path_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("/{p}"),
            _ => String::new(),
        };

        Ok(Self {
            client,
            urls: config
                .urls
                .iter()
                .map(|u| u.trim_end_matches('/').to_string())
                .collect(),
            path_prefix,
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
            node_count: OnceLock::new(),
        })
    }

    fn url_for(&self, base: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{base}{}/{path}", self.path_prefix)
    }

    /// Send to each configured url in turn, moving on only when the
    /// connection itself could not be established.
    fn send(
        &self,
        request: &Request,
        parameters: &BTreeMap<String, String>,
    ) -> std::result::Result<Response, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let mut last_error = None;
        for base in &self.urls {
            let url = self.url_for(base, &request.path);
            let mut builder = self.client.request(method.clone(), &url).query(parameters);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some((user, password)) = &self.credentials {
                builder = builder.basic_auth(user, password.as_ref());
            }
            if !request.body.is_empty() {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(request.body.clone());
            }

            match builder.send() {
                Ok(resp) => return into_response(resp),
                Err(e) if e.is_connect() => {
                    warn!(url = %url, error = %e, "store unreachable, trying next url");
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
        Err(TransportError::Io(
            last_error.unwrap_or_else(|| "no store urls configured".into()),
        ))
    }

    fn cluster_node_count(&self) -> std::result::Result<u64, TransportError> {
        if let Some(count) = self.node_count.get() {
            return Ok(*count);
        }
        let resp = self.send(&Request::new(Method::Get, "/_nodes"), &BTreeMap::new())?;
        let count = resp
            .json()
            .ok()
            .and_then(|v| v["_nodes"]["total"].as_u64())
            .ok_or_else(|| {
                TransportError::Io(format!("cannot read _nodes.total from: {}", resp.body))
            })?;
        debug!(nodes = count, "cluster size");
        Ok(*self.node_count.get_or_init(|| count))
    }

    fn augment_parameters(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> std::result::Result<BTreeMap<String, String>, TransportError> {
        let mut augmented = parameters.clone();
        if let Some(requested) = parameters
            .get(WAIT_FOR_ACTIVE_SHARDS)
            .and_then(|v| v.parse::<u64>().ok())
        {
            let clamped = requested.min(self.cluster_node_count()?);
            augmented.insert(WAIT_FOR_ACTIVE_SHARDS.to_string(), clamped.to_string());
        }
        Ok(augmented)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let parameters = self.augment_parameters(&request.parameters)?;
        debug!(method = %request.method, path = %request.path, "store request");
        self.send(request, &parameters)
    }
}

fn into_response(
    resp: reqwest::blocking::Response,
) -> std::result::Result<Response, TransportError> {
    let status = resp.status();
    let body = resp.text().map_err(|e| TransportError::Io(e.to_string()))?;
    debug!(status = status.as_u16(), body = %body, "store response");
    if status.is_success() {
        Ok(Response {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            message: body,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
