//! In-memory stand-in for the document store, used by unit tests.
//!
//! Understands just enough of the HTTP surface for the lock, ledger, and
//! orchestrator: index creation, create-only/overwrite document writes,
//! partial updates, deletes, refresh, and a single `term` query. Anything
//! else is accepted and recorded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::transport::{Request, Response, Transport, TransportError};
use crate::types::Method;

#[derive(Default)]
struct Inner {
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    requests: Vec<Request>,
    failures: Vec<Failure>,
    next_id: u64,
}

struct Failure {
    method: Method,
    path: String,
    error: TransportError,
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<Inner>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.inner.lock().unwrap().indices.contains_key(index)
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn put_document(&self, index: &str, id: &str, source: Value) {
        self.inner
            .lock()
            .unwrap()
            .indices
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), source);
    }

    /// Fail every matching request with `error`.
    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push_failure(method, path, error, None);
    }

    /// Fail the next `times` matching requests with `error`.
    pub fn fail_times(&self, method: Method, path: &str, error: TransportError, times: usize) {
        assert!(times > 0, "fail_times needs at least one failure");
        self.push_failure(method, path, error, Some(times));
    }

    fn push_failure(
        &self,
        method: Method,
        path: &str,
        error: TransportError,
        remaining: Option<usize>,
    ) {
        self.inner.lock().unwrap().failures.push(Failure {
            method,
            path: path.to_string(),
            error,
            remaining,
        });
    }
}

fn status(status: u16, message: impl Into<String>) -> TransportError {
    TransportError::Status {
        status,
        message: message.into(),
    }
}

fn ok(body: Value) -> Result<Response, TransportError> {
    Ok(Response {
        status: 200,
        body: body.to_string(),
    })
}

impl Transport for FakeStore {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());

        if let Some(pos) = inner
            .failures
            .iter()
            .position(|f| f.method == request.method && f.path == request.path)
        {
            let error = inner.failures[pos].error.clone();
            if let Some(remaining) = inner.failures[pos].remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    inner.failures.remove(pos);
                }
            }
            return Err(error);
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Put, [index]) if !index.starts_with('_') => {
                if inner.indices.contains_key(*index) {
                    return Err(status(
                        400,
                        json!({"error": {"type": "resource_already_exists_exception", "index": index}})
                            .to_string(),
                    ));
                }
                inner.indices.insert(index.to_string(), BTreeMap::new());
                ok(json!({"acknowledged": true, "index": index}))
            }
            (Method::Delete, [index]) if !index.starts_with('_') => {
                match inner.indices.remove(*index) {
                    Some(_) => ok(json!({"acknowledged": true})),
                    None => Err(status(404, "index_not_found_exception")),
                }
            }
            (Method::Put, [index, "_doc", id]) => {
                let source: Value = serde_json::from_str(&request.body)
                    .map_err(|e| status(400, format!("mapper_parsing_exception: {e}")))?;
                let create_only =
                    request.parameters.get("op_type").map(String::as_str) == Some("create");
                let docs = inner.indices.entry(index.to_string()).or_default();
                if create_only && docs.contains_key(*id) {
                    return Err(status(
                        409,
                        format!(
                            "version_conflict_engine_exception: [{id}]: version conflict, document already exists"
                        ),
                    ));
                }
                docs.insert(id.to_string(), source);
                ok(json!({"_id": id, "result": "created"}))
            }
            (Method::Post, [index, "_doc"]) => {
                let source: Value = serde_json::from_str(&request.body)
                    .map_err(|e| status(400, format!("mapper_parsing_exception: {e}")))?;
                inner.next_id += 1;
                let id = format!("auto-{}", inner.next_id);
                inner
                    .indices
                    .entry(index.to_string())
                    .or_default()
                    .insert(id.clone(), source);
                ok(json!({"_id": id, "result": "created"}))
            }
            (Method::Delete, [index, "_doc", id]) => {
                let removed = inner
                    .indices
                    .get_mut(*index)
                    .and_then(|docs| docs.remove(*id));
                match removed {
                    Some(_) => ok(json!({"_id": id, "result": "deleted"})),
                    None => Err(status(404, json!({"_id": id, "result": "not_found"}).to_string())),
                }
            }
            (Method::Post, [index, "_update", id]) => {
                let patch: Value = serde_json::from_str(&request.body)
                    .map_err(|e| status(400, format!("parse_exception: {e}")))?;
                let doc = inner
                    .indices
                    .get_mut(*index)
                    .and_then(|docs| docs.get_mut(*id))
                    .ok_or_else(|| status(404, format!("document_missing_exception: [{id}]")))?;
                if let (Some(target), Some(fields)) = (doc.as_object_mut(), patch["doc"].as_object())
                {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                ok(json!({"_id": id, "result": "updated"}))
            }
            (Method::Post, [index, "_refresh"]) => {
                if inner.indices.contains_key(*index) {
                    ok(json!({"_shards": {"failed": 0}}))
                } else {
                    Err(status(404, "index_not_found_exception"))
                }
            }
            (Method::Post | Method::Get, [index, "_search"]) => {
                let query: Value = serde_json::from_str(&request.body).unwrap_or(Value::Null);
                let terms: HashMap<String, Value> = query["query"]["bool"]["must"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|clause| clause["term"].as_object())
                    .flat_map(|term| term.iter().map(|(k, v)| (k.clone(), v.clone())))
                    .collect();
                let size = query["size"].as_u64().unwrap_or(10) as usize;
                let matching: Vec<(&String, &Value)> = inner
                    .indices
                    .get(*index)
                    .ok_or_else(|| status(404, "index_not_found_exception"))?
                    .iter()
                    .filter(|(_, doc)| terms.iter().all(|(field, value)| &doc[field] == value))
                    .collect();
                let hits: Vec<Value> = matching
                    .iter()
                    .take(size)
                    .map(|(id, doc)| json!({"_id": id, "_source": doc}))
                    .collect();
                ok(json!({
                    "hits": {
                        "total": {"value": matching.len(), "relation": "eq"},
                        "hits": hits,
                    }
                }))
            }
            _ => ok(json!({"acknowledged": true})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_times_expires_after_count() {
        let store = FakeStore::new();
        store.fail_times(Method::Get, "/x", TransportError::Io("down".into()), 2);
        let request = Request::new(Method::Get, "/x");
        assert!(store.execute(&request).is_err());
        assert!(store.execute(&request).is_err());
        assert!(store.execute(&request).is_ok());
    }

    #[test]
    #[should_panic(expected = "at least one failure")]
    fn fail_times_rejects_zero() {
        FakeStore::new().fail_times(Method::Get, "/x", TransportError::Io("down".into()), 0);
    }
}
