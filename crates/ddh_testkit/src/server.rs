//! In-memory fake of the node API.
//!
//! Serves node creation, update, deletion, lookup, file attach and paged
//! search from memory, and can be told to misbehave in the ways the live
//! server does (garbage bodies, trailing diagnostics, dropped connections,
//! short pages).

use ddh_client::{
    ClientError, ClientResult, HttpRequest, HttpResponse, Method, RequestBody, Transport,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

/// Diagnostic trailer some server builds append to JSON bodies.
pub const PHP_NOTICE: &str =
    "<br />\n<b>Notice</b>:  Undefined index: und in <b>/var/www/html/api.php</b> on line <b>12</b><br />";

#[derive(Debug, Default)]
struct State {
    next_nid: u64,
    descending_nids: bool,
    nodes: BTreeMap<String, Json>,
    search_corpus: Vec<(String, Json)>,
    reported_total: Option<u64>,
    fail_titles: BTreeSet<String>,
    fail_attach: bool,
    drop_puts: u32,
    trailing_notice: bool,
    next_fid: u64,
    requests: Vec<HttpRequest>,
}

/// A fake repository implementing [`Transport`].
#[derive(Debug)]
pub struct FakeNodeServer {
    state: Mutex<State>,
}

impl Default for FakeNodeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeNodeServer {
    /// Creates an empty server. Node ids start at 1000.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_nid: 1000,
                next_fid: 9000,
                ..State::default()
            }),
        }
    }

    /// Seeds `count` search hits with nids `1..=count`.
    pub fn with_search_results(self, count: u64) -> Self {
        {
            let mut state = self.state.lock();
            state.search_corpus = (1..=count)
                .map(|i| {
                    let nid = i.to_string();
                    let hit = json!({ "nid": nid, "title": format!("Dataset {}", i) });
                    (nid, hit)
                })
                .collect();
        }
        self
    }

    /// Reports `total` as the search count regardless of the corpus size.
    pub fn with_reported_total(self, total: u64) -> Self {
        self.state.lock().reported_total = Some(total);
        self
    }

    /// Hands out node ids counting down from 2000, so creation order and
    /// nid order disagree.
    pub fn with_descending_nids(self) -> Self {
        {
            let mut state = self.state.lock();
            state.descending_nids = true;
            state.next_nid = 2001;
        }
        self
    }

    /// Answers node creation for records with this title with an HTML body.
    pub fn failing_title(self, title: impl Into<String>) -> Self {
        self.state.lock().fail_titles.insert(title.into());
        self
    }

    /// Answers every file attach with an error body.
    pub fn failing_attach(self) -> Self {
        self.state.lock().fail_attach = true;
        self
    }

    /// Drops the connection on the next `count` PUT requests.
    pub fn dropping_puts(self, count: u32) -> Self {
        self.state.lock().drop_puts = count;
        self
    }

    /// Appends [`PHP_NOTICE`] to every JSON body.
    pub fn with_trailing_notice(self) -> Self {
        self.state.lock().trailing_notice = true;
        self
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns the requests with the given method.
    pub fn requests_with(&self, method: Method) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Returns a stored node.
    pub fn node(&self, nid: &str) -> Option<Json> {
        self.state.lock().nodes.get(nid).cloned()
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    fn handle(&self, request: &HttpRequest) -> ClientResult<Json> {
        let path = request.path().trim_end_matches('/').to_string();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let mut state = self.state.lock();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["search-service", "search_api", "datasets"]) => {
                Ok(search_page(&state, request))
            }
            (Method::Post, ["api", "dataset", "node"]) => {
                let body = request.json().cloned().unwrap_or(Json::Null);
                let title = body.get("title").and_then(Json::as_str).unwrap_or_default();
                if state.fail_titles.contains(title) {
                    return Ok(Json::String("<html>Internal Server Error</html>".into()));
                }
                if state.descending_nids {
                    state.next_nid = state.next_nid.saturating_sub(1);
                } else {
                    state.next_nid += 1;
                }
                let nid = state.next_nid.to_string();
                state.nodes.insert(nid.clone(), body);
                Ok(json!({ "nid": nid, "uri": format!("/api/dataset/node/{}", nid) }))
            }
            (Method::Post, ["api", "dataset", "node", nid, "attach_file"]) => {
                if state.fail_attach || !state.nodes.contains_key(*nid) {
                    return Ok(json!({ "form_errors": { "files[1]": "upload failed" } }));
                }
                let has_file = matches!(
                    &request.body,
                    RequestBody::Multipart(parts) if parts.iter().any(|p| p.file_name.is_some())
                );
                if !has_file {
                    return Ok(json!(["no file"]));
                }
                state.next_fid += 1;
                Ok(json!([{ "fid": state.next_fid.to_string() }]))
            }
            (Method::Put, ["api", "dataset", "node", nid]) => {
                if state.drop_puts > 0 {
                    state.drop_puts -= 1;
                    return Err(ClientError::transport_retryable("connection reset by peer"));
                }
                let nid = nid.to_string();
                let update = request.json().cloned().unwrap_or(Json::Null);
                match state.nodes.get_mut(&nid) {
                    Some(Json::Object(node)) => {
                        if let Json::Object(fields) = update {
                            node.extend(fields);
                        }
                        Ok(json!({ "nid": nid }))
                    }
                    _ => Ok(json!(["Node not found"])),
                }
            }
            (Method::Delete, ["api", "dataset", "node", nid]) => {
                if state.nodes.remove(*nid).is_some() {
                    Ok(json!([true]))
                } else {
                    Ok(json!([false, "Node not found"]))
                }
            }
            (Method::Get, ["api", "dataset", _object_type, nid]) => {
                let node = state.nodes.get(*nid).cloned();
                Ok(match node {
                    Some(Json::Object(mut node)) => {
                        node.insert("nid".into(), Json::String(nid.to_string()));
                        Json::Object(node)
                    }
                    _ => json!([]),
                })
            }
            _ => Ok(json!(["unknown endpoint"])),
        }
    }
}

fn search_page(state: &State, request: &HttpRequest) -> Json {
    let offset: usize = request
        .query_param("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let limit: usize = request
        .query_param("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(250);

    let result: Map<String, Json> = state
        .search_corpus
        .iter()
        .skip(offset)
        .take(limit)
        .map(|(nid, hit)| (nid.clone(), hit.clone()))
        .collect();
    let count = state
        .reported_total
        .unwrap_or(state.search_corpus.len() as u64);

    json!({ "count": count, "result": result })
}

impl Transport for FakeNodeServer {
    fn execute(&self, request: &HttpRequest) -> ClientResult<HttpResponse> {
        self.state.lock().requests.push(request.clone());
        let body = self.handle(request)?;

        let mut text = match body {
            // non-JSON bodies are sent as raw text
            Json::String(s) if s.starts_with('<') => s,
            other => other.to_string(),
        };
        if self.state.lock().trailing_notice {
            text.push_str(PHP_NOTICE);
        }
        Ok(HttpResponse::new(200, text))
    }
}
