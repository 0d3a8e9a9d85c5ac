//! The client: node creation, update, deletion and lookup.

use crate::config::{AttachStrategy, ClientConfig, Session};
use crate::error::{ClientError, ClientResult};
use crate::response::{json_id, ResponseParser};
use crate::search::{SearchCursor, SearchIter, SearchQuery};
use crate::transport::{FormPart, HttpRequest, HttpResponse, Method, Transport};
use ddh_codec::{
    EncodedObject, FieldEncoder, FieldSchema, FieldValue, Record, TaxonomyRegistry,
    LANGUAGE_NEUTRAL, RESOURCES_FIELD,
};
use parking_lot::RwLock;
use serde_json::{json, Map, Value as Json};
use std::path::Path;
use std::sync::Arc;

/// External identifier carried by harvested records.
pub const HARVEST_ID_FIELD: &str = "field_ddh_harvest_sys_id";

/// Resource field holding a local file path to upload.
pub const UPLOAD_FIELD: &str = "upload";

/// Workflow state field.
pub const WORKFLOW_FIELD: &str = "moderation_next_state";

const CSRF_HEADER: &str = "X-CSRF-Token";
const DATASET_REF_FIELD: &str = "field_dataset_ref";
const RESOURCE_WEIGHT_FIELD: &str = "field_resource_weight";
const LEGACY_RESOURCES_FIELD: &str = "field_resources";

/// The dataset a resource is appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetRef {
    /// A bare node id.
    Nid(String),
    /// A node id with the dataset's external id, used in error reports.
    Known {
        /// External id, if any.
        id: Option<String>,
        /// Node id.
        nid: String,
    },
}

impl DatasetRef {
    /// Returns the node id.
    pub fn nid(&self) -> &str {
        match self {
            DatasetRef::Nid(nid) | DatasetRef::Known { nid, .. } => nid,
        }
    }

    /// Returns the best identifier for error reports.
    pub fn label(&self) -> &str {
        match self {
            DatasetRef::Known { id: Some(id), .. } => id,
            other => other.nid(),
        }
    }
}

impl From<&str> for DatasetRef {
    fn from(nid: &str) -> Self {
        DatasetRef::Nid(nid.to_string())
    }
}

impl From<String> for DatasetRef {
    fn from(nid: String) -> Self {
        DatasetRef::Nid(nid)
    }
}

impl From<&CreatedDataset> for DatasetRef {
    fn from(created: &CreatedDataset) -> Self {
        DatasetRef::Known {
            id: created.id.clone(),
            nid: created.nid.clone(),
        }
    }
}

/// A resource created under a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Node id.
    pub nid: String,
    /// Title, if the record had one.
    pub title: Option<String>,
}

impl ResourceRef {
    fn legacy_target(&self) -> String {
        match &self.title {
            Some(title) => format!("{} ({})", title, self.nid),
            None => self.nid.clone(),
        }
    }
}

/// Outcome of the legacy repeated attach update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachReport {
    /// Attempts made.
    pub attempts: u32,
    /// One message per failed attempt.
    pub failures: Vec<String>,
}

impl AttachReport {
    /// Returns true if every attempt succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A dataset and the resources created under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDataset {
    /// Dataset node id.
    pub nid: String,
    /// External id, if known.
    pub id: Option<String>,
    /// Resources in creation order.
    pub resources: Vec<ResourceRef>,
    /// Report of the legacy repeated attach update, when it ran.
    pub attach_report: Option<AttachReport>,
}

/// Outcome of a delete request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The node was deleted.
    Deleted,
    /// The server declined; carries its reason.
    Refused(Json),
}

impl DeleteOutcome {
    /// Returns true if the node was deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

impl std::fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteOutcome::Deleted => f.write_str("OK"),
            DeleteOutcome::Refused(Json::String(reason)) => f.write_str(reason),
            DeleteOutcome::Refused(reason) => write!(f, "{}", reason),
        }
    }
}

/// Counters for a client's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Requests sent.
    pub requests: u64,
    /// Datasets created.
    pub datasets_created: u64,
    /// Resources created.
    pub resources_created: u64,
    /// Files attached.
    pub files_attached: u64,
    /// Search pages fetched.
    pub pages_fetched: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

struct Upload {
    file_name: String,
    content: Vec<u8>,
}

/// Client for the repository's node API.
///
/// Holds its own configuration and session; any number of clients can be
/// used side by side. All network calls go through the [`Transport`].
pub struct Client<T: Transport> {
    config: ClientConfig,
    session: Session,
    transport: T,
    encoder: FieldEncoder,
    parser: ResponseParser,
    stats: RwLock<ClientStats>,
}

impl<T: Transport> Client<T> {
    /// Creates a client with the default field schema.
    pub fn new(
        config: ClientConfig,
        session: Session,
        transport: T,
        taxonomy: Arc<dyn TaxonomyRegistry>,
    ) -> Self {
        Self::with_schema(config, session, transport, FieldSchema::ddh(), taxonomy)
    }

    /// Creates a client with a custom field schema.
    pub fn with_schema(
        config: ClientConfig,
        session: Session,
        transport: T,
        schema: FieldSchema,
        taxonomy: Arc<dyn TaxonomyRegistry>,
    ) -> Self {
        let parser = ResponseParser::new(config.resilience_mode);
        Self {
            config,
            session,
            transport,
            encoder: FieldEncoder::new(schema, taxonomy),
            parser,
            stats: RwLock::new(ClientStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the field encoder.
    pub fn encoder(&self) -> &FieldEncoder {
        &self.encoder
    }

    /// Returns the counters.
    pub fn stats(&self) -> ClientStats {
        self.stats.read().clone()
    }

    pub(crate) fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    /// Builds a request carrying the session cookie, plus the CSRF header
    /// for mutating methods.
    pub(crate) fn request(&self, method: Method, url: impl Into<String>) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        if let Some((name, value)) = self.session.cookie() {
            request = request.with_cookie(name, value);
        }
        if method.is_mutating() && !self.session.csrf_token.is_empty() {
            request = request.with_header(CSRF_HEADER, self.session.csrf_token.clone());
        }
        request
    }

    pub(crate) fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        tracing::debug!(method = ?request.method, url = %request.url, "request");
        if let Some(body) = request.json() {
            tracing::trace!(payload = %body, "request payload");
        }

        self.stats.write().requests += 1;
        if request.method == Method::Get && request.url.starts_with(&self.config.search_url()) {
            self.stats.write().pages_fetched += 1;
        }

        let result = self.transport.execute(&request);
        match &result {
            Ok(response) if !response.is_success() => {
                tracing::debug!(status = response.status, "non-success status");
            }
            Err(e) => self.note_error(e),
            _ => {}
        }
        result
    }

    fn note_error(&self, error: &ClientError) {
        self.stats.write().last_error = Some(error.to_string());
    }

    /// Searches for nodes. See [`SearchIter`].
    ///
    /// Taxonomy labels in the filter are resolved before the first request;
    /// an unresolvable label fails here.
    pub fn search(&self, query: impl Into<SearchQuery>) -> ClientResult<SearchIter<'_, T>> {
        self.resume_search(query, SearchCursor::default())
    }

    /// Resumes a search from a saved cursor.
    pub fn resume_search(
        &self,
        query: impl Into<SearchQuery>,
        cursor: SearchCursor,
    ) -> ClientResult<SearchIter<'_, T>> {
        SearchIter::new(self, &query.into(), cursor)
    }

    /// Creates a dataset node and returns its nid.
    ///
    /// Any `resources` entry is ignored; use
    /// [`create_dataset_with_resources`](Self::create_dataset_with_resources).
    pub fn create_dataset(&self, record: &Record, id: Option<&str>) -> ClientResult<String> {
        let id = external_id(record, id);
        let mut fields = record.clone();
        fields.remove(RESOURCES_FIELD);

        let operation = fields.get_text("type").unwrap_or("dataset").to_string();
        let object = self.encoder.encode(&fields);
        let nid = self.post_node(object, &operation, id.as_deref().unwrap_or_default())?;

        self.stats.write().datasets_created += 1;
        tracing::info!(nid = %nid, id = ?id, "dataset created");
        Ok(nid)
    }

    /// Creates a resource under a dataset and returns its nid.
    ///
    /// An `upload` field names a local file; it is read before the resource
    /// is created and attached afterwards. If the attach fails the resource
    /// stays in place and the error names it.
    pub fn append_resource(
        &self,
        dataset: impl Into<DatasetRef>,
        resource: &Record,
        weight: Option<i64>,
    ) -> ClientResult<String> {
        let dataset = dataset.into();
        let label = resource_label(resource).unwrap_or_else(|| dataset.label().to_string());

        let mut fields = resource.clone();
        let upload = match fields.remove(UPLOAD_FIELD) {
            Some(FieldValue::Text(path)) if !path.is_empty() => Some(read_upload(Path::new(&path))?),
            None | Some(FieldValue::Absent) | Some(FieldValue::Text(_)) => None,
            Some(other) => {
                return Err(ClientError::InvalidRecord(format!(
                    "{} must be a file path, got {:?}",
                    UPLOAD_FIELD, other
                )))
            }
        };

        let mut object = self.encoder.encode(&fields);
        object.insert(
            DATASET_REF_FIELD.to_string(),
            und(json!({ "target_id": dataset.nid() })),
        );
        if let Some(weight) = weight {
            object.insert(
                RESOURCE_WEIGHT_FIELD.to_string(),
                und(json!({ "value": weight })),
            );
        }

        let nid = self.post_node(object, "resource", &label)?;
        self.stats.write().resources_created += 1;
        tracing::info!(nid = %nid, dataset = %dataset.nid(), weight = ?weight, "resource created");

        if let Some(upload) = upload {
            self.attach_upload(&nid, &label, upload)?;
        }
        Ok(nid)
    }

    /// Uploads a local file to an existing resource and returns the file id.
    pub fn attach_file(&self, resource_nid: &str, path: impl AsRef<Path>) -> ClientResult<String> {
        let upload = read_upload(path.as_ref())?;
        self.attach_upload(resource_nid, resource_nid, upload)
    }

    fn attach_upload(&self, resource_nid: &str, label: &str, upload: Upload) -> ClientResult<String> {
        let url = format!("{}/attach_file", self.config.node_item_url(resource_nid));
        tracing::debug!(file = %upload.file_name, bytes = upload.content.len(), "attaching file");

        let request = self.request(Method::Post, url).with_multipart(vec![
            FormPart::file("files[1]", upload.file_name, upload.content),
            FormPart::text("field_name", "field_upload"),
            FormPart::text("attach", "1"),
        ]);

        let attach_error = |body: String| ClientError::AttachFile {
            resource_nid: resource_nid.to_string(),
            id: label.to_string(),
            body,
        };

        let response = self.send(request).map_err(|e| attach_error(e.to_string()))?;
        let fid = self
            .parser
            .parse(&response.body)
            .and_then(|data| data.as_array()?.first()?.get("fid").and_then(json_id));

        match fid {
            Some(fid) => {
                self.stats.write().files_attached += 1;
                Ok(fid)
            }
            None => {
                let err = attach_error(response.body);
                self.note_error(&err);
                Err(err)
            }
        }
    }

    /// Creates a dataset, then each of its `resources` in order.
    ///
    /// Resource k gets weight k. If a resource fails, the error is
    /// [`ClientError::PartialDataset`] carrying what was created so far;
    /// nothing is rolled back. Legacy attach strategies run afterwards.
    pub fn create_dataset_with_resources(
        &self,
        record: &Record,
        id: Option<&str>,
    ) -> ClientResult<CreatedDataset> {
        let resources = dataset_resources(record)?;
        let id = external_id(record, id);
        let nid = self.create_dataset(record, id.as_deref())?;

        let mut created = CreatedDataset {
            nid,
            id,
            resources: Vec::with_capacity(resources.len()),
            attach_report: None,
        };

        for (position, resource) in resources.iter().enumerate() {
            match self.append_resource(&created, resource, Some(position as i64)) {
                Ok(nid) => created.resources.push(ResourceRef {
                    nid,
                    title: resource.get_text("title").map(str::to_string),
                }),
                Err(source) => {
                    tracing::warn!(
                        dataset = %created.nid,
                        position,
                        error = %source,
                        "resource creation failed; dataset left partially populated"
                    );
                    return Err(partial(created, source));
                }
            }
        }

        if created.resources.is_empty() {
            return Ok(created);
        }

        let workflow = record.get_text(WORKFLOW_FIELD).unwrap_or("draft").to_string();
        let attached = match self.config.attach_strategy {
            AttachStrategy::DatasetFirst => Ok(()),
            AttachStrategy::PostHoc => self.attach_post_hoc(&created, &workflow),
            AttachStrategy::PostHocSingle => self.attach_one_by_one(&created, &workflow),
            AttachStrategy::PostHocRepeated => {
                created.attach_report = Some(self.attach_repeated(&created, &workflow));
                Ok(())
            }
        };

        match attached {
            Ok(()) => Ok(created),
            Err(source) => Err(partial(created, source)),
        }
    }

    fn attach_post_hoc(&self, created: &CreatedDataset, workflow: &str) -> ClientResult<()> {
        let targets = created
            .resources
            .iter()
            .map(|r| json!({ "target_id": r.nid }))
            .collect();
        let body = legacy_attach_body(workflow, targets);
        self.put_node(&created.nid, body, label_of(created)).map(|_| ())
    }

    fn attach_one_by_one(&self, created: &CreatedDataset, workflow: &str) -> ClientResult<()> {
        for resource in &created.resources {
            let body = legacy_attach_body(
                workflow,
                vec![json!({ "target_id": resource.legacy_target() })],
            );
            self.put_node(&created.nid, body, label_of(created))?;
        }
        Ok(())
    }

    /// Repeats the full attach update once per resource, bounded by the
    /// retry attempt limit. Failures are recorded and do not stop the loop.
    fn attach_repeated(&self, created: &CreatedDataset, workflow: &str) -> AttachReport {
        let targets: Vec<Json> = created
            .resources
            .iter()
            .map(|r| json!({ "target_id": r.legacy_target() }))
            .collect();
        let body = legacy_attach_body(workflow, targets);

        let retry = &self.config.retry;
        let attempts = (created.resources.len() as u32).min(retry.max_attempts.max(1));
        let mut report = AttachReport::default();

        for attempt in 0..attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
            }
            report.attempts += 1;

            if let Err(e) = self.put_node(&created.nid, body.clone(), label_of(created)) {
                tracing::warn!(
                    dataset = %created.nid,
                    attempt,
                    error = %e,
                    "attaching resources failed; continuing"
                );
                report.failures.push(e.to_string());
            }
        }
        report
    }

    /// Updates an existing node with a partial record and returns its nid.
    ///
    /// The workflow state defaults to `published`.
    pub fn update_dataset(&self, nid: &str, record: &Record) -> ClientResult<String> {
        let mut object = self.encoder.encode(record);
        object
            .entry(WORKFLOW_FIELD)
            .or_insert_with(|| Json::String("published".to_string()));
        self.put_node(nid, object, nid)
    }

    /// Deletes a node.
    pub fn delete(&self, nid: &str) -> ClientResult<DeleteOutcome> {
        let url = self.config.node_item_url(nid);
        let response = self.send(self.request(Method::Delete, url).with_json(json!({})))?;

        let outcome = match self.parser.parse(&response.body) {
            Some(Json::Array(items)) => match items.as_slice() {
                [Json::Bool(true), ..] => Some(DeleteOutcome::Deleted),
                [Json::Bool(false), reason, ..] => Some(DeleteOutcome::Refused(reason.clone())),
                [first, ..] => Some(DeleteOutcome::Refused(first.clone())),
                [] => None,
            },
            _ => None,
        };

        let outcome = outcome.ok_or_else(|| ClientError::api("delete", nid, response.body))?;
        tracing::info!(nid, outcome = %outcome, "delete");
        Ok(outcome)
    }

    /// Fetches a node by numeric nid or full URL.
    ///
    /// Returns `None` when the server answers with anything but an object.
    pub fn get_node(&self, target: &str, object_type: &str) -> ClientResult<Option<Map<String, Json>>> {
        let url = if !target.is_empty() && target.bytes().all(|b| b.is_ascii_digit()) {
            format!("{}/api/dataset/{}/{}", self.config.base_url(), object_type, target)
        } else {
            target.to_string()
        };

        let response = self.send(self.request(Method::Get, url.clone()))?;
        match self.parser.parse(&response.body) {
            Some(Json::Object(node)) => Ok(Some(node)),
            Some(_) => Ok(None),
            None => Err(ClientError::api("get", url, response.body)),
        }
    }

    fn post_node(&self, object: EncodedObject, operation: &str, id: &str) -> ClientResult<String> {
        let request = self
            .request(Method::Post, self.config.node_url())
            .with_json(Json::Object(object));
        let response = self.send(request)?;
        self.node_id(response, operation, id)
    }

    fn put_node(&self, nid: &str, object: EncodedObject, id: &str) -> ClientResult<String> {
        let request = self
            .request(Method::Put, self.config.node_item_url(nid))
            .with_json(Json::Object(object));
        let response = self.send(request)?;
        self.node_id(response, "put", id)
    }

    fn node_id(&self, response: HttpResponse, operation: &str, id: &str) -> ClientResult<String> {
        match self.parser.parse_nid(&response.body) {
            Some(nid) => Ok(nid),
            None => {
                let err = ClientError::api(operation, id, response.body);
                self.note_error(&err);
                Err(err)
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn und(item: Json) -> Json {
    json!({ LANGUAGE_NEUTRAL: [item] })
}

fn legacy_attach_body(workflow: &str, targets: Vec<Json>) -> EncodedObject {
    let mut body = Map::new();
    body.insert(WORKFLOW_FIELD.to_string(), Json::String(workflow.to_string()));
    body.insert(
        LEGACY_RESOURCES_FIELD.to_string(),
        json!({ LANGUAGE_NEUTRAL: targets }),
    );
    body
}

fn label_of(created: &CreatedDataset) -> &str {
    created.id.as_deref().unwrap_or(&created.nid)
}

fn partial(created: CreatedDataset, source: ClientError) -> ClientError {
    ClientError::PartialDataset {
        created: Box::new(created),
        source: Box::new(source),
    }
}

fn external_id(record: &Record, explicit: Option<&str>) -> Option<String> {
    explicit.map(str::to_string).or_else(|| {
        record
            .get(HARVEST_ID_FIELD)
            .map(FieldValue::to_query_string)
            .filter(|id| !id.is_empty())
    })
}

fn resource_label(resource: &Record) -> Option<String> {
    external_id(resource, None).or_else(|| {
        resource
            .get_text("title")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn dataset_resources(record: &Record) -> ClientResult<Vec<Record>> {
    match record.get(RESOURCES_FIELD) {
        None | Some(FieldValue::Absent) => Ok(Vec::new()),
        Some(FieldValue::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                FieldValue::Map(resource) => Ok(resource.clone()),
                other => Err(ClientError::InvalidRecord(format!(
                    "resource {} is not a record: {:?}",
                    i, other
                ))),
            })
            .collect(),
        Some(other) => Err(ClientError::InvalidRecord(format!(
            "{} must be a list of records, got {:?}",
            RESOURCES_FIELD, other
        ))),
    }
}

fn read_upload(path: &Path) -> ClientResult<Upload> {
    let content = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Upload { file_name, content })
}
