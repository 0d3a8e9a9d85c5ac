//! Paginated search over the repository's search endpoint.

use crate::error::{ClientError, ClientResult};
use crate::orchestrator::Client;
use crate::transport::{Method, Transport};
use ddh_codec::{FieldValue, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::VecDeque;

/// Identifier field; always requested first.
pub const ID_FIELD: &str = "nid";

/// Title field; always requested.
pub const TITLE_FIELD: &str = "title";

/// Kind of node to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Datasets.
    #[default]
    Dataset,
    /// Resources.
    Resource,
}

impl ObjectType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Dataset => "dataset",
            ObjectType::Resource => "resource",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search request: filter, requested fields and object type.
///
/// A bare [`Record`] converts into a query using it as the filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    filter: Record,
    fields: Vec<String>,
    object_type: ObjectType,
}

impl SearchQuery {
    /// Creates a query matching every dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: Record) -> Self {
        self.filter = filter;
        self
    }

    /// Adds one filter condition.
    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filter.insert(field, value);
        self
    }

    /// Sets the fields to return (in addition to `nid` and `title`).
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the object type.
    pub fn object_type(mut self, object_type: ObjectType) -> Self {
        self.object_type = object_type;
        self
    }

    /// Returns the filter.
    pub fn filter_record(&self) -> &Record {
        &self.filter
    }

    /// Returns the object type.
    pub fn kind(&self) -> ObjectType {
        self.object_type
    }

    /// Returns the field list literal, e.g. `[nid,title,created,]`.
    pub fn field_list(&self) -> String {
        let mut fields: Vec<&str> = vec![ID_FIELD, TITLE_FIELD];
        for field in &self.fields {
            if !fields.contains(&field.as_str()) {
                fields.push(field);
            }
        }
        format!("[{},]", fields.join(","))
    }
}

impl From<Record> for SearchQuery {
    fn from(filter: Record) -> Self {
        Self::new().filter(filter)
    }
}

/// Position in a search, which a caller can persist and resume from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCursor {
    /// Records handed to the caller so far.
    pub offset: u64,
    /// Total reported by the first page, once known.
    pub total: Option<u64>,
}

impl SearchCursor {
    /// Returns true once every record has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.total.is_some_and(|total| self.offset >= total)
    }
}

/// Lazy, forward-only sequence of `(nid, record)` pairs.
///
/// Pages are fetched on demand. The total is taken from the first page and
/// iteration ends once that many records have been read. An error is
/// yielded once and ends the sequence. Use [`cursor`](Self::cursor) to
/// record progress and [`Client::resume_search`] to pick it up again.
pub struct SearchIter<'a, T: Transport> {
    client: &'a Client<T>,
    params: String,
    fetched: u64,
    yielded: u64,
    total: Option<u64>,
    buffer: VecDeque<(String, Record)>,
    finished: bool,
}

impl<'a, T: Transport> SearchIter<'a, T> {
    pub(crate) fn new(
        client: &'a Client<T>,
        query: &SearchQuery,
        cursor: SearchCursor,
    ) -> ClientResult<Self> {
        let filter = client
            .encoder()
            .taxonomy()
            .expand_filter(query.filter_record())?;

        let mut params: Vec<String> = filter
            .iter()
            .map(|(k, v)| format!("filter[{}]={}", k, v.to_query_string()))
            .collect();
        params.push(format!("type={}", query.kind()));
        params.push(format!("fields={}", query.field_list()));
        params.push(format!("limit={}", client.config().page_size));

        Ok(Self {
            client,
            params: params.join("&"),
            fetched: cursor.offset,
            yielded: cursor.offset,
            total: cursor.total,
            buffer: VecDeque::new(),
            finished: false,
        })
    }

    /// Returns the current position.
    pub fn cursor(&self) -> SearchCursor {
        SearchCursor {
            offset: self.yielded,
            total: self.total,
        }
    }

    /// Total reported by the server, once the first page is in.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    fn page_url(&self) -> String {
        // crude join so the brackets stay unescaped
        format!(
            "{}?{}&offset={}",
            self.client.config().search_url(),
            self.params,
            self.fetched
        )
    }

    /// Fetches the next page into the buffer; returns the number of records.
    fn fetch_page(&mut self) -> ClientResult<usize> {
        let url = self.page_url();
        tracing::debug!(url = %url, "search");

        let response = self
            .client
            .send(self.client.request(Method::Get, url.clone()))?;
        let page = self
            .client
            .parser()
            .parse(&response.body)
            .filter(Json::is_object)
            .ok_or_else(|| ClientError::api("search", &url, &response.body))?;

        let count = page
            .get("count")
            .and_then(count_value)
            .ok_or_else(|| ClientError::api("search", &url, &response.body))?;
        if self.total.is_none() {
            self.total = Some(count);
        }

        let mut read = 0;
        if let Some(Json::Object(result)) = page.get("result") {
            for (nid, value) in result {
                let record = match FieldValue::from(value.clone()) {
                    FieldValue::Map(record) => record,
                    _ => Record::new(),
                };
                self.buffer.push_back((nid.clone(), record));
                read += 1;
            }
        }
        self.fetched += read as u64;
        Ok(read)
    }
}

impl<T: Transport> Iterator for SearchIter<'_, T> {
    type Item = ClientResult<(String, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(hit));
            }

            if self.finished {
                return None;
            }

            if let Some(total) = self.total {
                if self.fetched >= total {
                    self.finished = true;
                    return None;
                }
            }

            match self.fetch_page() {
                Ok(0) => {
                    self.finished = true;
                    if let Some(total) = self.total {
                        if self.fetched < total {
                            tracing::warn!(
                                read = self.fetched,
                                total,
                                "search returned an empty page before the reported total"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn count_value(value: &Json) -> Option<u64> {
    match value {
        Json::Number(n) => n.as_u64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
