//! Record → node API wire object encoder.

use crate::date::parse_date;
use crate::schema::{EncodingRule, FieldSchema};
use crate::taxonomy::TaxonomyRegistry;
use crate::value::{FieldValue, Record, DATETIME_FORMAT};
use serde_json::{json, Map, Value as Json};
use std::sync::Arc;

/// Language key the repository wraps field payloads in.
pub const LANGUAGE_NEUTRAL: &str = "und";

/// Encoded node body, ready for JSON serialization.
pub type EncodedObject = Map<String, Json>;

/// Encodes records into the repository's field representation.
///
/// Encoding never fails and never mutates its input. Fields with absent
/// values are omitted from the output.
///
/// # Example
///
/// ```
/// use ddh_codec::{FieldEncoder, NoTaxonomy, Record};
/// use serde_json::json;
///
/// let encoder = FieldEncoder::with_taxonomy(NoTaxonomy);
/// let obj = encoder.encode(&Record::new().with("title", "GDP").with("body", "Gross"));
///
/// assert_eq!(obj["title"], json!("GDP"));
/// assert_eq!(obj["body"], json!({"und": [{"value": "Gross"}]}));
/// ```
#[derive(Clone)]
pub struct FieldEncoder {
    schema: FieldSchema,
    taxonomy: Arc<dyn TaxonomyRegistry>,
}

impl FieldEncoder {
    /// Creates an encoder from a schema and a taxonomy registry.
    pub fn new(schema: FieldSchema, taxonomy: Arc<dyn TaxonomyRegistry>) -> Self {
        Self { schema, taxonomy }
    }

    /// Creates an encoder with the standard schema.
    pub fn with_taxonomy(taxonomy: impl TaxonomyRegistry + 'static) -> Self {
        Self::new(FieldSchema::ddh(), Arc::new(taxonomy))
    }

    /// Returns the schema.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Returns the taxonomy registry.
    pub fn taxonomy(&self) -> &dyn TaxonomyRegistry {
        self.taxonomy.as_ref()
    }

    /// Encodes a whole record.
    pub fn encode(&self, record: &Record) -> EncodedObject {
        let mut obj = EncodedObject::new();
        for (name, value) in record.iter() {
            if let Some(encoded) = self.encode_field(name, value) {
                obj.insert(name.to_string(), encoded);
            }
        }
        obj
    }

    /// Encodes a single field; `None` means the field is omitted.
    pub fn encode_field(&self, name: &str, value: &FieldValue) -> Option<Json> {
        if value.is_absent() {
            return None;
        }

        let rule = self.schema.rule_for(name, self.taxonomy.as_ref());
        let encoded = match rule {
            EncodingRule::TermReference => wrap_each(value, |v| json!({ "tid": v })),
            EncodingRule::FreeTags => free_tags(value),
            EncodingRule::ValueList => keyed_list(value, "value"),
            EncodingRule::UrlList => keyed_list(value, "url"),
            EncodingRule::EntityReference => wrap_each(value, |v| json!({ "target_id": v })),
            EncodingRule::GroupReference { mode } => {
                let target = value.to_json()?;
                und(json!([{ "target_id": target, "field_mode": mode }]))
            }
            EncodingRule::DateTime => {
                let tz = self.schema.timezone();
                und(json!([{
                    "value": timestamp(value)?,
                    "timezone": tz,
                    "timezone_db": tz,
                    "date_type": "datetime",
                }]))
            }
            EncodingRule::TimeRange => {
                // one interval per record; start and end are the same instant
                let ts = timestamp(value)?;
                und(json!([{ "value": ts, "value2": ts, "show_todate": 0 }]))
            }
            EncodingRule::PassThrough => value.to_json()?,
        };
        Some(encoded)
    }
}

impl std::fmt::Debug for FieldEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEncoder")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

fn und(payload: Json) -> Json {
    json!({ LANGUAGE_NEUTRAL: payload })
}

fn wrap_each(value: &FieldValue, wrap: impl Fn(Json) -> Json) -> Json {
    und(Json::Array(
        value
            .items()
            .into_iter()
            .filter_map(FieldValue::to_json)
            .map(wrap)
            .collect(),
    ))
}

fn keyed_list(value: &FieldValue, key: &str) -> Json {
    let entry = |v: &FieldValue| match v {
        FieldValue::Text(s) => Some(json!({ key: s })),
        other => other.to_json(),
    };
    let entries: Vec<Json> = match value {
        FieldValue::List(items) => items.iter().filter_map(entry).collect(),
        other => entry(other).into_iter().collect(),
    };
    und(Json::Array(entries))
}

fn free_tags(value: &FieldValue) -> Json {
    let tags = value
        .items()
        .into_iter()
        .map(|t| format!("\"\" {} \"\"", t.to_query_string()))
        .collect::<Vec<_>>()
        .join(" ");
    und(json!({ "value_field": tags }))
}

fn timestamp(value: &FieldValue) -> Option<Json> {
    match value {
        FieldValue::Date(d) => Some(Json::String(d.format(DATETIME_FORMAT).to_string())),
        FieldValue::Text(s) => match parse_date(s) {
            Ok(d) => Some(Json::String(d.format(DATETIME_FORMAT).to_string())),
            Err(_) => {
                tracing::debug!(value = %s, "sending unparsed date text verbatim");
                Some(Json::String(s.clone()))
            }
        },
        other => other.to_json(),
    }
}
