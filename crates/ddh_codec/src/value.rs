//! Dynamic field values and records.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

/// Wire format used for date/time values sent to the repository.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamic field value.
///
/// This type represents anything a caller can put into a [`Record`].
/// `Absent` stands for an undefined value: the encoder drops such fields
/// instead of sending `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Undefined value.
    Absent,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text string.
    Text(String),
    /// Date and time (no timezone; the schema supplies one on the wire).
    Date(NaiveDateTime),
    /// Ordered list of values.
    List(Vec<FieldValue>),
    /// Nested record.
    Map(Record),
}

impl FieldValue {
    /// Check if this value is absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a date, if it is one.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a nested record, if it is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Map(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the values this field carries, treating a scalar as a
    /// one-element list. Absent entries are skipped.
    pub fn items(&self) -> Vec<&FieldValue> {
        match self {
            FieldValue::Absent => Vec::new(),
            FieldValue::List(items) => items.iter().filter(|v| !v.is_absent()).collect(),
            other => vec![other],
        }
    }

    /// Converts this value to JSON.
    ///
    /// Returns `None` for absent values and for NaN or infinite floats,
    /// which JSON cannot carry. Such entries inside lists and records are
    /// dropped as well.
    pub fn to_json(&self) -> Option<Json> {
        let json = match self {
            FieldValue::Absent => return None,
            FieldValue::Bool(b) => Json::Bool(*b),
            FieldValue::Integer(n) => Json::Number(Number::from(*n)),
            FieldValue::Float(f) => Json::Number(Number::from_f64(*f)?),
            FieldValue::Text(s) => Json::String(s.clone()),
            FieldValue::Date(d) => Json::String(d.format(DATETIME_FORMAT).to_string()),
            FieldValue::List(items) => Json::Array(items.iter().filter_map(Self::to_json).collect()),
            FieldValue::Map(record) => Json::Object(record.to_json_map()),
        };
        Some(json)
    }

    /// Renders this value for use in a URL query string.
    pub fn to_query_string(&self) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format(DATETIME_FORMAT).to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(Self::to_query_string)
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_json().map(|j| j.to_string()).unwrap_or_default(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(i64::from(n))
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Integer(i64::from(n))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(d: NaiveDateTime) -> Self {
        FieldValue::Date(d)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Record> for FieldValue {
    fn from(r: Record) -> Self {
        FieldValue::Map(r)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Absent, Into::into)
    }
}

impl From<Json> for FieldValue {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => FieldValue::Absent,
            Json::Bool(b) => FieldValue::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => FieldValue::Text(s),
            Json::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            Json::Object(map) => FieldValue::Map(Record::from(map)),
        }
    }
}

/// A flat mapping from field name to value.
///
/// Key order carries no meaning; records iterate in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    /// Looks up a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Looks up a text field.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Returns true if the field is present with a defined value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_absent())
    }

    /// Returns true if the field is present, even when absent-valued.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts to a JSON object, dropping absent fields.
    pub fn to_json_map(&self) -> Map<String, Json> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
            .collect()
    }
}

impl From<Map<String, Json>> for Record {
    fn from(map: Map<String, Json>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
