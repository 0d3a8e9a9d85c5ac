//! Taxonomy lookups consumed by the encoder and the search filter.

use crate::error::{CodecError, CodecResult};
use crate::value::{FieldValue, Record};
use std::collections::BTreeMap;

/// Source of taxonomy knowledge for the repository.
///
/// Implementations are usually backed by vocabulary exports loaded by the
/// integrator. The encoder only asks whether a field is a taxonomy field; the
/// search filter also resolves human labels to term ids.
pub trait TaxonomyRegistry: Send + Sync {
    /// Returns true if the field references taxonomy terms.
    fn is_taxonomy_field(&self, name: &str) -> bool;

    /// Returns the default term for a field, if one is configured.
    fn default_value(&self, name: &str) -> Option<FieldValue>;

    /// Resolves a display label to a term identifier.
    fn resolve_term(&self, field: &str, label: &str) -> Option<FieldValue>;

    /// Maps a shorthand field name to its canonical repository name.
    fn canonical_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Expands a search filter into canonical field names and term ids.
    ///
    /// Text values on taxonomy fields are looked up with
    /// [`resolve_term`](Self::resolve_term); other values pass through.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnresolvedTerm`] naming the caller's field when
    /// a value is absent or a label does not resolve.
    fn expand_filter(&self, filter: &Record) -> CodecResult<Record> {
        let mut expanded = Record::new();
        for (name, value) in filter.iter() {
            let canonical = self.canonical_name(name);
            let resolved = match value {
                FieldValue::Absent => None,
                FieldValue::Text(label) if self.is_taxonomy_field(&canonical) => {
                    self.resolve_term(&canonical, label)
                }
                other => Some(other.clone()),
            };
            match resolved {
                Some(v) if !v.is_absent() => {
                    expanded.insert(canonical, v);
                }
                _ => {
                    return Err(CodecError::unresolved_term(
                        name,
                        value.to_query_string(),
                    ))
                }
            }
        }
        Ok(expanded)
    }
}

/// A registry with no taxonomy fields. Everything passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTaxonomy;

impl TaxonomyRegistry for NoTaxonomy {
    fn is_taxonomy_field(&self, _name: &str) -> bool {
        false
    }

    fn default_value(&self, _name: &str) -> Option<FieldValue> {
        None
    }

    fn resolve_term(&self, _field: &str, _label: &str) -> Option<FieldValue> {
        None
    }
}

#[derive(Debug, Clone, Default)]
struct Vocabulary {
    terms: BTreeMap<String, i64>,
    default: Option<i64>,
}

/// In-memory taxonomy registry.
///
/// Labels are matched case-insensitively.
///
/// # Example
///
/// ```
/// use ddh_codec::{StaticTaxonomy, TaxonomyRegistry};
///
/// let taxonomy = StaticTaxonomy::new()
///     .with_term("field_topic", "Energy", 366)
///     .with_default("field_topic", 366)
///     .with_alias("topic", "field_topic");
///
/// assert!(taxonomy.is_taxonomy_field("field_topic"));
/// assert_eq!(taxonomy.canonical_name("topic"), "field_topic");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticTaxonomy {
    fields: BTreeMap<String, Vocabulary>,
    aliases: BTreeMap<String, String>,
}

impl StaticTaxonomy {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a taxonomy field with no terms yet.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.entry(field.into()).or_default();
        self
    }

    /// Adds a term to a field's vocabulary.
    pub fn with_term(mut self, field: impl Into<String>, label: &str, tid: i64) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .terms
            .insert(label.to_lowercase(), tid);
        self
    }

    /// Sets a field's default term.
    pub fn with_default(mut self, field: impl Into<String>, tid: i64) -> Self {
        self.fields.entry(field.into()).or_default().default = Some(tid);
        self
    }

    /// Registers a shorthand name for a field.
    pub fn with_alias(mut self, alias: impl Into<String>, field: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), field.into());
        self
    }

    /// Number of taxonomy fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl TaxonomyRegistry for StaticTaxonomy {
    fn is_taxonomy_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn default_value(&self, name: &str) -> Option<FieldValue> {
        self.fields
            .get(name)
            .and_then(|v| v.default)
            .map(FieldValue::Integer)
    }

    fn resolve_term(&self, field: &str, label: &str) -> Option<FieldValue> {
        let vocabulary = self.fields.get(field)?;
        if let Some(tid) = vocabulary.terms.get(&label.to_lowercase()) {
            return Some(FieldValue::Integer(*tid));
        }
        // numeric labels are already term ids
        label.trim().parse::<i64>().ok().map(FieldValue::Integer)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}
