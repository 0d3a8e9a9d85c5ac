//! Declarative field schema: which wire shape each field name gets.

use crate::taxonomy::TaxonomyRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Timezone the repository expects on datetime fields.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Mode marker sent with collection (group) references.
pub const COLLECTION_MODE: &str = "collections";

/// The closed set of wire encodings a field can receive.
///
/// Serializes as `{"rule": "value_list"}`, so rule tables can be kept in
/// configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum EncodingRule {
    /// `{"und": [{"tid": v}, ...]}`
    TermReference,
    /// `{"und": {"value_field": "\"\" a \"\" \"\" b \"\""}}`
    FreeTags,
    /// `{"und": [{"value": v}, ...]}`
    ValueList,
    /// `{"und": [{"url": v}, ...]}`
    UrlList,
    /// `{"und": [{"target_id": v}, ...]}`
    EntityReference,
    /// `{"und": [{"target_id": v, "field_mode": mode}]}`
    GroupReference {
        /// Mode marker sent alongside the target.
        mode: String,
    },
    /// `{"und": [{"value": ts, "timezone": tz, "timezone_db": tz, "date_type": "datetime"}]}`
    DateTime,
    /// `{"und": [{"value": ts, "value2": ts, "show_todate": 0}]}`
    TimeRange,
    /// Value sent unchanged.
    PassThrough,
}

/// Matches field names that are not listed exactly.
#[derive(Debug, Clone)]
pub enum FieldPattern {
    /// Names starting with the prefix.
    Prefix(String),
    /// Names matching the regular expression.
    Regex(Regex),
}

impl FieldPattern {
    /// Returns true if the pattern matches the field name.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            FieldPattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
            FieldPattern::Regex(re) => re.is_match(name),
        }
    }
}

/// Field-name driven encoding policy.
///
/// Lookup order for a field name:
/// 1. an exact entry for [`EncodingRule::FreeTags`] or [`EncodingRule::TermReference`];
/// 2. the taxonomy registry, unless the name is reserved;
/// 3. any other exact entry;
/// 4. patterns, in insertion order;
/// 5. [`EncodingRule::PassThrough`].
#[derive(Debug, Clone)]
pub struct FieldSchema {
    exact: BTreeMap<String, EncodingRule>,
    patterns: Vec<(FieldPattern, EncodingRule)>,
    reserved: BTreeSet<String>,
    timezone: String,
}

impl FieldSchema {
    /// Creates a schema with no entries; every field passes through unless
    /// the taxonomy registry claims it.
    pub fn empty() -> Self {
        Self {
            exact: BTreeMap::new(),
            patterns: Vec::new(),
            reserved: BTreeSet::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    /// The repository's standard field table.
    pub fn ddh() -> Self {
        const VALUE_FIELDS: &[&str] = &[
            "body",
            "field_wbddh_copyright",
            "field_wbddh_type_of_license",
            "field_wbddh_source",
            "field_wbddh_publisher_name",
            "field_wbddh_search_tags",
            "field_ddh_external_contact_email",
            "field_wbddh_depositor_notes",
            "field_ddh_harvest_sys_id",
            "field_wbddh_reference_system",
            "field_related_links_and_publicat",
            "field_external_metadata",
            "field_wbddh_responsible",
        ];
        const DATE_FIELDS: &[&str] = &[
            "field_wbddh_release_date",
            "field_wbddh_modified_date",
            "field_wbddh_start_date",
            "field_wbddh_end_date",
        ];

        let mut schema = Self::empty()
            .with_rule("field_tags", EncodingRule::TermReference)
            .with_rule("_field_tags", EncodingRule::FreeTags)
            .with_rule("field_link_api", EncodingRule::UrlList)
            .with_rule("field_wbddh_dsttl_upi", EncodingRule::EntityReference)
            .with_rule("field_wbddh_collaborator_upi", EncodingRule::EntityReference)
            .with_rule(
                "og_group_ref",
                EncodingRule::GroupReference {
                    mode: COLLECTION_MODE.to_string(),
                },
            )
            .with_rule("field_wbddh_time_periods", EncodingRule::TimeRange)
            .with_reserved("moderation_next_state");

        for name in VALUE_FIELDS {
            schema = schema.with_rule(*name, EncodingRule::ValueList);
        }
        for name in DATE_FIELDS {
            schema = schema.with_rule(*name, EncodingRule::DateTime);
        }
        schema
    }

    /// Adds or replaces an exact field entry.
    pub fn with_rule(mut self, name: impl Into<String>, rule: EncodingRule) -> Self {
        self.exact.insert(name.into(), rule);
        self
    }

    /// Adds a pattern entry, consulted after exact entries.
    pub fn with_pattern(mut self, pattern: FieldPattern, rule: EncodingRule) -> Self {
        self.patterns.push((pattern, rule));
        self
    }

    /// Marks a field as never being a taxonomy field.
    pub fn with_reserved(mut self, name: impl Into<String>) -> Self {
        self.reserved.insert(name.into());
        self
    }

    /// Sets the timezone attached to datetime fields.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Returns the timezone attached to datetime fields.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Returns true if the name is reserved.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Picks the encoding rule for a field.
    pub fn rule_for(&self, name: &str, taxonomy: &dyn TaxonomyRegistry) -> EncodingRule {
        let exact = self.exact.get(name);

        if let Some(rule @ (EncodingRule::FreeTags | EncodingRule::TermReference)) = exact {
            return rule.clone();
        }

        if !self.is_reserved(name) && taxonomy.is_taxonomy_field(name) {
            return EncodingRule::TermReference;
        }

        if let Some(rule) = exact {
            return rule.clone();
        }

        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map_or(EncodingRule::PassThrough, |(_, rule)| rule.clone())
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::ddh()
    }
}
