//! Starter records for new datasets and resources.
//!
//! Templates carry the fields the repository requires on creation. Fields
//! the caller still has to fill in are present with [`FieldValue::Absent`],
//! so they are visible to callers but never sent if left unset.

use crate::taxonomy::TaxonomyRegistry;
use crate::value::{FieldValue, Record};

/// Name of the dataset field holding child resources.
pub const RESOURCES_FIELD: &str = "resources";

/// Taxonomy fields pre-populated on dataset templates.
///
/// `field_frequency` holds the dataset's periodicity.
pub const DATASET_TAXONOMY_FIELDS: &[&str] = &[
    "field_wbddh_data_class",
    "field_frequency",
    "field_topic",
    "field_granularity_list",
    "field_wbddh_country",
    "field_wbddh_economy_coverage",
    "field_wbddh_languages_supported",
];

/// Taxonomy fields pre-populated on resource templates.
pub const RESOURCE_TAXONOMY_FIELDS: &[&str] = &["field_wbddh_resource_type", "field_wbddh_data_class"];

/// Returns a new dataset record with required fields and taxonomy defaults.
pub fn dataset_template(taxonomy: &dyn TaxonomyRegistry) -> Record {
    let mut record = Record::new()
        .with("title", FieldValue::Absent)
        .with("body", FieldValue::Absent)
        .with("type", "dataset")
        .with("status", "1")
        .with("moderation_next_state", "published")
        .with("field_wbddh_data_type", FieldValue::Absent)
        .with("field_license_wbddh", FieldValue::Absent)
        .with("field_exception_s_", FieldValue::Absent)
        .with("field_wbddh_dsttl_upi", FieldValue::Absent)
        .with("field_wbddh_responsible", "No")
        .with(RESOURCES_FIELD, FieldValue::List(Vec::new()));

    apply_defaults(&mut record, taxonomy, DATASET_TAXONOMY_FIELDS);
    record
}

/// Returns a new resource record with required fields and taxonomy defaults.
pub fn resource_template(taxonomy: &dyn TaxonomyRegistry) -> Record {
    let mut record = Record::new()
        .with("title", FieldValue::Absent)
        .with("type", "resource")
        .with("status", "1")
        .with("moderation_next_state", "published");

    apply_defaults(&mut record, taxonomy, RESOURCE_TAXONOMY_FIELDS);
    record
}

fn apply_defaults(record: &mut Record, taxonomy: &dyn TaxonomyRegistry, fields: &[&str]) {
    for field in fields {
        record.insert(
            *field,
            taxonomy.default_value(field).unwrap_or(FieldValue::Absent),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::StaticTaxonomy;

    #[test]
    fn dataset_template_fills_defaults() {
        let taxonomy = StaticTaxonomy::new()
            .with_default("field_wbddh_data_class", 358)
            .with_default("field_topic", 366);
        let record = dataset_template(&taxonomy);

        assert_eq!(record.get_text("type"), Some("dataset"));
        assert_eq!(record.get_text("moderation_next_state"), Some("published"));
        assert_eq!(
            record.get("field_wbddh_data_class"),
            Some(&FieldValue::Integer(358))
        );
        assert_eq!(record.get("field_topic"), Some(&FieldValue::Integer(366)));
        assert!(record.contains("field_frequency"));
        assert!(!record.is_set("field_frequency"));
        assert_eq!(record.get(RESOURCES_FIELD), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn resource_template_fills_defaults() {
        let taxonomy = StaticTaxonomy::new().with_default("field_wbddh_resource_type", 443);
        let record = resource_template(&taxonomy);

        assert_eq!(record.get_text("type"), Some("resource"));
        assert_eq!(
            record.get("field_wbddh_resource_type"),
            Some(&FieldValue::Integer(443))
        );
        assert!(!record.is_set("title"));
        assert!(!record.contains(RESOURCES_FIELD));
    }
}
