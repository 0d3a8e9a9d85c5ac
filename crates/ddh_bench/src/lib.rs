//! Benchmark utilities.

#![warn(missing_docs)]

use ddh_codec::{EncodingRule, FieldPattern, FieldSchema, FieldValue, Record};

/// The standard schema plus prefix rules matching [`wide_record`] names.
pub fn bench_schema() -> FieldSchema {
    FieldSchema::ddh()
        .with_pattern(FieldPattern::Prefix("tags_".into()), EncodingRule::FreeTags)
        .with_pattern(FieldPattern::Prefix("term_".into()), EncodingRule::TermReference)
        .with_pattern(FieldPattern::Prefix("date_".into()), EncodingRule::DateTime)
        .with_pattern(FieldPattern::Prefix("link_".into()), EncodingRule::UrlList)
        .with_pattern(FieldPattern::Prefix("value_".into()), EncodingRule::ValueList)
}

/// Generate a record with `width` fields spread across the encoding rules.
pub fn wide_record(width: usize) -> Record {
    (0..width)
        .map(|i| {
            let (name, value): (String, FieldValue) = match i % 6 {
                0 => (format!("tags_{}", i), vec!["energy", "access"].into()),
                1 => (format!("term_{}", i), vec![101, 102].into()),
                2 => (format!("date_{}", i), "2019-03-01".into()),
                3 => (format!("link_{}", i), "https://example.org/data".into()),
                4 => (format!("value_{}", i), (i as i64).into()),
                _ => (format!("x_text_{}", i), format!("value {}", i).into()),
            };
            (name, value)
        })
        .collect()
}
