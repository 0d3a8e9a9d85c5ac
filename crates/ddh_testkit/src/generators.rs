//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and field values in the
//! shapes the repository accepts.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ddh_codec::{FieldValue, Record};
use proptest::prelude::*;

/// Strategy for generating field names that match no encoding rule.
pub fn plain_field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("x_[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating short text values.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9 ,.-]{1,24}").expect("Invalid regex")
}

/// Strategy for generating timestamps between 1990 and 2030.
pub fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (1990i32..2030, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, m, d, hh, mm, ss)| {
            let date = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
            let time = NaiveTime::from_hms_opt(hh, mm, ss).unwrap_or_default();
            NaiveDateTime::new(date, time)
        },
    )
}

/// Strategy for generating scalar field values (no absent values).
pub fn scalar_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        text_strategy().prop_map(FieldValue::Text),
        any::<i32>().prop_map(|i| FieldValue::Integer(i as i64)),
        any::<bool>().prop_map(FieldValue::Bool),
        datetime_strategy().prop_map(FieldValue::Date),
    ]
}

/// Strategy for generating lists of text values.
pub fn text_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(text_strategy(), 1..6)
}

/// Strategy for generating records of plain fields, some left absent.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(
        plain_field_name_strategy(),
        prop_oneof![
            4 => scalar_value_strategy(),
            1 => Just(FieldValue::Absent),
        ],
        0..8,
    )
    .prop_map(|fields| fields.into_iter().collect::<Record>())
}

/// Strategy for generating date strings in the accepted layouts.
///
/// Each value pairs the string with the timestamp it denotes.
pub fn date_text_strategy() -> impl Strategy<Value = (String, NaiveDateTime)> {
    (datetime_strategy(), 0usize..3).prop_map(|(dt, layout)| {
        match layout {
            0 => (dt.format("%Y-%m-%d %H:%M:%S").to_string(), dt),
            1 => (dt.format("%Y-%m-%dT%H:%M:%S").to_string(), dt),
            _ => (
                dt.format("%d/%m/%Y").to_string(),
                dt.date().and_time(NaiveTime::MIN),
            ),
        }
    })
}
