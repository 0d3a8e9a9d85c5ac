//! Lenient date parsing for caller-supplied strings.
//!
//! Patterns are tried in a fixed order and the first anchored match wins:
//!
//! | pattern               | example               |
//! |-----------------------|-----------------------|
//! | `Y-M-DTh:m:s`         | `2021-06-15T08:30:00` |
//! | `Y-M-D h:m:s`         | `2021-06-15 08:30:00` |
//! | `Y-M-D`               | `2021-06-15`          |
//! | `Y/M/D`               | `2021/06/15`          |
//! | `D-M-Y`               | `15-06-2021`          |
//! | `D/M/Y`               | `15/06/2021`          |
//! | `D-Mon-Y`             | `15-Jun-2021`         |
//! | `D/Mon/Y`             | `15/Jun/2021`         |
//! | `YYYY`                | `2021` (January 1)    |

use crate::error::{CodecError, CodecResult};
use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
enum Month {
    Numeric,
    Abbreviated,
}

struct DatePattern {
    regex: Regex,
    month: Month,
}

fn patterns() -> &'static [DatePattern] {
    static PATTERNS: OnceLock<Vec<DatePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"^(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})T(?P<H>\d{1,2}):(?P<M>\d{1,2}):(?P<S>\d{1,2})$", Month::Numeric),
            (r"^(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2}) (?P<H>\d{1,2}):(?P<M>\d{1,2}):(?P<S>\d{1,2})$", Month::Numeric),
            (r"^(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})$", Month::Numeric),
            (r"^(?P<y>\d{4})/(?P<m>\d{1,2})/(?P<d>\d{1,2})$", Month::Numeric),
            (r"^(?P<d>\d{1,2})-(?P<m>\d{1,2})-(?P<y>\d{4})$", Month::Numeric),
            (r"^(?P<d>\d{1,2})/(?P<m>\d{1,2})/(?P<y>\d{4})$", Month::Numeric),
            (r"^(?P<d>\d{1,2})-(?P<m>\w{3})-(?P<y>\d{4})$", Month::Abbreviated),
            (r"^(?P<d>\d{1,2})/(?P<m>\w{3})/(?P<y>\d{4})$", Month::Abbreviated),
            (r"^(?P<y>\d{4})$", Month::Numeric),
        ]
        .into_iter()
        .filter_map(|(source, month)| match Regex::new(source) {
            Ok(regex) => Some(DatePattern { regex, month }),
            Err(err) => {
                tracing::error!(pattern = source, error = %err, "invalid date pattern");
                None
            }
        })
        .collect()
    })
}

/// Parses a date string using the first matching known pattern.
///
/// Surrounding whitespace is ignored. Dates without a time part resolve to
/// midnight; a bare year resolves to January 1.
///
/// # Errors
///
/// Returns [`CodecError::UnrecognizedDate`] if no pattern matches, or if the
/// matching pattern yields an impossible calendar date.
pub fn parse_date(input: &str) -> CodecResult<NaiveDateTime> {
    let trimmed = input.trim();

    let captures = patterns()
        .iter()
        .find_map(|p| p.regex.captures(trimmed).map(|c| (c, p.month)));

    let Some((caps, month)) = captures else {
        return Err(CodecError::unrecognized_date(input));
    };

    build(&caps, month).ok_or_else(|| CodecError::unrecognized_date(input))
}

/// Like [`parse_date`], but blank input yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`CodecError::UnrecognizedDate`] for non-blank input that does not
/// parse.
pub fn parse_optional_date(input: &str) -> CodecResult<Option<NaiveDateTime>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_date(input).map(Some)
}

fn build(caps: &Captures<'_>, month: Month) -> Option<NaiveDateTime> {
    let num = |name: &str| -> Option<u32> {
        caps.name(name).map_or(Some(0), |m| m.as_str().parse().ok())
    };

    let year: i32 = caps.name("y")?.as_str().parse().ok()?;
    let month = match (caps.name("m"), month) {
        (None, _) => 1,
        (Some(m), Month::Numeric) => m.as_str().parse().ok()?,
        (Some(m), Month::Abbreviated) => month_from_abbrev(m.as_str())?,
    };
    let day = match caps.name("d") {
        None => 1,
        Some(d) => d.as_str().parse().ok()?,
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(num("H")?, num("M")?, num("S")?)
}

fn month_from_abbrev(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = abbrev.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}
