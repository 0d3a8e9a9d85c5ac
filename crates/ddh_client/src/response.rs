//! Response body decoding.
//!
//! Some server builds append PHP diagnostics (`<br />\n<b>Notice</b>: ...`)
//! after an otherwise valid JSON body. Resilience mode strips that trailer
//! before decoding. It is off unless the caller turns it on.

use regex::Regex;
use serde_json::Value as Json;
use std::sync::OnceLock;

fn trailing_markup() -> Option<&'static Regex> {
    static TRAILER: OnceLock<Option<Regex>> = OnceLock::new();
    TRAILER
        .get_or_init(|| Regex::new(r"(?s)<br />.+").ok())
        .as_ref()
}

/// Decodes response bodies, optionally tolerating trailing markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    resilient: bool,
}

impl ResponseParser {
    /// Creates a parser.
    pub fn new(resilient: bool) -> Self {
        Self { resilient }
    }

    /// Returns true if resilience mode is on.
    pub fn is_resilient(&self) -> bool {
        self.resilient
    }

    /// Decodes a body as JSON. Returns `None` if it is not valid JSON.
    pub fn parse(&self, body: &str) -> Option<Json> {
        if !self.resilient {
            return serde_json::from_str(body).ok();
        }

        let cleaned = match trailing_markup() {
            Some(re) => re.replace(body, ""),
            None => body.into(),
        };
        if cleaned.len() != body.len() {
            tracing::debug!(
                stripped = body.len() - cleaned.len(),
                "stripped trailing markup from response"
            );
        }
        serde_json::from_str(&cleaned).ok()
    }

    /// Decodes a body and extracts its `nid`, as a string.
    pub fn parse_nid(&self, body: &str) -> Option<String> {
        self.parse(body)?.get("nid").and_then(json_id)
    }
}

/// Renders a JSON scalar id (`"12"` or `12`) as a string.
pub fn json_id(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
