//! crates/healthlens_core/src/parser.rs
//!
//! Turns the raw text returned by the vision model into a structured record.
//! Parsing never fails: text that does not decode degrades to a readable stub.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Number of characters kept as the summary of a degraded response.
pub const SUMMARY_CHARS: usize = 200;

/// The outcome of parsing a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// The response decoded as a JSON object.
    Structured(Map<String, Value>),
    /// The response was not a JSON object.
    Degraded {
        /// The first `SUMMARY_CHARS` characters of the raw text.
        summary: String,
        /// The raw text, verbatim.
        raw: String,
    },
}

impl ParsedResponse {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParsedResponse::Degraded { .. })
    }

    /// The record view used in the outward envelope. A degraded response
    /// becomes `{quickSummary, rawResponse}`.
    pub fn into_record(self) -> Map<String, Value> {
        match self {
            ParsedResponse::Structured(record) => record,
            ParsedResponse::Degraded { summary, raw } => {
                let mut record = Map::new();
                record.insert("quickSummary".into(), Value::String(summary));
                record.insert("rawResponse".into(), Value::String(raw));
                record
            }
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    // ```json\n ... \n```  or  ```\n ... \n```
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:[A-Za-z0-9_+-]+)?[ \t]*\r?\n(.*?)\r?\n?[ \t]*```")
            .expect("fence pattern is a valid regex")
    })
}

/// Returns the body of the first fenced block, or the trimmed text when there is none.
pub fn strip_code_fence(text: &str) -> &str {
    match fence_regex().captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Parses the raw model text.
pub fn parse_model_response(raw: &str) -> ParsedResponse {
    match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(record)) => ParsedResponse::Structured(record),
        Ok(_) | Err(_) => ParsedResponse::Degraded {
            summary: raw.chars().take(SUMMARY_CHARS).collect(),
            raw: raw.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_round_trips() {
        let document = json!({
            "quickSummary": "Contains peanut.",
            "keyComponents": { "allergens": ["peanut"] },
            "healthScore": { "overall": 4 }
        });
        let text = format!("```json\n{}\n```", serde_json::to_string_pretty(&document).unwrap());

        match parse_model_response(&text) {
            ParsedResponse::Structured(record) => assert_eq!(Value::Object(record), document),
            other => panic!("expected structured record, got {other:?}"),
        }
    }

    #[test]
    fn untagged_fence_and_surrounding_prose_are_tolerated() {
        let text = "Here is the analysis:\n```\n{\"quickSummary\": \"ok\"}\n```\nStay safe.";
        let record = parse_model_response(text).into_record();
        assert_eq!(record.get("quickSummary"), Some(&json!("ok")));
    }

    #[test]
    fn bare_json_is_accepted() {
        let parsed = parse_model_response("  {\"recommendations\": [\"drink water\"]}\n");
        assert!(!parsed.is_degraded());
    }

    #[test]
    fn non_json_degrades_with_truncated_summary() {
        let text = "The label is blurry. ".repeat(20);
        assert!(text.chars().count() > SUMMARY_CHARS);

        match parse_model_response(&text) {
            ParsedResponse::Degraded { summary, raw } => {
                assert_eq!(summary, text.chars().take(SUMMARY_CHARS).collect::<String>());
                assert_eq!(raw, text);
            }
            other => panic!("expected degraded record, got {other:?}"),
        }
    }

    #[test]
    fn degraded_record_has_summary_and_raw_fields() {
        let record = parse_model_response("not json").into_record();
        assert_eq!(Value::Object(record), json!({
            "quickSummary": "not json",
            "rawResponse": "not json"
        }));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let text = "é".repeat(250);
        match parse_model_response(&text) {
            ParsedResponse::Degraded { summary, .. } => assert_eq!(summary.chars().count(), 200),
            other => panic!("expected degraded record, got {other:?}"),
        }
    }

    #[test]
    fn json_scalars_are_not_records() {
        assert!(parse_model_response("42").is_degraded());
        assert!(parse_model_response("```json\n[1, 2]\n```").is_degraded());
    }
}
