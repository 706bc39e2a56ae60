//! Recovery parser for reasoning-service output.
//!
//! The reasoning service is asked for a single JSON object, but what comes
//! back is untrusted free text. Parsing walks a fixed ladder and each rung is
//! tried only when the previous one failed:
//!
//! 1. The whole (trimmed) text is one JSON object of verdict shape.
//! 2. The span from the first `{` to the last `}` is one JSON object of
//!    verdict shape. The scan is greedy and does not track nesting.
//! 3. A synthetic all-"unknown" verdict whose explanation embeds at most
//!    [`RAW_PREFIX_LIMIT`] characters of the raw text.
//!
//! [`parse_response`] never fails.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use super::schema::validate_verdict_shape;
use crate::types::{PartialVerdict, ProcessingClass, RiskLevel, Score};

/// Maximum number of raw characters kept in a synthetic explanation.
pub const RAW_PREFIX_LIMIT: usize = 200;

/// Source recorded on synthetic verdicts.
pub const SYNTHETIC_SOURCE: &str = "N/A";

lazy_static! {
    /// First `{` through last `}`, across newlines.
    static ref BRACE_SPAN: Regex = Regex::new(r"(?s)\{.*\}").unwrap();

    /// A lone processing category digit, e.g. "4", "Category: 4", "NOVA 4".
    static ref CATEGORY_DIGIT: Regex = Regex::new(r"\b([1-4])\b").unwrap();
}

/// Which rung of the ladder produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The whole text was a verdict object
    Direct,
    /// A verdict object was extracted from surrounding text
    BraceSpan,
    /// Nothing parseable; a synthetic unknown verdict was produced
    Synthetic,
}

/// A parsed reasoning response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub verdict: PartialVerdict,
    pub recovery: Recovery,
}

/// Parse raw reasoning output for `ingredient`.
pub fn parse_response(ingredient: &str, raw: &str) -> ParsedResponse {
    if let Some(verdict) = parse_object(raw.trim()) {
        return ParsedResponse {
            verdict,
            recovery: Recovery::Direct,
        };
    }

    if let Some(span) = BRACE_SPAN.find(raw) {
        if let Some(verdict) = parse_object(span.as_str()) {
            tracing::debug!(ingredient, "Recovered verdict from embedded JSON span");
            return ParsedResponse {
                verdict,
                recovery: Recovery::BraceSpan,
            };
        }
    }

    tracing::warn!(ingredient, "Reasoning output was not parseable, using unknown verdict");
    ParsedResponse {
        verdict: synthetic_verdict(ingredient, raw),
        recovery: Recovery::Synthetic,
    }
}

/// The verdict used when nothing in the raw text can be parsed.
pub fn synthetic_verdict(ingredient: &str, raw: &str) -> PartialVerdict {
    let prefix: String = raw.chars().take(RAW_PREFIX_LIMIT).collect();
    let ellipsis = if raw.chars().count() > RAW_PREFIX_LIMIT {
        "..."
    } else {
        ""
    };

    PartialVerdict {
        name: Some(ingredient.to_string()),
        risk_level: Some(RiskLevel::Unknown),
        score: Some(Score::Unknown),
        source: Some(SYNTHETIC_SOURCE.to_string()),
        explanation: Some(format!(
            "Unable to parse AI response. Raw response: {}{}",
            prefix, ellipsis
        )),
        processing_class: None,
    }
}

fn parse_object(text: &str) -> Option<PartialVerdict> {
    let value: JsonValue = serde_json::from_str(text).ok()?;
    if let Err(errors) = validate_verdict_shape(&value) {
        tracing::debug!(?errors, "Generated JSON does not have verdict shape");
        return None;
    }
    value.as_object().map(partial_from_map)
}

/// Read verdict fields leniently from a generated object.
///
/// Values that cannot be interpreted are treated as absent rather than
/// failing the whole object.
pub fn partial_from_map(map: &Map<String, JsonValue>) -> PartialVerdict {
    PartialVerdict {
        name: text_field(map, "name"),
        risk_level: map
            .get("risk_level")
            .and_then(JsonValue::as_str)
            .and_then(RiskLevel::parse),
        score: map.get("score").and_then(Score::from_json),
        source: text_field(map, "source"),
        explanation: text_field(map, "explanation"),
        processing_class: map
            .get("processing_class")
            .or_else(|| map.get("nova_group"))
            .and_then(processing_class_from_json),
    }
}

fn text_field(map: &Map<String, JsonValue>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn processing_class_from_json(value: &JsonValue) -> Option<ProcessingClass> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(ProcessingClass::new),
        JsonValue::String(s) => CATEGORY_DIGIT
            .captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .and_then(ProcessingClass::new),
        _ => None,
    }
}
