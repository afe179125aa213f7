//! Lookup payload parsing
//!
//! Fallback chain, first hit wins:
//! 1. the whole payload as JSON
//! 2. the outermost `{...}` span (payload wrapped in prose or code fences)
//! 3. `"field": "value"` pairs pulled out with a regex, the last value may be cut off
//! 4. the whole trimmed payload as the translation
//!
//! Anything that parses as JSON stops at step 1 or 2, even with no usable
//! translation. An error object never becomes a translation.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::LookupResult;

static FIELD_RE: OnceLock<Regex> = OnceLock::new();

fn field_re() -> &'static Regex {
    FIELD_RE.get_or_init(|| {
        Regex::new(r#""(word|translation|phonetic|explanation)"\s*:\s*"((?:[^"\\]|\\.)*)(?:"|$)"#).unwrap()
    })
}

/// Which step of the chain produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Json,
    EmbeddedJson,
    Fields,
    RawText,
}

/// Parse a raw lookup payload; never fails
pub fn parse_lookup_payload(raw: &str, request_text: &str) -> LookupResult {
    parse_with_source(raw, request_text).0
}

/// Like [`parse_lookup_payload`], also reporting how the result was obtained
pub fn parse_with_source(raw: &str, request_text: &str) -> (LookupResult, ParseSource) {
    let trimmed = raw.trim();

    if let Some(result) = from_json(trimmed, request_text) {
        return (result, ParseSource::Json);
    }

    if let Some(result) = embedded_object(trimmed).and_then(|span| from_json(span, request_text)) {
        return (result, ParseSource::EmbeddedJson);
    }

    console_warn!("[Lookup] Malformed result, falling back to text extraction");

    if let Some(result) = from_fields(trimmed, request_text) {
        return (result, ParseSource::Fields);
    }

    let result = LookupResult {
        word: request_text.to_string(),
        translation: trimmed.to_string(),
        ..Default::default()
    };
    (result, ParseSource::RawText)
}

/// Fields of a JSON payload; None only when `text` is not JSON
///
/// An object fills whatever fields it has. A bare string is the translation.
/// Any other JSON value yields an empty result.
fn from_json(text: &str, request_text: &str) -> Option<LookupResult> {
    let value: Value = serde_json::from_str(text).ok()?;
    let mut result = LookupResult {
        word: request_text.to_string(),
        ..Default::default()
    };

    match &value {
        Value::Object(object) => {
            let field = |name: &str| -> String {
                match object.get(name) {
                    Some(Value::String(s)) => s.trim().to_string(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                }
            };
            let word = field("word");
            if !word.is_empty() {
                result.word = word;
            }
            result.translation = field("translation");
            result.phonetic = field("phonetic");
            result.explanation = field("explanation");
        }
        Value::String(s) => result.translation = s.trim().to_string(),
        _ => {}
    }

    if result.translation.is_empty() {
        console_warn!("[Lookup] JSON payload without a translation");
    }
    Some(result)
}

/// The outermost `{...}` span, if any
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn from_fields(text: &str, request_text: &str) -> Option<LookupResult> {
    let mut result = LookupResult {
        word: request_text.to_string(),
        ..Default::default()
    };
    for caps in field_re().captures_iter(text) {
        let value = unescape(&caps[2]);
        if value.is_empty() {
            continue;
        }
        match &caps[1] {
            "word" => result.word = value,
            "translation" => result.translation = value,
            "phonetic" => result.phonetic = value,
            "explanation" => result.explanation = value,
            _ => {}
        }
    }
    if result.translation.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Decode JSON string escapes, keeping the raw text when they are broken
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string())
        .trim()
        .to_string()
}
