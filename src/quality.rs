//! Structural quality scoring of provider responses.
//!
//! [`validate`] is total: malformed input is an expected case and yields a
//! zero score, never an error or panic.

use serde_json::Value;

/// Minimum score for a response to be cached.
pub const PASSING_SCORE: u8 = 70;

const MISSING_FIELD_PENALTY: i32 = 20;
const SHORT_SUMMARY_PENALTY: i32 = 10;
const CONFIDENCE_RANGE_PENALTY: i32 = 15;
const EMPTY_LIST_PENALTY: i32 = 10;

/// Summaries shorter than this (in characters) are considered implausible.
pub const MIN_SUMMARY_CHARS: usize = 20;

/// Outcome of scoring one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Parsed payload, `None` if the text was not valid JSON.
    pub parsed: Option<Value>,
    /// Heuristic score in `[0, 100]`.
    pub confidence: u8,
    /// `confidence >= PASSING_SCORE`.
    pub is_valid: bool,
    /// What cost points, for logging.
    pub issues: Vec<String>,
}

impl ValidationResult {
    fn unparseable(reason: String) -> Self {
        Self {
            parsed: None,
            confidence: 0,
            is_valid: false,
            issues: vec![reason],
        }
    }
}

/// Score `text` against the list of fields it is expected to contain.
pub fn validate(text: &str, expected_fields: &[String]) -> ValidationResult {
    let parsed = match parse_structured(text) {
        Ok(value) => value,
        Err(e) => return ValidationResult::unparseable(format!("unparseable response: {e}")),
    };

    let mut score: i32 = 100;
    let mut issues = Vec::new();

    for field in expected_fields {
        match parsed.get(field) {
            None | Some(Value::Null) => {
                score -= MISSING_FIELD_PENALTY;
                issues.push(format!("missing field '{field}'"));
            }
            Some(Value::Array(items)) if items.is_empty() => {
                score -= EMPTY_LIST_PENALTY;
                issues.push(format!("empty list '{field}'"));
            }
            Some(_) => {}
        }
    }

    if let Some(Value::String(summary)) = parsed.get("summary")
        && summary.trim().chars().count() < MIN_SUMMARY_CHARS
    {
        score -= SHORT_SUMMARY_PENALTY;
        issues.push("summary too short".to_string());
    }

    if has_out_of_range_confidence(&parsed) {
        score -= CONFIDENCE_RANGE_PENALTY;
        issues.push("confidence outside [0, 100]".to_string());
    }

    let confidence = score.clamp(0, 100) as u8;
    ValidationResult {
        parsed: Some(parsed),
        confidence,
        is_valid: confidence >= PASSING_SCORE,
        issues,
    }
}

/// Parse model output as JSON.
///
/// Models often wrap JSON in a markdown fence or surround it with prose, so
/// after a direct parse fails this strips a fence, then falls back to the
/// outermost `{...}` span.
pub fn parse_structured(text: &str) -> serde_json::Result<Value> {
    let trimmed = text.trim();
    let first_err = match serde_json::from_str(trimmed) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    let unfenced = strip_code_fence(trimmed);
    if unfenced.len() != trimmed.len()
        && let Ok(v) = serde_json::from_str(unfenced)
    {
        return Ok(v);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}'))
        && start < end
        && let Ok(v) = serde_json::from_str(&unfenced[start..=end])
    {
        return Ok(v);
    }

    Err(first_err)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") up to the first newline.
    let body = match body.find('\n') {
        Some(nl) => &body[nl + 1..],
        None => body,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn has_out_of_range_confidence(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, v)| {
            let bad = key == "confidence"
                && v.as_f64().is_some_and(|c| !(0.0..=100.0).contains(&c));
            bad || has_out_of_range_confidence(v)
        }),
        Value::Array(items) => items.iter().any(has_out_of_range_confidence),
        _ => false,
    }
}
