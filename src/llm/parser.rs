//! JSON extraction from free-form model output
//!
//! Models wrap JSON in prose or code fences. The extractor scans for the
//! first balanced `{...}` object that parses, using single-pass bracket
//! matching that ignores braces inside string literals.

use crate::errors::{RagError, Result};
use serde_json::Value;

/// Maximum accepted response size (1MB)
pub const MAX_INPUT_SIZE: usize = 1_048_576;

/// Extracts JSON objects from model responses
#[derive(Debug, Clone)]
pub struct JsonExtractor {
    max_input_size: usize,
}

impl JsonExtractor {
    pub fn new() -> Self {
        Self::with_capacity(MAX_INPUT_SIZE)
    }

    pub fn with_capacity(max_input_size: usize) -> Self {
        Self { max_input_size }
    }

    /// Return the first parseable JSON object in `text`, if any
    pub fn extract(&self, text: &str) -> Result<Option<Value>> {
        if text.len() > self.max_input_size {
            return Err(RagError::Generic(format!(
                "Response of {} bytes exceeds maximum {}",
                text.len(),
                self.max_input_size
            )));
        }

        let bytes = text.as_bytes();
        let mut offset = 0;

        while offset < bytes.len() {
            let Some((start, end)) = Self::find_balanced_object(&bytes[offset..]) else {
                return Ok(None);
            };

            let (start, end) = (offset + start, offset + end);
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Ok(Some(value));
            }

            // Not valid JSON; resume scanning just past this opening brace
            offset = start + 1;
        }

        Ok(None)
    }

    /// Bracket matching over bytes
    ///
    /// Returns: Some((start_index, end_index)) of the first balanced object
    fn find_balanced_object(bytes: &[u8]) -> Option<(usize, usize)> {
        let mut depth: i32 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in bytes.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            if in_string {
                match byte {
                    b'\\' => escape_next = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match byte {
                b'"' if start.is_some() => in_string = true,
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            return Some((s, i));
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }
}

impl Default for JsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper using the default size limit
pub fn extract_json_object(text: &str) -> Option<Value> {
    JsonExtractor::new().extract(text).ok().flatten()
}

/// Numeric field that may arrive as a number or a numeric string
pub fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|v| {
            if s.trim().ends_with('%') {
                v / 100.0
            } else {
                v
            }
        }),
        _ => None,
    }
}

/// Non-empty string field
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// List of strings; a single string becomes a one-element list
pub fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let value = extract_json_object(r#"{"query_type": "factual", "confidence": 0.9}"#).unwrap();
        assert_eq!(value["query_type"], "factual");
    }

    #[test]
    fn test_object_in_prose_and_fences() {
        let text = "Sure! Here is the analysis:\n```json\n{\"query_type\": \"conceptual\"}\n```\nHope it helps.";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["query_type"], "conceptual");
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"note": "use {braces} carefully", "ok": true}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_nested_object() {
        let text = r#"prefix {"outer": {"inner": [1, 2]}} suffix"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["outer"]["inner"][1], 2);
    }

    #[test]
    fn test_skips_invalid_candidate() {
        let text = r#"{not json} then {"valid": 1}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["valid"], 1);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json_object("I cannot answer that.").is_none());
        assert!(extract_json_object("{ unterminated").is_none());
    }

    #[test]
    fn test_oversized_input_rejected() {
        let extractor = JsonExtractor::with_capacity(8);
        assert!(extractor.extract(r#"{"a": 123456}"#).is_err());
    }

    #[test]
    fn test_field_helpers() {
        let value: Value = serde_json::json!({
            "a": 0.5,
            "b": "0.75",
            "c": "80%",
            "d": "  text ",
            "e": ["x", " ", "y"],
            "f": "single"
        });
        assert_eq!(number_field(&value, "a"), Some(0.5));
        assert_eq!(number_field(&value, "b"), Some(0.75));
        assert_eq!(number_field(&value, "c"), Some(0.8));
        assert_eq!(number_field(&value, "missing"), None);
        assert_eq!(string_field(&value, "d").as_deref(), Some("text"));
        assert_eq!(string_list(&value, "e"), vec!["x", "y"]);
        assert_eq!(string_list(&value, "f"), vec!["single"]);
    }
}
