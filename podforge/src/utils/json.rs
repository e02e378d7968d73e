//! Recovery of JSON payloads from loosely formatted engine responses.
//!
//! Text-generation engines regularly wrap the requested structured output in
//! markdown fences or surrounding prose. These helpers pull the intended
//! payload back out before deserialization.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{Error, Result};

/// Extract the JSON payload embedded in `raw`.
///
/// Tried in order: the raw text itself, the contents of the first fenced
/// code block, and finally the first balanced `{...}` or `[...]` span.
pub fn extract_json_payload(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed.to_string());
    }

    if let Some(fenced) = extract_fenced_block(trimmed) {
        let inner = fenced.trim();
        if inner.starts_with('{') || inner.starts_with('[') {
            return Some(inner.to_string());
        }
    }

    extract_balanced(trimmed, '{', '}').or_else(|| extract_balanced(trimmed, '[', ']'))
}

/// Deserialize `raw` into `T`, tolerating wrapping noise.
pub fn parse_lenient<T: DeserializeOwned>(service: &str, raw: &str) -> Result<T> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Ok(value);
    }

    let payload = extract_json_payload(raw).ok_or_else(|| Error::ProviderRejected {
        service: service.to_string(),
        message: "response contained no JSON payload".to_string(),
    })?;

    serde_json::from_str::<T>(&payload).map_err(|error| {
        warn!(
            service,
            raw_len = raw.len(),
            error = %error,
            "Failed to parse recovered JSON payload"
        );
        Error::ProviderRejected {
            service: service.to_string(),
            message: format!("malformed JSON payload: {error}"),
        }
    })
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the optional language tag on the opening fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample = parse_lenient("textgen", r#"{"name":"a","count":2}"#).unwrap();
        assert_eq!(parsed.count, 2);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here you go:\n```json\n{\"name\":\"a\",\"count\":3}\n```\nanything else?";
        let parsed: Sample = parse_lenient("textgen", raw).unwrap();
        assert_eq!(parsed.count, 3);
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = "The result is {\"name\":\"x\",\"count\":7} as requested.";
        let parsed: Sample = parse_lenient("textgen", raw).unwrap();
        assert_eq!(parsed.name, "x");
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let raw = "note {\"name\":\"has } brace\",\"count\":1} end";
        let parsed: Sample = parse_lenient("textgen", raw).unwrap();
        assert_eq!(parsed.name, "has } brace");
    }

    #[test]
    fn test_array_payload() {
        let raw = "```\n[1, 2, 3]\n```";
        let parsed: Vec<u32> = parse_lenient("textgen", raw).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_json_is_rejected() {
        let result = parse_lenient::<Sample>("textgen", "sorry, I cannot do that");
        assert!(matches!(result, Err(crate::Error::ProviderRejected { .. })));
    }
}
