use regex::Regex;
use std::sync::LazyLock;

use crate::schema::ClassificationResult;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));

/// Strip a markdown code fence (with or without a language tag) around a response.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let start = FENCE_OPEN.find(trimmed).map_or(0, |m| m.end());
    let body = &trimmed[start..];
    let end = FENCE_CLOSE.find(body).map_or(body.len(), |m| m.start());
    body[..end].trim()
}

/// Parse a raw classifier response into a result.
///
/// Non-object JSON (arrays, bare numbers) is a schema mismatch and is rejected.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fences(raw))?;
    if !value.is_object() {
        return Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            value
        )));
    }
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_and_bare_json_parse_identically() {
        let fenced = parse_classification("```json\n{\"score\":5}\n```").unwrap();
        let bare = parse_classification("{\"score\":5}").unwrap();
        assert_eq!(fenced, bare);
        assert_eq!(bare.score, 5);
    }

    #[test]
    fn strips_fence_without_language_tag() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```JSON {\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn rejects_malformed_and_non_object_responses() {
        assert!(parse_classification("I think this paper scores 8").is_err());
        assert!(parse_classification("[1, 2, 3]").is_err());
        assert!(parse_classification("```json\n```").is_err());
    }
}
