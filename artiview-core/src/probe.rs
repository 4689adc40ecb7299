//! Interpretation of probe responses
//!
//! The HTTP side lives in the binary. These functions only look at the
//! (possibly truncated) bodies it hands over.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Bytes read from `/api/artifacts` before the connection is dropped
pub const LISTING_BODY_LIMIT: usize = 8 * 1024;

/// Bytes read from a page while looking for its `<title>`
pub const TITLE_BODY_LIMIT: usize = 4 * 1024;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").expect("valid title regex")
});

/// First `<title>` in an HTML prefix
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Whether a `/api/artifacts` body has the shape an artifact viewer serves:
/// a JSON array that is either empty or whose first element carries string
/// `url` and `name` fields.
///
/// Only the first element is decoded, so a body cut off at
/// [`LISTING_BODY_LIMIT`] is still recognised.
pub fn looks_like_artifact_listing(body: &str) -> bool {
    let Some(rest) = body.trim_start().strip_prefix('[') else {
        return false;
    };
    let rest = rest.trim_start();
    if rest.starts_with(']') {
        return true;
    }

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match stream.next() {
        Some(Ok(first)) => {
            first.get("url").is_some_and(Value::is_string)
                && first.get("name").is_some_and(Value::is_string)
        }
        _ => false,
    }
}

/// `workspace` field of an `/api/identity` body, if present and non-empty
pub fn workspace_from_identity(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("workspace")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE lang=\"en\">  My App \n</TITLE>"),
            Some("My App".into())
        );
        assert_eq!(extract_title("<html><body>no title</body>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
    }

    #[test]
    fn test_listing_empty_array() {
        assert!(looks_like_artifact_listing("[]"));
        assert!(looks_like_artifact_listing("  [ \n ]"));
    }

    #[test]
    fn test_listing_first_element_shape() {
        assert!(looks_like_artifact_listing(
            r#"[{"name":"Plan","path":"Artifacts/plan.md","url":"http://127.0.0.1:3124/Artifacts/plan.md","modified":1,"type":"md","folderLabel":"Artifacts"}]"#
        ));
        assert!(!looks_like_artifact_listing(r#"[{"name":"x"}]"#));
        assert!(!looks_like_artifact_listing(r#"[{"name":"x","url":3}]"#));
        assert!(!looks_like_artifact_listing("[1, 2, 3]"));
    }

    #[test]
    fn test_listing_truncated_body() {
        let body = r#"[{"url":"http://127.0.0.1:3124/a.md","name":"a"},{"url":"http://127.0.0.1:3124/b"#;
        assert!(looks_like_artifact_listing(body));
    }

    #[test]
    fn test_listing_rejects_non_arrays() {
        assert!(!looks_like_artifact_listing(r#"{"url":"x","name":"y"}"#));
        assert!(!looks_like_artifact_listing("<!DOCTYPE html>"));
        assert!(!looks_like_artifact_listing(""));
    }

    #[test]
    fn test_workspace_from_identity() {
        assert_eq!(workspace_from_identity(r#"{"workspace":"notes"}"#), Some("notes".into()));
        assert_eq!(workspace_from_identity(r#"{"workspace":""}"#), None);
        assert_eq!(workspace_from_identity(r#"{"other":1}"#), None);
        assert_eq!(workspace_from_identity("not json"), None);
    }
}
