//! Frontmatter extraction
//!
//! Strips a leading `---` delimited metadata block from a document and parses
//! its `key: value` lines into loosely typed values. This is deliberately not
//! a YAML parser: values are coerced with a small set of rules.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A---\n(?:((?s:.*?))\n)?---(?:\n|\z)").expect("valid frontmatter regex")
});

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]+):(.*)$").expect("valid key regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("valid number regex"));

/// A coerced frontmatter value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(serde_json::Number),
    List(Vec<String>),
    String(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Human readable rendering used by the document header
    pub fn display(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::List(items) => items.join(", "),
            Value::String(s) => s.clone(),
        }
    }
}

pub type Metadata = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct FrontmatterResult {
    pub content: String,
    /// `None` when no block was found or the block held no keys
    pub metadata: Option<Metadata>,
}

impl FrontmatterResult {
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Normalize CRLF / CR line endings to LF
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split a document into its frontmatter metadata and remaining content.
pub fn extract(text: &str) -> FrontmatterResult {
    let normalized = normalize_line_endings(text);
    let normalized = normalized.strip_prefix('\u{feff}').unwrap_or(&normalized);

    let Some(caps) = BLOCK_RE.captures(normalized) else {
        return FrontmatterResult {
            content: text.to_string(),
            metadata: None,
        };
    };

    let block_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let block = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let metadata = parse_block(block);

    FrontmatterResult {
        content: normalized[block_end..].to_string(),
        metadata: if metadata.is_empty() {
            None
        } else {
            Some(metadata)
        },
    }
}

fn parse_block(block: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in block.split('\n') {
        if let Some(caps) = KEY_RE.captures(line) {
            if let Some((key, parts)) = current.take() {
                metadata.insert(key, coerce(&parts.join("\n")));
            }
            let key = caps[1].to_string();
            let first = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            current = Some((key, vec![first]));
            continue;
        }

        if is_continuation(line) {
            if let Some((_, parts)) = current.as_mut() {
                parts.push(line);
            }
        }
    }

    if let Some((key, parts)) = current {
        metadata.insert(key, coerce(&parts.join("\n")));
    }

    metadata
}

fn is_continuation(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with("  ") || line.starts_with('\t')
}

/// Coerce a raw value: bracket list, quoted string, bool, number, then plain string.
pub fn coerce(raw: &str) -> Value {
    let value = raw.trim();

    if value.len() >= 2 && value.starts_with('[') && value.ends_with(']') {
        let items = value[1..value.len() - 1]
            .split(',')
            .map(|item| strip_quotes(item.trim()).to_string())
            .filter(|item| !item.is_empty())
            .collect();
        return Value::List(items);
    }

    if is_quoted(value) {
        return Value::String(value[1..value.len() - 1].to_string());
    }

    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if NUMBER_RE.is_match(value) {
        if let Some(number) = parse_number(value) {
            return Value::Number(number);
        }
    }

    Value::String(value.to_string())
}

fn parse_number(value: &str) -> Option<serde_json::Number> {
    if value.contains('.') {
        value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
    } else {
        value.parse::<i64>().ok().map(serde_json::Number::from)
    }
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
}

fn strip_quotes(value: &str) -> &str {
    if is_quoted(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_title() {
        let result = extract("---\ntitle: X\n---\nbody");
        assert_eq!(result.content, "body");
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.get("title"), Some(&Value::String("X".into())));
    }

    #[test]
    fn test_no_frontmatter_returns_input() {
        let result = extract("no frontmatter");
        assert_eq!(result.content, "no frontmatter");
        assert!(result.metadata.is_none());
    }

    #[test]
    fn test_unclosed_block_is_not_frontmatter() {
        let input = "---\ntitle: X\nbody without closing";
        let result = extract(input);
        assert_eq!(result.content, input);
        assert!(result.metadata.is_none());
    }

    #[test]
    fn test_crlf_and_bom_are_normalized() {
        let result = extract("\u{feff}---\r\ntitle: Hello\r\n---\r\nline one\r\nline two");
        assert_eq!(result.content, "line one\nline two");
        assert_eq!(result.title(), Some("Hello"));
    }

    #[test]
    fn test_content_never_contains_delimiters() {
        let result = extract("---\na: 1\n---\n# Heading\n\ntext");
        assert!(!result.content.starts_with("---"));
        assert_eq!(result.content, "# Heading\n\ntext");
    }

    #[test]
    fn test_empty_block_yields_null_metadata() {
        let result = extract("---\n---\nbody");
        assert_eq!(result.content, "body");
        assert!(result.metadata.is_none());

        let result = extract("---\n\n---\nbody");
        assert_eq!(result.content, "body");
        assert!(result.metadata.is_none());
    }

    #[test]
    fn test_value_coercion() {
        let doc = "---\n\
                   tags: [rust, 'web', \"cli\"]\n\
                   draft: TRUE\n\
                   published: false\n\
                   count: 42\n\
                   ratio: -0.5\n\
                   quoted: \"42\"\n\
                   single: 'hello world'\n\
                   plain: just text\n\
                   empty:\n\
                   ---\n";
        let metadata = extract(doc).metadata.unwrap();

        assert_eq!(
            metadata["tags"],
            Value::List(vec!["rust".into(), "web".into(), "cli".into()])
        );
        assert_eq!(metadata["draft"], Value::Bool(true));
        assert_eq!(metadata["published"], Value::Bool(false));
        assert_eq!(metadata["count"], Value::Number(42.into()));
        assert_eq!(metadata["ratio"].display(), "-0.5");
        assert_eq!(metadata["quoted"], Value::String("42".into()));
        assert_eq!(metadata["single"], Value::String("hello world".into()));
        assert_eq!(metadata["plain"], Value::String("just text".into()));
        assert_eq!(metadata["empty"], Value::String(String::new()));
    }

    #[test]
    fn test_empty_brackets_are_empty_list() {
        assert_eq!(coerce("[]"), Value::List(vec![]));
    }

    #[test]
    fn test_continuation_lines_join_with_newline() {
        let doc = "---\ndescription:\n  first line\n\n\tsecond line\nauthor: me\n---\nbody";
        let metadata = extract(doc).metadata.unwrap();
        assert_eq!(
            metadata["description"],
            Value::String("first line\n\n\tsecond line".into())
        );
        assert_eq!(metadata["author"], Value::String("me".into()));
    }

    #[test]
    fn test_unindented_non_key_lines_are_ignored() {
        let doc = "---\ntitle: A\nnot a key line\nsub-title: B\n---\n";
        let metadata = extract(doc).metadata.unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["title"], Value::String("A".into()));
        assert_eq!(metadata["sub-title"], Value::String("B".into()));
    }

    #[test]
    fn test_metadata_serializes_as_plain_json() {
        let metadata = extract("---\nn: 3\nok: true\nlist: [a]\ns: x\n---\n")
            .metadata
            .unwrap();
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"n": 3, "ok": true, "list": ["a"], "s": "x"})
        );
    }
}
