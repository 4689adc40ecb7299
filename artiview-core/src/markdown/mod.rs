//! Restricted Markdown to HTML renderer
//!
//! A fixed sequence of text substitutions, no syntax tree. Every stage is a
//! `&str -> String` function so ordering can be tested stage by stage.
//! Fenced code and tables are swapped for placeholder comments early and
//! restored at the very end so later stages cannot reinterpret them.

mod document;
mod inline;
mod table;

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub use document::{render_document, title_from_file_name};
pub use inline::format_inline;

use crate::frontmatter::normalize_line_endings;

const SPACER_MARKER: &str = "<!--SPACER-->";
const SPACER_HTML: &str = r#"<div class="spacer" style="height: 1.5em;"></div>"#;

fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid markdown regex")
}

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"\n{3,}"));

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"(?m)^```([A-Za-z0-9_+#.-]*)[ \t]*\n((?s:.*?))^```[ \t]*$")
});

static H4_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^#### (.+)$"));
static H3_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^### (.+)$"));
static H2_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^## (.+)$"));
static H1_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^# (.+)$"));
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^> (.+)$"));
static RULE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^---$"));
static ORDERED_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^\d+\. (.+)$"));
static UNORDERED_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?m)^- (.+)$"));
static EMPTY_P_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"<p>\s*</p>"));

const ORDERED_MARKER: &str = r#" class="ol-item""#;

/// Tags that mark a line as already being block level markup
const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "div", "p", "img",
    "blockquote", "pre", "!",
];

/// Render a Markdown body to an HTML fragment.
///
/// Frontmatter is not handled here; strip it with [`crate::frontmatter::extract`]
/// first or `---` delimiters become section dividers.
pub fn render(markdown: &str) -> String {
    let text = normalize_line_endings(markdown);
    // fences first so blank runs inside code are never collapsed
    let (text, code_blocks) = extract_code_blocks(&text);
    let text = collapse_blank_runs(&text);
    let (text, tables) = table::extract_tables(&text);
    let text = apply_block_rules(&text);
    let text = wrap_lists(&text);
    let text = wrap_paragraphs(&text);
    let text = merge_blockquotes(&text);
    restore_placeholders(&text, &code_blocks, &tables)
}

/// Escape the characters that matter inside element content and attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn collapse_blank_runs(text: &str) -> String {
    BLANK_RUN_RE
        .replace_all(text, format!("\n\n{SPACER_MARKER}\n\n").as_str())
        .into_owned()
}

fn code_placeholder(index: usize) -> String {
    format!("<!--CODE-BLOCK-{index}-->")
}

/// Swap fenced code blocks for placeholders, returning the escaped blocks.
pub fn extract_code_blocks(text: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();

    let replaced = CODE_FENCE_RE.replace_all(text, |caps: &Captures| {
        let lang = &caps[1];
        let code = &caps[2];
        let code = code.strip_suffix('\n').unwrap_or(code);
        let code = escape_html(code);

        let html = if lang.is_empty() {
            format!("<pre><code>{code}</code></pre>")
        } else {
            format!(r#"<pre><code class="language-{lang}">{code}</code></pre>"#)
        };

        let index = blocks.len();
        blocks.push(html);
        code_placeholder(index)
    });

    (replaced.into_owned(), blocks)
}

/// Headings, images, links, inline formatting, quotes, dividers and list items.
pub fn apply_block_rules(text: &str) -> String {
    let text = H4_RE.replace_all(text, "<h4>${1}</h4>");
    let text = H3_RE.replace_all(&text, "<h3>${1}</h3>");
    let text = H2_RE.replace_all(&text, "<h2>${1}</h2>");
    let text = H1_RE.replace_all(&text, "<h1>${1}</h1>");
    let text = inline::images(&text);
    let text = inline::links(&text);
    let text = format_inline(&text);
    let text = QUOTE_RE.replace_all(&text, "<blockquote>${1}</blockquote>");
    let text = RULE_RE.replace_all(&text, r#"<div class="section-divider"></div>"#);
    let text = ORDERED_RE.replace_all(&text, r#"<li class="ol-item">${1}</li>"#);
    UNORDERED_RE
        .replace_all(&text, "<li>${1}</li>")
        .into_owned()
}

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Ordered,
    Unordered,
}

fn list_kind(line: &str) -> Option<ListKind> {
    if !line.ends_with("</li>") {
        return None;
    }
    if line.starts_with(r#"<li class="ol-item">"#) {
        Some(ListKind::Ordered)
    } else if line.starts_with("<li>") {
        Some(ListKind::Unordered)
    } else {
        None
    }
}

/// Group consecutive list item lines of the same kind into `<ol>` / `<ul>`.
pub fn wrap_lists(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_kind = None;

    fn flush(out: &mut Vec<String>, group: &mut Vec<&str>, kind: Option<ListKind>) {
        if group.is_empty() {
            return;
        }
        let (open, close) = match kind {
            Some(ListKind::Ordered) => ("<ol>", "</ol>"),
            _ => ("<ul>", "</ul>"),
        };
        let mut items = group.join("\n");
        items.insert_str(0, open);
        items.push_str(close);
        out.push(items);
        group.clear();
    }

    for line in text.split('\n') {
        let kind = list_kind(line);
        if kind.is_some() && kind == group_kind {
            group.push(line);
            continue;
        }
        flush(&mut out, &mut group, group_kind);
        group_kind = kind;
        if kind.is_some() {
            group.push(line);
        } else {
            out.push(line.to_string());
        }
    }
    flush(&mut out, &mut group, group_kind);

    out.join("\n").replace(ORDERED_MARKER, "")
}

fn starts_with_block_tag(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('<') else {
        return false;
    };
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    BLOCK_TAGS.iter().any(|tag| rest.starts_with(tag))
}

/// Wrap every non-empty line that is not block markup in `<p>`.
pub fn wrap_paragraphs(text: &str) -> String {
    let wrapped: Vec<String> = text
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else if starts_with_block_tag(line) {
                line.to_string()
            } else {
                format!("<p>{line}</p>")
            }
        })
        .collect();

    EMPTY_P_RE.replace_all(&wrapped.join("\n"), "").into_owned()
}

/// Join quote lines that were wrapped one by one into a single block.
pub fn merge_blockquotes(text: &str) -> String {
    text.replace("</blockquote>\n<blockquote>", "<br>")
}

fn restore(text: String, marker: &str, html: &str) -> String {
    text.replace(&format!("<p>{marker}</p>"), html)
        .replace(marker, html)
}

pub fn restore_placeholders(text: &str, code_blocks: &[String], tables: &[String]) -> String {
    let mut text = restore(text.to_string(), SPACER_MARKER, SPACER_HTML);
    for (index, html) in tables.iter().enumerate() {
        text = restore(text, &table::placeholder(index), html);
    }
    for (index, html) in code_blocks.iter().enumerate() {
        text = restore(text, &code_placeholder(index), html);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading() {
        assert_eq!(render("# Hello"), "<h1>Hello</h1>");
    }

    #[test]
    fn test_heading_levels_do_not_overlap() {
        let html = render("#### four\n### three\n## two\n# one");
        assert_eq!(html, "<h4>four</h4>\n<h3>three</h3>\n<h2>two</h2>\n<h1>one</h1>");
    }

    #[test]
    fn test_code_block_is_protected() {
        let html = render("```js\nconst x = 1;\n```");
        assert_eq!(html, r#"<pre><code class="language-js">const x = 1;</code></pre>"#);
    }

    #[test]
    fn test_code_block_content_is_escaped_not_formatted() {
        let html = render("```\nif a < b && **c** { _d_ }\n```");
        assert_eq!(
            html,
            "<pre><code>if a &lt; b &amp;&amp; **c** { _d_ }</code></pre>"
        );
    }

    #[test]
    fn test_code_block_keeps_blank_runs() {
        let html = render("```\na\n\n\n\nb\n```");
        assert_eq!(html, "<pre><code>a\n\n\n\nb</code></pre>");
    }

    #[test]
    fn test_code_block_leading_and_trailing_blank_runs() {
        let html = render("```\n\n\n\nx\n```");
        assert_eq!(html, "<pre><code>\n\n\nx</code></pre>");

        let html = render("```\nx\n\n\n\n```");
        assert_eq!(html, "<pre><code>x\n\n\n</code></pre>");
        assert!(!html.contains("SPACER"));
    }

    #[test]
    fn test_blank_run_before_code_block() {
        let html = render("a\n\n\n\n```\nx\n```");
        assert_eq!(
            html,
            format!("<p>a</p>\n\n{SPACER_HTML}\n\n<pre><code>x</code></pre>")
        );
    }

    #[test]
    fn test_table_with_bold_cell() {
        let html = render("| a | b |\n|---|---|\n| **x** | y |");
        assert!(html.starts_with(r#"<div class="table-wrapper"><table>"#));
        assert!(html.contains("<td><strong>x</strong></td>"));
        assert!(!html.contains("<p>"));
    }

    #[test]
    fn test_inline_parity_between_cells_and_body() {
        let fragment = "**x** and `y` and ~~z~~";
        let body = render(fragment);
        assert_eq!(body, format!("<p>{}</p>", format_inline(fragment)));
        assert_eq!(format_inline("**x**"), "<strong>x</strong>");
    }

    #[test]
    fn test_paragraphs_and_empty_lines() {
        assert_eq!(render("one\n\ntwo"), "<p>one</p>\n\n<p>two</p>");
        assert_eq!(render("   \nx"), "\n<p>x</p>");
    }

    #[test]
    fn test_spacer_for_blank_runs() {
        assert_eq!(
            render("a\n\n\n\nb"),
            format!("<p>a</p>\n\n{SPACER_HTML}\n\n<p>b</p>")
        );
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(
            render("- one\n- two"),
            "<ul><li>one</li>\n<li>two</li></ul>"
        );
    }

    #[test]
    fn test_ordered_list_drops_marker_class() {
        let html = render("1. one\n2. two\n\n- three");
        assert_eq!(
            html,
            "<ol><li>one</li>\n<li>two</li></ol>\n\n<ul><li>three</li></ul>"
        );
        assert!(!html.contains("ol-item"));
    }

    #[test]
    fn test_adjacent_lists_of_different_kind_are_separate() {
        assert_eq!(
            render("1. a\n- b"),
            "<ol><li>a</li></ol>\n<ul><li>b</li></ul>"
        );
    }

    #[test]
    fn test_blockquotes_merge() {
        assert_eq!(
            render("> first\n> second"),
            "<blockquote>first<br>second</blockquote>"
        );
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(
            render("a\n---\nb"),
            "<p>a</p>\n<div class=\"section-divider\"></div>\n<p>b</p>"
        );
    }

    #[test]
    fn test_links_and_images() {
        let html = render("![pic](a.png)\n[site](https://x.dev)");
        assert_eq!(
            html,
            "<img src=\"a.png\" alt=\"pic\" loading=\"lazy\">\n\
             <p><a href=\"https://x.dev\" target=\"_blank\" rel=\"noopener\">site</a></p>"
        );
    }

    #[test]
    fn test_crlf_input() {
        assert_eq!(render("# T\r\nbody"), "<h1>T</h1>\n<p>body</p>");
    }

    #[test]
    fn test_unclosed_fence_degrades_to_text() {
        let html = render("```\nno end");
        assert_eq!(html, "<p>```</p>\n<p>no end</p>");
    }

    #[test]
    fn test_wrapped_placeholder_is_restored() {
        let restored = restore_placeholders(
            "<p><!--CODE-BLOCK-0--></p>",
            &["<pre><code>x</code></pre>".to_string()],
            &[],
        );
        assert_eq!(restored, "<pre><code>x</code></pre>");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
