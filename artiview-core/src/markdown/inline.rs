use std::sync::LazyLock;

use regex::Regex;

fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid inline markdown regex")
}

static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"~~(.+?)~~"));
static HIGHLIGHT_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"==(.+?)=="));
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"`([^`\n]+)`"));
static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"\*\*(.+?)\*\*"));
static BOLD_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"__(.+?)__"));
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"\*(.+?)\*"));
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"_([^_\n]+)_"));

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"!\[([^\]\n]*)\]\(([^)\n]+)\)"));
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"\[([^\]\n]+)\]\(([^)\n]+)\)"));

/// Inline formatting shared by table cells and body text.
///
/// Order matters: strikethrough, highlight, inline code, bold, italic.
/// Emphasis rules are non-greedy per line and will pair unrelated `*` / `_`
/// markers on the same line.
pub fn format_inline(text: &str) -> String {
    let text = STRIKE_RE.replace_all(text, "<del>${1}</del>");
    let text = HIGHLIGHT_RE.replace_all(&text, "<mark>${1}</mark>");
    let text = CODE_RE.replace_all(&text, "<code>${1}</code>");
    let text = BOLD_STAR_RE.replace_all(&text, "<strong>${1}</strong>");
    let text = BOLD_UNDERSCORE_RE.replace_all(&text, "<strong>${1}</strong>");
    let text = ITALIC_STAR_RE.replace_all(&text, "<em>${1}</em>");
    ITALIC_UNDERSCORE_RE
        .replace_all(&text, "<em>${1}</em>")
        .into_owned()
}

/// `![alt](src)` to `<img>`
pub fn images(text: &str) -> String {
    IMAGE_RE
        .replace_all(text, r#"<img src="${2}" alt="${1}" loading="lazy">"#)
        .into_owned()
}

/// `[text](href)` to an anchor that opens in a new browsing context
pub fn links(text: &str) -> String {
    LINK_RE
        .replace_all(text, r#"<a href="${2}" target="_blank" rel="noopener">${1}</a>"#)
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(format_inline("**x**"), "<strong>x</strong>");
        assert_eq!(format_inline("__x__"), "<strong>x</strong>");
        assert_eq!(format_inline("*x*"), "<em>x</em>");
        assert_eq!(format_inline("_x_"), "<em>x</em>");
        assert_eq!(
            format_inline("**bold** and *it*"),
            "<strong>bold</strong> and <em>it</em>"
        );
    }

    #[test]
    fn test_strike_highlight_code() {
        assert_eq!(format_inline("~~gone~~"), "<del>gone</del>");
        assert_eq!(format_inline("==hot=="), "<mark>hot</mark>");
        assert_eq!(format_inline("run `cargo`"), "run <code>cargo</code>");
    }

    #[test]
    fn test_emphasis_does_not_cross_lines() {
        assert_eq!(format_inline("a_b\nc_d"), "a_b\nc_d");
        assert_eq!(format_inline("*a\nb*"), "*a\nb*");
    }

    #[test]
    fn test_emphasis_pairs_unrelated_markers_on_one_line() {
        // accepted limitation of the dialect
        assert_eq!(
            format_inline("snake_case and other_name"),
            "snake<em>case and other</em>name"
        );
    }

    #[test]
    fn test_images_and_links() {
        assert_eq!(
            images("![logo](img/logo.png)"),
            r#"<img src="img/logo.png" alt="logo" loading="lazy">"#
        );
        assert_eq!(
            links("see [docs](https://example.com)"),
            r#"see <a href="https://example.com" target="_blank" rel="noopener">docs</a>"#
        );
    }

    #[test]
    fn test_image_with_empty_alt() {
        assert_eq!(
            images("![](a.png)"),
            r#"<img src="a.png" alt="" loading="lazy">"#
        );
    }
}
