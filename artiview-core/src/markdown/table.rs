use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::inline::format_inline;

/// Header row, a separator row made of dashes, colons and pipes, then one or
/// more body rows. All rows start and end with a pipe.
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(\|.+\|)[ \t]*\n\|[ \t]*:?-+[-:| \t]*\|[ \t]*\n((?:\|.*\|[ \t]*(?:\n|\z))+)",
    )
    .expect("valid table regex")
});

pub fn placeholder(index: usize) -> String {
    format!("<!--TABLE-{index}-->")
}

/// Replace every table with an indexed placeholder, returning the rendered
/// tables in placeholder order.
pub fn extract_tables(text: &str) -> (String, Vec<String>) {
    let mut tables = Vec::new();

    let replaced = TABLE_RE.replace_all(text, |caps: &Captures| {
        let header = &caps[1];
        let body = &caps[2];
        let index = tables.len();
        tables.push(render_table(header, body));

        // the last body row consumes its newline, keep the line break
        if body.ends_with('\n') {
            format!("{}\n", placeholder(index))
        } else {
            placeholder(index)
        }
    });

    (replaced.into_owned(), tables)
}

fn split_cells(row: &str) -> Vec<&str> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(str::trim).collect()
}

fn render_table(header: &str, body: &str) -> String {
    let mut html = String::from(r#"<div class="table-wrapper"><table><thead><tr>"#);
    for cell in split_cells(header) {
        html.push_str("<th>");
        html.push_str(&format_inline(cell));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");

    for row in body.lines().filter(|line| !line.trim().is_empty()) {
        html.push_str("<tr>");
        for cell in split_cells(row) {
            html.push_str("<td>");
            html.push_str(&format_inline(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_table() {
        let (text, tables) = extract_tables("| a | b |\n|---|---|\n| **x** | y |");
        assert_eq!(text, "<!--TABLE-0-->");
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            "<div class=\"table-wrapper\"><table><thead><tr><th>a</th><th>b</th></tr></thead>\
             <tbody><tr><td><strong>x</strong></td><td>y</td></tr></tbody></table></div>"
        );
    }

    #[test]
    fn test_surrounding_text_is_kept() {
        let input = "before\n| h |\n| :-: |\n| 1 |\n| 2 |\nafter";
        let (text, tables) = extract_tables(input);
        assert_eq!(text, "before\n<!--TABLE-0-->\nafter");
        assert!(tables[0].contains("<td>1</td>"));
        assert!(tables[0].contains("<td>2</td>"));
    }

    #[test]
    fn test_header_without_separator_is_not_a_table() {
        let input = "| a | b |\n| c | d |";
        let (text, tables) = extract_tables(input);
        assert_eq!(text, input);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_multiple_tables_are_indexed() {
        let input = "| a |\n|---|\n| 1 |\n\n| b |\n|---|\n| 2 |\n";
        let (text, tables) = extract_tables(input);
        assert_eq!(text, "<!--TABLE-0-->\n\n<!--TABLE-1-->\n");
        assert_eq!(tables.len(), 2);
        assert!(tables[1].contains("<th>b</th>"));
    }

    #[test]
    fn test_cell_formatting_matches_inline_pass() {
        let (_, tables) = extract_tables("| `c` | ~~d~~ |\n|---|---|\n| _e_ | ==f== |");
        let table = &tables[0];
        assert!(table.contains(&format!("<th>{}</th>", format_inline("`c`"))));
        assert!(table.contains("<th><del>d</del></th>"));
        assert!(table.contains("<td><em>e</em></td>"));
        assert!(table.contains("<td><mark>f</mark></td>"));
    }
}
