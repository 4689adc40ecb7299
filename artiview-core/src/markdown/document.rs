use std::path::Path;

use super::{escape_html, render};
use crate::frontmatter::{self, Metadata};

const STYLESHEET: &str = r#"
:root { color-scheme: light dark; }
body {
  margin: 0;
  font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
  line-height: 1.6;
  color: #1f2328;
  background: #ffffff;
}
@media (prefers-color-scheme: dark) {
  body { color: #e6edf3; background: #0d1117; }
  pre, code { background: #161b22; }
  th { background: #161b22; }
  th, td { border-color: #30363d; }
}
.content-section { max-width: 880px; margin: 0 auto; padding: 2rem 1.5rem 4rem; }
.metadata { font-size: 0.85em; opacity: 0.75; margin-bottom: 1.5rem; }
.metadata dt { font-weight: 600; display: inline; }
.metadata dd { display: inline; margin: 0 1rem 0 0.25rem; }
h1, h2, h3, h4 { line-height: 1.25; margin: 1.5em 0 0.5em; }
pre { padding: 1rem; overflow-x: auto; border-radius: 6px; background: #f6f8fa; }
code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 0.9em; }
:not(pre) > code { padding: 0.1em 0.35em; border-radius: 4px; background: #f6f8fa; }
blockquote { margin: 1em 0; padding: 0 1em; border-left: 4px solid #d0d7de; opacity: 0.85; }
mark { padding: 0 0.2em; }
img { max-width: 100%; }
.table-wrapper { overflow-x: auto; margin: 1em 0; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #d0d7de; padding: 0.4em 0.75em; text-align: left; }
th { background: #f6f8fa; }
.section-divider { height: 1px; margin: 2em 0; background: #d0d7de; }
"#;

/// Title for a document without frontmatter: file stem with underscores as spaces
pub fn title_from_file_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

/// Render a complete, self-contained HTML page for a Markdown document.
///
/// The title comes from the `title` frontmatter key when present, otherwise
/// `fallback_title`. Other metadata keys are listed above the body.
pub fn render_document(markdown: &str, fallback_title: &str) -> String {
    let extracted = frontmatter::extract(markdown);
    let title = extracted.title().unwrap_or(fallback_title).to_string();
    let body = render(&extracted.content);

    let header = extracted
        .metadata
        .as_ref()
        .map(metadata_header)
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n\
         <style>{STYLESHEET}</style>\n\
         </head>\n\
         <body>\n\
         <div class=\"content-section\">\n\
         {header}{body}\n\
         </div>\n\
         </body>\n\
         </html>\n",
        title = escape_html(&title),
    )
}

fn metadata_header(metadata: &Metadata) -> String {
    let items: String = metadata
        .iter()
        .filter(|(key, _)| key.as_str() != "title")
        .map(|(key, value)| {
            format!(
                "<dt>{}</dt><dd>{}</dd>",
                escape_html(key),
                escape_html(&value.display())
            )
        })
        .collect();

    if items.is_empty() {
        String::new()
    } else {
        format!("<dl class=\"metadata\">{items}</dl>\n")
    }
}
