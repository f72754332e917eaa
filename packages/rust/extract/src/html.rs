//! HTML-to-text conversion.
//!
//! Strips page chrome with `scraper`, converts the remaining content with
//! `htmd`, then normalizes whitespace. The output is plain text with light
//! structure (headings, lists) preserved as line breaks.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use wikisync_shared::{Result, WikiSyncError};

/// Convert rendered HTML to normalized plain text.
pub fn html_to_text(html: &str) -> Result<String> {
    let content_html = extract_content_html(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let raw = converter
        .convert(&content_html)
        .map_err(|e| WikiSyncError::Extract(format!("html conversion failed: {e}")))?;

    let text = normalize_whitespace(&raw);
    debug!(input_len = html.len(), output_len = text.len(), "html converted");
    Ok(text)
}

/// Pull the content region out of a full HTML document.
///
/// Prefers `<main>`, then `<article>`, then `<body>`; falls back to the raw
/// input for fragments without any of these.
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for selector in ["main", "article", "body"] {
        let sel = Selector::parse(selector).expect("valid selector");
        if let Some(el) = doc.select(&sel).next() {
            let inner = el.inner_html();
            if !inner.trim().is_empty() {
                return inner;
            }
        }
    }

    html.to_string()
}

/// Collapse runs of blank lines, strip trailing spaces, trim the ends.
fn normalize_whitespace(text: &str) -> String {
    static BLANK_RUNS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let stripped: String = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUNS.replace_all(&stripped, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_simple_page() {
        let html = r#"<html><body><main>
            <h1>Sandbox</h1>
            <p>The sandbox is a page to try editing.</p>
        </main></body></html>"#;

        let text = html_to_text(html).expect("convert");
        assert!(text.contains("Sandbox"));
        assert!(text.contains("try editing"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn skips_script_and_style() {
        let html = r#"<html><body>
            <script>analytics();</script>
            <style>.x { color: red; }</style>
            <p>Visible content</p>
        </body></html>"#;

        let text = html_to_text(html).expect("convert");
        assert!(text.contains("Visible content"));
        assert!(!text.contains("analytics"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn prefers_main_over_body() {
        let html = r#"<html><body>
            <nav>Site navigation</nav>
            <main><p>Page body</p></main>
        </body></html>"#;

        let text = html_to_text(html).expect("convert");
        assert!(text.contains("Page body"));
        assert!(!text.contains("Site navigation"));
    }

    #[test]
    fn collapses_blank_runs() {
        let html = "<body><p>one</p><br><br><br><br><p>two</p></body>";
        let text = html_to_text(html).expect("convert");
        assert!(!text.contains("\n\n\n"));
        assert!(text.starts_with("one"));
        assert!(text.ends_with("two"));
    }

    #[test]
    fn empty_input_yields_empty_text() {
        let text = html_to_text("").expect("convert");
        assert!(text.is_empty());
    }
}
