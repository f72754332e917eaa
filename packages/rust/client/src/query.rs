//! Search query construction.
//!
//! Translates high-level sync filters (root page scope, tag, recursion,
//! time window) into a single full-text query string against the wiki's
//! SOLR index, plus the wiki-scope parameter extracted from a prefixed
//! root page reference. No I/O happens here.

use chrono::{DateTime, Utc};

/// Auxiliary scope parameters extracted while building a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryScope {
    /// Wiki name parsed from a `wiki:Page.Path` root page reference.
    pub wiki: Option<String>,
}

/// Build the search query string for one batch.
///
/// `root_page` and `tag` are mutually exclusive scope filters; when both are
/// given the root page wins. With neither, the query still restricts to
/// visible document-type content (optionally time-bounded) across the whole
/// wiki.
pub fn build_query(
    root_page: Option<&str>,
    tag: Option<&str>,
    recursive: bool,
    since_ms: Option<i64>,
) -> (String, QueryScope) {
    let mut terms: Vec<String> = vec!["type:(\"DOCUMENT\")".into(), "hidden:false".into()];
    let mut scope = QueryScope::default();

    if let Some(root_page) = root_page {
        // A colon separates an optional wiki prefix from the page reference:
        //   "subwiki:Sandbox.WebHome" -> wiki="subwiki", page_ref="Sandbox.WebHome"
        //   "Sandbox.WebHome"         -> no wiki,        page_ref="Sandbox.WebHome"
        let page_ref = match root_page.split_once(':') {
            Some((wiki, page_ref)) => {
                scope.wiki = Some(wiki.to_string());
                page_ref
            }
            None => root_page,
        };

        let space = space_from_page_ref(page_ref);
        terms.push(space_filter(space, recursive));
    } else if let Some(tag) = tag {
        terms.push(format!(
            "property.XWiki.TagClass.tags:\"{}\"",
            escape_term(tag)
        ));
    }

    if let Some(since_ms) = since_ms {
        terms.push(modified_filter(since_ms));
    }

    let query = terms
        .iter()
        .map(|t| format!("({t})"))
        .collect::<Vec<_>>()
        .join(" AND ");

    (query, scope)
}

/// Extract the space name from a page reference.
///
/// A trailing `.WebHome` denotes the space's home page and is stripped
/// (`"Sandbox.WebHome"` -> `"Sandbox"`). Any other dotted value is a literal
/// space reference (`"Help.Macros"` stays as-is), as is a bare space name.
fn space_from_page_ref(page_ref: &str) -> &str {
    page_ref.strip_suffix(".WebHome").unwrap_or(page_ref)
}

/// Build the space scope term.
///
/// Recursive scope matches the space and all descendants with a prefix
/// wildcard. The index treats terms independently, so multi-word space names
/// require each leading word and wildcard only the last one. Exact scope is
/// a quoted term.
fn space_filter(space: &str, recursive: bool) -> String {
    if !recursive {
        return format!("space:\"{}\"", escape_term(space));
    }

    let words: Vec<&str> = space.split_whitespace().collect();
    match words.split_last() {
        Some((last, leading)) if !leading.is_empty() => {
            let required: Vec<String> = leading.iter().map(|w| format!("+{w}")).collect();
            format!("space:({} +{last}*)", required.join(" "))
        }
        _ => format!("space:({space}*)"),
    }
}

/// Inclusive lower-bound range term on the modification date, open above.
fn modified_filter(since_ms: i64) -> String {
    let since = DateTime::<Utc>::from_timestamp_millis(since_ms)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ");
    format!("date:[{since} TO *]")
}

/// Escape backslash and double-quote for use inside a quoted term.
fn escape_term(val: &str) -> String {
    val.replace('\\', "\\\\").replace('"', "\\\"")
}
